use super::models::*;
use super::sqlite::Database;
use ahash::AHashMap;
use rusqlite::{params, Result, Row, Transaction, TransactionBehavior};
use tracing::debug;

const INSERT_PAGE: &str = "INSERT INTO page_hashes (pdf_path, page_number, page_hash, original_md5) \
                           VALUES (?1, ?2, ?3, ?4)";

fn page_record(row: &Row<'_>) -> Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        document_path: row.get(1)?,
        page_number: row.get(2)?,
        page_hash: row.get(3)?,
        document_checksum: row.get(4)?,
    })
}

impl Database {
    // ── Page Hashes ──────────────────────────────────────────────

    /// Append one page record. Does not deduplicate.
    pub fn put_page(
        &self,
        document_path: &str,
        page_number: u32,
        page_hash: &str,
        checksum: &str,
    ) -> Result<i64> {
        self.connection().execute(
            INSERT_PAGE,
            params![document_path, page_number, page_hash, checksum],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Replace every row of `document_path` with `pages` and mark the
    /// document as fully hashed, atomically. `pages` is (page_number, hash)
    /// in the order the rows should be written.
    pub fn record_document(
        &self,
        document_path: &str,
        checksum: &str,
        pages: &[(u32, String)],
    ) -> Result<usize> {
        let tx = Transaction::new_unchecked(self.connection(), TransactionBehavior::Immediate)?;
        let replaced = tx.execute(
            "DELETE FROM page_hashes WHERE pdf_path = ?1",
            params![document_path],
        )?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_PAGE)?;
            for (page_number, page_hash) in pages {
                count += stmt.execute(params![document_path, page_number, page_hash, checksum])?;
            }
        }
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO hashed_document (pdf_path, original_md5, page_count, completed_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(pdf_path) DO UPDATE SET \
                 original_md5 = excluded.original_md5, \
                 page_count = excluded.page_count, \
                 completed_at = excluded.completed_at",
            params![document_path, checksum, pages.len() as u32, now],
        )?;
        tx.commit()?;
        if replaced > 0 {
            debug!("Replaced {} stale rows for {}", replaced, document_path);
        }
        debug!("Recorded {} pages for {}", count, document_path);
        Ok(count)
    }

    /// Every distinct page hash, in the order each was first stored.
    pub fn distinct_hashes(&self) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(
            "SELECT page_hash FROM page_hashes WHERE page_hash IS NOT NULL \
             GROUP BY page_hash ORDER BY MIN(id)",
        )?;
        let hashes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(hashes)
    }

    pub fn records_for_hash(&self, page_hash: &str) -> Result<Vec<PageRecord>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT id, pdf_path, page_number, page_hash, original_md5 \
             FROM page_hashes WHERE page_hash = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![page_hash], page_record)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn records_for_document(&self, document_path: &str) -> Result<Vec<PageRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, pdf_path, page_number, page_hash, original_md5 \
             FROM page_hashes WHERE pdf_path = ?1 ORDER BY page_number, id",
        )?;
        let records = stmt
            .query_map(params![document_path], page_record)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn page_count(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM page_hashes", [], |row| row.get(0))
    }

    // ── Completion Markers ───────────────────────────────────────

    pub fn hashed_document(&self, document_path: &str) -> Result<Option<HashedDocument>> {
        match self.connection().query_row(
            "SELECT pdf_path, original_md5, page_count, completed_at \
             FROM hashed_document WHERE pdf_path = ?1",
            params![document_path],
            |row| {
                Ok(HashedDocument {
                    document_path: row.get(0)?,
                    document_checksum: row.get(1)?,
                    page_count: row.get(2)?,
                    completed_at: row.get(3)?,
                })
            },
        ) {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// True when the document was fully hashed with this exact content.
    pub fn is_document_current(&self, document_path: &str, checksum: &str) -> Result<bool> {
        Ok(self
            .hashed_document(document_path)?
            .is_some_and(|doc| doc.document_checksum == checksum))
    }

    // ── OCR Status ───────────────────────────────────────────────

    pub fn ocr_status(&self, document_path: &str) -> Result<Option<OcrRecord>> {
        match self.connection().query_row(
            "SELECT pdf_path, status, attempts FROM ocr_status WHERE pdf_path = ?1",
            params![document_path],
            |row| {
                Ok(OcrRecord {
                    document_path: row.get(0)?,
                    status: row.get(1)?,
                    attempts: row.get(2)?,
                })
            },
        ) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn all_ocr_status(&self) -> Result<AHashMap<String, OcrRecord>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT pdf_path, status, attempts FROM ocr_status")?;
        let records = stmt
            .query_map([], |row| {
                Ok(OcrRecord {
                    document_path: row.get(0)?,
                    status: row.get(1)?,
                    attempts: row.get(2)?,
                })
            })?
            .map(|r| r.map(|record| (record.document_path.clone(), record)))
            .collect::<Result<AHashMap<_, _>>>()?;
        Ok(records)
    }

    /// Upsert a document's OCR status. The stored attempt count never goes down.
    pub fn set_ocr_status(
        &self,
        document_path: &str,
        status: OcrStatus,
        attempts: u32,
    ) -> Result<()> {
        self.connection().execute(
            "INSERT INTO ocr_status (pdf_path, status, attempts) VALUES (?1, ?2, ?3) \
             ON CONFLICT(pdf_path) DO UPDATE SET \
                 status = excluded.status, \
                 attempts = MAX(COALESCE(ocr_status.attempts, 0), excluded.attempts)",
            params![document_path, status, attempts],
        )?;
        debug!(
            "OCR status for {}: {} ({} attempts)",
            document_path, status, attempts
        );
        Ok(())
    }
}
