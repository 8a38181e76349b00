use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;

/// One hashed page of one document. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub id: i64,
    pub document_path: String,
    /// 1-based.
    pub page_number: u32,
    pub page_hash: String,
    /// MD5 of the whole document; the same on every row of a document.
    pub document_checksum: String,
}

/// Completion marker written together with a document's page rows.
#[derive(Debug, Clone)]
pub struct HashedDocument {
    pub document_path: String,
    pub document_checksum: String,
    pub page_count: u32,
    pub completed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrStatus {
    Pending,
    Completed,
    Retry,
    Failed,
}

impl OcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrStatus::Pending => "pending",
            OcrStatus::Completed => "completed",
            OcrStatus::Retry => "retry",
            OcrStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OcrStatus::Completed | OcrStatus::Failed)
    }
}

impl fmt::Display for OcrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OcrStatus::Pending),
            "completed" => Ok(OcrStatus::Completed),
            "retry" => Ok(OcrStatus::Retry),
            "failed" => Ok(OcrStatus::Failed),
            other => Err(format!("unknown OCR status '{}'", other)),
        }
    }
}

impl ToSql for OcrStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OcrStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Per-document OCR bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRecord {
    pub document_path: String,
    pub status: OcrStatus,
    pub attempts: u32,
}

impl OcrRecord {
    pub fn pending(document_path: &str) -> Self {
        Self {
            document_path: document_path.to_string(),
            status: OcrStatus::Pending,
            attempts: 0,
        }
    }
}
