use crate::config::AppConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::scanner;
use crate::storage::models::{OcrRecord, OcrStatus};
use crate::storage::Database;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, warn};

use super::OcrTool;

/// Where one document stands after a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    Completed,
    /// Failed, but still under the retry limit.
    Retry { attempts: u32 },
    /// Failed and reached the retry limit.
    Failed { attempts: u32 },
    /// Status could not be read or written; not retried this run.
    StoreError,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OcrSummary {
    pub completed: usize,
    /// Still in `retry` after both passes; picked up again next run.
    pub pending_retry: usize,
    pub failed: usize,
    pub skipped: usize,
    pub store_errors: usize,
}

/// Runs OCR over a tree of PDFs with persisted per-document status.
///
/// Policy: one bulk pass over every document that is not terminal, then one
/// bulk retry pass over the documents that ended the first pass in `retry`.
/// Attempt counts persist, so later runs continue where this one stopped.
pub struct OcrOrchestrator {
    tool: Box<dyn OcrTool>,
    db_path: String,
    input_dir: PathBuf,
    output_dir: PathBuf,
    jobs: usize,
    retry_limit: u32,
    retry_failed: bool,
    ignore_patterns: Vec<String>,
}

impl OcrOrchestrator {
    pub fn new(config: &AppConfig, tool: Box<dyn OcrTool>) -> Self {
        Self {
            tool,
            db_path: config.db_path.clone(),
            input_dir: PathBuf::from(&config.input_dir),
            output_dir: PathBuf::from(&config.output_dir),
            jobs: config.jobs.max(1),
            retry_limit: config.retry_limit.max(1),
            retry_failed: config.retry_failed,
            ignore_patterns: config.ignore_patterns.clone(),
        }
    }

    pub fn process(&self, reporter: &dyn ProgressReporter) -> Result<OcrSummary, Error> {
        let known = Database::open(&self.db_path)?.all_ocr_status()?;
        let mut summary = OcrSummary::default();

        let mut documents = Vec::new();
        for path in scanner::discover_pdfs(&self.input_dir, &self.ignore_patterns)? {
            let key = path.to_string_lossy();
            match known.get(key.as_ref()).map(|r| r.status) {
                Some(OcrStatus::Completed) => summary.skipped += 1,
                Some(OcrStatus::Failed) if !self.retry_failed => summary.skipped += 1,
                _ => documents.push(path),
            }
        }

        info!(
            "Found {} PDF files to process ({} skipped from earlier runs).",
            documents.len(),
            summary.skipped
        );
        if documents.is_empty() {
            info!("No PDF files found to process.");
            return Ok(summary);
        }

        fs::create_dir_all(&self.output_dir)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()?;

        let first = pool.install(|| self.run_pass("Processing PDFs", &documents, reporter));
        let retry: Vec<PathBuf> = first
            .iter()
            .filter(|(_, outcome)| matches!(outcome, DocumentOutcome::Retry { .. }))
            .map(|(path, _)| path.clone())
            .collect();

        let mut outcomes = first;
        if !retry.is_empty() {
            info!("Retrying {} failed files...", retry.len());
            let second = pool.install(|| self.run_pass("Retrying PDFs", &retry, reporter));
            for (path, outcome) in second {
                if let Some(slot) = outcomes.iter_mut().find(|(p, _)| *p == path) {
                    slot.1 = outcome;
                }
            }
        }

        for (path, outcome) in &outcomes {
            match outcome {
                DocumentOutcome::Completed => summary.completed += 1,
                DocumentOutcome::Retry { attempts } => {
                    warn!(
                        "File failed after multiple attempts: {} ({} so far)",
                        path.display(),
                        attempts
                    );
                    summary.pending_retry += 1;
                }
                DocumentOutcome::Failed { .. } => summary.failed += 1,
                DocumentOutcome::StoreError => summary.store_errors += 1,
            }
        }
        info!(
            "OCR finished: {} completed, {} awaiting retry, {} failed, {} skipped",
            summary.completed, summary.pending_retry, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    fn run_pass(
        &self,
        label: &str,
        documents: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Vec<(PathBuf, DocumentOutcome)> {
        reporter.on_ocr_pass_start(label, documents.len());
        let done = AtomicUsize::new(0);

        let outcomes: Vec<(PathBuf, DocumentOutcome)> = documents
            .par_iter()
            .map(|path| {
                let outcome = match self.process_document(path) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Error tracking OCR status for {}: {}", path.display(), e);
                        DocumentOutcome::StoreError
                    }
                };
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_ocr_progress(n, documents.len());
                (path.clone(), outcome)
            })
            .collect();

        let failures = outcomes
            .iter()
            .filter(|(_, o)| *o != DocumentOutcome::Completed)
            .count();
        reporter.on_ocr_pass_complete(label, failures);
        outcomes
    }

    /// Where the OCR'd copy of `path` goes: the same relative path under the
    /// output directory, so same-named files in different folders stay apart.
    pub fn output_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.input_dir) {
            Ok(relative) => self.output_dir.join(relative),
            Err(_) => self
                .output_dir
                .join(path.file_name().unwrap_or(path.as_os_str())),
        }
    }

    /// One attempt at one document, with its own store connection.
    pub fn process_document(&self, path: &Path) -> Result<DocumentOutcome, Error> {
        let key = path.to_string_lossy();
        let db = Database::open(&self.db_path)?;
        let record = db
            .ocr_status(&key)?
            .unwrap_or_else(|| OcrRecord::pending(&key));

        if record.status == OcrStatus::Completed {
            return Ok(DocumentOutcome::Completed);
        }

        let output = self.output_path(path);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.tool.run(path, &output) {
            Ok(()) => {
                db.set_ocr_status(&key, OcrStatus::Completed, record.attempts)?;
                Ok(DocumentOutcome::Completed)
            }
            Err(e) => {
                let attempts = record.attempts + 1;
                if attempts >= self.retry_limit {
                    error!(
                        "Error processing file {} after {} attempts: {}",
                        path.display(),
                        attempts,
                        e
                    );
                    db.set_ocr_status(&key, OcrStatus::Failed, attempts)?;
                    Ok(DocumentOutcome::Failed { attempts })
                } else {
                    warn!(
                        "Attempt {} of {} failed for {}: {}",
                        attempts,
                        self.retry_limit,
                        path.display(),
                        e
                    );
                    db.set_ocr_status(&key, OcrStatus::Retry, attempts)?;
                    Ok(DocumentOutcome::Retry { attempts })
                }
            }
        }
    }
}
