use crate::analysis::{self, Cluster};
use crate::config::{AppConfig, ConcurrencyMode};
use crate::error::Error;
use crate::export::{self, ExportSummary};
use crate::hasher::{self, FuzzyHasher, SpamSum};
use crate::progress::ProgressReporter;
use crate::raster::{PdftoppmRasterizer, RasterizationError, Rasterizer};
use crate::scanner;
use crate::storage::Database;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub struct DedupeEngine {
    config: AppConfig,
    rasterizer: Box<dyn Rasterizer>,
    hasher: Box<dyn FuzzyHasher>,
}

#[derive(Debug, Default)]
pub struct HashSummary {
    pub scan_duration: Duration,
    pub hash_duration: Duration,
    pub documents_found: usize,
    pub documents_hashed: usize,
    /// Already hashed with identical content.
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub pages_stored: usize,
}

#[derive(Debug, Default)]
pub struct ClusterSummary {
    pub cluster_duration: Duration,
    pub export_duration: Duration,
    pub distinct_hashes: usize,
    pub clusters: usize,
    pub export: ExportSummary,
}

#[derive(Debug, Default)]
pub struct RunResult {
    pub hashing: HashSummary,
    pub clustering: ClusterSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashOutcome {
    Stored(usize),
    Skipped,
    Failed,
}

impl DedupeEngine {
    pub fn new(config: AppConfig) -> Self {
        let rasterizer = Box::new(PdftoppmRasterizer::new(config.dpi));
        Self {
            config,
            rasterizer,
            hasher: Box::new(SpamSum::new()),
        }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.config.db_path = path.to_string();
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Box<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_hasher(mut self, hasher: Box<dyn FuzzyHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the full page deduplication pipeline:
    /// 1. Find PDFs under the input directory
    /// 2. Rasterize and fuzzy-hash every page, storing the results
    /// 3. Cluster similar hashes and write one PDF per cluster
    ///
    /// Clustering starts only after every document has been hashed.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<RunResult, Error> {
        let hashing = self.hash_documents(reporter)?;
        if hashing.documents_found == 0 {
            info!("No PDF files found to process.");
            return Ok(RunResult {
                hashing,
                ..RunResult::default()
            });
        }
        let clustering = self.cluster_and_export(reporter)?;
        Ok(RunResult {
            hashing,
            clustering,
        })
    }

    /// Hash every PDF under the input directory. Per-document failures are
    /// logged and counted; they never abort the batch.
    pub fn hash_documents(&self, reporter: &dyn ProgressReporter) -> Result<HashSummary, Error> {
        self.config.validate()?;

        info!("Scanning {} for PDF files...", self.config.input_dir);
        let scan_start = Instant::now();
        let documents =
            scanner::discover_pdfs(Path::new(&self.config.input_dir), &self.config.ignore_patterns)?;
        let scan_duration = scan_start.elapsed();
        info!("Found {} PDF files to hash.", documents.len());
        reporter.on_scan_complete(documents.len());

        let mut summary = HashSummary {
            scan_duration,
            documents_found: documents.len(),
            ..HashSummary::default()
        };
        if documents.is_empty() {
            return Ok(summary);
        }

        info!(
            "Hashing pages ({} mode, {} jobs)...",
            self.config.concurrency, self.config.jobs
        );
        reporter.on_hash_start(documents.len());
        let hash_start = Instant::now();
        let outcomes = match self.config.concurrency {
            ConcurrencyMode::Sequential => self.hash_sequential(&documents, reporter)?,
            ConcurrencyMode::Parallel => self.hash_parallel(&documents, reporter)?,
        };
        summary.hash_duration = hash_start.elapsed();

        for outcome in outcomes {
            match outcome {
                HashOutcome::Stored(pages) => {
                    summary.documents_hashed += 1;
                    summary.pages_stored += pages;
                }
                HashOutcome::Skipped => summary.documents_skipped += 1,
                HashOutcome::Failed => summary.documents_failed += 1,
            }
        }
        reporter.on_hash_complete(summary.pages_stored, summary.hash_duration.as_secs_f64());
        debug!(
            "Hash completed in {:.2}s: {} hashed, {} unchanged, {} failed, {} pages",
            summary.hash_duration.as_secs_f64(),
            summary.documents_hashed,
            summary.documents_skipped,
            summary.documents_failed,
            summary.pages_stored,
        );
        Ok(summary)
    }

    fn hash_sequential(
        &self,
        documents: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<HashOutcome>, Error> {
        let db = Database::open(&self.config.db_path)?;
        let outcomes = documents
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let outcome = self.hash_logged(&db, path);
                reporter.on_hash_progress(i + 1, documents.len());
                outcome
            })
            .collect();
        Ok(outcomes)
    }

    /// Each rayon worker opens its own connection; SQLite's WAL journal and
    /// busy timeout serialise the appends.
    fn hash_parallel(
        &self,
        documents: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<HashOutcome>, Error> {
        // Schema and journal mode are settled before the workers connect.
        drop(Database::open(&self.config.db_path)?);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()?;
        let done = AtomicUsize::new(0);
        let db_path = self.config.db_path.as_str();

        let outcomes = pool.install(|| {
            documents
                .par_iter()
                .map_init(
                    || Database::open(db_path),
                    |db, path| {
                        let outcome = match db {
                            Ok(db) => self.hash_logged(db, path),
                            Err(e) => {
                                error!("Cannot open store for {}: {}", path.display(), e);
                                HashOutcome::Failed
                            }
                        };
                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        reporter.on_hash_progress(n, documents.len());
                        outcome
                    },
                )
                .collect()
        });
        Ok(outcomes)
    }

    fn hash_logged(&self, db: &Database, path: &Path) -> HashOutcome {
        match self.hash_document(db, path) {
            Ok(Some(pages)) => HashOutcome::Stored(pages),
            Ok(None) => HashOutcome::Skipped,
            Err(e) => {
                error!("Error processing file {}: {}", path.display(), e);
                if let Error::Rasterization(RasterizationError::ToolMissing { hint, .. }) = &e {
                    error!("Please {}.", hint);
                }
                HashOutcome::Failed
            }
        }
    }

    /// Hash one document's pages in page order and store them. Returns
    /// `None` when the store already holds this document with the same
    /// checksum.
    pub fn hash_document(&self, db: &Database, path: &Path) -> Result<Option<usize>, Error> {
        let key = path.to_string_lossy();
        let checksum = hasher::document_checksum(path)?;
        if db.is_document_current(&key, &checksum)? {
            debug!("Skipping unchanged {}", path.display());
            return Ok(None);
        }

        let images = self.rasterizer.rasterize(path)?;
        let pages: Vec<(u32, String)> = images
            .iter()
            .map(|image| (image.page_number, self.hasher.hash(&image.bytes)))
            .collect();
        let stored = db.record_document(&key, &checksum, &pages)?;
        Ok(Some(stored))
    }

    /// Cluster everything currently in the store and export the clusters.
    pub fn cluster_and_export(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> Result<ClusterSummary, Error> {
        if self.config.output_dir.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "no output directory given".to_string(),
            ));
        }

        let cluster_start = Instant::now();
        let (clusters, distinct_hashes) = {
            let db = Database::open(&self.config.db_path)?;
            let distinct = db.distinct_hashes()?.len();
            reporter.on_cluster_start(distinct);
            let clusters = self.find_clusters(&db)?;
            (clusters, distinct)
        };
        let cluster_duration = cluster_start.elapsed();
        reporter.on_cluster_complete(clusters.len(), cluster_duration.as_secs_f64());

        let export_start = Instant::now();
        let export = if clusters.is_empty() {
            info!("No similar pages found.");
            ExportSummary::default()
        } else {
            info!("Similar pages found, saving {} clusters to new PDFs.", clusters.len());
            export::export_clusters(&clusters, Path::new(&self.config.output_dir), reporter)?
        };

        Ok(ClusterSummary {
            cluster_duration,
            export_duration: export_start.elapsed(),
            distinct_hashes,
            clusters: clusters.len(),
            export,
        })
    }

    pub fn find_clusters(&self, db: &Database) -> Result<Vec<Cluster>, Error> {
        analysis::find_similar_pages(
            db,
            self.hasher.as_ref(),
            self.config.threshold,
            self.config.cluster_mode,
        )
    }
}
