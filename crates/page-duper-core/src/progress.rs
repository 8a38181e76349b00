/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars. All methods have default
/// no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_complete(&self, _documents_found: usize) {}
    fn on_hash_start(&self, _total_documents: usize) {}
    fn on_hash_progress(&self, _documents_done: usize, _total_documents: usize) {}
    fn on_hash_complete(&self, _pages_stored: usize, _duration_secs: f64) {}
    fn on_cluster_start(&self, _distinct_hashes: usize) {}
    fn on_cluster_complete(&self, _clusters: usize, _duration_secs: f64) {}
    fn on_export_start(&self, _clusters: usize) {}
    fn on_export_progress(&self, _clusters_done: usize, _total_clusters: usize) {}
    fn on_export_complete(&self, _files_written: usize, _pages_written: usize) {}
    fn on_ocr_pass_start(&self, _label: &str, _total_documents: usize) {}
    fn on_ocr_progress(&self, _documents_done: usize, _total_documents: usize) {}
    fn on_ocr_pass_complete(&self, _label: &str, _failures: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
