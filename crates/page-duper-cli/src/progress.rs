use indicatif::{ProgressBar, ProgressStyle};
use page_duper_core::ProgressReporter;
use std::sync::Mutex;
use std::time::Duration;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Hash and OCR passes: progress bar over documents
/// - Clustering: spinner (pairwise comparisons have no useful position)
/// - Export: progress bar over clusters
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn update(&self, done: usize, total: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if pb.length() != Some(total as u64) {
                    pb.set_length(total as u64);
                }
                pb.set_position(done as u64);
            }
        }
    }

    fn start_bar(&self, label: &str, unit: &str, total: usize) {
        let pb = ProgressBar::new(total as u64);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {} ({{eta}} remaining)",
            label, unit
        );
        if let Ok(style) = ProgressStyle::with_template(&template) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICKS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn start_spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICKS));
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_complete(&self, documents_found: usize) {
        eprintln!("  \x1b[32m✓\x1b[0m Scan complete: {} PDF files", documents_found);
    }

    fn on_hash_start(&self, total_documents: usize) {
        self.start_bar("Hashing", "files", total_documents);
    }

    fn on_hash_progress(&self, documents_done: usize, total_documents: usize) {
        self.update(documents_done, total_documents);
    }

    fn on_hash_complete(&self, pages_stored: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Hash complete: {} pages stored in {:.2}s",
            pages_stored, duration_secs
        );
    }

    fn on_cluster_start(&self, distinct_hashes: usize) {
        self.start_spinner(format!("Comparing {} distinct page hashes...", distinct_hashes));
    }

    fn on_cluster_complete(&self, clusters: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Clustering complete: {} clusters in {:.2}s",
            clusters, duration_secs
        );
    }

    fn on_export_start(&self, clusters: usize) {
        self.start_bar("Exporting", "clusters", clusters);
    }

    fn on_export_progress(&self, clusters_done: usize, total_clusters: usize) {
        self.update(clusters_done, total_clusters);
    }

    fn on_export_complete(&self, files_written: usize, pages_written: usize) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Export complete: {} files, {} pages",
            files_written, pages_written
        );
    }

    fn on_ocr_pass_start(&self, label: &str, total_documents: usize) {
        self.start_bar(label, "files", total_documents);
    }

    fn on_ocr_progress(&self, documents_done: usize, total_documents: usize) {
        self.update(documents_done, total_documents);
    }

    fn on_ocr_pass_complete(&self, label: &str, failures: usize) {
        self.finish_bar();
        if failures == 0 {
            eprintln!("  \x1b[32m✓\x1b[0m {}: no failures", label);
        } else {
            eprintln!("  \x1b[33m!\x1b[0m {}: {} failures", label, failures);
        }
    }
}
