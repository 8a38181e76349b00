pub mod assembler;

pub use assembler::PageAssembler;

use crate::analysis::Cluster;
use crate::progress::ProgressReporter;
use ahash::{AHashMap, AHashSet};
use lopdf::Document;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("source document {path} no longer exists")]
    Missing { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: lopdf::Error,
    },

    #[error("{path} has no page {page_number}")]
    PageOutOfRange { path: PathBuf, page_number: u32 },

    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("PDF structure error: {0}")]
    Pdf(#[from] lopdf::Error),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub files_written: usize,
    pub pages_written: usize,
    pub members_skipped: usize,
    pub clusters_failed: usize,
    pub output_files: Vec<PathBuf>,
}

/// Write one PDF per cluster into `output_dir`.
///
/// A member whose source is gone or unreadable is logged and skipped; a
/// cluster that fails to write is logged and the rest continue.
pub fn export_clusters(
    clusters: &[Cluster],
    output_dir: &Path,
    reporter: &dyn ProgressReporter,
) -> Result<ExportSummary, crate::Error> {
    fs::create_dir_all(output_dir)?;
    info!(
        "Exporting {} clusters to {}...",
        clusters.len(),
        output_dir.display()
    );
    reporter.on_export_start(clusters.len());

    let mut summary = ExportSummary::default();
    let mut used_names: AHashSet<String> = AHashSet::new();

    for (index, cluster) in clusters.iter().enumerate() {
        if cluster.records.len() < 2 {
            continue;
        }

        let mut assembler = PageAssembler::new();
        let mut sources: AHashMap<&str, Document> = AHashMap::new();

        for record in &cluster.records {
            let path = Path::new(&record.document_path);
            let result = load_source(&mut sources, &record.document_path).and_then(|source| {
                assembler.append_page(source, path, record.page_number)
            });
            if let Err(e) = result {
                warn!(
                    "Skipping page {} of {}: {}",
                    record.page_number, record.document_path, e
                );
                summary.members_skipped += 1;
            }
        }

        if assembler.is_empty() {
            warn!("Cluster {} has no readable pages, nothing written", cluster.key);
            reporter.on_export_progress(index + 1, clusters.len());
            continue;
        }

        let file_name = unique_file_name(&cluster.key, &mut used_names);
        let output_path = output_dir.join(&file_name);
        match assembler.save(&output_path) {
            Ok(pages) => {
                debug!("Wrote {} pages to {}", pages, output_path.display());
                summary.files_written += 1;
                summary.pages_written += pages;
                summary.output_files.push(output_path);
            }
            Err(e) => {
                error!("Failed to write cluster {}: {}", cluster.key, e);
                summary.clusters_failed += 1;
            }
        }
        reporter.on_export_progress(index + 1, clusters.len());
    }

    reporter.on_export_complete(summary.files_written, summary.pages_written);
    info!(
        "Exported {} files ({} pages, {} members skipped)",
        summary.files_written, summary.pages_written, summary.members_skipped
    );
    Ok(summary)
}

/// Each member gets its own copy because appending renumbers the source.
fn load_source<'a>(
    cache: &mut AHashMap<&'a str, Document>,
    path: &'a str,
) -> Result<Document, ExportError> {
    if let Some(doc) = cache.get(path) {
        return Ok(doc.clone());
    }
    let file = Path::new(path);
    if !file.exists() {
        return Err(ExportError::Missing {
            path: file.to_path_buf(),
        });
    }
    let doc = Document::load(file).map_err(|source| ExportError::Unreadable {
        path: file.to_path_buf(),
        source,
    })?;
    cache.insert(path, doc.clone());
    Ok(doc)
}

/// Cluster keys are digests and may hold `/` or `:`; map anything outside a
/// portable file-name alphabet to `_`.
pub fn cluster_file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn unique_file_name(key: &str, used: &mut AHashSet<String>) -> String {
    let stem = cluster_file_stem(key);
    let mut name = format!("{}.pdf", stem);
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{}-{}.pdf", stem, n);
        n += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_file_stem() {
        assert_eq!(cluster_file_stem("96:abc/def+:xyz"), "96_abc_def+_xyz");
        assert_eq!(cluster_file_stem("plain"), "plain");
    }

    #[test]
    fn test_unique_file_name_disambiguates() {
        let mut used = AHashSet::new();
        assert_eq!(unique_file_name("3:a/b:c", &mut used), "3_a_b_c.pdf");
        assert_eq!(unique_file_name("3:a:b/c", &mut used), "3_a_b_c-2.pdf");
    }
}
