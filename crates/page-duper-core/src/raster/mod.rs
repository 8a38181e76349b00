pub mod pdftoppm;

pub use pdftoppm::PdftoppmRasterizer;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterizationError {
    #[error("cannot read PDF {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("{tool} not found ({hint})")]
    ToolMissing { tool: &'static str, hint: &'static str },

    #[error("{tool} failed on {path}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        path: PathBuf,
        stderr: String,
    },

    #[error("no image rendered for page {page_number} of {path}")]
    MissingPage { path: PathBuf, page_number: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One rendered page. `page_number` is 1-based.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_number: u32,
    pub bytes: Vec<u8>,
}

/// Turns a PDF into an ordered sequence of page images.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, RasterizationError>;
}

/// Page count read from the document's page tree.
pub fn page_count(pdf_path: &Path) -> Result<u32, RasterizationError> {
    let document =
        lopdf::Document::load(pdf_path).map_err(|e| RasterizationError::Unreadable {
            path: pdf_path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(document.get_pages().len() as u32)
}
