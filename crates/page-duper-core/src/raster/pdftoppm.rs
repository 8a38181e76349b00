use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, trace};

use super::{page_count, PageImage, RasterizationError, Rasterizer};

const TOOL: &str = "pdftoppm";
const INSTALL_HINT: &str = "install poppler-utils and make sure it is on your PATH";

/// Renders every page of a document to PNG with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    fn render_all(&self, pdf_path: &Path, out_dir: &Path) -> Result<(), RasterizationError> {
        let output = Command::new(TOOL)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf_path)
            .arg(out_dir.join("page"))
            .output();

        match output {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(RasterizationError::ToolFailed {
                tool: TOOL,
                path: pdf_path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RasterizationError::ToolMissing {
                tool: TOOL,
                hint: INSTALL_HINT,
            }),
            Err(e) => Err(RasterizationError::Io(e)),
        }
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, RasterizationError> {
        let pages = page_count(pdf_path)?;
        let temp_dir = TempDir::new()?;
        self.render_all(pdf_path, temp_dir.path())?;

        let rendered = rendered_pages(temp_dir.path())?;
        debug!(
            "Rendered {} of {} pages from {}",
            rendered.len(),
            pages,
            pdf_path.display()
        );

        let mut images = Vec::with_capacity(pages as usize);
        for page_number in 1..=pages {
            let path = rendered
                .iter()
                .find(|(n, _)| *n == page_number)
                .map(|(_, p)| p)
                .ok_or_else(|| RasterizationError::MissingPage {
                    path: pdf_path.to_path_buf(),
                    page_number,
                })?;
            trace!("Reading {}", path.display());
            images.push(PageImage {
                page_number,
                bytes: fs::read(path)?,
            });
        }
        Ok(images)
    }
}

/// pdftoppm zero-pads page numbers to the width of the last page
/// (`page-1.png`, `page-01.png`, `page-001.png`, ...).
fn rendered_pages(dir: &Path) -> io::Result<Vec<(u32, PathBuf)>> {
    let mut pages = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(number) = parse_page_number(&path) {
            pages.push((number, path));
        }
    }
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages)
}

fn parse_page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    stem.strip_prefix("page-")?.parse().ok()
}
