use thiserror::Error;

pub use crate::export::ExportError;
pub use crate::ocr::OcrToolError;
pub use crate::raster::RasterizationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Rasterization error: {0}")]
    Rasterization(#[from] RasterizationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrToolError),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
