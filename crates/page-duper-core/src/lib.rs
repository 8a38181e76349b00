pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod hasher;
pub mod ocr;
pub mod progress;
pub mod raster;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use engine::{ClusterSummary, DedupeEngine, HashSummary, RunResult};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
