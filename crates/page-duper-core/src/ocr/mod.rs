pub mod orchestrator;
pub mod tool;

pub use orchestrator::{DocumentOutcome, OcrOrchestrator, OcrSummary};
pub use tool::{OcrMyPdf, OcrTool};

use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrToolError {
    #[error("{tool} not found ({hint})")]
    ToolMissing {
        tool: &'static str,
        hint: &'static str,
    },

    #[error("{tool} failed ({}): {stderr}", exit_label(.code))]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {timeout:?}")]
    Timeout {
        tool: &'static str,
        timeout: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "killed by signal".to_string(),
    }
}
