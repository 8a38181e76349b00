use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::Error;

pub const DEFAULT_THRESHOLD: u32 = 95;
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_DB_PATH: &str = "page_hashes.db";

/// How documents are distributed while hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrencyMode {
    Sequential,
    #[default]
    Parallel,
}

/// How similar hashes are grouped into clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterMode {
    /// Connected components over the similarity graph.
    #[default]
    Transitive,
    /// One bucket per hash, holding every hash it matched directly.
    FirstMatch,
}

impl FromStr for ConcurrencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(ConcurrencyMode::Sequential),
            "parallel" => Ok(ConcurrencyMode::Parallel),
            other => Err(format!("unknown concurrency mode '{}'", other)),
        }
    }
}

impl FromStr for ClusterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transitive" => Ok(ClusterMode::Transitive),
            "first-match" | "first_match" => Ok(ClusterMode::FirstMatch),
            other => Err(format!("unknown cluster mode '{}'", other)),
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyMode::Sequential => write!(f, "sequential"),
            ConcurrencyMode::Parallel => write!(f, "parallel"),
        }
    }
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterMode::Transitive => write!(f, "transitive"),
            ClusterMode::FirstMatch => write!(f, "first-match"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input_dir: String,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Minimum similarity score (0-100) for two pages to be grouped.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default)]
    pub concurrency: ConcurrencyMode,
    #[serde(default)]
    pub cluster_mode: ClusterMode,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: String,
    #[serde(default = "default_ocr_timeout_secs")]
    pub ocr_timeout_secs: u64,
    #[serde(default)]
    pub retry_failed: bool,
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_dpi() -> u32 {
    200
}

fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

fn default_ocr_languages() -> String {
    "eng+spa".to_string()
}

fn default_ocr_timeout_secs() -> u64 {
    3600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: String::new(),
            output_dir: String::new(),
            db_path: default_db_path(),
            threshold: default_threshold(),
            jobs: default_jobs(),
            concurrency: ConcurrencyMode::default(),
            cluster_mode: ClusterMode::default(),
            dpi: default_dpi(),
            ignore_patterns: Vec::new(),
            retry_limit: default_retry_limit(),
            ocr_languages: default_ocr_languages(),
            ocr_timeout_secs: default_ocr_timeout_secs(),
            retry_failed: false,
        }
    }
}

impl AppConfig {
    /// Check everything a run depends on before any work starts.
    pub fn validate(&self) -> Result<(), Error> {
        if self.input_dir.is_empty() {
            return Err(Error::InvalidConfig("no input directory given".to_string()));
        }
        if !Path::new(&self.input_dir).is_dir() {
            return Err(Error::InvalidConfig(format!(
                "the directory '{}' does not exist",
                self.input_dir
            )));
        }
        if self.output_dir.is_empty() {
            return Err(Error::InvalidConfig("no output directory given".to_string()));
        }
        if self.jobs == 0 {
            return Err(Error::InvalidConfig("jobs must be at least 1".to_string()));
        }
        if self.retry_limit == 0 {
            return Err(Error::InvalidConfig(
                "retry_limit must be at least 1".to_string(),
            ));
        }
        if self.dpi == 0 {
            return Err(Error::InvalidConfig("dpi must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Load `PageDuper.{toml,json,yaml,...}` if present, then `PAGE_DUPER_*` env vars.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("PageDuper").required(false))
        .add_source(Environment::with_prefix("PAGE_DUPER").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(dir: &Path) -> AppConfig {
        AppConfig {
            input_dir: dir.to_string_lossy().into_owned(),
            output_dir: dir.join("out").to_string_lossy().into_owned(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.threshold, 95);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.db_path, "page_hashes.db");
        assert_eq!(config.cluster_mode, ClusterMode::Transitive);
        assert!(config.jobs >= 1);
    }

    #[test]
    fn test_validate_accepts_existing_dir() {
        let tmp = tempdir().unwrap();
        assert!(config_for(tmp.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_dir() {
        let tmp = tempdir().unwrap();
        let config = config_for(&tmp.path().join("nope"));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_jobs() {
        let tmp = tempdir().unwrap();
        let config = AppConfig {
            jobs: 0,
            ..config_for(tmp.path())
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "first-match".parse::<ClusterMode>().unwrap(),
            ClusterMode::FirstMatch
        );
        assert_eq!(
            "Sequential".parse::<ConcurrencyMode>().unwrap(),
            ConcurrencyMode::Sequential
        );
        assert!("bogus".parse::<ClusterMode>().is_err());
    }
}
