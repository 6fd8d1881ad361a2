//! # Configuration
//!
//! Every section is optional; missing fields take their defaults.
//!
//! ```json
//! {
//!   "transport": { "chunk_size": 128, "chunk_delay_ms": 100, "write_timeout_ms": 5000 },
//!   "image": { "mode": "canny", "low": 40, "high": 90 },
//!   "job": { "energy": 12000, "finalize_feed_rows": 60 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PrintError, PrintResult};
use crate::job::JobConfig;
use crate::render::process::ImageMode;
use crate::transport::TransportConfig;

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    pub transport: TransportConfig,
    pub image: ImageMode,
    pub job: JobConfig,
}

impl PrintConfig {
    pub fn from_json_str(json: &str) -> PrintResult<Self> {
        serde_json::from_str(json).map_err(|e| PrintError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> PrintResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
            .map_err(|e| PrintError::Config(format!("{}: {}", path.as_ref().display(), e)))
    }

    pub fn to_json_pretty(&self) -> PrintResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PrintError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(PrintConfig::from_json_str("{}").unwrap(), PrintConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = PrintConfig::from_json_str(
            r#"{ "transport": { "write_timeout_ms": 5000 }, "job": { "energy": 12000 } }"#,
        )
        .unwrap();
        assert_eq!(config.transport.write_timeout_ms, Some(5000));
        assert_eq!(config.transport.chunk_size, 128);
        assert_eq!(config.job.energy, Some(12000));
        assert_eq!(config.job.finalize_feed_rows, 100);
        assert_eq!(config.image, ImageMode::default());
    }

    #[test]
    fn test_roundtrip_pretty() {
        let config = PrintConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert_eq!(PrintConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            PrintConfig::from_json_str("{ \"job\": 3 }"),
            Err(PrintError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            PrintConfig::from_json_file("/nonexistent/catprint.json"),
            Err(PrintError::Io(_))
        ));
    }
}
