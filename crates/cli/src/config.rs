//! CLI configuration
//!
//! Read from an optional `strata.toml`. Every section has defaults, so a
//! missing file or a missing section leaves the defaults in place.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_core::{EngineError, EngineResult};
use tracing::debug;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "strata.toml";

// ============================================================================
// CliConfig
// ============================================================================

/// Top-level CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub schema: SchemaConfig,
}

impl CliConfig {
    /// Load configuration from a file
    ///
    /// A missing file yields the defaults. A file that cannot be parsed is
    /// an `InvalidConfig` error.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            EngineError::InvalidConfig(message) => {
                EngineError::InvalidConfig(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        toml::from_str(contents).map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }
}

// ============================================================================
// Sections
// ============================================================================

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// `[output]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON results
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl OutputConfig {
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// `[schema]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema file used when no `--schema` flag is given
    pub path: Option<PathBuf>,
}

impl SchemaConfig {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.output.pretty);
        assert_eq!(config.schema.path, None);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n\n[schema]\npath = \"blog.json\"\n")
            .unwrap();

        let config = CliConfig::load(&path).unwrap();
        let expected = CliConfig::default()
            .with_logging(LoggingConfig::default().with_level("debug"))
            .with_schema(SchemaConfig::default().with_path("blog.json"));
        assert_eq!(config, expected);
    }

    #[test]
    fn test_malformed_file_is_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[output]\npretty = \"sometimes\"\n").unwrap();

        let err = CliConfig::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = CliConfig::default().with_output(OutputConfig::default().with_pretty(false));
        let text = toml::to_string(&config).unwrap();
        assert_eq!(CliConfig::from_toml(&text).unwrap(), config);
    }
}
