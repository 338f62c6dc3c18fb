//! Configuration loaded from YAML
//!
//! Every section has defaults, so a partial file (or none at all) works.
//! Secrets never live in the file: the API key is read from the environment.

use crate::document::ExtractorKind;
use crate::export::ExportSettings;
use crate::gateway::TokenBudgets;
use crate::graph::Canvas;
use crate::llm::AnthropicSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the model API key
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_base: String,
    pub model: String,
    pub api_version: String,
    pub budgets: TokenBudgets,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_version: "2023-06-01".to_string(),
            budgets: TokenBudgets::default(),
        }
    }
}

impl ModelConfig {
    /// Client settings, with the key taken from [`API_KEY_ENV`].
    pub fn anthropic_settings(&self) -> AnthropicSettings {
        AnthropicSettings {
            api_base: self.api_base.clone(),
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            model: self.model.clone(),
            api_version: self.api_version.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub extractor: ExtractorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub canvas: Canvas,
    pub export: ExportSettings,
    pub document: DocumentConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            model: ModelConfig::default(),
            canvas: Canvas::default(),
            export: ExportSettings::default(),
            document: DocumentConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// `<config_dir>/mindmap/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mindmap").join("config.yaml"))
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit path, or the default location if it exists.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_yaml(
            "server:\n  bind: 0.0.0.0:8080\nmodel:\n  budgets:\n    verification: 512\ncanvas:\n  width: 1024\n",
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.max_upload_bytes, ServerConfig::default().max_upload_bytes);
        assert_eq!(config.model.budgets.verification, 512);
        assert_eq!(config.model.budgets.extraction, 4096);
        assert_eq!(config.canvas.width, 1024.0);
        assert_eq!(config.canvas.height, 500.0);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn document_and_export_sections_parse() {
        let config = Config::from_yaml(
            "document:\n  extractor: utf8\nexport:\n  scale: 1.5\n  font_path: /fonts/a.ttf\nlog_level: debug\n",
        )
        .unwrap();

        assert_eq!(config.document.extractor, ExtractorKind::Utf8);
        assert_eq!(config.export.scale, 1.5);
        assert_eq!(config.export.font_path, Some(PathBuf::from("/fonts/a.ttf")));
        assert_eq!(config.export.jpeg_quality, 92);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  max_upload_bytes: 1024").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.max_upload_bytes, 1024);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, map]").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
