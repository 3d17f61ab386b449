//! Configuration
//!
//! Loads engine settings from an optional YAML file and environment
//! overrides, and installs the tracing subscriber.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Record archetypes the registry loads macros from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroArchetypes {
    /// Archetype of expression macros
    pub expression: String,

    /// Archetype of report macros
    pub report: String,
}

impl Default for MacroArchetypes {
    fn default() -> Self {
        Self {
            expression: "lookup.macro".to_string(),
            report: "lookup.macroReport".to_string(),
        }
    }
}

impl MacroArchetypes {
    /// Both archetypes, expression first
    pub fn all(&self) -> [&str; 2] {
        [&self.expression, &self.report]
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    pub archetypes: MacroArchetypes,

    /// YAML file or directory of macro records
    pub macro_path: Option<PathBuf>,

    /// Tracing filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            archetypes: MacroArchetypes::default(),
            macro_path: None,
            log_filter: "warn".to_string(),
        }
    }
}

impl MacroConfig {
    /// Load from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        info!("Loading macro configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load from `MACRO_CONFIG` if set, then apply environment overrides:
    /// `MACRO_EXPRESSION_ARCHETYPE`, `MACRO_REPORT_ARCHETYPE`, `MACRO_PATH`, `MACRO_LOG`
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("MACRO_CONFIG") {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(value) = var("MACRO_EXPRESSION_ARCHETYPE") {
            self.archetypes.expression = value;
        }
        if let Some(value) = var("MACRO_REPORT_ARCHETYPE") {
            self.archetypes.report = value;
        }
        if let Some(value) = var("MACRO_PATH") {
            self.macro_path = Some(PathBuf::from(value));
        }
        if let Some(value) = var("MACRO_LOG") {
            self.log_filter = value;
        }
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MacroConfig::default();
        assert_eq!(config.archetypes.all(), ["lookup.macro", "lookup.macroReport"]);
        assert_eq!(config.log_filter, "warn");
        assert!(config.macro_path.is_none());
    }

    #[test]
    fn test_from_yaml_partial() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "archetypes:\n  report: lookup.customReport\nmacro_path: /etc/macros\n",
        )
        .unwrap();

        let config = MacroConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.archetypes.expression, "lookup.macro");
        assert_eq!(config.archetypes.report, "lookup.customReport");
        assert_eq!(config.macro_path, Some(PathBuf::from("/etc/macros")));
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MACRO_EXPRESSION_ARCHETYPE", "lookup.text"),
            ("MACRO_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = MacroConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.archetypes.expression, "lookup.text");
        assert_eq!(config.archetypes.report, "lookup.macroReport");
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing("warn");
        init_tracing("debug");
    }
}
