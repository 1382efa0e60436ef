use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// External tools used by the extraction collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub pdftk: String,
    pub djvused: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pdftk: "pdftk".to_string(),
            djvused: "djvused".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TagFsConfig {
    /// Attributes whose values are comma-separated lists.
    pub split_attributes: Vec<String>,
    /// Skip dot-files and dot-directories while scanning.
    pub skip_hidden: bool,
    pub fs_name: String,
    /// How long the kernel may cache entries and attributes.
    pub ttl_secs: u64,
    pub tools: ToolPaths,
}

impl Default for TagFsConfig {
    fn default() -> Self {
        Self {
            split_attributes: vec!["keywords".to_string(), "author".to_string()],
            skip_hidden: false,
            fs_name: "tagfs".to_string(),
            ttl_secs: 1,
            tools: ToolPaths::default(),
        }
    }
}

impl TagFsConfig {
    /// Loads `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                info!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether values of `attr` are split on commas. Case-insensitive.
    pub fn splits(&self, attr: &str) -> bool {
        self.split_attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case(attr))
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
