use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up at the repository root (and while walking upward)
pub const CONFIG_FILE_NAME: &str = ".buildgraph.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Descriptor file name expected in every buildpath
    pub descriptor_name: String,
    /// Files whose presence marks the repository root
    pub root_markers: Vec<String>,
    /// Top-level directories that are never projects
    pub reserved_projects: Vec<String>,

    // Additions to the built-in sandbox symbol lists
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_target_kinds: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_globals: Vec<String>,

    /// Default `max_depth` for descriptor discovery
    pub find_depth: usize,
    /// Default expansion depth for dependency queries
    pub dependency_depth: usize,
    /// Value returned by `pants_version()` inside descriptors
    pub interpreter_version: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            descriptor_name: "BUILD".to_string(),
            root_markers: vec!["pants.ini".to_string()],
            reserved_projects: vec!["science".to_string()],
            extra_target_kinds: Vec::new(),
            extra_globals: Vec::new(),
            find_depth: 3,
            dependency_depth: 2,
            interpreter_version: 20,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load `<root>/.buildgraph.json` if it exists, defaults otherwise
    pub fn load_for_root(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!("Loading config from {:?}", path);
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
        let mut current = start_path;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }

            current = current.parent()?;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.descriptor_name.is_empty() || self.descriptor_name.contains('/') {
            return Err(Error::ConfigError(format!(
                "descriptor_name must be a plain file name, got '{}'",
                self.descriptor_name
            )));
        }
        if self.root_markers.is_empty() {
            return Err(Error::ConfigError(
                "root_markers must name at least one file".to_string(),
            ));
        }
        Ok(())
    }
}
