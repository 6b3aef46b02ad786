//! Database configuration
//!
//! Loaded from a JSON file. Every field is optional:
//!
//! ```json
//! {
//!   "initial_capacity_bytes": 65536,
//!   "max_size_bytes": 1073741824,
//!   "image_path": "./index.ndb",
//!   "log_level": "info",
//!   "reserved_tags": [32, 33]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};
use crate::observability::Severity;
use crate::store::{load_image, MemoryStore, Store, DEFAULT_MAX_SIZE};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDbConfig {
    /// Bytes reserved when a fresh store is created (default 64 KiB)
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity_bytes: u64,

    /// Hard limit on store size (default 1 GiB)
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,

    /// Store image to load on open, if it exists
    #[serde(default)]
    pub image_path: Option<PathBuf>,

    /// Lowest log severity written (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Tags reserved in addition to the built-in retired ones
    #[serde(default)]
    pub reserved_tags: Vec<u32>,
}

fn default_initial_capacity() -> u64 {
    64 * 1024
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeDbConfig {
    fn default() -> Self {
        Self {
            initial_capacity_bytes: default_initial_capacity(),
            max_size_bytes: default_max_size(),
            image_path: None,
            log_level: default_log_level(),
            reserved_tags: Vec::new(),
        }
    }
}

impl NodeDbConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> NodeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            NodeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> NodeResult<Self> {
        let config: NodeDbConfig = serde_json::from_str(content)
            .map_err(|e| NodeError::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.max_size_bytes == 0 {
            return Err(NodeError::Config("max_size_bytes must be > 0".into()));
        }
        if self.initial_capacity_bytes > self.max_size_bytes {
            return Err(NodeError::Config(format!(
                "initial_capacity_bytes ({}) exceeds max_size_bytes ({})",
                self.initial_capacity_bytes, self.max_size_bytes
            )));
        }
        if let Some(tag) = self.reserved_tags.iter().find(|&&t| t > u16::MAX as u32) {
            return Err(NodeError::Config(format!(
                "reserved tag {:#x} does not fit in 16 bits",
                tag
            )));
        }
        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> NodeResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| NodeError::Config(format!("unknown log_level '{}'", self.log_level)))
    }

    /// Opens the configured store: the image if one exists, otherwise a
    /// fresh in-memory store.
    pub fn open_store(&self) -> NodeResult<Box<dyn Store>> {
        match &self.image_path {
            Some(path) if path.exists() => Ok(Box::new(load_image(path, self.max_size_bytes)?)),
            _ => Ok(Box::new(MemoryStore::with_limits(
                self.initial_capacity_bytes,
                self.max_size_bytes,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = NodeDbConfig::from_json("{}").unwrap();
        assert_eq!(config, NodeDbConfig::default());
        assert_eq!(config.initial_capacity_bytes, 65536);
        assert_eq!(config.severity().unwrap(), Severity::Info);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"max_size_bytes": 1048576, "log_level": "trace", "reserved_tags": [32]}}"#
        )
        .unwrap();
        let config = NodeDbConfig::load(file.path()).unwrap();
        assert_eq!(config.max_size_bytes, 1048576);
        assert_eq!(config.severity().unwrap(), Severity::Trace);
        assert_eq!(config.reserved_tags, vec![32]);
    }

    #[test]
    fn test_initial_capacity_above_max_rejected() {
        let err = NodeDbConfig::from_json(
            r#"{"initial_capacity_bytes": 4096, "max_size_bytes": 1024}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_wide_reserved_tag_rejected() {
        let err = NodeDbConfig::from_json(r#"{"reserved_tags": [65536]}"#).unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        assert!(NodeDbConfig::from_json(r#"{"log_level": "loud"}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = NodeDbConfig::load(Path::new("/nonexistent/nodedb.json")).unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
