//! Configuration parsing and the process-wide strict flag.

use crate::history::{SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
use crate::injector::Injector;
use modelx_reactive::{Graph, DEFAULT_MAX_ROUNDS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Configuration matching the `modelx.yml` schema
///
/// ```yaml
/// strict: true
/// history:
///   capacity: 50
/// reactions:
///   max_rounds: 100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Warn about observable writes outside a transaction
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub reactions: ReactionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionConfig {
    /// Flush rounds before a reaction cycle is reported
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Push process-wide settings; returns the previous strict flag
    pub fn apply(&self) -> bool {
        use_strict(self.strict)
    }

    /// A graph honouring this configuration
    pub fn graph(&self) -> Graph {
        let graph = Graph::with_max_rounds(self.reactions.max_rounds);
        graph.set_strict(self.strict);
        graph
    }

    /// An empty injector on a configured graph
    pub fn injector(&self) -> Injector {
        Injector::with_graph(self.graph())
    }

    /// Start recording undo history for `injector` with the configured
    /// capacity
    pub fn history(&self, injector: &Injector) -> SnapshotHistory {
        SnapshotHistory::attach(injector, self.history.capacity)
    }
}

static STRICT: AtomicBool = AtomicBool::new(false);

/// Turn strict mode on or off for injectors created from now on, returning
/// the previous setting
///
/// In strict mode, writes to observable state outside a transaction log a
/// warning.
pub fn use_strict(strict: bool) -> bool {
    let previous = STRICT.swap(strict, Ordering::SeqCst);
    tracing::debug!(strict, previous, "Strict mode updated");
    previous
}

pub fn is_strict() -> bool {
    STRICT.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = Config::from_yaml_str("strict: true\n").unwrap();
        assert!(config.strict);
        assert_eq!(config.history.capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.reactions.max_rounds, DEFAULT_MAX_ROUNDS);
    }

    #[test]
    fn test_full_config() {
        let yaml = "strict: false\nhistory:\n  capacity: 5\nreactions:\n  max_rounds: 10\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.history.capacity, 5);
        assert_eq!(config.reactions.max_rounds, 10);
        assert!(!config.graph().is_strict());
    }

    #[test]
    fn test_history_uses_configured_capacity() {
        let config = Config::from_yaml_str("history:\n  capacity: 2\n").unwrap();
        let injector = config.injector();

        let history = config.history(&injector);
        assert_eq!(history.capacity(), 2);
    }

    #[test]
    fn test_invalid_yaml_is_a_parse_error() {
        let err = Config::from_yaml_str("history: [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelx.yml");
        std::fs::write(&path, "strict: true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.graph().is_strict());

        let missing = Config::from_file(dir.path().join("nope.yml")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadError(_)));
    }
}
