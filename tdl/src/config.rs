//! Interpreter configuration
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for an [crate::Evaluator]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories searched for modules, in order
    pub path: Vec<PathBuf>,
    /// Module source file extension
    pub extension: String,
    /// Whether or not to read statements from an interactive reader
    pub interactive: bool,
    pub prompt: String,
    pub continuation_prompt: String,
    /// Maximum depth of nested procedure calls
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: vec![PathBuf::from(".")],
            extension: String::from("tdl"),
            interactive: false,
            prompt: String::from("tdl> "),
            continuation_prompt: String::from("... "),
            max_depth: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"path": ["lib"], "interactive": true}"#)
            .expect("config should parse");
        assert_eq!(config.path, vec![PathBuf::from("lib")]);
        assert!(config.interactive);
        assert_eq!(config.extension, "tdl");
        assert_eq!(config.prompt, "tdl> ");
    }
}
