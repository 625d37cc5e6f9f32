//! Named process definitions.

use serde::{Deserialize, Serialize};

/// A named process definition.
///
/// Configs outlive the processes started from them: stopping a process
/// leaves its definition registered so it can be started again later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Name the process is tracked under. At most one live process per name.
    pub name: String,
    /// Program to execute.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Whether the auto-start sweep launches this definition.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

fn default_auto_start() -> bool {
    true
}

impl ProcessConfig {
    /// Create a definition with no arguments and auto-start enabled.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            auto_start: true,
        }
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the auto-start flag.
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_auto_start() {
        let config = ProcessConfig::new("web", "node");
        assert_eq!(config.name, "web");
        assert_eq!(config.command, "node");
        assert!(config.args.is_empty());
        assert!(config.auto_start);
    }

    #[test]
    fn builders_set_args_and_flag() {
        let config = ProcessConfig::new("web", "node")
            .with_args(["server.js", "--port", "3000"])
            .with_auto_start(false);
        assert_eq!(config.args, vec!["server.js", "--port", "3000"]);
        assert!(!config.auto_start);
    }

    #[test]
    fn deserializes_with_missing_optional_fields() {
        let config: ProcessConfig =
            serde_json::from_str(r#"{"name":"web","command":"node"}"#).unwrap();
        assert!(config.args.is_empty());
        assert!(config.auto_start);
    }

    #[test]
    fn round_trips_through_json() {
        let config = ProcessConfig::new("worker", "cargo")
            .with_args(["run"])
            .with_auto_start(false);
        let json = serde_json::to_string(&config).unwrap();
        let back: ProcessConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
