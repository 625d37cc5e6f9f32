//! Runtime configuration helpers.

use std::path::PathBuf;

use erwin::ProcessConfig;

/// Default socket location: `~/.erwin/erwin.sock`, with a `/tmp` fallback
/// when no home directory can be resolved.
pub fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".erwin").join("erwin.sock"))
        .unwrap_or_else(|| PathBuf::from("/tmp/erwin.sock"))
}

/// Parse one `--command` value into a process definition.
///
/// The line is split on whitespace: the first word is both the process
/// name and the program, the rest are its arguments. Returns `None` for
/// a blank line.
pub fn parse_command_line(line: &str) -> Option<ProcessConfig> {
    let mut words = line.split_whitespace();
    let program = words.next()?;
    Some(ProcessConfig::new(program, program).with_args(words.map(String::from)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_word_names_the_process() {
        let config = parse_command_line("node server.js --port 3000").unwrap();
        assert_eq!(config.name, "node");
        assert_eq!(config.command, "node");
        assert_eq!(config.args, vec!["server.js", "--port", "3000"]);
        assert!(config.auto_start);
    }

    #[test]
    fn bare_program_has_no_args() {
        let config = parse_command_line("htop").unwrap();
        assert_eq!(config.name, "htop");
        assert!(config.args.is_empty());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let config = parse_command_line("  ping   -c 3   localhost  ").unwrap();
        assert_eq!(config.name, "ping");
        assert_eq!(config.args, vec!["-c", "3", "localhost"]);
    }

    #[test]
    fn blank_line_is_rejected() {
        assert!(parse_command_line("").is_none());
        assert!(parse_command_line("   ").is_none());
    }

    #[test]
    fn default_socket_is_stable() {
        let path = default_socket_path();
        assert!(path.to_string_lossy().ends_with("erwin.sock"));
    }
}
