//! Protocol configuration: wire literals, accepted commands, host aliases
//!
//! A `ProtocolConfig` is built once (defaults, optionally overridden from a
//! TOML file) and handed to the engine by reference. Nothing in the engine
//! reads protocol constants directly.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{FtError, Result};
use crate::protocol::{self, command};

/// What a command asks the server to do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Fetch one file; requires a filename
    Get,
    /// List every file in the server's directory
    List,
    /// List only files with a .txt extension
    ListTxt,
}

impl CommandKind {
    pub fn takes_filename(self) -> bool {
        matches!(self, CommandKind::Get)
    }
}

/// One row of the accepted command table
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub token: String,
    pub description: String,
}

impl CommandSpec {
    fn new(kind: CommandKind, token: &str, description: &str) -> Self {
        Self {
            kind,
            token: token.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub greeting: String,
    pub data_init: String,
    pub data_ack: String,
    pub success_marker: String,
    pub data_port_prefix: String,
    pub commands: Vec<CommandSpec>,
    /// Short host names expanded before connecting
    pub host_aliases: BTreeMap<String, String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let host_aliases = ["flip1", "flip2", "flip3"]
            .iter()
            .map(|h| (h.to_string(), format!("{}.engr.oregonstate.edu", h)))
            .collect();
        Self {
            greeting: protocol::CONTROL_GREETING.to_string(),
            data_init: protocol::DATA_INIT.to_string(),
            data_ack: protocol::DATA_ACK.to_string(),
            success_marker: protocol::SUCCESS_MARKER.to_string(),
            data_port_prefix: protocol::DATA_PORT_PREFIX.to_string(),
            commands: vec![
                CommandSpec::new(CommandKind::Get, command::GET_FILE, "Get file with [filename]"),
                CommandSpec::new(
                    CommandKind::List,
                    command::LIST_FILES,
                    "List all files in the current directory",
                ),
                CommandSpec::new(
                    CommandKind::ListTxt,
                    command::LIST_TXT_FILES,
                    "List only files with .txt extension",
                ),
            ],
            host_aliases,
        }
    }
}

impl ProtocolConfig {
    /// Load from `path`, or return the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path)
            .map_err(|e| FtError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&data)
            .map_err(|e| FtError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(data: &str) -> std::result::Result<Self, String> {
        let cfg: ProtocolConfig = toml::from_str(data).map_err(|e| e.to_string())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.commands.is_empty() {
            return Err("command table is empty".to_string());
        }
        for (i, c) in self.commands.iter().enumerate() {
            if c.token.is_empty() || c.token.contains(char::is_whitespace) {
                return Err(format!("command token {:?} must be a single non-empty word", c.token));
            }
            if self.commands[..i].iter().any(|o| o.token == c.token) {
                return Err(format!("duplicate command token {:?}", c.token));
            }
        }
        if self.success_marker.is_empty() || self.success_marker.contains(char::is_whitespace) {
            return Err("success_marker must be a single non-empty word".to_string());
        }
        Ok(())
    }

    pub fn lookup(&self, token: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.token == token)
    }

    pub fn expand_host<'a>(&'a self, host: &'a str) -> &'a str {
        self.host_aliases.get(host).map(String::as_str).unwrap_or(host)
    }

    /// Tabular rendering of the accepted commands for help output
    pub fn command_table(&self) -> CommandTable<'_> {
        CommandTable(&self.commands)
    }
}

pub struct CommandTable<'a>(&'a [CommandSpec]);

impl fmt::Display for CommandTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SYNTAX:\tDESCRIPTION:")?;
        for c in self.0 {
            writeln!(f, "{}\t{}", c.token, c.description)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_protocol() {
        let cfg = ProtocolConfig::default();
        assert_eq!(cfg.greeting, "FTSERVER CONNECTION ESTABLISHED");
        assert_eq!(cfg.data_init, "FTSERVER DATA CONNECTION INITIALIZATION");
        assert_eq!(cfg.data_ack, "FTSERVER DATA CONNECTION ACCEPTED");
        assert_eq!(cfg.success_marker, "SUCCESS!");
        assert_eq!(cfg.lookup("-g").map(|c| c.kind), Some(CommandKind::Get));
        assert_eq!(cfg.lookup("-l").map(|c| c.kind), Some(CommandKind::List));
        assert_eq!(cfg.lookup("-ltxt").map(|c| c.kind), Some(CommandKind::ListTxt));
        assert!(cfg.lookup("-x").is_none());
    }

    #[test]
    fn host_alias_expansion() {
        let cfg = ProtocolConfig::default();
        assert_eq!(cfg.expand_host("flip2"), "flip2.engr.oregonstate.edu");
        assert_eq!(cfg.expand_host("localhost"), "localhost");
    }

    #[test]
    fn command_table_rendering() {
        let table = ProtocolConfig::default().command_table().to_string();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("SYNTAX:\tDESCRIPTION:"));
        assert_eq!(lines.next(), Some("-g\tGet file with [filename]"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = ProtocolConfig::from_toml(
            r#"
greeting = "HELLO"

[host_aliases]
lab = "lab.example.org"
"#,
        )
        .unwrap();
        assert_eq!(cfg.greeting, "HELLO");
        assert_eq!(cfg.data_ack, "FTSERVER DATA CONNECTION ACCEPTED");
        assert_eq!(cfg.commands.len(), 3);
        assert_eq!(cfg.expand_host("lab"), "lab.example.org");
        assert_eq!(cfg.expand_host("flip1"), "flip1");
    }

    #[test]
    fn command_table_override() {
        let cfg = ProtocolConfig::from_toml(
            r#"
[[commands]]
kind = "get"
token = "get"
description = "Fetch a file"

[[commands]]
kind = "list-txt"
token = "txt"
description = "Text files only"
"#,
        )
        .unwrap();
        assert_eq!(cfg.lookup("get").map(|c| c.kind), Some(CommandKind::Get));
        assert_eq!(cfg.lookup("txt").map(|c| c.kind), Some(CommandKind::ListTxt));
        assert!(cfg.lookup("-l").is_none());
    }

    #[test]
    fn invalid_tables_are_rejected() {
        assert!(ProtocolConfig::from_toml("commands = []").is_err());
        assert!(ProtocolConfig::from_toml(
            r#"
[[commands]]
kind = "list"
token = "-l"
description = "a"

[[commands]]
kind = "list-txt"
token = "-l"
description = "b"
"#
        )
        .is_err());
        assert!(ProtocolConfig::from_toml("greeting = 5").is_err());
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProtocolConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, FtError::Config(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(ProtocolConfig::load(None).is_ok());
    }
}
