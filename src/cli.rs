//! Command-line surface: clap options plus validation of the positional
//! `HOST PORT COMMAND [FILENAME] DATA_PORT` arguments

use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ProtocolConfig;
use crate::error::{FtError, Result};
use crate::session::SessionParams;

pub const USAGE_MESSAGE: &str =
    "USAGE: ftclient [OPTIONS] SERVER_HOST SERVER_PORT COMMAND [FILE_NAME] DATA_PORT";
pub const COMMAND_HELP_MESSAGE: &str = "FOR COMMAND HELP: ftclient -h";

// Positional count bounds (without / with FILE_NAME)
pub const MIN_POSITIONAL: usize = 4;
pub const MAX_POSITIONAL: usize = 5;

/// Command-line arguments
#[derive(Clone, Debug, Parser)]
#[command(
    name = "ftclient",
    about = "Two-channel file transfer client: list or fetch files from an ftserver",
    disable_help_flag = true
)]
pub struct Args {
    /// Print usage and the accepted command table
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    pub help: bool,

    /// Append session events to this log file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// TOML file overriding protocol literals, commands, and host aliases
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory received files are written to
    #[arg(long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Give up if the server is silent for this many seconds (default: wait forever)
    #[arg(long = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Show a byte counter while receiving
    #[arg(short, long)]
    pub progress: bool,

    /// SERVER_HOST SERVER_PORT COMMAND [FILE_NAME] DATA_PORT
    #[arg(
        value_name = "ARGS",
        allow_hyphen_values = true,
        trailing_var_arg = true,
        num_args = 0..
    )]
    pub positional: Vec<String>,
}

impl Args {
    /// `-h` must stand alone; combined with positionals it is an argument error
    pub fn help_requested(&self) -> Result<bool> {
        match (self.help, self.positional.is_empty()) {
            (false, _) => Ok(false),
            (true, true) => Ok(true),
            (true, false) => Err(FtError::Argument(vec![
                "-h takes no other arguments".to_string(),
                COMMAND_HELP_MESSAGE.to_string(),
            ])),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Usage text followed by the command table
pub fn help_text(config: &ProtocolConfig) -> String {
    format!(
        "{}\nAccepted Commands:\n\n{}",
        USAGE_MESSAGE,
        config.command_table()
    )
}

fn parse_port(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Local file name for a requested remote name: its final path component
pub fn local_file_name(requested: &str) -> Option<String> {
    Path::new(requested)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// Validate positional arguments into session parameters. Every problem
/// found is reported, not just the first.
pub fn validate(
    positional: &[String],
    config: &ProtocolConfig,
    output_dir: &Path,
    timeout: Option<Duration>,
) -> Result<SessionParams> {
    if positional.len() < MIN_POSITIONAL || positional.len() > MAX_POSITIONAL {
        return Err(FtError::Argument(vec![
            format!(
                "expected {} or {} arguments, got {}",
                MIN_POSITIONAL,
                MAX_POSITIONAL,
                positional.len()
            ),
            COMMAND_HELP_MESSAGE.to_string(),
        ]));
    }
    let mut errors = Vec::new();

    let nickname = positional[0].clone();
    let host = config.expand_host(&nickname).to_string();

    let port = parse_port(&positional[1]);
    if port.is_none() {
        errors.push(format!("SERVER_PORT invalid. You entered: {}", positional[1]));
    }

    let token = &positional[2];
    let command = config.lookup(token).cloned();
    if command.is_none() {
        errors.push(format!("COMMAND invalid. You entered: {}", token));
        errors.push(format!("\t{}", COMMAND_HELP_MESSAGE));
    }

    let with_filename = positional.len() == MAX_POSITIONAL;
    let takes_filename = command.as_ref().map(|c| c.kind.takes_filename());
    let (filename, data_port_in) = match takes_filename {
        Some(true) if !with_filename => {
            errors.push(format!(
                "COMMAND ERROR: FILENAME required after {} command before DATA_PORT.",
                token
            ));
            (None, &positional[3])
        }
        Some(false) if with_filename => {
            errors.push(format!(
                "COMMAND ERROR: Only DATA_PORT should appear after \"{}\" command",
                token
            ));
            (None, &positional[4])
        }
        _ if with_filename => (Some(positional[3].clone()), &positional[4]),
        _ => (None, &positional[3]),
    };

    if let Some(name) = &filename {
        if local_file_name(name).is_none() {
            errors.push(format!("FILENAME invalid. You entered: {}", name));
        }
    }

    let data_port = parse_port(data_port_in);
    if data_port.is_none() {
        errors.push(format!("DATA_PORT invalid. You entered: {}", data_port_in));
    }

    match (port, command, data_port) {
        (Some(port), Some(command), Some(data_port)) if errors.is_empty() => Ok(SessionParams {
            nickname,
            host,
            port,
            command,
            filename,
            data_port,
            output_dir: output_dir.to_path_buf(),
            timeout,
        }),
        _ => Err(FtError::Argument(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandKind;

    fn v(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn check(args: &[&str]) -> Result<SessionParams> {
        validate(&v(args), &ProtocolConfig::default(), Path::new("."), None)
    }

    fn problems(args: &[&str]) -> Vec<String> {
        match check(args) {
            Err(FtError::Argument(errs)) => errs,
            other => panic!("expected argument error, got {:?}", other.map(|p| p.nickname)),
        }
    }

    #[test]
    fn valid_get_request() {
        let p = check(&["flip1", "30021", "-g", "notes.txt", "30020"]).unwrap();
        assert_eq!(p.nickname, "flip1");
        assert_eq!(p.host, "flip1.engr.oregonstate.edu");
        assert_eq!(p.port, 30021);
        assert_eq!(p.command.kind, CommandKind::Get);
        assert_eq!(p.filename.as_deref(), Some("notes.txt"));
        assert_eq!(p.data_port, 30020);
        assert_eq!(p.peer_label(), "flip1:30021");
    }

    #[test]
    fn valid_listing_requests() {
        let p = check(&["localhost", "30021", "-l", "30020"]).unwrap();
        assert_eq!(p.command.kind, CommandKind::List);
        assert!(p.filename.is_none());
        let p = check(&["localhost", "30021", "-ltxt", "30020"]).unwrap();
        assert_eq!(p.command.kind, CommandKind::ListTxt);
    }

    #[test]
    fn wrong_argument_counts() {
        assert!(matches!(check(&["a", "1", "-l"]), Err(FtError::Argument(_))));
        assert!(matches!(
            check(&["a", "1", "-g", "f", "2", "extra"]),
            Err(FtError::Argument(_))
        ));
    }

    #[test]
    fn get_without_filename() {
        let errs = problems(&["localhost", "30021", "-g", "30020"]);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("FILENAME required"));
    }

    #[test]
    fn listing_with_filename() {
        let errs = problems(&["localhost", "30021", "-l", "x.txt", "30020"]);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("Only DATA_PORT"));
    }

    #[test]
    fn every_problem_is_collected() {
        let errs = problems(&["localhost", "port", "-zz", "dport"]);
        assert!(errs.iter().any(|e| e.starts_with("SERVER_PORT invalid")));
        assert!(errs.iter().any(|e| e.starts_with("COMMAND invalid")));
        assert!(errs.iter().any(|e| e.starts_with("DATA_PORT invalid")));
    }

    #[test]
    fn out_of_range_and_signed_ports() {
        assert!(!problems(&["h", "70000", "-l", "30020"]).is_empty());
        assert!(!problems(&["h", "+80", "-l", "30020"]).is_empty());
        assert!(!problems(&["h", "80", "-l", "-1"]).is_empty());
    }

    #[test]
    fn filename_must_have_a_final_component() {
        let errs = problems(&["h", "80", "-g", "..", "30020"]);
        assert!(errs[0].starts_with("FILENAME invalid"));
        assert_eq!(local_file_name("dir/sub/report.txt").as_deref(), Some("report.txt"));
    }

    #[test]
    fn clap_collects_hyphenated_command_tokens() {
        let args = Args::try_parse_from(["ftclient", "localhost", "30021", "-ltxt", "30020"]).unwrap();
        assert_eq!(args.positional, v(&["localhost", "30021", "-ltxt", "30020"]));
        assert!(!args.help_requested().unwrap());

        let args = Args::try_parse_from([
            "ftclient",
            "--timeout",
            "5",
            "-p",
            "localhost",
            "30021",
            "-g",
            "a.txt",
            "30020",
        ])
        .unwrap();
        assert_eq!(args.timeout(), Some(Duration::from_secs(5)));
        assert!(args.progress);
        assert_eq!(args.positional.len(), 5);
    }

    #[test]
    fn standalone_help_flag() {
        let args = Args::try_parse_from(["ftclient", "-h"]).unwrap();
        assert!(args.help_requested().unwrap());
        let text = help_text(&ProtocolConfig::default());
        assert!(text.starts_with(USAGE_MESSAGE));
        assert!(text.contains("-ltxt\tList only files with .txt extension"));
    }

    #[test]
    fn help_flag_with_session_arguments_is_rejected() {
        let args =
            Args::try_parse_from(["ftclient", "-h", "localhost", "30021", "-l", "30020"]).unwrap();
        match args.help_requested() {
            Err(e @ FtError::Argument(_)) => assert_eq!(e.exit_code(), 1),
            other => panic!("expected argument error, got {:?}", other),
        }
    }
}
