//! ftclient - list or fetch files from an ftserver over a control connection
//! plus a server-initiated data connection
//!
//! Exit codes: 0 on success or help, 1 for bad arguments or configuration,
//! 2 for any transport or protocol failure, 130 on Ctrl-C.

use anyhow::Result;
use clap::Parser;
use std::io;
use std::sync::Arc;

use ftclient::cli::{self, Args, USAGE_MESSAGE};
use ftclient::config::ProtocolConfig;
use ftclient::error::{FtError, EXIT_ARGUMENT, EXIT_PROTOCOL};
use ftclient::logger::{Logger, NoopLogger, TextLogger};
use ftclient::session;

fn main() {
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // 128 + SIGINT
        std::process::exit(130);
    })
    .ok();

    let args = match Args::try_parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE_MESSAGE);
            std::process::exit(EXIT_ARGUMENT);
        }
    };

    if let Err(err) = run(args) {
        let code = match err.downcast_ref::<FtError>() {
            Some(e @ FtError::Argument(_)) => {
                eprintln!("{}", USAGE_MESSAGE);
                eprintln!("{}", e);
                e.exit_code()
            }
            Some(e) => {
                eprintln!("{}", e);
                e.exit_code()
            }
            None => {
                eprintln!("{:#}", err);
                EXIT_PROTOCOL
            }
        };
        std::process::exit(code);
    }
}

fn run(args: Args) -> Result<()> {
    let config = ProtocolConfig::load(args.config.as_deref())?;

    if args.help_requested()? {
        println!("{}", cli::help_text(&config));
        return Ok(());
    }

    let params = cli::validate(&args.positional, &config, &args.output_dir, args.timeout())?;

    // Choose logger once; NoopLogger keeps the transfer path free of I/O
    let logger: Arc<dyn Logger> = match args.log_file {
        Some(ref p) => match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                eprintln!("warning: cannot open log file {}: {}", p.display(), e);
                Arc::new(NoopLogger)
            }
        },
        None => Arc::new(NoopLogger),
    };

    let stdout = io::stdout();
    session::execute(params, &config, logger, stdout.lock(), args.progress)?;
    Ok(())
}
