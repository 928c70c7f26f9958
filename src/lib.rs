//! ftclient library
//!
//! Client side of a two-channel file transfer protocol: a control connection
//! carries the request and the terminal status, while the server streams the
//! listing or file back over a separate data connection it opens to us.

#[cfg(not(unix))]
compile_error!("ftclient relies on poll(2) and only builds on unix targets");

pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod mux;
pub mod net;
pub mod poll;
pub mod progress;
pub mod protocol;
pub mod protocol_core;
pub mod session;
pub mod sink;

pub use error::{FtError, Result};
