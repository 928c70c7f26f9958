//! Error taxonomy for a single ftclient session

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Exit status for malformed command-line input or configuration
pub const EXIT_ARGUMENT: i32 = 1;
/// Exit status for every socket, handshake, or peer-reported failure
pub const EXIT_PROTOCOL: i32 = 2;

#[derive(Debug, Error)]
pub enum FtError {
    #[error("The command-line arguments entered contained the following error(s):\n\t{}", .0.join("\n\t"))]
    Argument(Vec<String>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("ERROR CONNECTING TO SERVER {addr}: {source}")]
    ConnectFailed { addr: String, source: io::Error },

    #[error("LISTENING SOCKET DATA PORT BIND ERROR (port {port}): {source}")]
    BindFailed { port: u16, source: io::Error },

    #[error("LISTEN ERROR (port {port}): {source}")]
    ListenFailed { port: u16, source: io::Error },

    #[error("SOCKET ACCEPTANCE ERROR: {0}")]
    AcceptFailed(io::Error),

    #[error("SEND ERROR: {0}")]
    SendFailed(io::Error),

    #[error("RECV ERROR: {0}")]
    ReceiveFailed(io::Error),

    #[error("RECV ERROR: Connection closed by server.")]
    ConnectionClosed,

    #[error("PROTOCOL ERROR: {0}")]
    ProtocolViolation(String),

    #[error("VALIDATION ERROR: expected \"{expected}\", received \"{received}\"")]
    HandshakeMismatch { expected: String, received: String },

    #[error("INVALID DATA CONNECTION: connection expected from {expected}, received instead from {received}")]
    UnauthorizedDataConnection { expected: IpAddr, received: IpAddr },

    #[error("{peer} says:\n{message}")]
    PeerReported { peer: String, message: String },

    #[error("OUTPUT ERROR ({}): {source}", .path.display())]
    Output { path: PathBuf, source: io::Error },

    #[error("TIMEOUT: no activity from server within {0:?}")]
    Timeout(std::time::Duration),
}

impl FtError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FtError::Argument(_) | FtError::Config(_) => EXIT_ARGUMENT,
            _ => EXIT_PROTOCOL,
        }
    }

    /// True when the failure was reported by the remote peer rather than detected locally
    pub fn is_peer_reported(&self) -> bool {
        matches!(self, FtError::PeerReported { .. })
    }
}

pub type Result<T> = std::result::Result<T, FtError>;
