//! One client session: negotiate, request, accept the data channel, receive
//!
//! Every socket is owned by the `Session`; any early return drops (closes)
//! whatever is open at that point.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::local_file_name;
use crate::config::{CommandKind, CommandSpec, ProtocolConfig};
use crate::error::{FtError, Result};
use crate::logger::Logger;
use crate::mux::TransferMultiplexer;
use crate::net::{self, ControlNegotiator, DataChannelAcceptor};
use crate::progress::ProgressSink;
use crate::protocol::request_line;
use crate::protocol_core::recv_framed_text;
use crate::sink::{FileMaterializer, ListingPrinter, TransferSink};

/// Validated, immutable inputs for one session
#[derive(Clone, Debug)]
pub struct SessionParams {
    /// Host as typed by the user, used when naming the peer
    pub nickname: String,
    /// Host actually connected to, after alias expansion
    pub host: String,
    pub port: u16,
    pub command: CommandSpec,
    pub filename: Option<String>,
    /// Requested data port; 0 binds an ephemeral port
    pub data_port: u16,
    pub output_dir: PathBuf,
    /// Bound on each readiness wait; `None` waits forever
    pub timeout: Option<Duration>,
}

impl SessionParams {
    /// `<nickname>:<port>`, prefixed to anything the server reports
    pub fn peer_label(&self) -> String {
        format!("{}:{}", self.nickname, self.port)
    }
}

/// Data channel state. The listener is consumed by accepting, so it can
/// never coexist with the data socket.
enum DataChannel {
    Listening(TcpListener),
    Connected(TcpStream),
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Listing { bytes: u64 },
    File { path: PathBuf, bytes: u64 },
}

impl Outcome {
    pub fn bytes(&self) -> u64 {
        match self {
            Outcome::Listing { bytes } | Outcome::File { bytes, .. } => *bytes,
        }
    }
}

pub struct Session<'a> {
    params: SessionParams,
    config: &'a ProtocolConfig,
    logger: Arc<dyn Logger>,
    control: TcpStream,
    data: DataChannel,
    data_port: u16,
}

impl<'a> Session<'a> {
    /// Bind the data listener, then open and negotiate the control connection
    pub fn establish(
        params: SessionParams,
        config: &'a ProtocolConfig,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        let listener = net::bind_data_listener(params.data_port)?;
        let data_port = listener
            .local_addr()
            .map_err(|source| FtError::BindFailed {
                port: params.data_port,
                source,
            })?
            .port();
        let control =
            ControlNegotiator::new(config).negotiate(&params.host, params.port, data_port)?;
        logger.connected(&params.peer_label(), data_port);
        Ok(Self {
            params,
            config,
            logger,
            control,
            data: DataChannel::Listening(listener),
            data_port,
        })
    }

    pub fn send_request(&mut self) -> Result<()> {
        let filename = self.params.filename.as_deref();
        ControlNegotiator::new(self.config).send_request(
            &mut self.control,
            &self.params.command,
            filename,
        )?;
        self.logger
            .request(&request_line(&self.params.command.token, filename));
        Ok(())
    }

    /// Wait for the server to connect back, or for its error report instead
    pub fn open_data_channel(&mut self) -> Result<()> {
        let listener = match std::mem::replace(&mut self.data, DataChannel::Closed) {
            DataChannel::Listening(l) => l,
            other => {
                self.data = other;
                return Err(FtError::ProtocolViolation(
                    "data channel already consumed".to_string(),
                ));
            }
        };
        let acceptor = DataChannelAcceptor::new(self.config, self.params.timeout);
        if !acceptor.ready_to_accept(&listener, &self.control)? {
            // Any control traffic here means the request was refused.
            drop(listener);
            let message = recv_framed_text(&mut self.control)?;
            return Err(FtError::PeerReported {
                peer: self.params.peer_label(),
                message,
            });
        }
        let stream = acceptor.accept_and_validate(listener, &self.control)?;
        if let Ok(from) = stream.peer_addr() {
            self.logger.data_accepted(from);
        }
        self.data = DataChannel::Connected(stream);
        Ok(())
    }

    fn transfer<S: TransferSink>(&mut self, sink: &mut S, progress: bool) -> Result<u64> {
        let peer = self.params.peer_label();
        let data = match &mut self.data {
            DataChannel::Connected(s) => s,
            _ => {
                return Err(FtError::ProtocolViolation(
                    "data channel is not open".to_string(),
                ))
            }
        };
        let mut mux = TransferMultiplexer::new(
            &mut self.control,
            data,
            &self.config.success_marker,
            &peer,
            self.params.timeout,
        );
        if progress {
            mux.run(&mut ProgressSink::new(sink, "receiving"))
        } else {
            mux.run(sink)
        }
    }

    /// Receive the payload: listings into `out`, files under the output directory
    pub fn receive<W: Write>(&mut self, out: W, progress: bool) -> Result<Outcome> {
        let source = format!("{}:{}", self.params.nickname, self.data_port);
        match (self.params.command.kind, self.params.filename.clone()) {
            (CommandKind::Get, Some(requested)) => {
                eprintln!("Receiving \"{}\" from {}", requested, source);
                let local = local_file_name(&requested).unwrap_or_else(|| requested.clone());
                let mut file = FileMaterializer::new(&self.params.output_dir, local);
                match self.transfer(&mut file, progress) {
                    Ok(bytes) => {
                        let path = file.path().map(Path::to_path_buf).unwrap_or_default();
                        eprintln!(
                            "File transfer complete. Results can be found in \"{}\"",
                            path.display()
                        );
                        Ok(Outcome::File { path, bytes })
                    }
                    Err(e) => {
                        if let Some(partial) = file.partial_path() {
                            eprintln!(
                                "Transfer incomplete: \"{}\" holds only the first {} bytes received",
                                partial.display(),
                                file.bytes_written()
                            );
                            self.logger
                                .error("partial file", &partial.display().to_string());
                        }
                        Err(e)
                    }
                }
            }
            (CommandKind::Get, None) => Err(FtError::ProtocolViolation(
                "get request was sent without a file name".to_string(),
            )),
            (kind, _) => {
                if kind == CommandKind::ListTxt {
                    eprintln!("Receiving list of .txt files in directory from {}", source);
                } else {
                    eprintln!("Receiving directory structure from {}", source);
                }
                let mut printer = ListingPrinter::new(out);
                let bytes = self.transfer(&mut printer, progress)?;
                Ok(Outcome::Listing { bytes })
            }
        }
    }

    fn drive<W: Write>(&mut self, out: W, progress: bool) -> Result<Outcome> {
        self.send_request()?;
        self.open_data_channel()?;
        self.receive(out, progress)
    }

    /// Request, accept, receive. Sockets close when `self` drops on return.
    pub fn run<W: Write>(mut self, out: W, progress: bool) -> Result<Outcome> {
        let start = Instant::now();
        let result = self.drive(out, progress);
        match &result {
            Ok(outcome) => {
                self.logger
                    .status(&format!("{} {}", self.config.success_marker, outcome.bytes()));
                self.logger
                    .done(outcome.bytes(), start.elapsed().as_secs_f64());
            }
            Err(e) => {
                let context = if e.is_peer_reported() { "peer" } else { "session" };
                self.logger.error(context, &e.to_string());
            }
        }
        result
    }
}

/// Establish and run a complete session
pub fn execute<W: Write>(
    params: SessionParams,
    config: &ProtocolConfig,
    logger: Arc<dyn Logger>,
    out: W,
    progress: bool,
) -> Result<Outcome> {
    let session = match Session::establish(params, config, Arc::clone(&logger)) {
        Ok(s) => s,
        Err(e) => {
            logger.error("establish", &e.to_string());
            return Err(e);
        }
    };
    session.run(out, progress)
}
