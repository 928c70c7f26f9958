//! Two-socket transfer loop: control status + data payload
//!
//! Both sockets are waited on together; each wakeup drains at most one frame
//! per ready socket. The transfer is complete only once a success status has
//! arrived on the control channel *and* the data channel has delivered exactly
//! the announced number of bytes, in whichever order those happen.
//!
//! The server closes the data channel once it has sent everything, so a data
//! EOF only retires that socket. Whether the transfer succeeded is decided by
//! the status and the byte count, never by the order of the two hangups.

use std::io::Read;
use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::error::{FtError, Result};
use crate::poll;
use crate::protocol_core::{recv_framed_bytes, recv_framed_text};
use crate::sink::TransferSink;

/// How data frames are decoded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataMode {
    Text,
    Binary,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Binary(b) => b,
        }
    }
}

/// Terminal state reported on the control channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Success(u64),
    Failure(String),
}

/// Classify a control message as the terminal status.
///
/// `"<marker> <total> ..."` is success; anything else is the server's error
/// text, kept verbatim.
pub fn finalize_control_frame(message: &str, success_marker: &str) -> Result<TransferStatus> {
    let mut tokens = message.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(first), Some(count)) if first == success_marker => count
            .parse::<u64>()
            .map(TransferStatus::Success)
            .map_err(|_| {
                FtError::ProtocolViolation(format!("invalid byte count in status: {:?}", message))
            }),
        _ => Ok(TransferStatus::Failure(message.to_string())),
    }
}

/// What one readiness wakeup produced.
///
/// A data EOF yields neither field. Any other failed data read is held in
/// `data_error` when a control frame was drained in the same wakeup.
#[derive(Debug, Default)]
pub struct Drained {
    pub control: Option<String>,
    pub data: Option<Payload>,
    pub data_error: Option<FtError>,
}

pub struct TransferMultiplexer<'a, C, D> {
    control: &'a mut C,
    data: &'a mut D,
    /// Cleared once the terminal status has been read
    control_live: bool,
    /// Cleared once the server closes the data channel
    data_live: bool,
    success_marker: &'a str,
    peer: &'a str,
    timeout: Option<Duration>,
}

impl<'a, C, D> TransferMultiplexer<'a, C, D>
where
    C: Read + AsRawFd,
    D: Read + AsRawFd,
{
    pub fn new(
        control: &'a mut C,
        data: &'a mut D,
        success_marker: &'a str,
        peer: &'a str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            control,
            data,
            control_live: true,
            data_live: true,
            success_marker,
            peer,
            timeout,
        }
    }

    /// One readiness wait, then at most one frame from each ready socket
    pub fn poll_once(&mut self, mode: DataMode) -> Result<Drained> {
        let mut out = Drained::default();
        let mut fds = Vec::with_capacity(2);
        if self.control_live {
            fds.push(self.control.as_raw_fd());
        }
        if self.data_live {
            fds.push(self.data.as_raw_fd());
        }
        if fds.is_empty() {
            return Err(FtError::ConnectionClosed);
        }
        let ready = poll::wait_readable(&fds, self.timeout)?;
        let control_ready = self.control_live && ready[0];
        let data_ready = self.data_live && ready[fds.len() - 1];
        if control_ready {
            out.control = Some(recv_framed_text(self.control)?);
        }
        if data_ready {
            let payload = match mode {
                DataMode::Text => recv_framed_text(self.data).map(Payload::Text),
                DataMode::Binary => recv_framed_bytes(self.data).map(Payload::Binary),
            };
            match payload {
                Ok(p) => out.data = Some(p),
                Err(FtError::ConnectionClosed) => self.data_live = false,
                Err(e) if out.control.is_some() => out.data_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Drive the transfer into `sink` until the status and byte count agree.
    /// Returns the total number of payload bytes delivered.
    pub fn run<S: TransferSink + ?Sized>(&mut self, sink: &mut S) -> Result<u64> {
        let mode = sink.data_mode();
        let mut expected: Option<u64> = None;
        let mut received: u64 = 0;
        while expected != Some(received) {
            let drained = self.poll_once(mode)?;
            if let Some(payload) = &drained.data {
                sink.write_chunk(payload.as_bytes())?;
                received += payload.as_bytes().len() as u64;
            }
            // The status outranks a data channel error from the same wakeup.
            if let Some(message) = drained.control {
                match finalize_control_frame(&message, self.success_marker)? {
                    TransferStatus::Success(total) => {
                        expected = Some(total);
                        self.control_live = false;
                    }
                    TransferStatus::Failure(message) => {
                        return Err(FtError::PeerReported {
                            peer: self.peer.to_string(),
                            message,
                        });
                    }
                }
            }
            if let Some(e) = drained.data_error {
                return Err(e);
            }
            if let Some(total) = expected {
                if received > total {
                    return Err(FtError::ProtocolViolation(format!(
                        "received {} bytes but server reported {}",
                        received, total
                    )));
                }
                if received < total && !self.data_live {
                    return Err(FtError::ConnectionClosed);
                }
            }
        }
        sink.finish()?;
        Ok(received)
    }
}
