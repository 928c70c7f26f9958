//! Control connection negotiation and data channel acceptance
//!
//! The control connection is opened by the client. The data connection is
//! opened by the server back to a single-use listener on the client, and is
//! only trusted after its origin matches the control peer and the data
//! handshake literal checks out.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::config::{CommandSpec, ProtocolConfig};
use crate::error::{FtError, Result};
use crate::poll;
use crate::protocol::{data_port_announcement, request_line};
use crate::protocol_core::{recv_framed_text, send_text};

/// Require an exact literal match from the peer
pub fn expect_literal(received: String, expected: &str) -> Result<()> {
    if received != expected {
        return Err(FtError::HandshakeMismatch {
            expected: expected.to_string(),
            received,
        });
    }
    Ok(())
}

/// The data connection must come from the same host as the control peer
pub fn check_origin(expected: IpAddr, received: IpAddr) -> Result<()> {
    let expected = expected.to_canonical();
    let received = received.to_canonical();
    if expected != received {
        return Err(FtError::UnauthorizedDataConnection { expected, received });
    }
    Ok(())
}

/// Bind the data listener on all interfaces with a backlog of exactly one.
/// Port 0 picks an ephemeral port; read it back with `local_addr`.
pub fn bind_data_listener(port: u16) -> Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(|source| FtError::BindFailed { port, source })?;
    socket
        .set_reuse_address(true)
        .map_err(|source| FtError::BindFailed { port, source })?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    socket
        .bind(&addr.into())
        .map_err(|source| FtError::BindFailed { port, source })?;
    socket
        .listen(1)
        .map_err(|source| FtError::ListenFailed { port, source })?;
    Ok(socket.into())
}

pub struct ControlNegotiator<'a> {
    config: &'a ProtocolConfig,
}

impl<'a> ControlNegotiator<'a> {
    pub fn new(config: &'a ProtocolConfig) -> Self {
        Self { config }
    }

    /// Connect to `host:port` and run the control handshake
    pub fn negotiate(&self, host: &str, port: u16, data_port: u16) -> Result<TcpStream> {
        let mut stream = connect_control(host, port)?;
        self.handshake(&mut stream, data_port)?;
        Ok(stream)
    }

    /// Announce the data port and validate the server greeting
    pub fn handshake<S: Read + Write>(&self, stream: &mut S, data_port: u16) -> Result<()> {
        send_text(
            stream,
            &data_port_announcement(&self.config.data_port_prefix, data_port),
        )?;
        let response = recv_framed_text(stream)?;
        expect_literal(response, &self.config.greeting)
    }

    pub fn send_request<W: Write>(
        &self,
        stream: &mut W,
        command: &CommandSpec,
        filename: Option<&str>,
    ) -> Result<()> {
        send_text(stream, &request_line(&command.token, filename))
    }
}

/// Open the control connection, trying each resolved IPv4 address in order
pub fn connect_control(host: &str, port: u16) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| FtError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?
        .filter(SocketAddr::is_ipv4)
        .collect();
    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "no IPv4 address found for host",
    );
    for candidate in candidates {
        match TcpStream::connect(candidate) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => last_err = e,
        }
    }
    Err(FtError::ConnectFailed {
        addr,
        source: last_err,
    })
}

pub struct DataChannelAcceptor<'a> {
    config: &'a ProtocolConfig,
    timeout: Option<Duration>,
}

impl<'a> DataChannelAcceptor<'a> {
    pub fn new(config: &'a ProtocolConfig, timeout: Option<Duration>) -> Self {
        Self { config, timeout }
    }

    /// Wait until the listener or the control socket becomes readable.
    ///
    /// `true` only when the listener is the sole ready descriptor. Anything on
    /// the control socket at this point is taken as the server reporting an
    /// error instead of connecting; the caller drains it from `control`.
    pub fn ready_to_accept(&self, listener: &TcpListener, control: &TcpStream) -> Result<bool> {
        let ready = poll::wait_any(&[listener as &dyn AsRawFd, control], self.timeout)?;
        Ok(ready[0] && !ready[1])
    }

    /// Accept exactly one connection, consuming the listener, and validate it.
    pub fn accept_and_validate(
        &self,
        listener: TcpListener,
        control: &TcpStream,
    ) -> Result<TcpStream> {
        let (mut stream, from) = listener.accept().map_err(FtError::AcceptFailed)?;
        drop(listener);
        let expected = control.peer_addr().map_err(FtError::ReceiveFailed)?;
        // On mismatch `stream` is dropped (closed) before it is ever read.
        check_origin(expected.ip(), from.ip())?;
        self.data_handshake(&mut stream)?;
        Ok(stream)
    }

    pub fn data_handshake<S: Read + Write>(&self, stream: &mut S) -> Result<()> {
        let init = recv_framed_text(stream)?;
        expect_literal(init, &self.config.data_init)?;
        send_text(stream, &self.config.data_ack)
    }
}
