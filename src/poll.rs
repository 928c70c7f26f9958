//! Readiness multiplexing over a small set of sockets via poll(2)
//!
//! This is the only place the client suspends waiting for the server.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use crate::error::{FtError, Result};

/// Block until at least one descriptor is readable (or hung up / in error).
///
/// Returns one flag per input descriptor, in order. `timeout = None` waits
/// indefinitely; an elapsed timeout is `FtError::Timeout`.
pub fn wait_readable(fds: &[RawFd], timeout: Option<Duration>) -> Result<Vec<bool>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();
    let timeout_ms: libc::c_int = match timeout {
        None => -1,
        Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
    };
    loop {
        let r = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if r < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(FtError::ReceiveFailed(err));
        }
        if r == 0 {
            return Err(FtError::Timeout(timeout.unwrap_or_default()));
        }
        // POLLHUP/POLLERR count as ready: the next read reports the closure.
        return Ok(pollfds.iter().map(|p| p.revents != 0).collect());
    }
}

/// Convenience wrapper taking socket references
pub fn wait_any(sources: &[&dyn AsRawFd], timeout: Option<Duration>) -> Result<Vec<bool>> {
    let fds: Vec<RawFd> = sources.iter().map(|s| s.as_raw_fd()).collect();
    wait_readable(&fds, timeout)
}
