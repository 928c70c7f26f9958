use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

/// Session event hooks. Every method defaults to a no-op.
pub trait Logger: Send + Sync {
    fn connected(&self, _peer: &str, _data_port: u16) {}
    fn request(&self, _line: &str) {}
    fn data_accepted(&self, _from: SocketAddr) {}
    fn status(&self, _message: &str) {}
    fn error(&self, _context: &str, _msg: &str) {}
    fn done(&self, _bytes: u64, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn connected(&self, peer: &str, data_port: u16) {
        self.line(&format!("CONNECT peer={} data_port={}", peer, data_port));
    }
    fn request(&self, line: &str) {
        self.line(&format!("REQUEST {}", line));
    }
    fn data_accepted(&self, from: SocketAddr) {
        self.line(&format!("DATA from={}", from));
    }
    fn status(&self, message: &str) {
        self.line(&format!("STATUS {}", message));
    }
    fn error(&self, context: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} msg={}", context, msg));
    }
    fn done(&self, bytes: u64, seconds: f64) {
        self.line(&format!("DONE bytes={bytes} seconds={seconds:.3}"));
    }
}
