//! Destinations for received data: files on disk, listings on stdout

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{FtError, Result};
use crate::mux::DataMode;
use crate::protocol::MAX_COPY_INDEX;

/// Consumer of data channel payloads, fed in arrival order
pub trait TransferSink {
    fn data_mode(&self) -> DataMode;
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;
    /// Called once after the byte count has been reconciled with the status
    fn finish(&mut self) -> Result<()>;
}

/// Split at the last '.', keeping the dot with the extension
pub fn split_filename(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) => (&name[..i], &name[i..]),
        None => (name, ""),
    }
}

/// Create `dir/name` exclusively, falling back to `prefix_N.ext` for N = 1, 2, ...
pub fn create_unique(dir: &Path, name: &str) -> Result<(File, PathBuf)> {
    let first = dir.join(name);
    if let Some(f) = try_create(&first)? {
        return Ok((f, first));
    }
    let (prefix, extension) = split_filename(name);
    for n in 1..=MAX_COPY_INDEX {
        let candidate = dir.join(format!("{}_{}{}", prefix, n, extension));
        if let Some(f) = try_create(&candidate)? {
            return Ok((f, candidate));
        }
    }
    Err(FtError::Output {
        path: first,
        source: io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name after {} attempts", MAX_COPY_INDEX),
        ),
    })
}

/// `Ok(None)` when the name is taken
fn try_create(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => Ok(Some(f)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(source) => Err(FtError::Output {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes a received file under a collision-free name.
///
/// The file is created on the first chunk (or at `finish` for an empty
/// transfer), so a request that fails before any data arrives leaves nothing
/// on disk.
pub struct FileMaterializer {
    dir: PathBuf,
    requested: String,
    file: Option<File>,
    path: Option<PathBuf>,
    written: u64,
    complete: bool,
}

impl FileMaterializer {
    pub fn new(dir: impl Into<PathBuf>, requested: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            requested: requested.into(),
            file: None,
            path: None,
            written: 0,
            complete: false,
        }
    }

    fn ensure_open(&mut self) -> Result<&mut File> {
        let file = match self.file.take() {
            Some(f) => f,
            None => {
                let (f, path) = create_unique(&self.dir, &self.requested)?;
                self.path = Some(path);
                f
            }
        };
        Ok(self.file.insert(file))
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Final path, once the file exists
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Path of a file left behind by a transfer that did not complete
    pub fn partial_path(&self) -> Option<&Path> {
        if self.complete {
            None
        } else {
            self.path()
        }
    }
}

impl TransferSink for FileMaterializer {
    fn data_mode(&self) -> DataMode {
        DataMode::Binary
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self.ensure_open()?;
        if let Err(source) = file.write_all(chunk) {
            return Err(FtError::Output {
                path: self.path.clone().unwrap_or_default(),
                source,
            });
        }
        self.written += chunk.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.path.is_none() {
            self.ensure_open()?;
        }
        if let Some(mut f) = self.file.take() {
            f.flush().map_err(|source| FtError::Output {
                path: self.path.clone().unwrap_or_default(),
                source,
            })?;
        }
        self.complete = true;
        Ok(())
    }
}

/// Forwards listing chunks straight to an output stream
pub struct ListingPrinter<W: Write> {
    out: W,
    printed: u64,
}

impl<W: Write> ListingPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    pub fn bytes_printed(&self) -> u64 {
        self.printed
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TransferSink for ListingPrinter<W> {
    fn data_mode(&self) -> DataMode {
        DataMode::Text
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.out.write_all(chunk).map_err(stdout_error)?;
        self.out.flush().map_err(stdout_error)?;
        self.printed += chunk.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().map_err(stdout_error)
    }
}

fn stdout_error(source: io::Error) -> FtError {
    FtError::Output {
        path: PathBuf::from("<stdout>"),
        source,
    }
}
