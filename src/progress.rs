//! Spinner showing bytes received, drawn on stderr
//!
//! Wraps any sink so listings on stdout stay untouched.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::mux::DataMode;
use crate::sink::TransferSink;

pub struct ProgressSink<'a, S: TransferSink + ?Sized> {
    inner: &'a mut S,
    spinner: ProgressBar,
    label: String,
    bytes: u64,
    start: Instant,
}

impl<'a, S: TransferSink + ?Sized> ProgressSink<'a, S> {
    pub fn new(inner: &'a mut S, label: &str) -> Self {
        let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("{}: 0 bytes", label));
        Self {
            inner,
            spinner,
            label: label.to_string(),
            bytes: 0,
            start: Instant::now(),
        }
    }

    fn message(&self) -> String {
        format!(
            "{}: {} bytes in {:.1}s",
            self.label,
            self.bytes,
            self.start.elapsed().as_secs_f64()
        )
    }
}

impl<S: TransferSink + ?Sized> TransferSink for ProgressSink<'_, S> {
    fn data_mode(&self) -> DataMode {
        self.inner.data_mode()
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.inner.write_chunk(chunk)?;
        self.bytes += chunk.len() as u64;
        self.spinner.set_message(self.message());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()?;
        self.spinner.finish_and_clear();
        Ok(())
    }
}

impl<S: TransferSink + ?Sized> Drop for ProgressSink<'_, S> {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.abandon();
        }
    }
}
