//! Writer that keeps log output above the progress bars
//!
//! Build output from many concurrent tasks goes through tracing; every
//! write suspends the shared `MultiProgress` so lines never tear a bar.

use indicatif::MultiProgress;
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

/// Process-wide progress container shared by the log writer and the builder
pub fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(MultiProgress::new)
}

/// `MakeWriter` for the fmt layer writing to stderr around the progress bars
pub fn make_writer() -> ProgressWriter {
    ProgressWriter::new(multi_progress().clone())
}

/// Writer that suspends progress bars while writing logs
pub struct ProgressWriter {
    multi: MultiProgress,
}

impl ProgressWriter {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl MakeWriter<'_> for ProgressWriter {
    type Writer = Self;

    fn make_writer(&'_ self) -> Self::Writer {
        Self {
            multi: self.multi.clone(),
        }
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().lock().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // One suspension per log record keeps records whole
        self.multi.suspend(|| io::stderr().lock().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
