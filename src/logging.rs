use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Sends log lines to stderr, keeping stdout for reports, and optionally
/// appends a copy to a run log file.
#[derive(Clone, Default)]
pub(crate) struct RunLogMakeWriter {
    pub file: Option<Arc<Mutex<File>>>,
    pub suppress_stderr: bool,
}

impl<'a> MakeWriter<'a> for RunLogMakeWriter {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter {
            file: self.file.clone(),
            suppress_stderr: self.suppress_stderr,
        }
    }
}

pub(crate) struct RunLogWriter {
    file: Option<Arc<Mutex<File>>>,
    suppress_stderr: bool,
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            file.write_all(buf)?;
        }
        if !self.suppress_stderr {
            std::io::stderr().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            file.flush()?;
        }
        if !self.suppress_stderr {
            std::io::stderr().flush()?;
        }
        Ok(())
    }
}

pub(crate) fn parse_level(value: &str) -> Result<Level> {
    value
        .parse::<Level>()
        .map_err(|_| anyhow!("Unknown log level '{}' (use trace, debug, info, warn or error)", value))
}

pub(crate) fn init_logging(level: Level, log_file: Option<&Path>) -> Result<()> {
    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(Arc::new(Mutex::new(file)))
        }
        None => None,
    };
    // Plain text when a copy lands in a file.
    let ansi = file.is_none();
    let make_writer = RunLogMakeWriter {
        file,
        suppress_stderr: false,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(ansi)
        .with_writer(make_writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    Ok(())
}
