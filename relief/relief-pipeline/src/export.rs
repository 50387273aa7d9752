//! The slicer-export capability.
//!
//! Producing a real Bambu Studio project requires Bambu Studio itself;
//! the pipeline consumes that as a capability so tests and other
//! frontends can substitute their own. [`BambuStudioCli`] is the
//! production implementation, spawning `bambu-studio --export-3mf`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Result type for slicer exports.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors surfaced by a slicer export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The slicer executable is not installed or not on the search path.
    #[error("slicer is not available: {details}")]
    Unavailable {
        /// What was looked for.
        details: String,
    },

    /// The slicer ran and failed.
    #[error("slicer export failed (exit code {code:?}): {stderr}")]
    Failed {
        /// Exit code, when the process terminated normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The slicer did not finish in time and was killed.
    #[error("slicer export timed out after {seconds} seconds")]
    TimedOut {
        /// The timeout that expired.
        seconds: u64,
    },

    /// Spawning or waiting on the slicer failed.
    #[error("I/O error running slicer: {0}")]
    Io(#[from] std::io::Error),
}

/// A converter from a plain 3MF into a slicer-native project package.
pub trait SlicerExport {
    /// Whether the exporter can run at all. Checked before any geometry
    /// work so a missing slicer fails the run immediately.
    fn is_available(&self) -> bool;

    /// Convert `input` into a slicer-native package at `output`.
    ///
    /// # Errors
    ///
    /// [`ExportError`] when the conversion fails or times out.
    fn export(&self, input: &Path, output: &Path) -> ExportResult<()>;
}

/// `bambu-studio --export-3mf` as a [`SlicerExport`].
#[derive(Debug, Clone)]
pub struct BambuStudioCli {
    program: PathBuf,
    timeout: Duration,
}

impl Default for BambuStudioCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("bambu-studio"),
            timeout: Duration::from_secs(120),
        }
    }
}

impl BambuStudioCli {
    /// Use a specific executable and timeout.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl SlicerExport for BambuStudioCli {
    fn is_available(&self) -> bool {
        if self.program.is_absolute() {
            return self.program.is_file();
        }
        std::env::var_os("PATH").is_some_and(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(&self.program).is_file())
        })
    }

    fn export(&self, input: &Path, output: &Path) -> ExportResult<()> {
        info!(
            program = %self.program.display(),
            input = %input.display(),
            output = %output.display(),
            "running slicer export"
        );
        let mut child = Command::new(&self.program)
            .arg("--export-3mf")
            .arg(output)
            .arg(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExportError::Unavailable {
                        details: self.program.display().to_string(),
                    }
                } else {
                    ExportError::Io(e)
                }
            })?;

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                if !status.success() {
                    let output = child.wait_with_output()?;
                    return Err(ExportError::Failed {
                        code: status.code(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    });
                }
                debug!(elapsed_ms = started.elapsed().as_millis(), "slicer export finished");
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                warn!("slicer export timed out, killing the process");
                child.kill()?;
                child.wait()?;
                return Err(ExportError::TimedOut {
                    seconds: self.timeout.as_secs(),
                });
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_program_is_unavailable() {
        let cli = BambuStudioCli::new("/nonexistent/bambu-studio", Duration::from_secs(1));
        assert!(!cli.is_available());
    }

    #[test]
    fn spawning_a_missing_program_reports_unavailable() {
        let cli = BambuStudioCli::new("/nonexistent/bambu-studio", Duration::from_secs(1));
        let err = cli
            .export(Path::new("/tmp/in.3mf"), Path::new("/tmp/out.3mf"))
            .unwrap_err();
        assert!(matches!(err, ExportError::Unavailable { .. }));
    }
}
