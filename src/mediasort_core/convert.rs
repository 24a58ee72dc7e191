use crate::mediasort_core::error::{MediaSortError, Result};
use crate::mediasort_core::process::run_with_timeout;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

/// A converted file in a scratch directory of its own.
///
/// Dropping it deletes the file and the directory, so nothing next to the
/// source is ever written or removed.
pub struct ConvertedCopy {
    path: PathBuf,
    scratch: TempDir,
}

impl ConvertedCopy {
    /// Reserve a fresh scratch location for the converted form of `source`.
    pub fn reserve(source: &Path) -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("mediasort-").tempdir()?;
        let mut name = source
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("converted"));
        name.push(".jpg");
        let path = scratch.path().join(name);
        Ok(ConvertedCopy { path, scratch })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConvertedCopy {
    fn drop(&mut self) {
        log::debug!("Removing converted copy {}", self.scratch.path().display());
    }
}

/// Turns a file the decoder cannot read into one it can.
pub trait ConversionService {
    /// Convert `path` into a scratch copy. The original is never touched.
    fn convert(&self, path: &Path) -> Result<ConvertedCopy>;
}

/// HEIC to JPEG conversion through libheif's `heif-convert`.
pub struct HeifConverter {
    program: String,
    timeout: Duration,
}

impl HeifConverter {
    pub fn new(program: &str, timeout: Duration) -> Self {
        HeifConverter {
            program: program.to_string(),
            timeout,
        }
    }
}

impl ConversionService for HeifConverter {
    fn convert(&self, path: &Path) -> Result<ConvertedCopy> {
        let copy = ConvertedCopy::reserve(path)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg(path).arg(copy.path());

        let output = run_with_timeout(cmd, self.timeout)?;
        log::debug!("{} return code: {}", self.program, output.status);

        if !output.status.success() || !copy.path().is_file() {
            return Err(MediaSortError::Conversion {
                path: path.to_path_buf(),
                reason: format!("{} failed: {}", self.program, output.stderr_lossy()),
            });
        }

        Ok(copy)
    }
}
