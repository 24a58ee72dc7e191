use crate::mediasort_core::error::Result;
use crate::mediasort_core::registry::Classification;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Number of hash hex digits appended by the collision fallback.
pub const HASH_SUFFIX_LEN: usize = 8;

/// Builds archive names and paths under a target root (`<root>/<year>/<month>/<name>`).
#[derive(Debug, Clone)]
pub struct NameBuilder {
    target_root: PathBuf,
}

impl NameBuilder {
    pub fn new(target_root: &Path) -> Self {
        NameBuilder {
            target_root: target_root.to_path_buf(),
        }
    }

    /// `base.ext` for originals, `base_copyN.ext` for duplicates.
    pub fn file_name(base_name: &str, extension: &str, class: Classification) -> String {
        match class {
            Classification::Original => format!("{}.{}", base_name, extension),
            Classification::Duplicate(count) => {
                format!("{}_copy{}.{}", base_name, count, extension)
            }
        }
    }

    /// Name used when the primary destination is already taken:
    /// `base_copyN_hhhhhhhh.ext`, where the suffix is the start of the hash.
    pub fn fallback_file_name(base_name: &str, extension: &str, count: u32, hash: &str) -> String {
        let suffix: String = hash.chars().take(HASH_SUFFIX_LEN).collect();
        format!("{}_copy{}_{}.{}", base_name, count, suffix, extension)
    }

    pub fn month_dir(&self, year: &str, month: &str) -> PathBuf {
        self.target_root.join(year).join(month)
    }

    /// Create `<root>/<year>/<month>` if needed. Safe to call repeatedly.
    pub fn ensure_month_dir(&self, year: &str, month: &str) -> Result<PathBuf> {
        let dir = self.month_dir(year, month);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn destination(&self, year: &str, month: &str, file_name: &str) -> PathBuf {
        self.month_dir(year, month).join(file_name)
    }
}

/// Why a file could not be placed.
#[derive(Debug)]
pub enum PlaceError {
    /// Something already lives at the destination; nothing was touched.
    Collision(PathBuf),
    Io(io::Error),
}

impl std::fmt::Display for PlaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceError::Collision(path) => write!(f, "destination exists: {}", path.display()),
            PlaceError::Io(e) => write!(f, "{}", e),
        }
    }
}

/// Move `source` to `destination` without ever replacing an existing file.
///
/// The file ends up either fully at `destination` or untouched at `source`.
/// Moves across filesystems fall back to copy-then-remove, deleting any
/// partial copy if the copy fails.
pub fn place(source: &Path, destination: &Path) -> std::result::Result<PathBuf, PlaceError> {
    if fs::symlink_metadata(destination).is_ok() {
        return Err(PlaceError::Collision(destination.to_path_buf()));
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(destination.to_path_buf()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "Rename across devices, copying {} -> {}",
                source.display(),
                destination.display()
            );
            if let Err(e) = fs::copy(source, destination) {
                let _ = fs::remove_file(destination);
                return Err(PlaceError::Io(e));
            }
            fs::remove_file(source).map_err(PlaceError::Io)?;
            Ok(destination.to_path_buf())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(PlaceError::Collision(destination.to_path_buf()))
        }
        Err(e) => Err(PlaceError::Io(e)),
    }
}
