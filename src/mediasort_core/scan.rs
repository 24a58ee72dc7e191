use crate::mediasort_core::error::{MediaSortError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively list the files under `root` in a stable order.
///
/// Anything inside `exclude` (the archive root, when it sits inside the input
/// tree) is skipped so already-archived files are not processed again.
pub fn list_files(root: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(MediaSortError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(MediaSortError::NotADirectory(root.to_path_buf()));
    }

    let exclude = exclude.and_then(|p| p.canonicalize().ok());

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match &exclude {
            Some(skip) => entry
                .path()
                .canonicalize()
                .map(|p| &p != skip)
                .unwrap_or(true),
            None => true,
        });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable entry: {}", e),
        }
    }

    log::debug!("Found {} files under {}", files.len(), root.display());
    Ok(files)
}
