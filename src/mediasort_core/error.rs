use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Process exit status for a clean run.
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit status for any failure without a more specific code.
pub const EXIT_FAILURE: u8 = 1;
/// Process exit status for a bad or missing input directory.
pub const EXIT_BAD_ARGUMENT: u8 = 2;
/// Process exit status when a required external tool is missing.
pub const EXIT_MISSING_DEPENDENCY: u8 = 3;

#[derive(Error, Debug)]
pub enum MediaSortError {
    // Item-level errors
    #[error("Unsupported file extension: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to extract metadata from {path}: {reason}")]
    MetadataExtraction { path: PathBuf, reason: String },

    #[error("No date field in metadata for {0}")]
    MissingDateField(PathBuf),

    #[error("Failed to convert {path}: {reason}")]
    Conversion { path: PathBuf, reason: String },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Destination already exists: {0}")]
    DestinationCollision(PathBuf),

    #[error("{tool} did not finish within {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    // Run-level errors
    #[error("Missing required tool: {0}")]
    MissingDependency(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    // Wrapped errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walker error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Other(String),
}

impl MediaSortError {
    /// Exit status the binary reports when this error aborts the run.
    pub fn exit_code(&self) -> u8 {
        match self {
            MediaSortError::PathNotFound(_) | MediaSortError::NotADirectory(_) => {
                EXIT_BAD_ARGUMENT
            }
            MediaSortError::MissingDependency(_) => EXIT_MISSING_DEPENDENCY,
            _ => EXIT_FAILURE,
        }
    }
}

/// Result type for mediasort operations.
pub type Result<T> = std::result::Result<T, MediaSortError>;
