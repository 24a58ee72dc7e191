use crate::mediasort_core::error::{MediaSortError, Result};
use crate::mediasort_core::metadata::MetadataMapping;
use std::path::{Path, PathBuf};

/// Image file extensions (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "heic", "png"];

/// Video file extensions (lowercase).
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4"];

/// Extensions the decoder cannot read directly and that go through the converter first.
const CONVERT_EXTENSIONS: &[&str] = &["heic"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// How a still frame is obtained for this kind of media.
    pub fn frame_source(&self) -> FrameSource {
        match self {
            MediaKind::Image => FrameSource::StillImage,
            MediaKind::Video => FrameSource::VideoFirstFrame,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The open/close capability of a media item, fixed when the item is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// Decode the file as a single image.
    StillImage,
    /// Decode the first frame of the video stream, never any other.
    VideoFirstFrame,
}

/// Lowercased extension of `path`, if it is one we handle.
pub fn supported_extension(path: &Path) -> Option<(String, MediaKind)> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Some((ext, MediaKind::Image));
    }

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Some((ext, MediaKind::Video));
    }

    None
}

/// Processing stages of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialized,
    MetadataExtracted,
    DateResolved,
    Converted,
    Opened,
    Hashed,
    Closed,
    Renamed,
    Done,
    Failed,
}

/// One file moving through the pipeline.
#[derive(Debug)]
pub struct MediaItem {
    /// Path of the file as found during traversal.
    pub source_path: PathBuf,
    /// Path the decoder reads; differs from `source_path` while a converted copy exists.
    pub working_path: PathBuf,
    /// Lowercase extension without the dot.
    pub extension: String,
    pub kind: MediaKind,
    pub frame_source: FrameSource,
    pub metadata: MetadataMapping,
    /// Normalized date string, full precision.
    pub date_value: String,
    /// Date-derived base name, truncated to whole seconds.
    pub base_name: String,
    pub year: String,
    pub month: String,
    pub hash: Option<String>,
    pub is_duplicate: bool,
    pub copy_count: u32,
    pub new_file: String,
    /// Set when the primary destination was taken and the fallback name was used.
    pub used_fallback_name: bool,
    pub destination: Option<PathBuf>,
    pub stage: Stage,
}

impl MediaItem {
    /// Build an item for `path`. Fails for anything outside the supported extension set.
    pub fn new(path: &Path) -> Result<Self> {
        let (extension, kind) = supported_extension(path)
            .ok_or_else(|| MediaSortError::UnsupportedFormat(path.to_path_buf()))?;

        Ok(MediaItem {
            source_path: path.to_path_buf(),
            working_path: path.to_path_buf(),
            extension,
            kind,
            frame_source: kind.frame_source(),
            metadata: MetadataMapping::default(),
            date_value: String::new(),
            base_name: String::new(),
            year: String::new(),
            month: String::new(),
            hash: None,
            is_duplicate: false,
            copy_count: 0,
            new_file: String::new(),
            used_fallback_name: false,
            destination: None,
            stage: Stage::Initialized,
        })
    }

    /// Whether the file must be converted before it can be decoded.
    pub fn needs_conversion(&self) -> bool {
        CONVERT_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn advance(&mut self, stage: Stage) {
        log::debug!(
            "{}: {:?} -> {:?}",
            self.source_path.display(),
            self.stage,
            stage
        );
        self.stage = stage;
    }
}

impl std::fmt::Display for MediaItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source_path.display())
    }
}
