use crate::mediasort_core::error::{MediaSortError, Result};
use crate::mediasort_core::media::FrameSource;
use crate::mediasort_core::process::run_with_timeout;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// An open still frame. Dropping it releases the decoded pixels.
pub struct DecodedFrame {
    path: PathBuf,
    image: DynamicImage,
}

impl DecodedFrame {
    pub fn new(path: &Path, image: DynamicImage) -> Self {
        log::debug!(
            "Opened {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        DecodedFrame {
            path: path.to_path_buf(),
            image,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl Drop for DecodedFrame {
    fn drop(&mut self) {
        log::debug!("Closed {}", self.path.display());
    }
}

/// Opens media files as still images.
pub trait DecodeService {
    fn open(&self, path: &Path, source: FrameSource) -> Result<DecodedFrame>;
}

/// Decodes still images in-process and pulls the first video frame through ffmpeg.
pub struct MediaDecoder {
    ffmpeg: String,
    timeout: Duration,
}

impl MediaDecoder {
    pub fn new(ffmpeg: &str, timeout: Duration) -> Self {
        MediaDecoder {
            ffmpeg: ffmpeg.to_string(),
            timeout,
        }
    }

    fn open_still(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path).map_err(|e| MediaSortError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Extract exactly the first video frame as PNG on stdout and decode it.
    fn open_first_frame(&self, path: &Path) -> Result<DynamicImage> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"]);

        let output = run_with_timeout(cmd, self.timeout)?;
        if !output.status.success() || output.stdout.is_empty() {
            return Err(MediaSortError::Decode {
                path: path.to_path_buf(),
                reason: format!("{} failed: {}", self.ffmpeg, output.stderr_lossy()),
            });
        }

        image::load_from_memory(&output.stdout).map_err(|e| MediaSortError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl DecodeService for MediaDecoder {
    fn open(&self, path: &Path, source: FrameSource) -> Result<DecodedFrame> {
        let image = match source {
            FrameSource::StillImage => self.open_still(path)?,
            FrameSource::VideoFirstFrame => self.open_first_frame(path)?,
        };
        Ok(DecodedFrame::new(path, image))
    }
}
