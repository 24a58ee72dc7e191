use crate::mediasort_core::pipeline::{PipelineConfig, DEFAULT_REPORT_NAME};
use clap::Parser;
use simplelog::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Sort photos and videos into a year/month archive, tagging visual duplicates"
)]
pub struct Cli {
    /// Directory to read media from (searched recursively)
    pub input_dir: PathBuf,

    /// Archive root that receives <year>/<month>/ folders and the hash report
    #[arg(long, short, default_value = "results")]
    pub output: PathBuf,

    /// Name of the duplicate report written inside the archive root
    #[arg(long, default_value = DEFAULT_REPORT_NAME)]
    pub report_name: String,

    /// Run log file (appended to)
    #[arg(long, default_value = "log.txt")]
    pub log_file: PathBuf,

    /// Disable the run log file
    #[arg(long)]
    pub no_log_file: bool,

    /// Log level for file logging (debug, info, warn, error)
    #[arg(long, default_value_t = LevelFilter::Debug)]
    pub log_level: LevelFilter,

    /// HEIC to JPEG converter executable
    #[arg(long, default_value = "heif-convert")]
    pub converter: String,

    /// ffmpeg executable used to grab the first frame of videos
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// Seconds to wait for any external tool before giving up on a file
    #[arg(long, default_value_t = 60)]
    pub tool_timeout: u64,

    /// Show where files would go without moving anything
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout.max(1))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            target_root: self.output.clone(),
            report_name: self.report_name.clone(),
            dry_run: self.dry_run,
        }
    }
}
