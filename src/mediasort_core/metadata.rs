use crate::mediasort_core::error::{MediaSortError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use exiftool::ExifTool;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Metadata field label -> value, as reported by the metadata tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMapping {
    fields: HashMap<String, String>,
}

impl MetadataMapping {
    /// Flatten an exiftool JSON object into string values.
    pub fn from_json(raw: HashMap<String, Value>) -> Self {
        raw.into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MetadataMapping {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Source of per-file metadata.
pub trait MetadataProvider {
    fn extract(&mut self, path: &Path) -> Result<MetadataMapping>;
}

type Reply = std::result::Result<MetadataMapping, String>;

/// Stuck workers tolerated before lookups stop starting new exiftool processes.
const MAX_STALLED_WORKERS: usize = 4;

/// A thread owning one exiftool process.
struct Worker {
    jobs: Sender<PathBuf>,
    replies: Receiver<Reply>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(executable: &Path) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<PathBuf>();
        let (reply_tx, reply_rx) = unbounded::<Reply>();
        let executable = executable.to_path_buf();

        let handle = thread::Builder::new()
            .name("exiftool".to_string())
            .spawn(move || {
                let mut exiftool = match ExifTool::with_executable(&executable) {
                    Ok(tool) => tool,
                    Err(e) => {
                        log::error!("Worker failed to initialize ExifTool: {}", e);
                        let reason = e.to_string();
                        for _ in job_rx {
                            if reply_tx.send(Err(reason.clone())).is_err() {
                                break;
                            }
                        }
                        return;
                    }
                };

                for path in job_rx {
                    let raw: std::result::Result<HashMap<String, Value>, _> =
                        exiftool.read_metadata(&path, &[]);
                    let result = raw
                        .map(MetadataMapping::from_json)
                        .map_err(|e| e.to_string());
                    if reply_tx.send(result).is_err() {
                        log::debug!("ExifTool worker abandoned, exiting");
                        break;
                    }
                }
            })?;

        Ok(Worker {
            jobs: job_tx,
            replies: reply_rx,
            handle,
        })
    }
}

/// Metadata provider backed by a long-lived exiftool process.
///
/// Each lookup waits at most `timeout`. A worker that misses the deadline is
/// set aside and a new one takes over on the next call. The stuck thread keeps
/// its exiftool process until the blocked read returns, so set-aside workers
/// are counted and, past a limit, no further processes are started.
pub struct ExifToolProvider {
    executable: PathBuf,
    timeout: Duration,
    worker: Option<Worker>,
    stalled: Vec<JoinHandle<()>>,
}

impl ExifToolProvider {
    pub fn new(timeout: Duration) -> Self {
        Self::with_executable(Path::new("exiftool"), timeout)
    }

    pub fn with_executable(executable: &Path, timeout: Duration) -> Self {
        ExifToolProvider {
            executable: executable.to_path_buf(),
            timeout,
            worker: None,
            stalled: Vec::new(),
        }
    }

    /// Workers that timed out and have not exited yet.
    pub fn stalled_workers(&mut self) -> usize {
        self.stalled.retain(|handle| !handle.is_finished());
        self.stalled.len()
    }

    fn worker(&mut self) -> Result<&Worker> {
        if self.worker.is_none() {
            self.worker = Some(Worker::spawn(&self.executable)?);
        }
        self.worker
            .as_ref()
            .ok_or_else(|| MediaSortError::Other("ExifTool worker unavailable".to_string()))
    }

    fn set_aside_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            // Dropping the channels lets the thread exit once its read returns.
            self.stalled.push(worker.handle);
        }
    }
}

impl MetadataProvider for ExifToolProvider {
    fn extract(&mut self, path: &Path) -> Result<MetadataMapping> {
        let timeout = self.timeout;

        if self.worker.is_none() {
            let stalled = self.stalled_workers();
            if stalled >= MAX_STALLED_WORKERS {
                return Err(MediaSortError::MetadataExtraction {
                    path: path.to_path_buf(),
                    reason: format!("{} ExifTool processes are stuck, not starting another", stalled),
                });
            }
        }

        let worker = self.worker()?;

        if worker.jobs.send(path.to_path_buf()).is_err() {
            self.worker = None;
            return Err(MediaSortError::MetadataExtraction {
                path: path.to_path_buf(),
                reason: "ExifTool worker exited".to_string(),
            });
        }

        match worker.replies.recv_timeout(timeout) {
            Ok(Ok(mapping)) => Ok(mapping),
            Ok(Err(reason)) => Err(MediaSortError::MetadataExtraction {
                path: path.to_path_buf(),
                reason,
            }),
            Err(RecvTimeoutError::Timeout) => {
                self.set_aside_worker();
                log::warn!(
                    "ExifTool timed out on {}, restarting worker ({} stuck)",
                    path.display(),
                    self.stalled.len()
                );
                Err(MediaSortError::ToolTimeout {
                    tool: "exiftool".to_string(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.worker = None;
                Err(MediaSortError::MetadataExtraction {
                    path: path.to_path_buf(),
                    reason: "ExifTool worker exited".to_string(),
                })
            }
        }
    }
}

impl Drop for ExifToolProvider {
    fn drop(&mut self) {
        let stalled = self.stalled_workers();
        if stalled > 0 {
            log::warn!(
                "{} ExifTool processes still stuck; they end with the program",
                stalled
            );
        }
    }
}

/// Check if exiftool is available on the system.
pub fn exiftool_available() -> bool {
    Command::new("exiftool")
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
