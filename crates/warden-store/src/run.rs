//! Per-run filesystem store.
//!
//! A [`RunStore`] owns everything a host session writes: the run
//! directory, the open image-log handle, the summary, and the heartbeat
//! file. It is created once per connection (new run or continuation) and
//! dropped when the connection closes, releasing the log handle.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use warden_proto::DetectionBox;

use crate::error::Result;
use crate::image_log::{write_detections, ImageLog, ImageRecord};
use crate::scan;
use crate::summary::{Heartbeat, HeartbeatFile, RunSummary};
use crate::timestamp;

/// Paths returned after an image is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Where the image bytes were written.
    pub image_path: PathBuf,
    /// Where the detection sidecar was written.
    pub lboxes_path: PathBuf,
}

/// Filesystem store for one host's run.
///
/// Holds the image-log and heartbeat handles open for the run's
/// lifetime; dropping the store releases both.
#[derive(Debug)]
pub struct RunStore {
    hostname: String,
    session_dir: PathBuf,
    summary_path: PathBuf,
    filter_classes: Vec<String>,
    image_log: ImageLog,
    heartbeat: HeartbeatFile,
    continued: bool,
}

impl RunStore {
    /// Starts a new run under `record_root/<hostname>/<stamp>/`.
    ///
    /// Creates the run directory (and any missing parents), the image
    /// log with its header row, the summary with `config_echo` folded
    /// in, and an initial heartbeat at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory or file cannot be created.
    pub fn create(
        record_root: &Path,
        hostname: &str,
        filter_classes: Vec<String>,
        config_echo: BTreeMap<String, serde_yaml::Value>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let stamp = timestamp::file_stamp(now);
        let session_dir = record_root.join(hostname).join(&stamp);
        fs::create_dir_all(&session_dir)?;

        let image_log_path = session_dir.join(format!("{stamp}_imagelog.csv"));
        let summary_path = session_dir.join(format!("{stamp}_summary.yaml"));
        let heartbeat_path = session_dir.join(format!("{stamp}_heartbeat.yaml"));

        let image_log = ImageLog::create(&image_log_path)?;
        let summary = RunSummary {
            hostname: hostname.to_string(),
            session_dir: session_dir.clone(),
            filter_classes: filter_classes.clone(),
            image_log: image_log_path,
            heartbeat_path: heartbeat_path.clone(),
            config: config_echo,
        };
        summary.write(&summary_path)?;
        let mut heartbeat = HeartbeatFile::open(&heartbeat_path)?;
        heartbeat.update(Heartbeat::new(timestamp::unix_seconds(now)))?;

        info!(
            host = %hostname,
            dir = %session_dir.display(),
            "started new run"
        );

        Ok(Self {
            hostname: hostname.to_string(),
            session_dir,
            summary_path,
            filter_classes,
            image_log,
            heartbeat,
            continued: false,
        })
    }

    /// Resumes the host's most recent run, recovering the filter classes
    /// and file paths from its summary.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NoPriorRun`] if the host has no
    /// runs, or an error if the summary or image log cannot be opened.
    pub fn resume(record_root: &Path, hostname: &str) -> Result<Self> {
        let recovered = scan::recover_latest(record_root, hostname)?;
        let summary = recovered.summary;
        let image_log = ImageLog::open(&summary.image_log)?;
        let heartbeat = HeartbeatFile::open(&summary.heartbeat_path)?;

        info!(
            host = %hostname,
            dir = %recovered.run_dir.display(),
            "continuing prior run"
        );

        Ok(Self {
            hostname: hostname.to_string(),
            summary_path: scan::summary_path(&recovered.run_dir),
            session_dir: recovered.run_dir,
            filter_classes: summary.filter_classes,
            image_log,
            heartbeat,
            continued: true,
        })
    }

    /// Stores one image: writes `<stamp>.jpeg` and `<stamp>.csv` into
    /// the run directory and appends a row to the image log.
    ///
    /// The three writes are not transactional, but every failure is
    /// surfaced; nothing is swallowed.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the writes fails.
    pub fn append_image(
        &mut self,
        image: &[u8],
        labels: &[String],
        boxes: &[DetectionBox],
        now: DateTime<Utc>,
    ) -> Result<StoredImage> {
        let stamp = timestamp::file_stamp(now);
        let image_path = self.session_dir.join(format!("{stamp}.jpeg"));
        let lboxes_path = self.session_dir.join(format!("{stamp}.csv"));

        fs::write(&image_path, image)?;
        write_detections(&lboxes_path, boxes)?;
        self.image_log.append(&ImageRecord {
            image_path: image_path.clone(),
            labels: labels.to_vec(),
            lboxes_path: lboxes_path.clone(),
            timestamp: timestamp::unix_seconds(now),
            datetime: timestamp::datetime_column(now),
        })?;

        debug!(
            host = %self.hostname,
            image = %image_path.display(),
            labels = ?labels,
            "stored image"
        );

        Ok(StoredImage {
            image_path,
            lboxes_path,
        })
    }

    /// Overwrites the heartbeat file with `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn touch_heartbeat(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.heartbeat
            .update(Heartbeat::new(timestamp::unix_seconds(now)))
    }

    /// Hostname this run belongs to.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Classes the host records.
    #[must_use]
    pub fn filter_classes(&self) -> &[String] {
        &self.filter_classes
    }

    /// The run directory.
    #[must_use]
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Path of the image log.
    #[must_use]
    pub fn image_log_path(&self) -> &Path {
        self.image_log.path()
    }

    /// Path of the summary file.
    #[must_use]
    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    /// Path of the heartbeat file.
    #[must_use]
    pub fn heartbeat_path(&self) -> &Path {
        self.heartbeat.path()
    }

    /// Whether this store resumed a prior run.
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.continued
    }
}
