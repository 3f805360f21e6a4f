//! Run summary and heartbeat files.
//!
//! Both are small YAML files inside the run directory. The dashboard
//! reads them directly, so the key names are part of the on-disk
//! contract: uppercase, with the config snapshot echoed into the same
//! mapping.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Contents of a run's summary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Hostname that produced the run.
    #[serde(rename = "HOSTNAME")]
    pub hostname: String,
    /// Absolute run directory.
    #[serde(rename = "USER_SESSION")]
    pub session_dir: PathBuf,
    /// Classes the host records.
    #[serde(rename = "FILTER_CLASSES")]
    pub filter_classes: Vec<String>,
    /// Path of the run's image log.
    #[serde(rename = "IMAGE_LOG")]
    pub image_log: PathBuf,
    /// Path of the run's heartbeat file.
    #[serde(rename = "HEARTBEAT_PATH")]
    pub heartbeat_path: PathBuf,
    /// Configuration echoed into the summary, key by key.
    #[serde(flatten)]
    pub config: BTreeMap<String, serde_yaml::Value>,
}

impl RunSummary {
    /// Writes the summary to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Reads a summary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&yaml)?)
    }
}

/// Contents of a run's heartbeat file: a single unix timestamp,
/// overwritten on every liveness signal (last-write-wins).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Fractional seconds since the unix epoch.
    #[serde(rename = "HEARTBEAT")]
    pub unix_seconds: f64,
}

impl Heartbeat {
    /// Creates a heartbeat value.
    #[must_use]
    pub const fn new(unix_seconds: f64) -> Self {
        Self { unix_seconds }
    }

    /// Reads a heartbeat file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&yaml)?)
    }
}

/// Open write handle to a run's heartbeat file.
///
/// The handle is held for the lifetime of the run and every liveness
/// signal truncates and rewrites the file in place.
#[derive(Debug)]
pub struct HeartbeatFile {
    path: PathBuf,
    file: fs::File,
}

impl HeartbeatFile {
    /// Opens the heartbeat file at `path`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for writing.
    pub fn open(path: &Path) -> Result<Self> {
        // Existing content is kept until the first update truncates it.
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Overwrites the file with `heartbeat` (last-write-wins).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn update(&mut self, heartbeat: Heartbeat) -> Result<()> {
        let yaml = serde_yaml::to_string(&heartbeat)?;
        self.file.set_len(0)?;
        self.file.rewind()?;
        self.file.write_all(yaml.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Path of the heartbeat file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
