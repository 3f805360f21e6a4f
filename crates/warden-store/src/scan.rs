//! Record-root scanning for run continuation and startup recovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, StoreError};
use crate::summary::{Heartbeat, RunSummary};

/// Snapshot of a host's most recent run, recovered from disk.
#[derive(Debug, Clone)]
pub struct RecoveredRun {
    /// The run directory.
    pub run_dir: PathBuf,
    /// Parsed summary.
    pub summary: RunSummary,
    /// Last heartbeat, if the heartbeat file was readable.
    pub heartbeat: Option<Heartbeat>,
}

/// Lists hostnames with at least one entry under `record_root`, sorted.
///
/// A missing record root is an empty list, not an error: the server may
/// start before any host has ever connected.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_hosts(record_root: &Path) -> Result<Vec<String>> {
    let mut hosts = Vec::new();
    if !record_root.exists() {
        return Ok(hosts);
    }
    if !record_root.is_dir() {
        return Err(StoreError::NotADirectory {
            path: record_root.to_path_buf(),
        });
    }
    for entry in fs::read_dir(record_root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            hosts.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    hosts.sort();
    Ok(hosts)
}

/// Returns the most recently modified run directory under `host_dir`,
/// or `None` if the host has no runs.
///
/// Selection is by modification time, not name order. Clock skew or a
/// concurrent writer can change which directory wins; callers that need
/// a specific run should not rely on this.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn most_recent_run(host_dir: &Path) -> Result<Option<PathBuf>> {
    if !host_dir.is_dir() {
        return Ok(None);
    }
    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(host_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if best.as_ref().is_none_or(|(when, _)| modified > *when) {
            best = Some((modified, entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}

/// Path of the summary file inside `run_dir` (the file name is derived
/// from the directory's timestamp name).
#[must_use]
pub fn summary_path(run_dir: &Path) -> PathBuf {
    let stamp = run_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    run_dir.join(format!("{stamp}_summary.yaml"))
}

/// Recovers the most recent run for `hostname` under `record_root`.
///
/// # Errors
///
/// Returns [`StoreError::NoPriorRun`] if the host has no runs, or an
/// error if the summary cannot be read. A missing or unparsable
/// heartbeat is not an error; the field is simply `None`.
pub fn recover_latest(record_root: &Path, hostname: &str) -> Result<RecoveredRun> {
    let host_dir = record_root.join(hostname);
    let run_dir = most_recent_run(&host_dir)?.ok_or_else(|| StoreError::NoPriorRun {
        hostname: hostname.to_string(),
    })?;
    let summary = RunSummary::read(&summary_path(&run_dir))?;
    let heartbeat = Heartbeat::read(&summary.heartbeat_path).ok();
    Ok(RecoveredRun {
        run_dir,
        summary,
        heartbeat,
    })
}
