//! Append-only image log and detection sidecar files.
//!
//! The image log is a CSV with one row per stored image; rows are never
//! mutated or deleted. Each image also gets a sidecar CSV holding its
//! detection boxes verbatim. No CSV library is used: the formats are two
//! fixed row shapes, written with minimal RFC 4180 quoting.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use warden_proto::DetectionBox;

use crate::error::Result;

/// Header row written to every new image log.
pub const IMAGE_LOG_HEADER: &str = "path,labels,lboxes,timestamp,datetime";

/// One image-log row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Stored image path.
    pub image_path: PathBuf,
    /// Filtered labels, first-seen order.
    pub labels: Vec<String>,
    /// Detection sidecar path.
    pub lboxes_path: PathBuf,
    /// Fractional unix seconds.
    pub timestamp: f64,
    /// Human-readable datetime.
    pub datetime: String,
}

impl ImageRecord {
    fn to_row(&self) -> String {
        let fields = [
            self.image_path.display().to_string(),
            bracketed_list(&self.labels),
            self.lboxes_path.display().to_string(),
            self.timestamp.to_string(),
            self.datetime.clone(),
        ];
        fields
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Open append handle to a run's image log.
///
/// A session holds exactly one of these for its lifetime; every append
/// is flushed so rows survive an abrupt disconnect.
#[derive(Debug)]
pub struct ImageLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ImageLog {
    /// Creates a new image log containing only the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{IMAGE_LOG_HEADER}")?;
        writer.flush()?;
        Ok(Self { path, writer })
    }

    /// Opens an existing image log for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Appends one row and flushes it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn append(&mut self, record: &ImageRecord) -> Result<()> {
        writeln!(self.writer, "{}", record.to_row())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes one sidecar row per detection box: `class_name, confidence,
/// x, y, w, h`. No header row; the column shape is fixed.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_detections(path: &Path, boxes: &[DetectionBox]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for lbox in boxes {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            csv_field(&lbox.class_name),
            lbox.confidence,
            lbox.x(),
            lbox.y(),
            lbox.width(),
            lbox.height()
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Renders labels as a bracketed list (`['lion', 'cheetah']`), the shape
/// the dashboard parses back out of the labels column.
#[must_use]
pub fn bracketed_list(labels: &[String]) -> String {
    let quoted: Vec<String> = labels.iter().map(|label| format!("'{label}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Quotes a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
