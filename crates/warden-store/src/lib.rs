//! Filesystem persistence for warden runs.
//!
//! Every connected host gets a run directory under the record root,
//! named by a millisecond timestamp. A run holds the images the host
//! uploads, one detection sidecar per image, an append-only image log
//! (CSV), a run summary (YAML), and a heartbeat file the server touches
//! on every frame.
//!
//! ```text
//! record_root/
//! └── cam-north/
//!     └── 2023-06-01T14h09m33s.521/
//!         ├── 2023-06-01T14h09m33s.521_imagelog.csv
//!         ├── 2023-06-01T14h09m33s.521_summary.yaml
//!         ├── 2023-06-01T14h09m33s.521_heartbeat.yaml
//!         ├── 2023-06-01T14h10m02s.114.jpeg
//!         └── 2023-06-01T14h10m02s.114.csv
//! ```
//!
//! [`RunStore`] is the entry point: [`RunStore::create`] starts a new
//! run, [`RunStore::resume`] continues the most recent one, and
//! [`scan`] recovers prior runs at server startup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod image_log;
pub mod run;
pub mod scan;
pub mod summary;
pub mod timestamp;

pub use error::{Result, StoreError};
pub use image_log::{ImageLog, ImageRecord};
pub use run::{RunStore, StoredImage};
pub use scan::RecoveredRun;
pub use summary::{Heartbeat, HeartbeatFile, RunSummary};
