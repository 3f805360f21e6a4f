//! Detection metadata reported by camera hosts.

use serde::{Deserialize, Serialize};

/// One detected object within an image.
///
/// Produced by the device's detector and stored verbatim in the image's
/// sidecar file; the server never recomputes or mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    /// Class label assigned by the detector.
    pub class_name: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    /// Pixel bounds as `[x, y, w, h]`.
    #[serde(rename = "box")]
    pub bounds: [i32; 4],
}

impl DetectionBox {
    /// Creates a detection box.
    #[must_use]
    pub fn new(class_name: impl Into<String>, confidence: f64, bounds: [i32; 4]) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bounds,
        }
    }

    /// Left edge in pixels.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.bounds[0]
    }

    /// Top edge in pixels.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.bounds[1]
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.bounds[2]
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.bounds[3]
    }
}

/// Reduces detection boxes to the labels a host records.
///
/// Keeps only class names present in `filter_classes`, drops duplicates,
/// and preserves first-seen order (devices sort boxes by confidence, so
/// first seen means highest confidence).
#[must_use]
pub fn filtered_labels(boxes: &[DetectionBox], filter_classes: &[String]) -> Vec<String> {
    let mut labels = Vec::new();
    for lbox in boxes {
        if filter_classes.contains(&lbox.class_name) && !labels.contains(&lbox.class_name) {
            labels.push(lbox.class_name.clone());
        }
    }
    labels
}
