//! Incident Watch
//!
//! This crate implements the result side of a remote-detection monitoring system:
//! media is submitted to an external detection service, and the returned
//! prediction records are rendered, recorded and classified locally.
//!
//! # Architecture
//!
//! - `surface`: drawing/pixel-read traits and the `image`-backed surface
//! - `annotate`: draw engine, crop extractor, recorder and the annotation pipeline
//! - `classify`: label set to semantic alert derivation
//! - `remote`: detection service boundary (schema validation, HTTP client)
//! - `controller`: submission state machine with last-submission-wins semantics
//! - `config`: file + environment configuration
//!
//! The pipeline is single-threaded and synchronous: for one completed submission,
//! each detection is drawn, cropped and recorded strictly in list order before the
//! next one is touched. Surfaces are exclusively borrowed for the duration of one
//! annotation pass.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub mod annotate;
pub mod classify;
pub mod config;
pub mod controller;
pub mod remote;
pub mod surface;

pub use annotate::{
    annotate, draw_detection, extract_crop, AnnotateReport, DetectionRecorder, RecordedDetection,
};
pub use classify::{classify, Alert};
pub use config::WatchConfig;
pub use controller::{
    CompletionDisposition, RenderTarget, SubmissionController, SubmissionOutcome, SubmissionState,
    SubmissionTicket,
};
pub use remote::{
    DetectionReport, DetectionService, HttpDetectionService, TransportError, TransportErrorKind,
};
pub use surface::{CropBuffer, ImageSurface, PixelRegion, PixelSource, Surface};

// -------------------- Geometry --------------------

/// Axis-aligned bounding box in source-pixel coordinates.
///
/// `x`/`y` locate the top-left corner and may be negative or exceed the surface
/// bounds; consumers clamp before any pixel access. `width`/`height` are
/// non-negative by contract, enforced by [`BoundingBox::validate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from corner coordinates as produced by model result tables.
    pub fn from_corners(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            x: xmin,
            y: ymin,
            width: xmax - xmin,
            height: ymax - ymin,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let components = [self.x, self.y, self.width, self.height];
        if components.iter().any(|c| !c.is_finite()) {
            return Err(anyhow!("bbox components must be finite"));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(anyhow!("bbox width/height must be >= 0"));
        }
        Ok(())
    }

    /// A degenerate box has zero area. It is still drawn (touching no pixels) and
    /// still recorded (as an empty crop); it is not an error.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }
}

// -------------------- Detections --------------------

/// One object instance identified by the remote model.
///
/// Immutable once received; scoped to a single render pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class name as reported by the model (any case; normalized on use).
    pub label: String,
    /// Confidence score in `0..=1`.
    pub confidence: f32,
    /// Bounding box in source-pixel coordinates.
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Validate the record. Failures are recoverable: the pipeline skips the
    /// entry and reports the skip count to the caller.
    pub fn validate(&self) -> Result<()> {
        validate_label(&self.label)?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!("confidence out of bounds"));
        }
        self.bbox.validate()
    }

    /// Lower-cased label for classification and history keys.
    pub fn normalized_label(&self) -> String {
        normalize_label(&self.label)
    }
}

// -------------------- Label Discipline --------------------

/// Trim and lower-case a model label before comparison.
///
/// The remote service does not guarantee case ("Accident" and "accident" are the
/// same class), so every consumer normalizes first.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// A conforming label is a short class name, not free text.
///
/// Allowed: "accident", "theft", "traffic light", "person_2"
/// Disallowed: empty strings, punctuation outside [ _-], control characters.
pub fn validate_label(label: &str) -> Result<()> {
    // Compile once for hot paths.
    static LABEL_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = LABEL_RE.get_or_init(|| regex::Regex::new(r"^[a-z0-9][a-z0-9 _-]{0,63}$").unwrap());

    let normalized = normalize_label(label);
    if !re.is_match(&normalized) {
        return Err(anyhow!(
            "label must match ^[a-z0-9][a-z0-9 _-]{{0,63}}$ after normalization"
        ));
    }
    Ok(())
}
