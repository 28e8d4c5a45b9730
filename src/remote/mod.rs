//! Remote detection service boundary.
//!
//! The detection model runs behind an HTTP API and is a black box to this
//! crate. This module owns the boundary: the `DetectionService` trait, the
//! strict response schema, and the conversion from raw wire records into typed
//! [`Detection`]s.
//!
//! Schema discipline: the top-level response shape is validated strictly (a
//! missing `detection_summary` is a malformed response and fails the
//! submission), while *per-record* gaps are local defects: a raw detection
//! missing its class, score or bbox is skipped and counted, never fatal.

pub mod http;

use serde::Deserialize;

use crate::{normalize_label, BoundingBox, Detection};

pub use http::HttpDetectionService;

// ----------------------------------------------------------------------------
// Error taxonomy
// ----------------------------------------------------------------------------

/// Transport-level failure reaching the detection service.
///
/// This is the only error class that propagates to user-visible state; all
/// other boundary defects are recovered locally (skips, clamps, discards).
#[derive(Clone, Debug)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection / IO failure before a response arrived.
    Network,
    /// Non-2xx HTTP status.
    Status,
    /// 2xx response whose body reports a service-side failure.
    Service,
    /// Response body does not match the expected schema.
    MalformedResponse,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn status(code: u16) -> Self {
        Self {
            kind: TransportErrorKind::Status,
            message: format!("detection service returned status {}", code),
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Service,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::MalformedResponse,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            TransportErrorKind::Network => "network",
            TransportErrorKind::Status => "status",
            TransportErrorKind::Service => "service",
            TransportErrorKind::MalformedResponse => "malformed-response",
        };
        write!(f, "transport error ({}): {}", kind, self.message)
    }
}

impl std::error::Error for TransportError {}

// ----------------------------------------------------------------------------
// Service trait
// ----------------------------------------------------------------------------

/// Pluggable detection service backend.
///
/// The production implementation is [`HttpDetectionService`]; tests substitute
/// canned backends. Implementations are synchronous; the controller's sequence
/// tokens provide the last-submission-wins semantics regardless of how the
/// caller schedules calls.
pub trait DetectionService {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Submit one media file and return the validated detection report.
    fn detect(&self, file_name: &str, media: &[u8]) -> Result<DetectionReport, TransportError>;
}

// ----------------------------------------------------------------------------
// Response schema
// ----------------------------------------------------------------------------

/// Validated detection service response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DetectionReport {
    #[serde(default)]
    pub accident_detected: bool,
    #[serde(default, alias = "thief_detected")]
    pub theft_detected: bool,
    /// Label universe for alert classification. Required.
    pub detection_summary: Vec<SummaryRecord>,
    /// Optional raw detection list for overlay rendering.
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub timing: Option<InferenceTiming>,
}

/// One model-table row from `detection_summary`.
///
/// Rows carry at least a class name; result tables also include per-object
/// confidence and corner coordinates, which let the report synthesize
/// renderable detections when no raw list is present.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SummaryRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub xmin: Option<f32>,
    #[serde(default)]
    pub ymin: Option<f32>,
    #[serde(default)]
    pub xmax: Option<f32>,
    #[serde(default)]
    pub ymax: Option<f32>,
}

/// One raw detection record: `{class, score, bbox: [x, y, w, h]}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawDetection {
    #[serde(default, alias = "name")]
    pub class: Option<String>,
    #[serde(default, alias = "confidence")]
    pub score: Option<f32>,
    #[serde(default)]
    pub bbox: Option<Vec<f32>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InferenceTiming {
    #[serde(default)]
    pub accident_inference_ms: Option<f64>,
    #[serde(default)]
    pub theft_inference_ms: Option<f64>,
    #[serde(default)]
    pub total_inference_ms: Option<f64>,
}

/// 2xx body shape used by the service to report an internal failure.
#[derive(Debug, Deserialize)]
struct ServiceFailure {
    error: String,
}

impl DetectionReport {
    /// Normalized label universe for classification.
    pub fn summary_labels(&self) -> Vec<String> {
        self.detection_summary
            .iter()
            .filter_map(|record| record.name.as_deref())
            .map(normalize_label)
            .collect()
    }

    /// Optional diagnostic line from the timing block.
    pub fn diagnostics(&self) -> Option<String> {
        let timing = self.timing.as_ref()?;
        let total = timing.total_inference_ms?;
        let mut line = format!("inference total {:.1}ms", total);
        if let (Some(accident), Some(theft)) =
            (timing.accident_inference_ms, timing.theft_inference_ms)
        {
            line.push_str(&format!(" (accident {:.1}ms, theft {:.1}ms)", accident, theft));
        }
        Some(line)
    }
}

/// Parse and validate a detection service response body.
pub fn parse_report(body: &str) -> Result<DetectionReport, TransportError> {
    if let Ok(failure) = serde_json::from_str::<ServiceFailure>(body) {
        return Err(TransportError::service(failure.error));
    }
    serde_json::from_str(body)
        .map_err(|err| TransportError::malformed(format!("response schema mismatch: {}", err)))
}

// ----------------------------------------------------------------------------
// Typed conversion
// ----------------------------------------------------------------------------

/// Typed detections plus the count of wire records dropped on the way.
#[derive(Clone, Debug, Default)]
pub struct TypedDetections {
    pub detections: Vec<Detection>,
    pub skipped: usize,
}

/// Convert a report's wire records into typed [`Detection`]s.
///
/// Prefers the raw detection list; when absent, synthesizes boxes from summary
/// rows that carry full corner geometry. Records with missing or partial
/// required fields are skipped and counted. Rows with no geometry at all are
/// summary-only (classification input) and are not counted as skips.
pub fn typed_detections(report: &DetectionReport) -> TypedDetections {
    let mut out = TypedDetections::default();

    if !report.detections.is_empty() {
        for (index, raw) in report.detections.iter().enumerate() {
            match detection_from_raw(raw) {
                Some(det) => out.detections.push(det),
                None => {
                    log::warn!("dropping raw detection #{}: missing required fields", index);
                    out.skipped += 1;
                }
            }
        }
        return out;
    }

    for (index, record) in report.detection_summary.iter().enumerate() {
        let corners = [record.xmin, record.ymin, record.xmax, record.ymax];
        if corners.iter().all(Option::is_none) {
            continue; // summary-only row
        }
        match detection_from_summary(record) {
            Some(det) => out.detections.push(det),
            None => {
                log::warn!("dropping summary row #{}: partial geometry", index);
                out.skipped += 1;
            }
        }
    }
    out
}

fn detection_from_raw(raw: &RawDetection) -> Option<Detection> {
    let class = raw.class.as_deref()?;
    let score = raw.score?;
    let bbox = raw.bbox.as_deref()?;
    let [x, y, w, h] = *<&[f32; 4]>::try_from(bbox).ok()?;
    Some(Detection::new(class, score, BoundingBox::new(x, y, w, h)))
}

fn detection_from_summary(record: &SummaryRecord) -> Option<Detection> {
    let name = record.name.as_deref()?;
    let confidence = record.confidence?;
    let bbox = BoundingBox::from_corners(record.xmin?, record.ymin?, record.xmax?, record.ymax?);
    Some(Detection::new(name, confidence, bbox))
}
