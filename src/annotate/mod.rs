//! Detection annotation: overlay drawing, crop extraction and recording.
//!
//! The pipeline consumes one completed submission's detection list and, per
//! entry in strict input order, draws the bounding box on the overlay surface,
//! extracts the corresponding crop from the *source* surface and appends it to
//! the recorder's history.
//!
//! The pipeline MUST NOT:
//! - Abort a pass because one detection record is malformed (skip and count)
//! - Read crop pixels from the annotated overlay
//! - Reorder the recorded history
//!
//! Re-running a pass with identical inputs produces identical overlay pixels
//! and identical crop buffers; only the recorded timestamps differ.

mod crop;
mod draw;
mod pipeline;
mod recorder;

pub use crop::extract_crop;
pub use draw::{draw_detection, BOX_COLOR, BOX_STROKE};
pub use pipeline::{annotate, AnnotateReport};
pub use recorder::{DetectionRecorder, RecordedDetection};
