//! Crop extractor: clamped pixel-region reads from the source surface.

use crate::surface::{CropBuffer, PixelSource};
use crate::Detection;

/// Extract the pixel region covered by the detection's bounding box.
///
/// Reads from the *source* surface (the unannotated frame), never from the
/// overlay, so the crop does not capture drawn boxes. The region is clamped to
/// the surface bounds before the read; a clamp result with zero area yields the
/// empty marker buffer instead of failing.
pub fn extract_crop(detection: &Detection, source: &dyn PixelSource) -> CropBuffer {
    let crop = source.read_region(&detection.bbox);
    if crop.is_empty() {
        log::debug!(
            "empty crop for '{}' at ({}, {})",
            detection.label,
            detection.bbox.x,
            detection.bbox.y
        );
    }
    crop
}
