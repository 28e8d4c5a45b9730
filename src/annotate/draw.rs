//! Draw engine: one detection record to stroke/label commands.

use image::Rgb;

use crate::surface::Surface;
use crate::Detection;

/// Bounding boxes and labels are drawn in red.
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Stroke width for bounding boxes, in pixels.
pub const BOX_STROKE: u32 = 2;

// Label offset above the box, and the fallback row when the box touches the
// surface's top edge.
const LABEL_RAISE: i32 = 5;
const LABEL_TOP_ROW: i32 = 10;

/// Draw one detection onto the overlay surface.
///
/// Pure geometry: an unfilled rectangle at the detection's bounding box and a
/// `"label (NN%)"` text placed at `(x, y - 5)`, or at `(x, 10)` when the box is
/// within 10 pixels of the top edge so the label stays visible. Zero-area boxes
/// produce a degenerate stroke touching no pixels; they never panic.
pub fn draw_detection(detection: &Detection, surface: &mut dyn Surface) {
    let bbox = detection.bbox;
    let x = bbox.x.round() as i32;
    let y = bbox.y.round() as i32;
    let width = bbox.width.max(0.0).round() as u32;
    let height = bbox.height.max(0.0).round() as u32;

    surface.stroke_rect(x, y, width, height, BOX_COLOR, BOX_STROKE);

    let text = label_text(detection);
    let text_y = if bbox.y > LABEL_TOP_ROW as f32 {
        y - LABEL_RAISE
    } else {
        LABEL_TOP_ROW
    };
    surface.fill_text(&text, x, text_y, BOX_COLOR);
}

/// `"{label} ({confidence}%)"` with the score rounded to whole percent.
pub(crate) fn label_text(detection: &Detection) -> String {
    format!(
        "{} ({}%)",
        detection.label,
        (detection.confidence * 100.0).round() as i32
    )
}
