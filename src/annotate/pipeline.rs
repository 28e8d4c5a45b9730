//! Annotation pipeline: ordered draw, crop, record per detection.

use crate::annotate::{draw_detection, extract_crop, DetectionRecorder};
use crate::surface::{PixelSource, Surface};
use crate::Detection;

/// Outcome of one annotation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnnotateReport {
    /// Detections drawn onto the overlay.
    pub drawn: usize,
    /// Detections appended to the history.
    pub recorded: usize,
    /// Malformed detections skipped without aborting the pass.
    pub skipped: usize,
}

/// Run one annotation pass over a completed submission's detection list.
///
/// For each detection, in input order: draw onto `overlay`, extract the crop
/// from `source` (the unannotated frame), append to `recorder`. Later
/// detections draw on top when boxes overlap. A malformed record (invalid
/// label, confidence or bbox) is skipped and counted, never fatal.
///
/// Re-invoking with an identical detection list and identical source pixels
/// yields identical overlay output and identical crop buffers; only recorded
/// timestamps differ.
pub fn annotate(
    detections: &[Detection],
    overlay: &mut dyn Surface,
    source: &dyn PixelSource,
    recorder: &mut DetectionRecorder,
) -> AnnotateReport {
    let mut report = AnnotateReport::default();
    for (index, detection) in detections.iter().enumerate() {
        if let Err(err) = detection.validate() {
            log::warn!("skipping malformed detection #{}: {}", index, err);
            report.skipped += 1;
            continue;
        }

        draw_detection(detection, overlay);
        report.drawn += 1;

        let crop = extract_crop(detection, source);
        recorder.record(&detection.normalized_label(), crop);
        report.recorded += 1;
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::test_support::TraceSurface;
    use crate::surface::ImageSurface;
    use crate::BoundingBox;
    use image::{Rgb, RgbImage};

    fn source_surface() -> ImageSurface {
        ImageSurface::new(RgbImage::from_fn(100, 100, |x, y| {
            Rgb([x as u8, y as u8, 42])
        }))
    }

    fn valid(label: &str, x: f32) -> Detection {
        Detection::new(label, 0.8, BoundingBox::new(x, 20.0, 10.0, 10.0))
    }

    #[test]
    fn one_rect_one_label_one_record_per_detection() {
        let detections = vec![valid("car", 5.0), valid("person", 30.0), valid("dog", 60.0)];
        let mut overlay = TraceSurface::new(100, 100);
        let source = source_surface();
        let mut recorder = DetectionRecorder::new();

        let report = annotate(&detections, &mut overlay, &source, &mut recorder);

        assert_eq!(report, AnnotateReport { drawn: 3, recorded: 3, skipped: 0 });
        assert_eq!(overlay.rect_count(), 3);
        assert_eq!(overlay.text_count(), 3);
        let labels: Vec<&str> = recorder.history().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["car", "person", "dog"]);
    }

    #[test]
    fn malformed_entry_is_skipped_and_counted() {
        let mut bad = valid("broken", 30.0);
        bad.bbox = BoundingBox::new(f32::NAN, 20.0, 10.0, 10.0);
        let detections = vec![valid("car", 5.0), bad, valid("dog", 60.0)];

        let mut overlay = TraceSurface::new(100, 100);
        let source = source_surface();
        let mut recorder = DetectionRecorder::new();

        let report = annotate(&detections, &mut overlay, &source, &mut recorder);

        assert_eq!(report, AnnotateReport { drawn: 2, recorded: 2, skipped: 1 });
        assert_eq!(overlay.rect_count(), 2);
        let labels: Vec<&str> = recorder.history().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["car", "dog"]);
    }

    #[test]
    fn crops_come_from_source_not_overlay() {
        // Overlay and source are separate surfaces; drawing must not leak into
        // the recorded pixels.
        let detections = vec![valid("car", 5.0)];
        let source = source_surface();
        let mut overlay = ImageSurface::blank(100, 100);
        let mut recorder = DetectionRecorder::new();

        annotate(&detections, &mut overlay, &source, &mut recorder);

        let expected = source.read_region(&detections[0].bbox);
        assert_eq!(recorder.history()[0].crop, expected);
    }

    #[test]
    fn recorded_labels_are_normalized() {
        let detections = vec![valid("  Person ", 5.0)];
        let mut overlay = TraceSurface::new(100, 100);
        let source = source_surface();
        let mut recorder = DetectionRecorder::new();

        annotate(&detections, &mut overlay, &source, &mut recorder);
        assert_eq!(recorder.history()[0].label, "person");
    }

    #[test]
    fn out_of_bounds_detection_records_clamped_crop() {
        let detections = vec![Detection::new(
            "edge",
            0.9,
            BoundingBox::new(95.0, 95.0, 20.0, 20.0),
        )];
        let mut overlay = TraceSurface::new(100, 100);
        let source = source_surface();
        let mut recorder = DetectionRecorder::new();

        let report = annotate(&detections, &mut overlay, &source, &mut recorder);

        assert_eq!(report.skipped, 0);
        let crop = &recorder.history()[0].crop;
        assert_eq!((crop.width(), crop.height()), (5, 5));
    }
}
