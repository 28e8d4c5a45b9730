//! Detection recorder: append-only crop history with capture timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::surface::CropBuffer;

/// One recorded detection: label, wall-clock capture time and the extracted
/// crop. Entries are never mutated after being appended.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDetection {
    pub label: String,
    /// Unix epoch milliseconds at the moment of recording.
    pub captured_at_ms: u64,
    /// Derived `HH:MM:SS` UTC wall-clock string for display/export.
    pub clock_time: String,
    pub crop: CropBuffer,
}

/// Ordered, append-only detection history.
///
/// The history grows monotonically within a session and is never reordered.
/// The recorder applies no eviction on its own; retention is the caller's
/// decision via [`DetectionRecorder::enforce_limit`]. Single-threaded by
/// design: appends and reads are serialized by the owning controller.
#[derive(Debug, Default)]
pub struct DetectionRecorder {
    history: Vec<RecordedDetection>,
}

impl DetectionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry stamped with the current wall-clock time.
    ///
    /// Timestamps are non-deterministic across runs; tests assert only format
    /// and ordering.
    pub fn record(&mut self, label: &str, crop: CropBuffer) {
        let captured_at_ms = now_ms();
        self.history.push(RecordedDetection {
            label: label.to_string(),
            captured_at_ms,
            clock_time: format_clock_time(captured_at_ms),
            crop,
        });
    }

    pub fn history(&self) -> &[RecordedDetection] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Caller-driven truncation hook: keep at most `max` entries, dropping the
    /// oldest. `max == 0` means unlimited.
    pub fn enforce_limit(&mut self, max: usize) {
        if max == 0 || self.history.len() <= max {
            return;
        }
        let excess = self.history.len() - max;
        log::warn!("detection history over limit, dropping {} oldest entries", excess);
        self.history.drain(..excess);
    }

    pub fn into_history(self) -> Vec<RecordedDetection> {
        self.history
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `HH:MM:SS` UTC from epoch milliseconds.
fn format_clock_time(epoch_ms: u64) -> String {
    let secs = epoch_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop(tag: u8) -> CropBuffer {
        CropBuffer::from_image(image::RgbImage::from_pixel(2, 2, image::Rgb([tag, 0, 0])))
    }

    #[test]
    fn history_preserves_append_order() {
        let mut recorder = DetectionRecorder::new();
        recorder.record("accident", crop(1));
        recorder.record("theft", crop(2));
        recorder.record("car", crop(3));

        let labels: Vec<&str> = recorder.history().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["accident", "theft", "car"]);
    }

    #[test]
    fn timestamps_are_monotonic_and_formatted() {
        let mut recorder = DetectionRecorder::new();
        recorder.record("a", crop(1));
        recorder.record("b", crop(2));

        let history = recorder.history();
        assert!(history[0].captured_at_ms <= history[1].captured_at_ms);
        for entry in history {
            let re = regex::Regex::new(r"^\d{2}:\d{2}:\d{2}$").unwrap();
            assert!(re.is_match(&entry.clock_time), "bad clock: {}", entry.clock_time);
        }
    }

    #[test]
    fn clock_formatting_wraps_at_midnight() {
        assert_eq!(format_clock_time(0), "00:00:00");
        // 1h 2m 3s into the day
        assert_eq!(format_clock_time(3_723_000), "01:02:03");
        // 25h wraps to 01:00:00
        assert_eq!(format_clock_time(25 * 3600 * 1000), "01:00:00");
    }

    #[test]
    fn enforce_limit_drops_oldest_only() {
        let mut recorder = DetectionRecorder::new();
        for i in 0u8..5 {
            recorder.record(&format!("label-{i}"), crop(i));
        }
        recorder.enforce_limit(3);

        let labels: Vec<&str> = recorder.history().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["label-2", "label-3", "label-4"]);

        // Zero means unlimited.
        recorder.enforce_limit(0);
        assert_eq!(recorder.len(), 3);
    }

    #[test]
    fn empty_crops_are_recorded_too() {
        let mut recorder = DetectionRecorder::new();
        recorder.record("ghost", CropBuffer::empty());
        assert_eq!(recorder.len(), 1);
        assert!(recorder.history()[0].crop.is_empty());
    }
}
