//! Drawing surfaces and pixel regions.
//!
//! This module is the seam between the annotation pipeline and whatever backs the
//! pixels. Two small traits describe the capabilities the pipeline needs:
//!
//! - `Surface`: mutable 2D drawing primitives (rectangle stroke, text placement)
//! - `PixelSource`: read-only region extraction with bounds clamping
//!
//! `ImageSurface` implements both on top of `image::RgbImage`, drawing with
//! `imageproc`. Label text uses an optional `ab_glyph` font; without one, labels
//! degrade to a deterministic filled tag strip so overlay output stays stable.

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::BoundingBox;

/// Default pixel height for label text.
pub const LABEL_SCALE: f32 = 16.0;

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Mutable 2D drawing surface.
///
/// Implementations must tolerate out-of-range geometry: coordinates may be
/// negative or exceed the surface bounds, and zero-sized rectangles are legal
/// no-ops. Drawing must never panic on degenerate input.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Stroke an unfilled rectangle. `stroke` is the line width in pixels,
    /// drawn inward from the rectangle edge.
    fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>, stroke: u32);

    /// Place label text with its top-left corner at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: i32, y: i32, color: Rgb<u8>);
}

/// Read-only pixel access with bounds clamping.
///
/// The annotation pipeline reads crops from the *source* surface, never from the
/// annotated overlay, so recorded crops do not capture drawn boxes.
pub trait PixelSource {
    fn dimensions(&self) -> (u32, u32);

    /// Extract the pixel region covered by `bbox`, clamped to the surface
    /// bounds. A clamped region with zero area yields the empty marker buffer.
    fn read_region(&self, bbox: &BoundingBox) -> CropBuffer;
}

// ----------------------------------------------------------------------------
// Regions
// ----------------------------------------------------------------------------

/// An integer pixel region guaranteed to lie within the bounds it was clamped
/// against. May have zero area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Clamp a bounding box to `width x height` surface bounds.
///
/// Non-finite components collapse to an empty region rather than failing; the
/// caller treats empty regions as zero-area crops.
pub fn clamp_region(bbox: &BoundingBox, width: u32, height: u32) -> PixelRegion {
    let finite = [bbox.x, bbox.y, bbox.width, bbox.height]
        .iter()
        .all(|c| c.is_finite());
    if !finite {
        return PixelRegion::default();
    }

    let x0 = bbox.x.round().clamp(0.0, width as f32) as u32;
    let y0 = bbox.y.round().clamp(0.0, height as f32) as u32;
    let x1 = (bbox.x + bbox.width.max(0.0))
        .round()
        .clamp(x0 as f32, width as f32) as u32;
    let y1 = (bbox.y + bbox.height.max(0.0))
        .round()
        .clamp(y0 as f32, height as f32) as u32;

    PixelRegion {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

// ----------------------------------------------------------------------------
// CropBuffer
// ----------------------------------------------------------------------------

/// Opaque RGB8 pixel buffer holding one extracted crop.
///
/// Zero-area extractions produce the empty marker buffer instead of an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CropBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CropBuffer {
    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    /// Marker buffer for zero-area extractions.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Content digest over dimensions and pixel data. Identical source pixels
    /// yield identical digests, which is what the re-render idempotence checks
    /// and the export manifest rely on.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(&self.pixels);
        hasher.finalize().into()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }

    /// Rebuild an `RgbImage` for encoding/export. `None` for the empty marker.
    pub fn to_image(&self) -> Option<RgbImage> {
        if self.is_empty() {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

// ----------------------------------------------------------------------------
// ImageSurface
// ----------------------------------------------------------------------------

/// `image::RgbImage`-backed surface.
///
/// Holds an optional label font. Fonts are deployment assets, not crate assets;
/// when none is configured, `fill_text` draws a filled tag strip sized from the
/// text instead of glyphs, keeping output deterministic either way.
pub struct ImageSurface {
    image: RgbImage,
    font: Option<FontArc>,
    font_scale: PxScale,
}

impl ImageSurface {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            font: None,
            font_scale: PxScale::from(LABEL_SCALE),
        }
    }

    pub fn with_font(image: RgbImage, font: FontArc) -> Self {
        Self {
            image,
            font: Some(font),
            font_scale: PxScale::from(LABEL_SCALE),
        }
    }

    /// Blank black surface, mainly for tests and overlay-on-blank rendering.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::new(width, height))
    }

    /// Load a TTF/OTF label font from disk.
    pub fn load_font(path: &Path) -> Result<FontArc> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading label font {}", path.display()))?;
        FontArc::try_from_vec(bytes)
            .with_context(|| format!("parsing label font {}", path.display()))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl Surface for ImageSurface {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>, stroke: u32) {
        // Nested hollow rects, shrinking inward one pixel per ring.
        for ring in 0..stroke.max(1) {
            let w = width.saturating_sub(ring * 2);
            let h = height.saturating_sub(ring * 2);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(x + ring as i32, y + ring as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut self.image, rect, color);
        }
    }

    fn fill_text(&mut self, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        if text.is_empty() {
            return;
        }
        match &self.font {
            Some(font) => {
                draw_text_mut(&mut self.image, color, x, y, self.font_scale, font, text);
            }
            None => {
                // No font configured: draw a tag strip where the text would sit.
                let strip_w = ((text.chars().count() as f32 * self.font_scale.x * 0.5) as u32).max(1);
                let strip_h = (self.font_scale.y as u32).max(1);
                let rect = Rect::at(x, y).of_size(strip_w, strip_h);
                draw_filled_rect_mut(&mut self.image, rect, color);
            }
        }
    }
}

impl PixelSource for ImageSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn read_region(&self, bbox: &BoundingBox) -> CropBuffer {
        let (width, height) = self.dimensions();
        let region = clamp_region(bbox, width, height);
        if region.is_empty() {
            return CropBuffer::empty();
        }
        let view = imageops::crop_imm(&self.image, region.x, region.y, region.width, region.height);
        CropBuffer::from_image(view.to_image())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Records draw commands instead of touching pixels. Lets pipeline tests
    /// assert "exactly one rectangle and one label per detection" directly.
    pub(crate) struct TraceSurface {
        width: u32,
        height: u32,
        pub(crate) ops: Vec<DrawOp>,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum DrawOp {
        Rect {
            x: i32,
            y: i32,
            width: u32,
            height: u32,
            stroke: u32,
        },
        Text {
            text: String,
            x: i32,
            y: i32,
        },
    }

    impl TraceSurface {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                ops: Vec::new(),
            }
        }

        pub(crate) fn rect_count(&self) -> usize {
            self.ops
                .iter()
                .filter(|op| matches!(op, DrawOp::Rect { .. }))
                .count()
        }

        pub(crate) fn text_count(&self) -> usize {
            self.ops
                .iter()
                .filter(|op| matches!(op, DrawOp::Text { .. }))
                .count()
        }
    }

    impl Surface for TraceSurface {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn stroke_rect(
            &mut self,
            x: i32,
            y: i32,
            width: u32,
            height: u32,
            _color: Rgb<u8>,
            stroke: u32,
        ) {
            self.ops.push(DrawOp::Rect {
                x,
                y,
                width,
                height,
                stroke,
            });
        }

        fn fill_text(&mut self, text: &str, x: i32, y: i32, _color: Rgb<u8>) {
            self.ops.push(DrawOp::Text {
                text: text.to_string(),
                x,
                y,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn clamp_keeps_interior_region_intact() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        let region = clamp_region(&bbox, 100, 100);
        assert_eq!(
            region,
            PixelRegion {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            }
        );
    }

    #[test]
    fn clamp_trims_overhanging_region() {
        let bbox = BoundingBox::new(80.0, 90.0, 50.0, 50.0);
        let region = clamp_region(&bbox, 100, 100);
        assert_eq!(
            region,
            PixelRegion {
                x: 80,
                y: 90,
                width: 20,
                height: 10
            }
        );
    }

    #[test]
    fn clamp_handles_negative_origin() {
        let bbox = BoundingBox::new(-10.0, -5.0, 30.0, 30.0);
        let region = clamp_region(&bbox, 100, 100);
        assert_eq!(
            region,
            PixelRegion {
                x: 0,
                y: 0,
                width: 20,
                height: 25
            }
        );
    }

    #[test]
    fn clamp_collapses_fully_outside_region() {
        let bbox = BoundingBox::new(200.0, 200.0, 30.0, 30.0);
        assert!(clamp_region(&bbox, 100, 100).is_empty());
    }

    #[test]
    fn clamp_collapses_non_finite_region() {
        let bbox = BoundingBox::new(f32::NAN, 0.0, 30.0, 30.0);
        assert!(clamp_region(&bbox, 100, 100).is_empty());
    }

    #[test]
    fn read_region_matches_source_pixels() {
        let surface = ImageSurface::new(gradient_image(64, 48));
        let bbox = BoundingBox::new(8.0, 4.0, 16.0, 12.0);
        let crop = surface.read_region(&bbox);

        assert_eq!(crop.width(), 16);
        assert_eq!(crop.height(), 12);
        // Spot-check one pixel against the source.
        let source_pixel = surface.image().get_pixel(8, 4);
        assert_eq!(&crop.pixels()[..3], &source_pixel.0[..]);
    }

    #[test]
    fn read_region_clamps_out_of_bounds() {
        let surface = ImageSurface::new(gradient_image(64, 48));
        let bbox = BoundingBox::new(60.0, 40.0, 100.0, 100.0);
        let crop = surface.read_region(&bbox);
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 8);
    }

    #[test]
    fn zero_area_read_yields_empty_marker() {
        let surface = ImageSurface::new(gradient_image(64, 48));
        let bbox = BoundingBox::new(10.0, 10.0, 0.0, 20.0);
        let crop = surface.read_region(&bbox);
        assert!(crop.is_empty());
        assert_eq!(crop, CropBuffer::empty());
    }

    #[test]
    fn stroke_rect_touches_expected_border_pixels() {
        let mut surface = ImageSurface::blank(32, 32);
        surface.stroke_rect(4, 4, 10, 10, Rgb([255, 0, 0]), 2);
        let img = surface.image();

        // Outer ring corner and second ring pixel are set; interior is not.
        assert_eq!(img.get_pixel(4, 4), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(5, 5), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(8, 8), &Rgb([0, 0, 0]));
    }

    #[test]
    fn zero_size_stroke_is_a_no_op() {
        let mut surface = ImageSurface::blank(32, 32);
        surface.stroke_rect(4, 4, 0, 0, Rgb([255, 0, 0]), 2);
        assert!(surface.image().pixels().all(|p| p == &Rgb([0, 0, 0])));
    }

    #[test]
    fn fallback_text_is_deterministic() {
        let mut a = ImageSurface::blank(64, 32);
        let mut b = ImageSurface::blank(64, 32);
        a.fill_text("person (87%)", 5, 5, Rgb([255, 0, 0]));
        b.fill_text("person (87%)", 5, 5, Rgb([255, 0, 0]));
        assert_eq!(a.image().as_raw(), b.image().as_raw());
        assert!(a.image().pixels().any(|p| p == &Rgb([255, 0, 0])));
    }

    #[test]
    fn crop_digest_tracks_content() {
        let surface = ImageSurface::new(gradient_image(64, 48));
        let a = surface.read_region(&BoundingBox::new(0.0, 0.0, 8.0, 8.0));
        let b = surface.read_region(&BoundingBox::new(0.0, 0.0, 8.0, 8.0));
        let c = surface.read_region(&BoundingBox::new(1.0, 0.0, 8.0, 8.0));
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest_hex().len(), 64);
    }
}
