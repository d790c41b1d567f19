//! Surface coordinate model
//!
//! Annotation geometry is stored as percentages of the rendered page surface.
//! Only the reference extent changes when the zoom or page changes; stored values
//! are never rescaled.

use serde::Serialize;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::config::EditorConfig;
use crate::dimension::{resolve_or_fallback, Axis, Dimension, Unit};

/// Pixel size of a rendered page surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceExtent {
    pub width: f32,
    pub height: f32,
}

impl SurfaceExtent {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both sides positive and finite; percent conversion divides by them
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Point in pointer space (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PixelPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Point in percent of the surface extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentPoint {
    pub x: f32,
    pub y: f32,
}

impl PercentPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Bounding box of the rendered surface in pointer space.
///
/// This is the page raster itself, not the scroll container around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(origin: PixelPoint, extent: SurfaceExtent) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            width: extent.width,
            height: extent.height,
        }
    }

    pub fn extent(&self) -> SurfaceExtent {
        SurfaceExtent::new(self.width, self.height)
    }

    /// `percent = (pointer - origin) / extent * 100`, per axis
    pub fn to_percent(&self, point: PixelPoint) -> PercentPoint {
        PercentPoint::new(
            (point.x - self.left) / self.width * 100.0,
            (point.y - self.top) / self.height * 100.0,
        )
    }

    /// Inverse of [`SurfaceRect::to_percent`], relative to the surface's top-left
    pub fn to_pixels(&self, point: PercentPoint) -> PixelPoint {
        PixelPoint::new(
            point.x / 100.0 * self.width,
            point.y / 100.0 * self.height,
        )
    }

    /// Offset of a pointer position from the surface's top-left corner
    pub fn local(&self, point: PixelPoint) -> PixelPoint {
        PixelPoint::new(point.x - self.left, point.y - self.top)
    }

    pub fn contains_percent(point: PercentPoint) -> bool {
        (0.0..=100.0).contains(&point.x) && (0.0..=100.0).contains(&point.y)
    }
}

/// Clamp a top-left coordinate into `[0, max]`
pub fn clamp_position(percent: f32, max: f32) -> f32 {
    percent.clamp(0.0, max)
}

/// Live pixel box of an annotation on the surface.
///
/// `left`/`top` are offsets from the surface's top-left corner; rotation is
/// applied around that same corner of the box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutBox {
    pub annotation_id: AnnotationId,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
}

impl LayoutBox {
    /// Hit test a surface-local point against the rotated box
    pub fn contains(&self, point: PixelPoint) -> bool {
        let local = self.unrotate(point);
        local.x >= 0.0 && local.x <= self.width && local.y >= 0.0 && local.y <= self.height
    }

    /// Express a surface-local point in the box's unrotated frame (origin at its top-left)
    fn unrotate(&self, point: PixelPoint) -> PixelPoint {
        let dx = point.x - self.left;
        let dy = point.y - self.top;
        let (sin, cos) = (-self.rotation.to_radians()).sin_cos();
        PixelPoint::new(dx * cos - dy * sin, dx * sin + dy * cos)
    }

    /// Map a point in the box's unrotated frame back to surface-local pixels
    pub fn corner(&self, offset: PixelPoint) -> PixelPoint {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        PixelPoint::new(
            self.left + offset.x * cos - offset.y * sin,
            self.top + offset.x * sin + offset.y * cos,
        )
    }
}

/// Estimated height of a text box; content flow is not measured
pub fn estimated_text_height(font_size: f32, line_height: f32) -> f32 {
    font_size * line_height
}

/// Project an annotation onto a surface of the given extent
pub fn layout_annotation(
    annotation: &Annotation,
    extent: SurfaceExtent,
    config: &EditorConfig,
) -> LayoutBox {
    let (width, height) = match &annotation.kind {
        AnnotationKind::Text(text) => (
            text.width / 100.0 * extent.width,
            estimated_text_height(text.font_size, config.line_height),
        ),
        AnnotationKind::Image(image) => {
            let fallback_width = default_percent(&config.default_image_width, 25.0);
            let fallback_height = default_percent(&config.default_image_height, 15.0);
            let resolve = |value, reference, axis| {
                resolve_or_fallback(
                    value,
                    reference,
                    axis,
                    config.em_size,
                    fallback_width,
                    fallback_height,
                )
                .value
            };
            (
                resolve(&image.width, extent.width, Axis::Width),
                resolve(&image.height, extent.height, Axis::Height),
            )
        }
    };

    LayoutBox {
        annotation_id: annotation.id(),
        left: annotation.x / 100.0 * extent.width,
        top: annotation.y / 100.0 * extent.height,
        width,
        height,
        rotation: annotation.rotation,
    }
}

fn default_percent(raw: &str, otherwise: f32) -> f32 {
    match raw.parse::<Dimension>() {
        Ok(Dimension {
            value,
            unit: Unit::Percent,
        }) => value,
        _ => otherwise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ImageAnnotation;
    use crate::dimension::DimensionValue;

    fn surface() -> SurfaceRect {
        SurfaceRect::new(PixelPoint::new(100.0, 50.0), SurfaceExtent::new(800.0, 1000.0))
    }

    #[test]
    fn test_pointer_to_percent_uses_surface_origin() {
        let percent = surface().to_percent(PixelPoint::new(500.0, 300.0));
        assert!((percent.x - 50.0).abs() < 1e-4);
        assert!((percent.y - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_percent_to_pixels_is_inverse() {
        let rect = surface();
        let pixels = rect.to_pixels(PercentPoint::new(50.0, 25.0));
        assert_eq!(pixels, PixelPoint::new(400.0, 250.0));
    }

    #[test]
    fn test_contains_percent_bounds() {
        assert!(SurfaceRect::contains_percent(PercentPoint::new(0.0, 100.0)));
        assert!(!SurfaceRect::contains_percent(PercentPoint::new(-0.1, 50.0)));
        assert!(!SurfaceRect::contains_percent(PercentPoint::new(50.0, 100.1)));
    }

    #[test]
    fn test_layout_survives_zoom_change() {
        let config = EditorConfig::default();
        let annotation = Annotation::new_text(1, 10.0, 20.0, &config);

        let at_100 = layout_annotation(&annotation, SurfaceExtent::new(600.0, 800.0), &config);
        let at_200 = layout_annotation(&annotation, SurfaceExtent::new(1200.0, 1600.0), &config);

        assert_eq!(at_100.left * 2.0, at_200.left);
        assert_eq!(at_100.top * 2.0, at_200.top);
        assert_eq!(at_100.width * 2.0, at_200.width);
        assert!((at_100.height - 12.0 * 1.2).abs() < 1e-4);
    }

    #[test]
    fn test_image_layout_resolves_units() {
        let config = EditorConfig::default();
        let mut annotation = Annotation::new_image(1, 0.0, 0.0, "a.png", "", &config);
        if let AnnotationKind::Image(ImageAnnotation { width, height, .. }) = &mut annotation.kind {
            *width = DimensionValue::parse("120px");
            *height = DimensionValue::parse("bogus");
        }
        let layout = layout_annotation(&annotation, SurfaceExtent::new(400.0, 200.0), &config);
        assert_eq!(layout.width, 120.0);
        assert_eq!(layout.height, 30.0);
    }

    #[test]
    fn test_rotated_box_hit_test_pivots_on_top_left() {
        let layout = LayoutBox {
            annotation_id: AnnotationId::new_v4(),
            left: 100.0,
            top: 100.0,
            width: 50.0,
            height: 10.0,
            rotation: 90.0,
        };
        // Rotated 90 degrees clockwise the box hangs below its top-left corner, to the left
        assert!(layout.contains(PixelPoint::new(95.0, 140.0)));
        assert!(!layout.contains(PixelPoint::new(140.0, 105.0)));

        let far = layout.corner(PixelPoint::new(50.0, 0.0));
        assert!((far.x - 100.0).abs() < 1e-3);
        assert!((far.y - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_clamp_position() {
        assert_eq!(clamp_position(-5.0, 99.9), 0.0);
        assert_eq!(clamp_position(150.0, 99.9), 99.9);
        assert_eq!(clamp_position(42.0, 99.9), 42.0);
    }
}
