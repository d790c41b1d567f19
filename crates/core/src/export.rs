//! Export transform
//!
//! Re-projects percentage geometry (Y-down, origin top-left) into the absolute
//! output coordinate system of a page (Y-up, origin bottom-left, points).

use serde::Serialize;

use crate::annotation::{Annotation, Color, ImageAnnotation, TextAnnotation};
use crate::config::ExportConfig;
use crate::dimension::{resolve_or_fallback, Axis, DimensionValue};

pub use crate::document::PageSize;

/// Axis-aligned box in output space; `(x, y)` is the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl OutputRect {
    pub fn top(&self) -> f32 {
        self.y + self.height
    }
}

/// Rotation origin in output space: the annotation's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pivot {
    pub x: f32,
    pub y: f32,
}

/// Non-fatal condition found while transforming one annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformWarning {
    /// Unparseable dimension replaced by the axis default
    DimensionFallback { axis: Axis, raw: String },
    /// Color could not be parsed; black was used
    InvalidColor { raw: String, reason: String },
}

/// Output placement of a text annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextPlacement {
    pub rect: OutputRect,
    /// Baseline of the first line
    pub baseline_y: f32,
    pub wrap_width: f32,
    pub font_size: f32,
    pub color: [f32; 3],
    /// Clockwise degrees
    pub rotation: f32,
    pub pivot: Pivot,
}

/// Output placement of an image annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePlacement {
    pub rect: OutputRect,
    /// Clockwise degrees
    pub rotation: f32,
    pub pivot: Pivot,
}

/// A placement plus the warnings raised while computing it
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed<T> {
    pub placement: T,
    pub warnings: Vec<TransformWarning>,
}

/// Top-left corner of an annotation in output space, before the axis flip
fn top_left(annotation: &Annotation, page: PageSize) -> (f32, f32) {
    (
        annotation.x / 100.0 * page.width,
        annotation.y / 100.0 * page.height,
    )
}

/// Flip a Y-down top offset into a Y-up bottom edge for a box of height `height`
fn flip(page: PageSize, top: f32, height: f32) -> f32 {
    page.height - top - height
}

fn pivot(page: PageSize, x: f32, top: f32) -> Pivot {
    Pivot {
        x,
        y: page.height - top,
    }
}

/// Transform a text annotation.
///
/// The box height is estimated as `font_size * line_height`; content flow is
/// not measured, so long wrapped text can overflow it.
pub fn transform_text(
    annotation: &Annotation,
    text: &TextAnnotation,
    page: PageSize,
    config: &ExportConfig,
) -> Transformed<TextPlacement> {
    let mut warnings = Vec::new();
    let (x, top) = top_left(annotation, page);
    let width = text.width / 100.0 * page.width;
    let height = text.font_size * config.line_height;
    let y = flip(page, top, height);

    let color = match Color::from_hex(&text.color) {
        Ok(color) => color,
        Err(err) => {
            tracing::warn!(annotation = %annotation.id(), color = %text.color, "invalid text color, using black");
            warnings.push(TransformWarning::InvalidColor {
                raw: text.color.clone(),
                reason: err.to_string(),
            });
            Color::BLACK
        }
    };

    Transformed {
        placement: TextPlacement {
            rect: OutputRect {
                x,
                y,
                width,
                height,
            },
            baseline_y: y + (height - text.font_size),
            wrap_width: width,
            font_size: text.font_size,
            color: color.to_normalized(),
            rotation: annotation.rotation,
            pivot: pivot(page, x, top),
        },
        warnings,
    }
}

/// Transform an image annotation, resolving its tagged dimensions against the page
pub fn transform_image(
    annotation: &Annotation,
    image: &ImageAnnotation,
    page: PageSize,
    config: &ExportConfig,
) -> Transformed<ImagePlacement> {
    let mut warnings = Vec::new();
    let mut resolve = |value: &DimensionValue, reference: f32, axis: Axis| {
        let resolved = resolve_or_fallback(
            value,
            reference,
            axis,
            config.em_size,
            config.fallback_width_percent,
            config.fallback_height_percent,
        );
        if resolved.fell_back {
            tracing::warn!(annotation = %annotation.id(), ?axis, raw = %value, "unparseable dimension, using default");
            warnings.push(TransformWarning::DimensionFallback {
                axis,
                raw: value.to_string(),
            });
        }
        resolved.value
    };
    let width = resolve(&image.width, page.width, Axis::Width);
    let height = resolve(&image.height, page.height, Axis::Height);

    let (x, top) = top_left(annotation, page);
    Transformed {
        placement: ImagePlacement {
            rect: OutputRect {
                x,
                y: flip(page, top, height),
                width,
                height,
            },
            rotation: annotation.rotation,
            pivot: pivot(page, x, top),
        },
        warnings,
    }
}
