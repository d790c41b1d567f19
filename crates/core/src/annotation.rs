//! Annotation data model
//!
//! An annotation is a positioned text or image overlay on one page. Position is
//! stored as percentages of the rendered page surface (origin top-left, Y down),
//! so stored values stay valid across zoom changes and page switches.

use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::dimension::DimensionValue;

/// Unique identifier for an annotation
///
/// Assigned at creation, immutable, never reused.
/// Generated using UUID v4 for guaranteed uniqueness.
pub type AnnotationId = uuid::Uuid;

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("color {0:?} is not a 6-digit hex value")]
    TooShort(String),
    #[error("color {0:?} contains a non-hex channel")]
    InvalidChannel(String),
}

impl Color {
    /// Create an opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#RRGGBB` (the `#` is optional).
    ///
    /// Each two-digit channel goes through numeric parsing; nothing else is validated.
    pub fn from_hex(raw: &str) -> Result<Self, ColorError> {
        let hex = raw.trim().trim_start_matches('#');
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .ok_or_else(|| ColorError::TooShort(raw.to_string()))
                .and_then(|digits| {
                    u8::from_str_radix(digits, 16)
                        .map_err(|_| ColorError::InvalidChannel(raw.to_string()))
                })
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Format as `#RRGGBB`
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Convert to normalized RGB values (0.0 to 1.0)
    pub fn to_normalized(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
}

/// Text overlay payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    pub text: String,
    /// Font size in surface pixels
    pub font_size: f32,
    pub font_family: String,
    /// `#RRGGBB`
    pub color: String,
    /// Box width in percent of page width; height flows from content
    pub width: f32,
}

/// Image overlay payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    /// Embedded `data:` URL, remote URL, or local path
    pub src: String,
    #[serde(default)]
    pub alt: String,
    pub width: DimensionValue,
    pub height: DimensionValue,
}

/// Variant payload; the serialized `type` tag always agrees with the field set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationKind {
    Text(TextAnnotation),
    Image(ImageAnnotation),
}

/// Annotation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,

    /// 1-based page index
    page: u32,

    /// Top-left corner, percent of surface width
    pub x: f32,

    /// Top-left corner, percent of surface height
    pub y: f32,

    /// Clockwise degrees in [0, 360), pivot at the top-left corner
    #[serde(default)]
    pub rotation: f32,

    #[serde(flatten)]
    pub kind: AnnotationKind,
}

impl Annotation {
    /// Create a new annotation with generated ID
    pub fn new(page: u32, x: f32, y: f32, kind: AnnotationKind) -> Self {
        Self::with_id(AnnotationId::new_v4(), page, x, y, kind)
    }

    /// Create an annotation with a specific ID (for deserialization and tests)
    pub fn with_id(id: AnnotationId, page: u32, x: f32, y: f32, kind: AnnotationKind) -> Self {
        Self {
            id,
            page,
            x,
            y,
            rotation: 0.0,
            kind,
        }
    }

    /// Text annotation with default geometry
    pub fn new_text(page: u32, x: f32, y: f32, config: &EditorConfig) -> Self {
        Self::new(
            page,
            x,
            y,
            AnnotationKind::Text(TextAnnotation {
                text: String::new(),
                font_size: config.default_font_size,
                font_family: config.default_font_family.clone(),
                color: config.default_color.clone(),
                width: config.default_text_width_percent,
            }),
        )
    }

    /// Image annotation with default geometry
    pub fn new_image(
        page: u32,
        x: f32,
        y: f32,
        src: impl Into<String>,
        alt: impl Into<String>,
        config: &EditorConfig,
    ) -> Self {
        Self::new(
            page,
            x,
            y,
            AnnotationKind::Image(ImageAnnotation {
                src: src.into(),
                alt: alt.into(),
                width: DimensionValue::parse(&config.default_image_width),
                height: DimensionValue::parse(&config.default_image_height),
            }),
        )
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Explicit move to another page; position is kept
    pub fn move_to_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, AnnotationKind::Image(_))
    }

    /// Rotate by a signed step, wrapping into [0, 360)
    pub fn rotate_by(&mut self, degrees: f32) {
        self.rotation = normalize_rotation(self.rotation + degrees);
    }
}

/// Wrap any angle into [0, 360)
pub fn normalize_rotation(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
