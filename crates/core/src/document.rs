//! Document collaborator contracts
//!
//! The core never parses, rasterizes, or writes a document container itself.
//! It talks to those collaborators through the traits below.

use serde::{Deserialize, Serialize};

use crate::coords::SurfaceExtent;
use crate::export::{OutputRect, Pivot};
use crate::payload::ImagePayload;

/// Page dimensions in output units (points, 1/72 inch), Y-up with a bottom-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Errors reported by document collaborators
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to load document: {0}")]
    Load(String),

    #[error("document has no pages")]
    Empty,

    #[error("no document loaded")]
    NotLoaded,

    #[error("invalid page index {page} (page count: {count})")]
    InvalidPageIndex { page: u32, count: u32 },

    #[error("failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    #[error("failed to write document: {0}")]
    Write(String),
}

/// Reports the page layout of raw document bytes
pub trait DocumentLoader {
    /// Parse `bytes` and return one size per page, in page order.
    ///
    /// A document with zero pages is a load failure.
    fn load(&mut self, bytes: &[u8]) -> Result<Vec<PageSize>, DocumentError>;
}

/// Rasterizes a page of the loaded document
pub trait PageRenderer {
    /// Render a 1-based page at `zoom` and report the surface's exact pixel extent
    fn render_page(&mut self, page: u32, zoom: f32) -> Result<SurfaceExtent, DocumentError>;
}

/// Writes draw instructions into a copy of the source document
pub trait DocumentWriter {
    fn write(&self, source: &[u8], pages: &[PageDrawList]) -> Result<Vec<u8>, DocumentError>;
}

/// Text run in output space
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    /// Normalized RGB
    pub color: [f32; 3],
    /// Estimated box; `rect.y` is the flipped bottom edge
    pub rect: OutputRect,
    /// Baseline of the first line
    pub baseline_y: f32,
    pub wrap_width: f32,
    /// Line-height multiplier for wrapped lines
    pub line_height: f32,
    /// Clockwise degrees
    pub rotation: f32,
    pub pivot: Pivot,
}

/// Image placement in output space
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDraw {
    pub payload: ImagePayload,
    pub rect: OutputRect,
    /// Clockwise degrees
    pub rotation: f32,
    pub pivot: Pivot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawInstruction {
    Text(TextRun),
    Image(ImageDraw),
}

/// Draw instructions for one 1-based page, in paint order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageDrawList {
    pub page: u32,
    pub instructions: Vec<DrawInstruction>,
}

impl PageDrawList {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            instructions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
