//! Stamper Core Library
//!
//! Annotation geometry for overlaying text and images on document pages:
//! the data model, the percentage coordinate model, the pointer interaction
//! state machine, and the transform that bakes annotations into an exported
//! document.

pub mod annotation;
pub mod config;
pub mod coords;
pub mod dimension;
pub mod document;
pub mod editor;
pub mod export;
pub mod manipulation;
pub mod payload;
pub mod pdf_export;
pub mod store;

pub use annotation::{Annotation, AnnotationId, AnnotationKind, Color, ImageAnnotation, TextAnnotation};
pub use config::{ConfigError, EditorConfig, ExportConfig, StamperConfig};
pub use coords::{layout_annotation, LayoutBox, PercentPoint, PixelPoint, SurfaceExtent, SurfaceRect};
pub use dimension::{Dimension, DimensionValue, Unit};
pub use document::{
    DocumentError, DocumentLoader, DocumentWriter, DrawInstruction, ImageDraw, PageDrawList,
    PageRenderer, PageSize, TextRun,
};
pub use editor::{Editor, EditorError, PlacementTool, PointerOutcome, RotationDirection, ViewEvent};
pub use export::{transform_image, transform_text, OutputRect, Pivot, TransformWarning};
pub use manipulation::{generate_handles, HandleType, Interaction, ManipulationHandle};
pub use payload::{resolve_payload, HttpFetcher, ImageFormat, ImagePayload, PayloadError, PayloadFetcher};
pub use pdf_export::{export_document, ExportError, ExportReport, ExportWarning, ExportWarningKind};
pub use store::{AnnotationEdit, AnnotationStore, StoreError};
