//! Baking annotations into an exported document
//!
//! Annotations are processed sequentially, page by page and then in store
//! order. A failure on one annotation skips that annotation only; failures to
//! read the source or write the output abort the whole export.

use serde::Serialize;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind, ImageAnnotation, TextAnnotation};
use crate::config::ExportConfig;
use crate::dimension::Axis;
use crate::document::{
    DocumentError, DocumentLoader, DocumentWriter, DrawInstruction, ImageDraw, PageDrawList,
    PageSize, TextRun,
};
use crate::export::{transform_image, transform_text, TransformWarning};
use crate::payload::{resolve_payload, PayloadError, PayloadFetcher};
use crate::store::AnnotationStore;

/// Whole-export failures
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("cannot read source document: {0}")]
    Source(#[source] DocumentError),

    #[error("cannot write output document: {0}")]
    Write(#[source] DocumentError),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// What went wrong with one annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportWarningKind {
    /// Annotation's page is beyond the document; skipped
    PageOutOfRange { page_count: u32 },
    /// Image codec is neither PNG nor JPEG; skipped
    UnsupportedFormat { src: String },
    /// Image could not be fetched, read, or decoded; skipped
    PayloadFailed { reason: String },
    /// Unparseable dimension replaced by the axis default; still placed
    DimensionFallback { axis: Axis, raw: String },
    /// Unparseable color replaced by black; still placed
    InvalidColor { raw: String, reason: String },
}

impl From<TransformWarning> for ExportWarningKind {
    fn from(warning: TransformWarning) -> Self {
        match warning {
            TransformWarning::DimensionFallback { axis, raw } => Self::DimensionFallback { axis, raw },
            TransformWarning::InvalidColor { raw, reason } => Self::InvalidColor { raw, reason },
        }
    }
}

/// A non-fatal condition attached to one annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportWarning {
    pub annotation_id: AnnotationId,
    pub page: u32,
    #[serde(flatten)]
    pub kind: ExportWarningKind,
}

impl ExportWarning {
    fn new(annotation: &Annotation, kind: ExportWarningKind) -> Self {
        Self {
            annotation_id: annotation.id(),
            page: annotation.page(),
            kind,
        }
    }

    /// The annotation was left out of the output
    pub fn skipped(&self) -> bool {
        matches!(
            self.kind,
            ExportWarningKind::PageOutOfRange { .. }
                | ExportWarningKind::UnsupportedFormat { .. }
                | ExportWarningKind::PayloadFailed { .. }
        )
    }
}

/// Outcome of a completed export
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Serialized output document
    pub bytes: Vec<u8>,
    /// Annotations drawn into the output
    pub placed: usize,
    pub warnings: Vec<ExportWarning>,
}

impl ExportReport {
    pub fn skipped(&self) -> impl Iterator<Item = &ExportWarning> + '_ {
        self.warnings.iter().filter(|w| w.skipped())
    }
}

/// Bake every annotation in `store` into a copy of `source`
pub fn export_document(
    source: &[u8],
    store: &AnnotationStore,
    loader: &mut dyn DocumentLoader,
    writer: &dyn DocumentWriter,
    fetcher: &dyn PayloadFetcher,
    config: &ExportConfig,
) -> ExportResult<ExportReport> {
    let pages = loader.load(source).map_err(ExportError::Source)?;
    let page_count = pages.len() as u32;
    tracing::debug!(page_count, annotations = store.len(), "starting export");

    let mut warnings = Vec::new();
    for annotation in store
        .iter()
        .filter(|a| a.page() == 0 || a.page() > page_count)
    {
        tracing::warn!(
            annotation = %annotation.id(),
            page = annotation.page(),
            page_count,
            "annotation page is outside the document, skipping"
        );
        warnings.push(ExportWarning::new(
            annotation,
            ExportWarningKind::PageOutOfRange { page_count },
        ));
    }

    let mut placed = 0;
    let mut draw_lists = Vec::new();
    for (page, size) in (1..).zip(pages.iter().copied()) {
        let mut list = PageDrawList::new(page);
        for annotation in store.query_by_page(page) {
            let instruction = match &annotation.kind {
                AnnotationKind::Text(text) => Some(text_run(annotation, text, size, config, &mut warnings)),
                AnnotationKind::Image(image) => {
                    image_draw(annotation, image, size, config, fetcher, &mut warnings)
                }
            };
            if let Some(instruction) = instruction {
                list.instructions.push(instruction);
                placed += 1;
            }
        }
        if !list.is_empty() {
            draw_lists.push(list);
        }
    }

    let bytes = writer.write(source, &draw_lists).map_err(ExportError::Write)?;
    let skipped = warnings.iter().filter(|w| w.skipped()).count();
    tracing::info!(placed, skipped, warnings = warnings.len(), "export complete");

    Ok(ExportReport {
        bytes,
        placed,
        warnings,
    })
}

fn text_run(
    annotation: &Annotation,
    text: &TextAnnotation,
    page: PageSize,
    config: &ExportConfig,
    warnings: &mut Vec<ExportWarning>,
) -> DrawInstruction {
    let transformed = transform_text(annotation, text, page, config);
    warnings.extend(
        transformed
            .warnings
            .into_iter()
            .map(|w| ExportWarning::new(annotation, w.into())),
    );
    let placement = transformed.placement;
    DrawInstruction::Text(TextRun {
        text: text.text.clone(),
        font_family: text.font_family.clone(),
        font_size: placement.font_size,
        color: placement.color,
        rect: placement.rect,
        baseline_y: placement.baseline_y,
        wrap_width: placement.wrap_width,
        line_height: config.line_height,
        rotation: placement.rotation,
        pivot: placement.pivot,
    })
}

fn image_draw(
    annotation: &Annotation,
    image: &ImageAnnotation,
    page: PageSize,
    config: &ExportConfig,
    fetcher: &dyn PayloadFetcher,
    warnings: &mut Vec<ExportWarning>,
) -> Option<DrawInstruction> {
    let payload = match resolve_payload(&image.src, fetcher) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(annotation = %annotation.id(), error = %err, "skipping image annotation");
            let kind = match err {
                PayloadError::Unsupported(_) => ExportWarningKind::UnsupportedFormat {
                    src: summarize_src(&image.src),
                },
                other => ExportWarningKind::PayloadFailed {
                    reason: other.to_string(),
                },
            };
            warnings.push(ExportWarning::new(annotation, kind));
            return None;
        }
    };

    let transformed = transform_image(annotation, image, page, config);
    warnings.extend(
        transformed
            .warnings
            .into_iter()
            .map(|w| ExportWarning::new(annotation, w.into())),
    );
    let placement = transformed.placement;
    Some(DrawInstruction::Image(ImageDraw {
        payload,
        rect: placement.rect,
        rotation: placement.rotation,
        pivot: placement.pivot,
    }))
}

/// Data URLs are cut to their header so reports stay readable
fn summarize_src(src: &str) -> String {
    match src.split_once(',') {
        Some((header, _)) if src.trim_start().starts_with("data:") => format!("{header},…"),
        _ => src.to_string(),
    }
}
