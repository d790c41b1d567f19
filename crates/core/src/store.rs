//! Annotation store
//!
//! One owned, insertion-ordered collection keyed by annotation identity. The
//! store carries no geometry logic; it only maps identities to records.

use indexmap::IndexMap;

use crate::annotation::{normalize_rotation, Annotation, AnnotationId, AnnotationKind};
use crate::dimension::DimensionValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("annotation {0} already exists")]
    DuplicateId(AnnotationId),
    #[error("annotation {0} not found")]
    NotFound(AnnotationId),
    #[error("edit {edit} does not apply to a {kind} annotation")]
    VariantMismatch {
        edit: &'static str,
        kind: &'static str,
    },
    #[error("edit {edit} needs finite values")]
    NonFinite { edit: &'static str },
}

/// Field edit requested by the editing panel
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationEdit {
    Position { x: f32, y: f32 },
    Rotation(f32),
    MoveToPage(u32),
    Text(String),
    FontSize(f32),
    FontFamily(String),
    Color(String),
    /// Text box width, percent of page width
    TextWidth(f32),
    /// Raw tagged dimension string as typed by the user
    ImageWidth(String),
    /// Raw tagged dimension string as typed by the user
    ImageHeight(String),
    Alt(String),
    Source(String),
}

impl AnnotationEdit {
    fn name(&self) -> &'static str {
        match self {
            Self::Position { .. } => "position",
            Self::Rotation(_) => "rotation",
            Self::MoveToPage(_) => "page",
            Self::Text(_) => "text",
            Self::FontSize(_) => "fontSize",
            Self::FontFamily(_) => "fontFamily",
            Self::Color(_) => "color",
            Self::TextWidth(_) => "width",
            Self::ImageWidth(_) => "width",
            Self::ImageHeight(_) => "height",
            Self::Alt(_) => "alt",
            Self::Source(_) => "src",
        }
    }

    fn apply(self, annotation: &mut Annotation) -> Result<(), StoreError> {
        let name = self.name();
        let mismatch = |kind: &AnnotationKind| StoreError::VariantMismatch {
            edit: name,
            kind: match kind {
                AnnotationKind::Text(_) => "text",
                AnnotationKind::Image(_) => "image",
            },
        };

        let edit = match self {
            Self::Position { x, y } => {
                if !x.is_finite() || !y.is_finite() {
                    return Err(StoreError::NonFinite { edit: name });
                }
                annotation.x = x;
                annotation.y = y;
                return Ok(());
            }
            Self::Rotation(degrees) => {
                annotation.rotation = normalize_rotation(degrees);
                return Ok(());
            }
            Self::MoveToPage(page) => {
                annotation.move_to_page(page);
                return Ok(());
            }
            edit => edit,
        };

        match (edit, &mut annotation.kind) {
            (Self::Text(text), AnnotationKind::Text(payload)) => payload.text = text,
            (Self::FontSize(size), AnnotationKind::Text(payload)) => payload.font_size = size,
            (Self::FontFamily(family), AnnotationKind::Text(payload)) => {
                payload.font_family = family
            }
            (Self::Color(color), AnnotationKind::Text(payload)) => payload.color = color,
            (Self::TextWidth(width), AnnotationKind::Text(payload)) => payload.width = width,
            (Self::ImageWidth(raw), AnnotationKind::Image(payload)) => {
                payload.width = DimensionValue::parse(&raw)
            }
            (Self::ImageHeight(raw), AnnotationKind::Image(payload)) => {
                payload.height = DimensionValue::parse(&raw)
            }
            (Self::Alt(alt), AnnotationKind::Image(payload)) => payload.alt = alt,
            (Self::Source(src), AnnotationKind::Image(payload)) => payload.src = src,
            (_, kind) => return Err(mismatch(kind)),
        }
        Ok(())
    }
}

/// Ordered collection of annotations for one document
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    annotations: IndexMap<AnnotationId, Annotation>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records, rejecting duplicate ids
    pub fn from_annotations(
        annotations: impl IntoIterator<Item = Annotation>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for annotation in annotations {
            store.add(annotation)?;
        }
        Ok(store)
    }

    /// Append an annotation
    pub fn add(&mut self, annotation: Annotation) -> Result<AnnotationId, StoreError> {
        let id = annotation.id();
        if self.annotations.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        self.annotations.insert(id, annotation);
        Ok(id)
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.annotations.contains_key(&id)
    }

    /// In-place update by identity; last write wins
    pub fn update<F>(&mut self, id: AnnotationId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Annotation),
    {
        let annotation = self
            .annotations
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        f(annotation);
        Ok(())
    }

    /// Apply a typed field edit
    pub fn apply_edit(&mut self, id: AnnotationId, edit: AnnotationEdit) -> Result<(), StoreError> {
        let annotation = self
            .annotations
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        edit.apply(annotation)
    }

    /// Remove by identity, keeping the order of the remaining records
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        self.annotations.shift_remove(&id)
    }

    /// Annotations on a 1-based page, in insertion order
    pub fn query_by_page(&self, page: u32) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.values().filter(move |a| a.page() == page)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.values()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }
}
