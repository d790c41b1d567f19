//! Editing session
//!
//! The [`Editor`] owns the annotation store for the open document, the single
//! selection, the active placement tool, the pointer interaction, and the view
//! (page, zoom, rendered surface). All mutation happens through it on one
//! logical thread.

use std::sync::mpsc;

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::config::EditorConfig;
use crate::coords::{layout_annotation, LayoutBox, PercentPoint, PixelPoint, SurfaceExtent, SurfaceRect};
use crate::document::{DocumentError, DocumentLoader, PageRenderer, PageSize};
use crate::manipulation::{
    generate_handles, DragState, HandleType, Interaction, ManipulationHandle, ResizeSnapshot,
    ResizeState,
};
use crate::store::{AnnotationEdit, AnnotationStore, StoreError};

/// Errors surfaced by editor operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error("no document is loaded")]
    NoDocument,

    #[error("page {page} is out of range (page count: {count})")]
    InvalidPage { page: u32, count: u32 },

    #[error("zoom must be a positive finite factor, got {0}")]
    InvalidZoom(f32),

    #[error("rendered surface must have a positive finite extent, got {width}x{height}")]
    InvalidSurface { width: f32, height: f32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Armed placement tool; consumed by the next successful placement
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementTool {
    Text,
    Image { src: String, alt: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

/// Result of a pointer-down
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    /// A new annotation was placed and selected
    Placed(AnnotationId),
    /// Placement tool is armed but the pointer is off the surface
    Rejected,
    StartedDrag(AnnotationId),
    StartedResize(AnnotationId, HandleType),
    /// Empty background hit with no tool armed
    SelectionCleared,
    /// Nothing to do (no surface, off-surface, or an interaction is already active)
    Ignored,
}

/// Notifications for the editing panel
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    DocumentLoaded { page_count: u32 },
    PageChanged(u32),
    ZoomChanged(f32),
    SurfaceReady(SurfaceExtent),
    /// Rendering failed; the page surface is empty
    SurfaceCleared { page: u32 },
    SelectionChanged(Option<AnnotationId>),
    AnnotationsChanged,
}

/// Identifies one render request; only the latest one is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTicket {
    pub generation: u64,
    pub page: u32,
    pub zoom: f32,
}

#[derive(Debug, Clone)]
struct ViewState {
    page: u32,
    zoom: f32,
    page_sizes: Vec<PageSize>,
    surface: Option<SurfaceRect>,
    generation: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: 1,
            zoom: 1.0,
            page_sizes: Vec::new(),
            surface: None,
            generation: 0,
        }
    }
}

impl ViewState {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }
}

/// Annotation editing session for one document at a time
pub struct Editor {
    config: EditorConfig,
    store: AnnotationStore,
    selection: Option<AnnotationId>,
    tool: Option<PlacementTool>,
    interaction: Interaction,
    view: ViewState,
    subscribers: Vec<mpsc::Sender<ViewEvent>>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            store: AnnotationStore::new(),
            selection: None,
            tool: None,
            interaction: Interaction::Idle,
            view: ViewState::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn page(&self) -> u32 {
        self.view.page
    }

    pub fn zoom(&self) -> f32 {
        self.view.zoom
    }

    pub fn page_count(&self) -> u32 {
        self.view.page_count()
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        &self.view.page_sizes
    }

    pub fn surface(&self) -> Option<SurfaceRect> {
        self.view.surface
    }

    /// Register for view notifications; dropped receivers are pruned on the next event
    pub fn subscribe(&mut self) -> mpsc::Receiver<ViewEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: ViewEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // Document lifecycle

    /// Open new document bytes.
    ///
    /// On success the store and selection are cleared and the view resets to
    /// page 1. On failure nothing changes.
    pub fn load_document(
        &mut self,
        loader: &mut dyn DocumentLoader,
        bytes: &[u8],
    ) -> Result<u32, EditorError> {
        let page_sizes = loader.load(bytes)?;
        if page_sizes.is_empty() {
            return Err(DocumentError::Empty.into());
        }

        let had_selection = self.selection.is_some();
        self.store.clear();
        self.selection = None;
        self.tool = None;
        self.interaction = Interaction::Idle;
        self.view = ViewState {
            zoom: self.view.zoom,
            generation: self.view.generation + 1,
            page_sizes,
            ..ViewState::default()
        };

        let page_count = self.view.page_count();
        tracing::debug!(page_count, "document loaded");
        self.emit(ViewEvent::DocumentLoaded { page_count });
        if had_selection {
            self.emit(ViewEvent::SelectionChanged(None));
        }
        self.emit(ViewEvent::AnnotationsChanged);
        self.emit(ViewEvent::PageChanged(1));
        Ok(page_count)
    }

    // View

    pub fn set_page(&mut self, page: u32) -> Result<(), EditorError> {
        let count = self.view.page_count();
        if count == 0 {
            return Err(EditorError::NoDocument);
        }
        if page == 0 || page > count {
            return Err(EditorError::InvalidPage { page, count });
        }
        if page != self.view.page {
            self.view.page = page;
            self.invalidate_surface();
            self.emit(ViewEvent::PageChanged(page));
        }
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), EditorError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(EditorError::InvalidZoom(zoom));
        }
        if zoom != self.view.zoom {
            self.view.zoom = zoom;
            self.invalidate_surface();
            self.emit(ViewEvent::ZoomChanged(zoom));
        }
        Ok(())
    }

    /// The rendered surface no longer matches the view; any gesture on it ends
    /// and renders already in flight are superseded
    fn invalidate_surface(&mut self) {
        self.view.surface = None;
        self.view.generation += 1;
        self.end_interaction();
    }

    /// Start a render of the current page and zoom, superseding any outstanding one
    pub fn begin_render(&mut self) -> Result<RenderTicket, EditorError> {
        if self.view.page_count() == 0 {
            return Err(EditorError::NoDocument);
        }
        self.view.generation += 1;
        Ok(RenderTicket {
            generation: self.view.generation,
            page: self.view.page,
            zoom: self.view.zoom,
        })
    }

    /// Apply a render result.
    ///
    /// Returns `Ok(false)` when the ticket was superseded and the result dropped.
    /// A failed render leaves the surface empty and is returned to the caller.
    pub fn complete_render(
        &mut self,
        ticket: RenderTicket,
        result: Result<SurfaceExtent, DocumentError>,
        origin: PixelPoint,
    ) -> Result<bool, EditorError> {
        if ticket.generation != self.view.generation
            || ticket.page != self.view.page
            || ticket.zoom != self.view.zoom
        {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.view.generation,
                "dropping stale render"
            );
            return Ok(false);
        }

        match result {
            Ok(extent) if !extent.is_usable() => {
                tracing::warn!(
                    page = ticket.page,
                    width = extent.width,
                    height = extent.height,
                    "renderer returned an unusable extent"
                );
                self.view.surface = None;
                self.end_interaction();
                self.emit(ViewEvent::SurfaceCleared { page: ticket.page });
                Err(EditorError::InvalidSurface {
                    width: extent.width,
                    height: extent.height,
                })
            }
            Ok(extent) => {
                self.view.surface = Some(SurfaceRect::new(origin, extent));
                self.emit(ViewEvent::SurfaceReady(extent));
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(page = ticket.page, error = %err, "page render failed");
                self.view.surface = None;
                self.end_interaction();
                self.emit(ViewEvent::SurfaceCleared { page: ticket.page });
                Err(err.into())
            }
        }
    }

    /// Render the current page synchronously with `renderer`
    pub fn render_current(
        &mut self,
        renderer: &mut dyn PageRenderer,
        origin: PixelPoint,
    ) -> Result<SurfaceExtent, EditorError> {
        let ticket = self.begin_render()?;
        let result = renderer.render_page(ticket.page, ticket.zoom);
        let extent = result.as_ref().ok().copied();
        self.complete_render(ticket, result, origin)?;
        extent.ok_or(EditorError::NoDocument)
    }

    /// Live boxes of the current page's annotations, in paint order
    pub fn layout_page(&self) -> Vec<LayoutBox> {
        let Some(surface) = self.view.surface else {
            return Vec::new();
        };
        if self.view.page > self.view.page_count() {
            return Vec::new();
        }
        self.store
            .query_by_page(self.view.page)
            .map(|annotation| layout_annotation(annotation, surface.extent(), &self.config))
            .collect()
    }

    /// Resize handles of the selected annotation, when it is an image on the current page
    pub fn handles(&self) -> Vec<ManipulationHandle> {
        let (Some(surface), Some(id)) = (self.view.surface, self.selection) else {
            return Vec::new();
        };
        match self.store.get(id) {
            Some(annotation) if annotation.is_image() && annotation.page() == self.view.page => {
                let layout = layout_annotation(annotation, surface.extent(), &self.config);
                generate_handles(&layout, self.config.handle_radius_px)
            }
            _ => Vec::new(),
        }
    }

    // Selection and tools

    pub fn selection(&self) -> Option<AnnotationId> {
        self.selection
    }

    /// Set or clear the single selection
    pub fn select(&mut self, id: Option<AnnotationId>) -> Result<(), EditorError> {
        if let Some(id) = id {
            if !self.store.contains(id) {
                return Err(StoreError::NotFound(id).into());
            }
        }
        self.set_selection(id);
        Ok(())
    }

    fn set_selection(&mut self, id: Option<AnnotationId>) {
        if self.selection != id {
            self.selection = id;
            self.emit(ViewEvent::SelectionChanged(id));
        }
    }

    pub fn tool(&self) -> Option<&PlacementTool> {
        self.tool.as_ref()
    }

    pub fn set_tool(&mut self, tool: Option<PlacementTool>) {
        self.tool = tool;
    }

    // Editing panel

    pub fn add(&mut self, annotation: Annotation) -> Result<AnnotationId, EditorError> {
        let id = self.store.add(annotation)?;
        self.emit(ViewEvent::AnnotationsChanged);
        Ok(id)
    }

    pub fn apply_edit(&mut self, id: AnnotationId, edit: AnnotationEdit) -> Result<(), EditorError> {
        self.store.apply_edit(id, edit)?;
        self.emit(ViewEvent::AnnotationsChanged);
        Ok(())
    }

    /// Delete by identity; clears the selection and ends any gesture on it
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let removed = self.store.remove(id)?;
        if self.interaction.annotation_id() == Some(id) {
            self.end_interaction();
        }
        if self.selection == Some(id) {
            self.set_selection(None);
        }
        self.emit(ViewEvent::AnnotationsChanged);
        Some(removed)
    }

    /// Rotate the selection by one step; returns the new rotation
    pub fn rotate_selected(&mut self, direction: RotationDirection) -> Result<Option<f32>, EditorError> {
        let Some(id) = self.selection else {
            return Ok(None);
        };
        let step = match direction {
            RotationDirection::Clockwise => self.config.rotation_step_deg,
            RotationDirection::CounterClockwise => -self.config.rotation_step_deg,
        };
        let mut rotation = 0.0;
        self.store.update(id, |annotation| {
            annotation.rotate_by(step);
            rotation = annotation.rotation;
        })?;
        self.emit(ViewEvent::AnnotationsChanged);
        Ok(Some(rotation))
    }

    // Pointer interaction

    /// Pointer-down in pointer space.
    ///
    /// Hit order: handles of the selected image, annotation bodies topmost
    /// first, then the surface background.
    pub fn pointer_down(&mut self, point: PixelPoint) -> PointerOutcome {
        if !self.interaction.is_idle() {
            return PointerOutcome::Ignored;
        }
        let Some(surface) = self.view.surface else {
            return PointerOutcome::Ignored;
        };
        let local = surface.local(point);

        if let Some(handle) = self.handles().into_iter().find(|h| h.hit_test(&local)) {
            return self.start_resize(surface, handle, local);
        }

        let hit = self.layout_page().into_iter().rev().find(|b| b.contains(local));
        if let Some(layout) = hit {
            return self.start_drag(surface, layout.annotation_id, point);
        }

        let percent = surface.to_percent(point);
        if !SurfaceRect::contains_percent(percent) {
            return match self.tool {
                Some(_) => {
                    tracing::debug!(x = percent.x, y = percent.y, "placement outside surface rejected");
                    PointerOutcome::Rejected
                }
                None => PointerOutcome::Ignored,
            };
        }

        match self.tool.take() {
            Some(tool) => self.place(tool, percent),
            None => {
                self.set_selection(None);
                PointerOutcome::SelectionCleared
            }
        }
    }

    fn start_resize(
        &mut self,
        surface: SurfaceRect,
        handle: ManipulationHandle,
        local: PixelPoint,
    ) -> PointerOutcome {
        let id = handle.annotation_id;
        let Some(annotation) = self.store.get(id) else {
            return PointerOutcome::Ignored;
        };
        let live = layout_annotation(annotation, surface.extent(), &self.config);
        let snapshot = ResizeSnapshot {
            pointer: local,
            width: live.width,
            height: live.height,
            extent: surface.extent(),
            origin: PercentPoint::new(annotation.x, annotation.y),
        };
        self.interaction = Interaction::Resizing(ResizeState::new(id, handle.handle_type, snapshot));
        self.set_selection(Some(id));
        tracing::debug!(annotation = %id, handle = ?handle.handle_type, "resize started");
        PointerOutcome::StartedResize(id, handle.handle_type)
    }

    fn start_drag(&mut self, surface: SurfaceRect, id: AnnotationId, point: PixelPoint) -> PointerOutcome {
        let Some(annotation) = self.store.get(id) else {
            return PointerOutcome::Ignored;
        };
        let origin = PercentPoint::new(annotation.x, annotation.y);
        self.interaction = Interaction::Dragging(DragState::new(id, origin, surface.to_percent(point)));
        self.set_selection(Some(id));
        tracing::debug!(annotation = %id, "drag started");
        PointerOutcome::StartedDrag(id)
    }

    fn place(&mut self, tool: PlacementTool, at: PercentPoint) -> PointerOutcome {
        let page = self.view.page;
        let annotation = match tool {
            PlacementTool::Text => Annotation::new_text(page, at.x, at.y, &self.config),
            PlacementTool::Image { src, alt } => {
                Annotation::new_image(page, at.x, at.y, src, alt, &self.config)
            }
        };
        match self.add(annotation) {
            Ok(id) => {
                self.set_selection(Some(id));
                tracing::debug!(annotation = %id, page, "annotation placed");
                PointerOutcome::Placed(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "placement failed");
                PointerOutcome::Ignored
            }
        }
    }

    /// Pointer-move in pointer space; returns whether an annotation was updated
    pub fn pointer_move(&mut self, point: PixelPoint) -> bool {
        let Some(surface) = self.view.surface else {
            return false;
        };
        let max = self.config.max_position_percent;
        let result = match self.interaction {
            Interaction::Idle => return false,
            Interaction::Dragging(drag) => {
                let position = drag.position_for(surface.to_percent(point), max);
                self.store.update(drag.annotation_id, |annotation| {
                    annotation.x = position.x;
                    annotation.y = position.y;
                })
            }
            Interaction::Resizing(resize) => {
                let geometry = resize.geometry_for(surface.local(point), self.config.min_resize_px, max);
                self.store.update(resize.annotation_id, |annotation| {
                    annotation.x = geometry.x;
                    annotation.y = geometry.y;
                    if let AnnotationKind::Image(image) = &mut annotation.kind {
                        image.width = geometry.width.into();
                        image.height = geometry.height.into();
                    }
                })
            }
        };

        match result {
            Ok(()) => {
                self.emit(ViewEvent::AnnotationsChanged);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "captured annotation vanished, ending interaction");
                self.end_interaction();
                false
            }
        }
    }

    /// Pointer-up anywhere ends the current gesture
    pub fn pointer_up(&mut self) -> bool {
        let active = !self.interaction.is_idle();
        self.end_interaction();
        active
    }

    fn end_interaction(&mut self) {
        if let Some(id) = self.interaction.annotation_id() {
            tracing::debug!(annotation = %id, "interaction ended");
        }
        self.interaction = Interaction::Idle;
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{Dimension, DimensionValue, Unit};

    struct FakeLoader(Result<Vec<PageSize>, DocumentError>);

    impl FakeLoader {
        fn pages(count: usize) -> Self {
            Self(Ok(vec![PageSize::new(612.0, 792.0); count]))
        }
    }

    impl DocumentLoader for FakeLoader {
        fn load(&mut self, _bytes: &[u8]) -> Result<Vec<PageSize>, DocumentError> {
            self.0.clone()
        }
    }

    struct FakeRenderer;

    impl PageRenderer for FakeRenderer {
        fn render_page(&mut self, page: u32, zoom: f32) -> Result<SurfaceExtent, DocumentError> {
            if page == 2 {
                return Err(DocumentError::Render {
                    page,
                    reason: "broken page".to_string(),
                });
            }
            Ok(SurfaceExtent::new(1000.0 * zoom, 500.0 * zoom))
        }
    }

    const ORIGIN: PixelPoint = PixelPoint { x: 100.0, y: 50.0 };

    fn editor() -> Editor {
        let mut editor = Editor::default();
        editor.load_document(&mut FakeLoader::pages(2), b"doc").unwrap();
        editor.render_current(&mut FakeRenderer, ORIGIN).unwrap();
        editor
    }

    /// Absolute pointer position for a surface-local pixel offset
    fn at(x: f32, y: f32) -> PixelPoint {
        PixelPoint::new(ORIGIN.x + x, ORIGIN.y + y)
    }

    fn add_image(editor: &mut Editor, x: f32, y: f32, size: &str) -> AnnotationId {
        let mut annotation = Annotation::new_image(1, x, y, "a.png", "", editor.config());
        if let AnnotationKind::Image(image) = &mut annotation.kind {
            image.width = DimensionValue::parse(size);
            image.height = DimensionValue::parse(size);
        }
        editor.add(annotation).unwrap()
    }

    #[test]
    fn test_placement_creates_and_selects() {
        let mut editor = editor();
        editor.set_tool(Some(PlacementTool::Text));

        let outcome = editor.pointer_down(at(250.0, 125.0));
        let PointerOutcome::Placed(id) = outcome else {
            panic!("expected placement, got {outcome:?}");
        };
        let annotation = editor.store().get(id).unwrap();
        assert!((annotation.x - 25.0).abs() < 1e-4);
        assert!((annotation.y - 25.0).abs() < 1e-4);
        assert_eq!(annotation.page(), 1);
        assert_eq!(editor.selection(), Some(id));
        // One-shot tool
        assert!(editor.tool().is_none());
    }

    #[test]
    fn test_placement_outside_surface_is_rejected() {
        let mut editor = editor();
        editor.set_tool(Some(PlacementTool::Image {
            src: "logo.png".to_string(),
            alt: String::new(),
        }));

        assert_eq!(editor.pointer_down(at(-10.0, 20.0)), PointerOutcome::Rejected);
        assert_eq!(editor.pointer_down(at(20.0, 501.0)), PointerOutcome::Rejected);
        assert!(editor.store().is_empty());
        assert!(editor.tool().is_some());
    }

    #[test]
    fn test_drag_moves_by_pointer_delta() {
        let mut editor = editor();
        let id = editor
            .add(Annotation::new_text(1, 10.0, 10.0, editor.config()))
            .unwrap();

        assert_eq!(editor.pointer_down(at(150.0, 55.0)), PointerOutcome::StartedDrag(id));
        assert!(editor.pointer_move(at(250.0, 105.0)));

        let annotation = editor.store().get(id).unwrap();
        // (100, 50) px on a 1000x500 surface is (10, 10) percent
        assert!((annotation.x - 20.0).abs() < 1e-3);
        assert!((annotation.y - 20.0).abs() < 1e-3);

        assert!(editor.pointer_up());
        assert!(editor.interaction().is_idle());
        assert!(!editor.pointer_move(at(400.0, 400.0)));
    }

    #[test]
    fn test_drag_clamps_to_surface() {
        let mut editor = editor();
        let id = editor
            .add(Annotation::new_text(1, 10.0, 10.0, editor.config()))
            .unwrap();
        editor.pointer_down(at(110.0, 55.0));
        editor.pointer_move(at(-5000.0, 5000.0));

        let annotation = editor.store().get(id).unwrap();
        assert_eq!(annotation.x, 0.0);
        assert_eq!(annotation.y, 99.9);
    }

    #[test]
    fn test_resize_from_bottom_right_handle() {
        let mut editor = editor();
        let id = add_image(&mut editor, 10.0, 10.0, "10%");
        editor.select(Some(id)).unwrap();

        // 100x50 px box with its top-left at (100, 50) local
        assert_eq!(
            editor.pointer_down(at(200.0, 100.0)),
            PointerOutcome::StartedResize(id, HandleType::BottomRight)
        );
        editor.pointer_move(at(300.0, 150.0));
        editor.pointer_up();

        let annotation = editor.store().get(id).unwrap();
        assert_eq!((annotation.x, annotation.y), (10.0, 10.0));
        let AnnotationKind::Image(image) = &annotation.kind else {
            panic!("expected image");
        };
        assert_eq!(image.width.as_dimension(), Some(Dimension::new(20.0, Unit::Percent)));
        assert_eq!(image.height.as_dimension(), Some(Dimension::new(20.0, Unit::Percent)));
    }

    #[test]
    fn test_text_has_no_resize_handles() {
        let mut editor = editor();
        let id = editor
            .add(Annotation::new_text(1, 10.0, 10.0, editor.config()))
            .unwrap();
        editor.select(Some(id)).unwrap();

        assert!(editor.handles().is_empty());
        assert_eq!(editor.pointer_down(at(100.0, 50.0)), PointerOutcome::StartedDrag(id));
    }

    #[test]
    fn test_only_one_interaction_at_a_time() {
        let mut editor = editor();
        let first = add_image(&mut editor, 10.0, 10.0, "10%");
        add_image(&mut editor, 50.0, 50.0, "10%");

        assert_eq!(editor.pointer_down(at(120.0, 60.0)), PointerOutcome::StartedDrag(first));
        assert_eq!(editor.pointer_down(at(520.0, 260.0)), PointerOutcome::Ignored);
        assert_eq!(editor.interaction().annotation_id(), Some(first));
    }

    #[test]
    fn test_topmost_annotation_wins() {
        let mut editor = editor();
        add_image(&mut editor, 10.0, 10.0, "10%");
        let top = add_image(&mut editor, 12.0, 12.0, "10%");

        assert_eq!(editor.pointer_down(at(150.0, 75.0)), PointerOutcome::StartedDrag(top));
    }

    #[test]
    fn test_background_click_clears_selection() {
        let mut editor = editor();
        let id = add_image(&mut editor, 10.0, 10.0, "10%");
        editor.select(Some(id)).unwrap();

        assert_eq!(editor.pointer_down(at(900.0, 450.0)), PointerOutcome::SelectionCleared);
        assert_eq!(editor.selection(), None);
    }

    #[test]
    fn test_removing_selected_clears_selection() {
        let mut editor = editor();
        let id = add_image(&mut editor, 10.0, 10.0, "10%");
        editor.pointer_down(at(120.0, 60.0));

        assert!(editor.remove(id).is_some());
        assert_eq!(editor.selection(), None);
        assert!(editor.interaction().is_idle());
        assert!(editor.remove(id).is_none());
    }

    #[test]
    fn test_rotate_selected_wraps() {
        let mut editor = editor();
        let id = add_image(&mut editor, 10.0, 10.0, "10%");
        assert_eq!(editor.rotate_selected(RotationDirection::Clockwise), Ok(None));

        editor.select(Some(id)).unwrap();
        editor
            .apply_edit(id, AnnotationEdit::Rotation(350.0))
            .unwrap();
        assert_eq!(editor.rotate_selected(RotationDirection::Clockwise), Ok(Some(5.0)));
        assert_eq!(
            editor.rotate_selected(RotationDirection::CounterClockwise),
            Ok(Some(350.0))
        );
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let mut editor = editor();
        let id = add_image(&mut editor, 10.0, 10.0, "10%");

        let mut broken = FakeLoader(Err(DocumentError::Load("truncated".to_string())));
        assert!(editor.load_document(&mut broken, b"junk").is_err());
        assert!(editor.load_document(&mut FakeLoader::pages(0), b"empty").is_err());
        assert!(editor.store().contains(id));
        assert_eq!(editor.page_count(), 2);
    }

    #[test]
    fn test_load_clears_store() {
        let mut editor = editor();
        let id = add_image(&mut editor, 10.0, 10.0, "10%");
        editor.select(Some(id)).unwrap();
        editor.set_page(2).unwrap();

        assert_eq!(editor.load_document(&mut FakeLoader::pages(3), b"next"), Ok(3));
        assert!(editor.store().is_empty());
        assert_eq!(editor.selection(), None);
        assert_eq!(editor.page(), 1);
        assert!(editor.surface().is_none());
    }

    #[test]
    fn test_latest_render_wins() {
        let mut editor = editor();
        let stale = editor.begin_render().unwrap();
        editor.set_zoom(2.0).unwrap();
        let latest = editor.begin_render().unwrap();

        let applied = editor
            .complete_render(latest, Ok(SurfaceExtent::new(2000.0, 1000.0)), ORIGIN)
            .unwrap();
        assert!(applied);
        let dropped = editor
            .complete_render(stale, Ok(SurfaceExtent::new(1000.0, 500.0)), ORIGIN)
            .unwrap();
        assert!(!dropped);
        assert_eq!(editor.surface().unwrap().width, 2000.0);
    }

    #[test]
    fn test_render_started_before_page_change_is_dropped() {
        let mut editor = editor();
        let ticket = editor.begin_render().unwrap();
        editor.set_page(2).unwrap();

        let applied = editor
            .complete_render(ticket, Ok(SurfaceExtent::new(612.0, 792.0)), ORIGIN)
            .unwrap();
        assert!(!applied);
        assert_eq!(editor.page(), 2);
        assert!(editor.surface().is_none());
    }

    #[test]
    fn test_render_started_before_load_is_dropped() {
        let mut editor = editor();
        let ticket = editor.begin_render().unwrap();
        editor.load_document(&mut FakeLoader::pages(1), b"next").unwrap();

        let applied = editor
            .complete_render(ticket, Ok(SurfaceExtent::new(1000.0, 500.0)), ORIGIN)
            .unwrap();
        assert!(!applied);
        assert!(editor.surface().is_none());
    }

    #[test]
    fn test_degenerate_render_extent_is_rejected() {
        let mut editor = editor();
        for extent in [SurfaceExtent::new(0.0, 500.0), SurfaceExtent::new(f32::NAN, 500.0)] {
            let ticket = editor.begin_render().unwrap();
            let err = editor.complete_render(ticket, Ok(extent), ORIGIN).unwrap_err();
            assert!(matches!(err, EditorError::InvalidSurface { .. }));
            assert!(editor.surface().is_none());
        }
    }

    #[test]
    fn test_render_failure_leaves_surface_empty() {
        let mut editor = editor();
        add_image(&mut editor, 10.0, 10.0, "10%");
        editor.set_page(2).unwrap();

        let err = editor.render_current(&mut FakeRenderer, ORIGIN).unwrap_err();
        assert!(matches!(err, EditorError::Document(DocumentError::Render { page: 2, .. })));
        assert!(editor.surface().is_none());
        assert!(editor.layout_page().is_empty());
        assert_eq!(editor.store().len(), 1);
    }

    #[test]
    fn test_layout_follows_zoom_without_rescaling_store() {
        let mut editor = editor();
        let id = add_image(&mut editor, 10.0, 10.0, "10%");
        let before = editor.layout_page()[0];

        editor.set_zoom(2.0).unwrap();
        editor.render_current(&mut FakeRenderer, ORIGIN).unwrap();
        let after = editor.layout_page()[0];

        assert_eq!(after.width, before.width * 2.0);
        assert_eq!(after.left, before.left * 2.0);
        assert_eq!(editor.store().get(id).unwrap().x, 10.0);
    }

    #[test]
    fn test_view_validation() {
        let mut editor = Editor::default();
        assert_eq!(editor.set_page(1), Err(EditorError::NoDocument));
        assert!(editor.begin_render().is_err());

        let mut editor = self::editor();
        assert_eq!(
            editor.set_page(3),
            Err(EditorError::InvalidPage { page: 3, count: 2 })
        );
        assert!(matches!(editor.set_zoom(0.0), Err(EditorError::InvalidZoom(_))));
    }

    #[test]
    fn test_subscribers_receive_view_events() {
        let mut editor = Editor::default();
        let events = editor.subscribe();
        editor.load_document(&mut FakeLoader::pages(2), b"doc").unwrap();
        editor.set_page(2).unwrap();
        editor.set_zoom(1.5).unwrap();

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                ViewEvent::DocumentLoaded { page_count: 2 },
                ViewEvent::AnnotationsChanged,
                ViewEvent::PageChanged(1),
                ViewEvent::PageChanged(2),
                ViewEvent::ZoomChanged(1.5),
            ]
        );

        drop(events);
        editor.set_zoom(2.0).unwrap();
        assert!(editor.subscribers.is_empty());
    }
}
