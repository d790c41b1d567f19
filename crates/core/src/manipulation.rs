//! Annotation manipulation handles and pointer interactions
//!
//! Provides corner handles for resizing image annotations and the captured
//! context for drag and resize gestures. The geometry math here is pure; the
//! editor owns the state and writes results back to the store.

use crate::annotation::AnnotationId;
use crate::coords::{clamp_position, LayoutBox, PercentPoint, PixelPoint, SurfaceExtent};
use crate::dimension::Dimension;

/// Corner handle of a selected image annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HandleType {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl HandleType {
    pub const ALL: [HandleType; 4] = [
        HandleType::TopLeft,
        HandleType::TopRight,
        HandleType::BottomLeft,
        HandleType::BottomRight,
    ];

    /// Handle sits on the left edge and drags it
    fn moves_left_edge(self) -> bool {
        matches!(self, HandleType::TopLeft | HandleType::BottomLeft)
    }

    /// Handle sits on the top edge and drags it
    fn moves_top_edge(self) -> bool {
        matches!(self, HandleType::TopLeft | HandleType::TopRight)
    }
}

/// Manipulation handle with position and type
#[derive(Debug, Clone, Copy)]
pub struct ManipulationHandle {
    /// Type of handle
    pub handle_type: HandleType,

    /// Position in surface-local pixels
    pub position: PixelPoint,

    /// Radius of the hit area in pixels
    pub size: f32,

    /// Associated annotation ID
    pub annotation_id: AnnotationId,
}

impl ManipulationHandle {
    /// Check if a surface-local point hits this handle
    pub fn hit_test(&self, point: &PixelPoint) -> bool {
        point.distance_to(&self.position) <= self.size
    }
}

/// Generate the four corner handles for a laid-out annotation.
///
/// Corners follow the box's rotation so they stay under the rendered corners.
pub fn generate_handles(layout: &LayoutBox, handle_size: f32) -> Vec<ManipulationHandle> {
    HandleType::ALL
        .into_iter()
        .map(|handle_type| {
            let offset = match handle_type {
                HandleType::TopLeft => PixelPoint::new(0.0, 0.0),
                HandleType::TopRight => PixelPoint::new(layout.width, 0.0),
                HandleType::BottomLeft => PixelPoint::new(0.0, layout.height),
                HandleType::BottomRight => PixelPoint::new(layout.width, layout.height),
            };
            ManipulationHandle {
                handle_type,
                position: layout.corner(offset),
                size: handle_size,
                annotation_id: layout.annotation_id,
            }
        })
        .collect()
}

/// Drag in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub annotation_id: AnnotationId,
    /// Vector from the annotation's top-left corner to the pointer-down point, in percent
    pub grab_offset: PercentPoint,
}

impl DragState {
    pub fn new(annotation_id: AnnotationId, origin: PercentPoint, pointer: PercentPoint) -> Self {
        Self {
            annotation_id,
            grab_offset: PercentPoint::new(pointer.x - origin.x, pointer.y - origin.y),
        }
    }

    /// New top-left for the current pointer, clamped per axis
    pub fn position_for(&self, pointer: PercentPoint, max_percent: f32) -> PercentPoint {
        PercentPoint::new(
            clamp_position(pointer.x - self.grab_offset.x, max_percent),
            clamp_position(pointer.y - self.grab_offset.y, max_percent),
        )
    }
}

/// Geometry captured when a resize starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSnapshot {
    /// Pointer-down position, surface-local pixels
    pub pointer: PixelPoint,
    /// Live rendered box size in pixels
    pub width: f32,
    pub height: f32,
    /// Surface extent at resize start
    pub extent: SurfaceExtent,
    /// Starting top-left, percent
    pub origin: PercentPoint,
}

/// Resize in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeState {
    pub annotation_id: AnnotationId,
    pub handle: HandleType,
    pub snapshot: ResizeSnapshot,
}

/// Outcome of one resize step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizedGeometry {
    pub x: f32,
    pub y: f32,
    pub width: Dimension,
    pub height: Dimension,
}

/// One axis of a resize, in pixels and percent of that axis' extent
struct AxisResize {
    start: f32,
    size: f32,
    extent: f32,
}

impl AxisResize {
    /// Returns the new (position percent, size px)
    fn apply(&self, delta: f32, moves_near_edge: bool, min_size: f32, max_percent: f32) -> (f32, f32) {
        let to_percent = |px: f32| px / self.extent * 100.0;
        let to_px = |percent: f32| percent / 100.0 * self.extent;

        if moves_near_edge {
            // Far edge stays pinned where it was at resize start
            let far_edge = self.start + to_percent(self.size);
            let mut size = (self.size - delta).max(min_size);
            let mut position = far_edge - to_percent(size);
            if position < 0.0 {
                position = 0.0;
                size = to_px(far_edge).max(min_size);
            }
            let position = clamp_position(position.min(max_percent - to_percent(size)), max_percent);
            (position, size)
        } else {
            // Position never moves; the size is capped at the clamp edge, so a box
            // already overhanging it shrinks to fit on the first step
            let available = to_px(max_percent - self.start).max(min_size);
            let size = (self.size + delta).max(min_size).min(available);
            (self.start, size)
        }
    }
}

impl ResizeState {
    pub fn new(annotation_id: AnnotationId, handle: HandleType, snapshot: ResizeSnapshot) -> Self {
        Self {
            annotation_id,
            handle,
            snapshot,
        }
    }

    /// Geometry for the current pointer position (surface-local pixels)
    pub fn geometry_for(&self, pointer: PixelPoint, min_size: f32, max_percent: f32) -> ResizedGeometry {
        let snapshot = &self.snapshot;
        let delta_x = pointer.x - snapshot.pointer.x;
        let delta_y = pointer.y - snapshot.pointer.y;

        let horizontal = AxisResize {
            start: snapshot.origin.x,
            size: snapshot.width,
            extent: snapshot.extent.width,
        };
        let vertical = AxisResize {
            start: snapshot.origin.y,
            size: snapshot.height,
            extent: snapshot.extent.height,
        };

        let (x, width) = horizontal.apply(
            delta_x,
            self.handle.moves_left_edge(),
            min_size,
            max_percent,
        );
        let (y, height) = vertical.apply(
            delta_y,
            self.handle.moves_top_edge(),
            min_size,
            max_percent,
        );

        ResizedGeometry {
            x,
            y,
            width: Dimension::percent(width / snapshot.extent.width * 100.0),
            height: Dimension::percent(height / snapshot.extent.height * 100.0),
        }
    }
}

/// Pointer interaction state
///
/// Pointer-move and pointer-up are only captured while not `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging(DragState),
    Resizing(ResizeState),
}

impl Interaction {
    pub fn is_idle(&self) -> bool {
        matches!(self, Interaction::Idle)
    }

    /// Annotation currently captured by a drag or resize
    pub fn annotation_id(&self) -> Option<AnnotationId> {
        match self {
            Interaction::Idle => None,
            Interaction::Dragging(drag) => Some(drag.annotation_id),
            Interaction::Resizing(resize) => Some(resize.annotation_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Unit;

    const MAX: f32 = 99.9;
    const MIN: f32 = 20.0;

    fn resize(handle: HandleType) -> ResizeState {
        // 100x50 px box at (10%, 10%) on a 1000x500 surface
        ResizeState::new(
            AnnotationId::new_v4(),
            handle,
            ResizeSnapshot {
                pointer: PixelPoint::new(200.0, 100.0),
                width: 100.0,
                height: 50.0,
                extent: SurfaceExtent::new(1000.0, 500.0),
                origin: PercentPoint::new(10.0, 10.0),
            },
        )
    }

    #[test]
    fn test_handle_hit_test() {
        let handle = ManipulationHandle {
            handle_type: HandleType::TopLeft,
            position: PixelPoint::new(100.0, 100.0),
            size: 6.0,
            annotation_id: AnnotationId::new_v4(),
        };
        assert!(handle.hit_test(&PixelPoint::new(103.0, 104.0)));
        assert!(!handle.hit_test(&PixelPoint::new(120.0, 120.0)));
    }

    #[test]
    fn test_generate_handles_on_corners() {
        let layout = LayoutBox {
            annotation_id: AnnotationId::new_v4(),
            left: 10.0,
            top: 20.0,
            width: 100.0,
            height: 50.0,
            rotation: 0.0,
        };
        let handles = generate_handles(&layout, 6.0);
        assert_eq!(handles.len(), 4);
        let bottom_right = handles
            .iter()
            .find(|h| h.handle_type == HandleType::BottomRight)
            .unwrap();
        assert_eq!(bottom_right.position, PixelPoint::new(110.0, 70.0));
    }

    #[test]
    fn test_drag_preserves_grab_offset() {
        let drag = DragState::new(
            AnnotationId::new_v4(),
            PercentPoint::new(10.0, 20.0),
            PercentPoint::new(15.0, 22.0),
        );
        let moved = drag.position_for(PercentPoint::new(35.0, 52.0), MAX);
        assert!((moved.x - 30.0).abs() < 1e-4);
        assert!((moved.y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_drag_clamps_each_axis() {
        let drag = DragState::new(
            AnnotationId::new_v4(),
            PercentPoint::new(10.0, 10.0),
            PercentPoint::new(10.0, 10.0),
        );
        let moved = drag.position_for(PercentPoint::new(-20.0, 140.0), MAX);
        assert_eq!(moved, PercentPoint::new(0.0, MAX));
    }

    #[test]
    fn test_bottom_right_never_moves_origin() {
        let state = resize(HandleType::BottomRight);
        let geometry = state.geometry_for(PixelPoint::new(300.0, 150.0), MIN, MAX);
        assert_eq!((geometry.x, geometry.y), (10.0, 10.0));
        assert_eq!(geometry.width, Dimension::new(20.0, Unit::Percent));
        assert_eq!(geometry.height, Dimension::new(20.0, Unit::Percent));

        // Growing past the page edge caps the size instead of moving the origin
        let huge = state.geometry_for(PixelPoint::new(5000.0, 5000.0), MIN, MAX);
        assert_eq!((huge.x, huge.y), (10.0, 10.0));
        assert_eq!(huge.width, Dimension::percent(89.9));
    }

    #[test]
    fn test_right_handle_fits_overhanging_box_to_clamp_edge() {
        // 200 px wide box at 90% of a 1000 px surface overhangs the edge
        let state = ResizeState::new(
            AnnotationId::new_v4(),
            HandleType::BottomRight,
            ResizeSnapshot {
                pointer: PixelPoint::new(1000.0, 100.0),
                width: 200.0,
                height: 50.0,
                extent: SurfaceExtent::new(1000.0, 500.0),
                origin: PercentPoint::new(90.0, 10.0),
            },
        );
        let geometry = state.geometry_for(PixelPoint::new(1001.0, 100.0), MIN, MAX);
        assert_eq!((geometry.x, geometry.y), (90.0, 10.0));
        assert_eq!(geometry.width.unit, Unit::Percent);
        assert!((geometry.width.value - 9.9).abs() < 1e-3);
    }

    #[test]
    fn test_top_left_moves_origin_and_pins_far_corner() {
        let state = resize(HandleType::TopLeft);
        let geometry = state.geometry_for(PixelPoint::new(150.0, 75.0), MIN, MAX);
        // Dragged up-left by (50, 25) px: grows by the negated delta
        assert!((geometry.x - 5.0).abs() < 1e-4);
        assert!((geometry.y - 5.0).abs() < 1e-4);
        assert_eq!(geometry.width, Dimension::new(15.0, Unit::Percent));
        assert_eq!(geometry.height, Dimension::new(15.0, Unit::Percent));
    }

    #[test]
    fn test_minimum_size_floor() {
        let state = resize(HandleType::TopLeft);
        let geometry = state.geometry_for(PixelPoint::new(900.0, 400.0), MIN, MAX);
        assert_eq!(geometry.width, Dimension::new(2.0, Unit::Percent));
        assert_eq!(geometry.height, Dimension::new(4.0, Unit::Percent));
        // Far corner (20%, 20%) stays where it was
        assert!((geometry.x - 18.0).abs() < 1e-4);
        assert!((geometry.y - 16.0).abs() < 1e-4);
    }

    #[test]
    fn test_top_left_cannot_push_origin_negative() {
        let state = resize(HandleType::TopLeft);
        let geometry = state.geometry_for(PixelPoint::new(-500.0, -500.0), MIN, MAX);
        assert_eq!((geometry.x, geometry.y), (0.0, 0.0));
        assert_eq!(geometry.width, Dimension::new(20.0, Unit::Percent));
        assert_eq!(geometry.height, Dimension::new(20.0, Unit::Percent));
    }

    #[test]
    fn test_mixed_handles() {
        let top_right = resize(HandleType::TopRight).geometry_for(PixelPoint::new(250.0, 75.0), MIN, MAX);
        assert_eq!(top_right.x, 10.0);
        assert!((top_right.y - 5.0).abs() < 1e-4);
        assert_eq!(top_right.width, Dimension::new(15.0, Unit::Percent));

        let bottom_left = resize(HandleType::BottomLeft).geometry_for(PixelPoint::new(150.0, 125.0), MIN, MAX);
        assert!((bottom_left.x - 5.0).abs() < 1e-4);
        assert_eq!(bottom_left.y, 10.0);
        assert_eq!(bottom_left.height, Dimension::new(15.0, Unit::Percent));
    }

    #[test]
    fn test_interaction_reports_captured_annotation() {
        assert!(Interaction::default().is_idle());
        let state = resize(HandleType::BottomLeft);
        let interaction = Interaction::Resizing(state);
        assert_eq!(interaction.annotation_id(), Some(state.annotation_id));
    }
}
