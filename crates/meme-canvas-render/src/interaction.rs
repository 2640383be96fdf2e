use meme_canvas::{MemePatch, MemeState, MemeStyle};

use crate::render_ir::ActiveGuides;

/// Drag hit-testing and snapping constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InteractionConfig {
    /// Vertical distance, in canvas units, within which a caption anchor is
    /// grabbed.
    pub hit_tolerance: f32,
    /// Percent distance within which an anchor snaps to a guide.
    pub snap_threshold: f32,
    /// Horizontal snap points, tried in order; the first match wins.
    pub snap_points_x: [f32; 3],
    /// Vertical snap point.
    pub snap_point_y: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hit_tolerance: 60.0,
            snap_threshold: 3.0,
            snap_points_x: [5.0, 50.0, 95.0],
            snap_point_y: 50.0,
        }
    }
}

impl InteractionConfig {
    pub fn with_hit_tolerance(mut self, tolerance: f32) -> Self {
        self.hit_tolerance = tolerance;
        self
    }

    pub fn with_snap_threshold(mut self, threshold: f32) -> Self {
        self.snap_threshold = threshold;
        self
    }
}

/// What a drag gesture moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragTarget {
    Top,
    Bottom,
    Image,
}

/// Pointer position in client (display) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClientPoint {
    pub x: f32,
    pub y: f32,
}

impl ClientPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Where the canvas is displayed and how large its backing store is.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CanvasViewport {
    /// Client x of the displayed canvas' left edge.
    pub left: f32,
    /// Client y of the displayed canvas' top edge.
    pub top: f32,
    pub display_width: f32,
    pub display_height: f32,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl CanvasViewport {
    /// Viewport showing the canvas at 1:1 at the client origin.
    pub fn unscaled(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            display_width: canvas_width as f32,
            display_height: canvas_height as f32,
            canvas_width,
            canvas_height,
        }
    }

    fn is_degenerate(&self) -> bool {
        !(self.display_width.is_finite()
            && self.display_height.is_finite()
            && self.display_width > 0.0
            && self.display_height > 0.0)
    }

    /// Map a client point into canvas units.
    pub fn to_canvas(&self, point: ClientPoint) -> Option<(f32, f32)> {
        if self.is_degenerate() {
            return None;
        }
        let scale_x = self.canvas_width as f32 / self.display_width;
        let scale_y = self.canvas_height as f32 / self.display_height;
        Some((
            (point.x - self.left) * scale_x,
            (point.y - self.top) * scale_y,
        ))
    }

    /// Map a client point into percent of the displayed canvas.
    pub fn to_percent(&self, point: ClientPoint) -> Option<(f32, f32)> {
        if self.is_degenerate() {
            return None;
        }
        Some((
            (point.x - self.left) / self.display_width * 100.0,
            (point.y - self.top) / self.display_height * 100.0,
        ))
    }
}

/// Result of a touch event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TouchOutcome {
    pub patch: Option<MemePatch>,
    /// The host should suppress native scrolling for this event.
    pub prevent_default: bool,
}

/// Pointer/touch state machine: `Idle -> Dragging(target) -> Idle`.
#[derive(Clone, Debug, Default)]
pub struct InteractionController {
    cfg: InteractionConfig,
    dragging: Option<DragTarget>,
    last_pointer: Option<ClientPoint>,
    guides: ActiveGuides,
}

impl InteractionController {
    pub fn new(cfg: InteractionConfig) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.cfg
    }

    /// Current drag target, if any.
    pub fn dragging(&self) -> Option<DragTarget> {
        self.dragging
    }

    /// Snapped guides to draw; only reported while a caption is dragged.
    pub fn active_guides(&self) -> Option<&ActiveGuides> {
        match self.dragging {
            Some(DragTarget::Top | DragTarget::Bottom) => Some(&self.guides),
            _ => None,
        }
    }

    /// Start a drag. Captions are only grabbable in classic style; anything
    /// else drags the image.
    pub fn pointer_down(
        &mut self,
        point: ClientPoint,
        viewport: &CanvasViewport,
        state: &MemeState,
    ) -> Option<DragTarget> {
        let (_, y) = viewport.to_canvas(point)?;
        self.guides = ActiveGuides::default();

        if state.style == MemeStyle::Classic {
            let height = viewport.canvas_height as f32;
            let top_y = height * state.top_offset / 100.0;
            let bottom_y = height * state.bottom_offset / 100.0;
            if (y - top_y).abs() < self.cfg.hit_tolerance {
                return self.begin(DragTarget::Top, None);
            }
            if (y - bottom_y).abs() < self.cfg.hit_tolerance {
                return self.begin(DragTarget::Bottom, None);
            }
        }
        self.begin(DragTarget::Image, Some(point))
    }

    fn begin(&mut self, target: DragTarget, pointer: Option<ClientPoint>) -> Option<DragTarget> {
        log::debug!("drag start: {:?}", target);
        self.dragging = Some(target);
        self.last_pointer = pointer;
        Some(target)
    }

    /// Continue a drag; emits an update for every move while dragging.
    pub fn pointer_move(
        &mut self,
        point: ClientPoint,
        viewport: &CanvasViewport,
        state: &MemeState,
    ) -> Option<MemePatch> {
        match self.dragging? {
            DragTarget::Image => {
                let last = self.last_pointer?;
                let dx = point.x - last.x;
                let dy = point.y - last.y;
                if !(dx.is_finite() && dy.is_finite()) {
                    return None;
                }
                self.last_pointer = Some(point);
                let (x_offset, y_offset) = state.image_offset();
                Some(MemePatch {
                    image_x_offset: Some(x_offset + dx),
                    image_y_offset: Some(y_offset + dy),
                    ..MemePatch::default()
                })
            }
            target @ (DragTarget::Top | DragTarget::Bottom) => {
                let (x, y) = viewport.to_percent(point)?;
                if !(x.is_finite() && y.is_finite()) {
                    return None;
                }
                let other_x = match target {
                    DragTarget::Top => state.bottom_anchor_x(),
                    _ => state.top_anchor_x(),
                };
                let (x, y, guides) = self.snap(x, y, other_x);
                self.guides = guides;
                let x = x.clamp(0.0, 100.0);
                let y = y.clamp(0.0, 100.0);
                Some(match target {
                    DragTarget::Top => MemePatch {
                        top_offset: Some(y),
                        top_x: Some(x),
                        ..MemePatch::default()
                    },
                    _ => MemePatch {
                        bottom_offset: Some(y),
                        bottom_x: Some(x),
                        ..MemePatch::default()
                    },
                })
            }
        }
    }

    fn snap(&self, mut x: f32, mut y: f32, other_x: f32) -> (f32, f32, ActiveGuides) {
        let threshold = self.cfg.snap_threshold;
        let mut guides = ActiveGuides::default();
        if let Some(point) = self
            .cfg
            .snap_points_x
            .into_iter()
            .find(|point| (x - point).abs() < threshold)
        {
            x = point;
            guides.x = Some(point);
        }
        if (x - other_x).abs() < threshold {
            x = other_x;
            guides.x = Some(other_x);
        }
        if (y - self.cfg.snap_point_y).abs() < threshold {
            y = self.cfg.snap_point_y;
            guides.y = Some(y);
        }
        (x, y, guides)
    }

    /// End a drag. Returns the state to commit when a drag was active.
    pub fn pointer_up(&mut self, state: &MemeState) -> Option<MemeState> {
        let was_dragging = self.dragging.take();
        self.last_pointer = None;
        self.guides = ActiveGuides::default();
        was_dragging.map(|target| {
            log::debug!("drag end: {:?}", target);
            state.clone()
        })
    }

    /// Pointer left the canvas; same as releasing it.
    pub fn pointer_leave(&mut self, state: &MemeState) -> Option<MemeState> {
        self.pointer_up(state)
    }

    /// Touch start, using the first touch point.
    pub fn touch_start(
        &mut self,
        touches: &[ClientPoint],
        viewport: &CanvasViewport,
        state: &MemeState,
    ) -> TouchOutcome {
        let Some(first) = touches.first() else {
            return TouchOutcome::default();
        };
        TouchOutcome {
            patch: None,
            prevent_default: self.pointer_down(*first, viewport, state).is_some(),
        }
    }

    /// Touch move, using the first touch point.
    pub fn touch_move(
        &mut self,
        touches: &[ClientPoint],
        viewport: &CanvasViewport,
        state: &MemeState,
    ) -> TouchOutcome {
        let Some(first) = touches.first() else {
            return TouchOutcome::default();
        };
        let patch = self.pointer_move(*first, viewport, state);
        TouchOutcome {
            prevent_default: patch.is_some(),
            patch,
        }
    }

    pub fn touch_end(&mut self, state: &MemeState) -> Option<MemeState> {
        self.pointer_up(state)
    }
}
