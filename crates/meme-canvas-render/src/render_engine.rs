use core::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use meme_canvas::{MemePatch, MemeState};

use crate::interaction::{
    CanvasViewport, ClientPoint, DragTarget, InteractionConfig, InteractionController,
    TouchOutcome,
};
use crate::render_ir::{ImageSize, MemeFrame};
use crate::render_layout::LayoutEngine;

/// Identifies one image load; only the latest ticket is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Single-slot generation counter enforcing "last load wins".
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadGuard {
    generation: u64,
}

impl LoadGuard {
    /// Issue a ticket for a new load, superseding every earlier one.
    pub fn begin(&mut self) -> LoadTicket {
        self.generation = self.generation.wrapping_add(1);
        LoadTicket(self.generation)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Make every outstanding ticket stale.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Image load the host must perform and report back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    /// Image reference from the state.
    pub image: String,
}

/// What the canvas currently shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CanvasStatus {
    /// No image selected.
    Placeholder,
    /// Waiting for the current image to decode.
    Loading,
    /// Frame available.
    Ready,
    /// Last load failed; replaced by the next successful load.
    Failed(String),
}

/// Runtime diagnostics from the composition session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionDiagnostic {
    /// Time spent composing one frame.
    ComposeTimeUs(u32),
    /// A load completed after being superseded.
    StaleLoadDiscarded { generation: u64 },
    LoadFailed(String),
    /// The composed canvas exceeded the configured pixel budget.
    CanvasTooLarge { width: u32, height: u32, limit: u64 },
}

type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(SessionDiagnostic) + Send + 'static>>>;

/// Client-space rectangle the canvas is displayed in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Reactive composition state: current meme, load tracking, drag state, and
/// the last composed frame.
///
/// Every state change marks the session dirty; [`CompositionSession::frame`]
/// recomputes the whole frame when needed. Nothing is drawn until the
/// current image size is known.
pub struct CompositionSession {
    layout: LayoutEngine,
    interaction: InteractionController,
    state: MemeState,
    image_size: Option<ImageSize>,
    status: CanvasStatus,
    guard: LoadGuard,
    pending_request: Option<LoadRequest>,
    frame: Option<MemeFrame>,
    canvas_rejected: bool,
    dirty: bool,
    revision: u64,
    diagnostic_sink: Option<DiagnosticCallback>,
}

impl fmt::Debug for CompositionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionSession")
            .field("status", &self.status)
            .field("image_size", &self.image_size)
            .field("dirty", &self.dirty)
            .field("revision", &self.revision)
            .field("dragging", &self.interaction.dragging())
            .finish()
    }
}

impl CompositionSession {
    /// Create a session. When `state` has an image a load request is queued;
    /// fetch it with [`CompositionSession::take_load_request`].
    pub fn new(layout: LayoutEngine, interaction: InteractionConfig, state: MemeState) -> Self {
        let mut session = Self {
            layout,
            interaction: InteractionController::new(interaction),
            state: MemeState::default(),
            image_size: None,
            status: CanvasStatus::Placeholder,
            guard: LoadGuard::default(),
            pending_request: None,
            frame: None,
            canvas_rejected: false,
            dirty: true,
            revision: 0,
            diagnostic_sink: None,
        };
        session.replace_state(state, true);
        session
    }

    /// Register a diagnostics callback.
    pub fn with_diagnostic_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(SessionDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
        self
    }

    fn emit_diagnostic(&self, diagnostic: SessionDiagnostic) {
        if let Some(sink) = &self.diagnostic_sink {
            if let Ok(mut cb) = sink.lock() {
                cb(diagnostic);
            }
        }
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut LayoutEngine {
        self.dirty = true;
        &mut self.layout
    }

    pub fn state(&self) -> &MemeState {
        &self.state
    }

    pub fn status(&self) -> &CanvasStatus {
        &self.status
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumped on every change that affects the frame.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dragging(&self) -> Option<DragTarget> {
        self.interaction.dragging()
    }

    /// Replace the whole state.
    pub fn set_state(&mut self, state: MemeState) {
        self.replace_state(state, false);
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: &MemePatch) {
        if patch.is_empty() {
            return;
        }
        let next = self.state.apply(patch);
        self.replace_state(next, false);
    }

    fn replace_state(&mut self, next: MemeState, force_load: bool) {
        if !force_load && next == self.state {
            return;
        }
        let image_changed = force_load || next.image != self.state.image;
        self.state = next;
        if image_changed {
            self.image_size = None;
            self.frame = None;
            match &self.state.image {
                Some(image) => {
                    let ticket = self.guard.begin();
                    log::debug!("image load {} requested", ticket.0);
                    self.pending_request = Some(LoadRequest {
                        ticket,
                        image: image.clone(),
                    });
                    self.status = CanvasStatus::Loading;
                }
                None => {
                    self.guard.invalidate();
                    self.pending_request = None;
                    self.status = CanvasStatus::Placeholder;
                }
            }
        }
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Take the queued image load, if any.
    pub fn take_load_request(&mut self) -> Option<LoadRequest> {
        self.pending_request.take()
    }

    /// True when `ticket` still belongs to the current image.
    pub fn is_current_load(&self, ticket: LoadTicket) -> bool {
        self.guard.is_current(ticket)
    }

    /// Report a finished load. Returns `false` when the result was stale and
    /// discarded.
    pub fn complete_load<E: fmt::Display>(
        &mut self,
        ticket: LoadTicket,
        result: Result<ImageSize, E>,
    ) -> bool {
        if !self.guard.is_current(ticket) {
            log::debug!("discarding stale image load {}", ticket.0);
            self.emit_diagnostic(SessionDiagnostic::StaleLoadDiscarded {
                generation: ticket.0,
            });
            return false;
        }
        match result {
            Ok(size) => {
                self.image_size = Some(size);
                self.status = CanvasStatus::Ready;
            }
            Err(err) => {
                let message = err.to_string();
                log::warn!("image load failed: {}", message);
                self.image_size = None;
                self.frame = None;
                self.status = CanvasStatus::Failed(message.clone());
                self.emit_diagnostic(SessionDiagnostic::LoadFailed(message));
            }
        }
        self.mark_dirty();
        true
    }

    /// Current frame, recomposed if anything changed.
    ///
    /// `None` until the current image size is known.
    ///
    /// A frame larger than the layout's canvas budget is rejected: the status
    /// becomes [`CanvasStatus::Failed`] until a change brings it back within
    /// budget.
    pub fn frame(&mut self) -> Option<&MemeFrame> {
        let image = self.image_size?;
        if self.dirty || (self.frame.is_none() && !self.canvas_rejected) {
            let started = Instant::now();
            let guides = self.interaction.active_guides().copied();
            let frame = self.layout.compose(image, &self.state, guides.as_ref());
            let elapsed = started.elapsed().as_micros().min(u32::MAX as u128) as u32;
            self.emit_diagnostic(SessionDiagnostic::ComposeTimeUs(elapsed));
            self.dirty = false;
            let config = self.layout.config();
            if config.canvas_fits(frame.width, frame.height) {
                self.canvas_rejected = false;
                if matches!(self.status, CanvasStatus::Failed(_)) {
                    self.status = CanvasStatus::Ready;
                }
                self.frame = Some(frame);
            } else {
                let limit = config.max_canvas_pixels;
                log::warn!(
                    "canvas {}x{} exceeds the {} pixel limit",
                    frame.width,
                    frame.height,
                    limit
                );
                self.status = CanvasStatus::Failed(format!(
                    "canvas {}x{} exceeds the {} pixel limit",
                    frame.width, frame.height, limit
                ));
                self.emit_diagnostic(SessionDiagnostic::CanvasTooLarge {
                    width: frame.width,
                    height: frame.height,
                    limit,
                });
                self.canvas_rejected = true;
                self.frame = None;
            }
        }
        self.frame.as_ref()
    }

    /// Last composed frame without recomputing.
    pub fn cached_frame(&self) -> Option<&MemeFrame> {
        self.frame.as_ref()
    }

    fn viewport(&mut self, display: DisplayRect) -> Option<CanvasViewport> {
        let frame = self.frame()?;
        Some(CanvasViewport {
            left: display.left,
            top: display.top,
            display_width: display.width,
            display_height: display.height,
            canvas_width: frame.width,
            canvas_height: frame.height,
        })
    }

    /// Pointer pressed over the displayed canvas. Ignored until a frame
    /// exists.
    pub fn pointer_down(&mut self, point: ClientPoint, display: DisplayRect) -> Option<DragTarget> {
        let viewport = self.viewport(display)?;
        let target = self.interaction.pointer_down(point, &viewport, &self.state);
        if target.is_some() {
            self.mark_dirty();
        }
        target
    }

    /// Pointer moved; applies and returns the resulting update.
    pub fn pointer_move(&mut self, point: ClientPoint, display: DisplayRect) -> Option<MemePatch> {
        self.interaction.dragging()?;
        let viewport = self.viewport(display)?;
        let patch = self
            .interaction
            .pointer_move(point, &viewport, &self.state)?;
        self.state = self.state.apply(&patch);
        self.mark_dirty();
        Some(patch)
    }

    /// Pointer released; returns the state to commit to history.
    pub fn pointer_up(&mut self) -> Option<MemeState> {
        let committed = self.interaction.pointer_up(&self.state);
        if committed.is_some() {
            self.mark_dirty();
        }
        committed
    }

    pub fn pointer_leave(&mut self) -> Option<MemeState> {
        self.pointer_up()
    }

    pub fn touch_start(&mut self, touches: &[ClientPoint], display: DisplayRect) -> TouchOutcome {
        let Some(viewport) = self.viewport(display) else {
            return TouchOutcome::default();
        };
        let outcome = self.interaction.touch_start(touches, &viewport, &self.state);
        if outcome.prevent_default {
            self.mark_dirty();
        }
        outcome
    }

    pub fn touch_move(&mut self, touches: &[ClientPoint], display: DisplayRect) -> TouchOutcome {
        if self.interaction.dragging().is_none() {
            return TouchOutcome::default();
        }
        let Some(viewport) = self.viewport(display) else {
            return TouchOutcome::default();
        };
        let outcome = self.interaction.touch_move(touches, &viewport, &self.state);
        if let Some(patch) = &outcome.patch {
            self.state = self.state.apply(patch);
            self.mark_dirty();
        }
        outcome
    }

    pub fn touch_end(&mut self) -> Option<MemeState> {
        self.pointer_up()
    }
}
