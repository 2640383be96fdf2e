//! Caption layout, render IR, interaction, and composition for `meme-canvas`.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod interaction;
mod render_engine;
mod render_ir;
mod render_layout;
mod text_wrap;

pub use interaction::{
    CanvasViewport, ClientPoint, DragTarget, InteractionConfig, InteractionController,
    TouchOutcome,
};
pub use meme_canvas::{Color, MemePatch, MemeState, MemeStyle};
pub use render_engine::{
    CanvasStatus, CompositionSession, DisplayRect, LoadGuard, LoadRequest, LoadTicket,
    SessionDiagnostic,
};
pub use render_ir::{
    ActiveGuides, DrawCommand, FontSpec, FrameMetrics, FrameRect, GuideAxis, GuideCommand,
    ImageCommand, ImageSize, MemeFrame, MergedCommandIter, RectCommand, TextAlign, TextBaseline,
    TextCommand, TextStroke,
};
pub use render_layout::{CanvasConfig, CaptionFonts, LayoutEngine};
pub use text_wrap::{wrap_text, HeuristicMeasurer, TextMeasurer};
