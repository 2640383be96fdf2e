//! embedded-graphics rasterizer, background loading, and PNG export for
//! `meme-canvas` frames.
//!
//! [`RasterRenderer`] executes a [`meme_canvas_render::MemeFrame`] onto an
//! [`RgbaSurface`]. [`Compositor`] ties the pieces together: it owns a
//! composition session, decodes backgrounds on a worker thread, keeps the
//! rasterized canvas current, and exports PNG snapshots.

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

mod backend;
mod compositor;
mod decode;
mod export;
mod renderer;
mod surface;

pub use backend::{
    FontBackend, FontFallbackReason, FontMetrics, FontSelection, MonoFace, MonoFontBackend,
    RasterTextMeasurer, ScaledTarget,
};
pub use compositor::Compositor;
pub use decode::{
    decode_image, load_image, DecodedImage, ImageLoader, LoadError, LoadOutcome,
    DEFAULT_MAX_IMAGE_PIXELS,
};
#[cfg(feature = "system-clipboard")]
pub use export::SystemClipboard;
pub use export::{
    copy_to_clipboard, download_file_name, encode_png, save_png, save_to_dir, timestamp_ms,
    ClipboardSink, ExportError, ExportedImage,
};
pub use renderer::{RasterConfig, RasterDiagnostics, RasterRenderer, ResampleFilter};
pub use surface::RgbaSurface;
