use core::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use meme_canvas::{MemePatch, MemeState};
use meme_canvas_render::{
    CanvasStatus, ClientPoint, CompositionSession, DisplayRect, DragTarget, InteractionConfig,
    LayoutEngine, MemeFrame, TouchOutcome,
};

use crate::backend::RasterTextMeasurer;
use crate::decode::{DecodedImage, ImageLoader, LoadError, LoadOutcome};
use crate::export::{self, ClipboardSink, ExportError, ExportedImage};
use crate::renderer::{RasterDiagnostics, RasterRenderer};
use crate::surface::RgbaSurface;

/// End-to-end meme canvas: state, background loading, layout, pixels, and
/// export.
///
/// Call [`Compositor::poll`] from the owning loop to dispatch queued image
/// loads and apply finished ones. Loads superseded by a newer image are
/// dropped. Nothing is rasterized until the current image has decoded.
pub struct Compositor {
    session: CompositionSession,
    renderer: RasterRenderer,
    loader: ImageLoader,
    image: Option<DecodedImage>,
    surface: Option<RgbaSurface>,
    surface_revision: Option<u64>,
    last_diagnostics: RasterDiagnostics,
}

impl fmt::Debug for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("session", &self.session)
            .field("has_image", &self.image.is_some())
            .field("surface_revision", &self.surface_revision)
            .finish()
    }
}

impl Compositor {
    /// Compositor with default layout, interaction, and raster settings.
    pub fn new(state: MemeState) -> Self {
        Self::with_parts(
            LayoutEngine::default(),
            InteractionConfig::default(),
            RasterRenderer::default(),
            ImageLoader::default(),
            state,
        )
    }

    /// Assemble from explicit parts. The layout's text measurer is replaced
    /// by one backed by the raster font backend so wrapping matches drawing.
    pub fn with_parts(
        layout: LayoutEngine,
        interaction: InteractionConfig,
        renderer: RasterRenderer,
        loader: ImageLoader,
        state: MemeState,
    ) -> Self {
        let layout = layout.with_text_measurer(RasterTextMeasurer::shared());
        let mut compositor = Self {
            session: CompositionSession::new(layout, interaction, state),
            renderer,
            loader,
            image: None,
            surface: None,
            surface_revision: None,
            last_diagnostics: RasterDiagnostics::default(),
        };
        compositor.dispatch_load();
        compositor
    }

    pub fn session(&self) -> &CompositionSession {
        &self.session
    }

    pub fn state(&self) -> &MemeState {
        self.session.state()
    }

    pub fn status(&self) -> &CanvasStatus {
        self.session.status()
    }

    pub fn renderer(&self) -> &RasterRenderer {
        &self.renderer
    }

    /// Decoded background, once the current load has finished.
    pub fn image(&self) -> Option<&DecodedImage> {
        self.image.as_ref()
    }

    /// Fallback counters from the most recent rasterization.
    pub fn last_diagnostics(&self) -> RasterDiagnostics {
        self.last_diagnostics
    }

    pub fn set_state(&mut self, state: MemeState) {
        self.session.set_state(state);
        self.after_state_change();
    }

    pub fn apply(&mut self, patch: &MemePatch) {
        self.session.apply(patch);
        self.after_state_change();
    }

    fn after_state_change(&mut self) {
        if self.session.image_size().is_none() {
            self.image = None;
        }
        self.dispatch_load();
    }

    fn dispatch_load(&mut self) {
        let Some(request) = self.session.take_load_request() else {
            return;
        };
        if !self.loader.request(request.ticket, request.image) {
            self.session
                .complete_load::<LoadError>(request.ticket, Err(LoadError::Disconnected));
        }
    }

    /// Dispatch queued loads and apply every finished one. Returns `true`
    /// when a load for the current image was applied.
    pub fn poll(&mut self) -> bool {
        self.dispatch_load();
        let mut applied = false;
        while let Some(outcome) = self.loader.try_next() {
            applied |= self.apply_outcome(outcome);
        }
        applied
    }

    /// Block until the current image has loaded or failed, or `timeout`
    /// elapses.
    pub fn wait_for_image(&mut self, timeout: Duration) -> Result<&CanvasStatus, LoadError> {
        let deadline = Instant::now() + timeout;
        self.poll();
        while *self.session.status() == CanvasStatus::Loading {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if let Some(outcome) = self.loader.next_timeout(deadline - now)? {
                self.apply_outcome(outcome);
            }
        }
        Ok(self.session.status())
    }

    fn apply_outcome(&mut self, outcome: LoadOutcome) -> bool {
        let LoadOutcome { ticket, result } = outcome;
        match result {
            Ok(decoded) => {
                let size = decoded.size();
                let current = self.session.complete_load::<LoadError>(ticket, Ok(size));
                if current {
                    log::debug!("background decoded at {}x{}", size.width, size.height);
                    self.image = Some(decoded);
                    // Compose now so an oversized canvas is reported as a failure.
                    let _ = self.session.frame();
                }
                current
            }
            Err(err) => {
                let current = self.session.complete_load(ticket, Err(err));
                if current {
                    self.image = None;
                }
                current
            }
        }
    }

    /// Current layout frame, `None` until the image has decoded.
    pub fn frame(&mut self) -> Option<&MemeFrame> {
        self.session.frame()
    }

    /// Current pixels, re-rasterized when anything changed since the last
    /// call. `None` until the image has decoded.
    pub fn surface(&mut self) -> Option<&RgbaSurface> {
        let revision = self.session.revision();
        if self.surface.is_none() || self.surface_revision != Some(revision) {
            let Some(frame) = self.session.frame() else {
                self.surface = None;
                self.surface_revision = None;
                return None;
            };
            let mut surface = RgbaSurface::new(frame.width, frame.height);
            let pixels = self.image.as_ref().map(DecodedImage::pixels);
            let diagnostics = self.renderer.render_frame(frame, pixels, &mut surface);
            if diagnostics.text_fallbacks() > 0 {
                log::debug!(
                    "text drawn with fallback fonts: {} of {} runs",
                    diagnostics.text_fallbacks(),
                    diagnostics.text_runs
                );
            }
            self.last_diagnostics = diagnostics;
            self.surface = Some(surface);
            self.surface_revision = Some(revision);
        }
        self.surface.as_ref()
    }

    /// Encode the current canvas as PNG at native resolution.
    pub fn export_png(&mut self) -> Result<ExportedImage, ExportError> {
        let surface = self.surface().ok_or(ExportError::NotReady)?;
        export::encode_png(surface)
    }

    /// Export and write to `path`.
    pub fn save_png(&mut self, path: &Path) -> Result<(), ExportError> {
        let image = self.export_png()?;
        export::save_png(&image, path)
    }

    /// Export and write into `dir` as `meme-<timestamp>.png`.
    pub fn download(&mut self, dir: &Path) -> Result<PathBuf, ExportError> {
        let image = self.export_png()?;
        export::save_to_dir(&image, dir)
    }

    /// Export and hand the PNG to `sink`.
    pub fn copy_to_clipboard<S>(&mut self, sink: &mut S) -> Result<(), ExportError>
    where
        S: ClipboardSink + ?Sized,
    {
        let image = self.export_png()?;
        export::copy_to_clipboard(sink, &image)
    }

    pub fn dragging(&self) -> Option<DragTarget> {
        self.session.dragging()
    }

    pub fn pointer_down(&mut self, point: ClientPoint, display: DisplayRect) -> Option<DragTarget> {
        self.session.pointer_down(point, display)
    }

    pub fn pointer_move(&mut self, point: ClientPoint, display: DisplayRect) -> Option<MemePatch> {
        self.session.pointer_move(point, display)
    }

    pub fn pointer_up(&mut self) -> Option<MemeState> {
        self.session.pointer_up()
    }

    pub fn pointer_leave(&mut self) -> Option<MemeState> {
        self.session.pointer_leave()
    }

    pub fn touch_start(&mut self, touches: &[ClientPoint], display: DisplayRect) -> TouchOutcome {
        self.session.touch_start(touches, display)
    }

    pub fn touch_move(&mut self, touches: &[ClientPoint], display: DisplayRect) -> TouchOutcome {
        self.session.touch_move(touches, display)
    }

    pub fn touch_end(&mut self) -> Option<MemeState> {
        self.session.touch_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use meme_canvas::{encode_data_url, MemeStyle};

    fn png_data_url(width: u32, height: u32, px: [u8; 4]) -> String {
        let img = RgbaImage::from_pixel(width, height, Rgba(px));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode png");
        encode_data_url("image/png", &out.into_inner())
    }

    fn loaded(state: MemeState) -> Compositor {
        let mut compositor = Compositor::new(state);
        let status = compositor
            .wait_for_image(Duration::from_secs(10))
            .expect("loader alive")
            .clone();
        assert_eq!(status, CanvasStatus::Ready);
        compositor
    }

    #[test]
    fn placeholder_without_image_draws_nothing() {
        let mut compositor = Compositor::new(MemeState::default());
        assert_eq!(compositor.status(), &CanvasStatus::Placeholder);
        assert!(!compositor.poll());
        assert!(compositor.surface().is_none());
        assert!(matches!(
            compositor.export_png(),
            Err(ExportError::NotReady)
        ));
    }

    #[test]
    fn classic_surface_has_reference_width() {
        let state = MemeState::with_image(png_data_url(400, 300, [0, 128, 0, 255]));
        let mut compositor = loaded(state);
        let surface = compositor.surface().expect("surface");
        assert_eq!((surface.width(), surface.height()), (800, 600));
        assert_eq!(surface.pixel(400, 300), Some([0, 128, 0, 255]));
        let exported = compositor.export_png().expect("export");
        assert_eq!((exported.width, exported.height), (800, 600));
    }

    #[test]
    fn surface_is_cached_until_state_changes() {
        let state = MemeState::with_image(png_data_url(100, 50, [10, 10, 10, 255]));
        let mut compositor = loaded(state);
        let before = compositor.surface().cloned().expect("surface");
        assert_eq!(compositor.surface(), Some(&before));

        compositor.apply(&MemePatch {
            style: Some(MemeStyle::Demotivational),
            ..MemePatch::default()
        });
        let after = compositor.surface().expect("surface");
        assert_eq!((after.width(), after.height()), (900, 650));
    }

    #[test]
    fn bad_image_fails_and_recovers_on_next_load() {
        let mut compositor = Compositor::new(MemeState::with_image("data:image/png;base64,AAAA"));
        let status = compositor
            .wait_for_image(Duration::from_secs(10))
            .expect("loader alive")
            .clone();
        assert!(matches!(status, CanvasStatus::Failed(_)));
        assert!(compositor.surface().is_none());

        compositor.apply(&MemePatch {
            image: Some(png_data_url(8, 8, [1, 1, 1, 255])),
            ..MemePatch::default()
        });
        let status = compositor
            .wait_for_image(Duration::from_secs(10))
            .expect("loader alive")
            .clone();
        assert_eq!(status, CanvasStatus::Ready);
        assert!(compositor.surface().is_some());
    }

    #[test]
    fn sliver_images_fail_instead_of_allocating_a_huge_canvas() {
        // 10x20000 scales to an 800x1600000 canvas.
        let tall = png_data_url(10, 20_000, [5, 5, 5, 255]);
        let mut compositor = Compositor::new(MemeState::with_image(tall));
        let status = compositor
            .wait_for_image(Duration::from_secs(10))
            .expect("loader alive")
            .clone();
        assert!(matches!(status, CanvasStatus::Failed(_)), "{:?}", status);
        assert!(compositor.surface().is_none());
        assert!(matches!(
            compositor.export_png(),
            Err(ExportError::NotReady)
        ));

        compositor.apply(&MemePatch {
            image: Some(png_data_url(10, 10, [5, 5, 5, 255])),
            ..MemePatch::default()
        });
        let status = compositor
            .wait_for_image(Duration::from_secs(10))
            .expect("loader alive")
            .clone();
        assert_eq!(status, CanvasStatus::Ready);
        let surface = compositor.surface().expect("surface");
        assert_eq!((surface.width(), surface.height()), (800, 800));
    }

    #[test]
    fn superseded_load_is_never_drawn() {
        let first = png_data_url(10, 10, [255, 0, 0, 255]);
        let second = png_data_url(20, 10, [0, 0, 255, 255]);
        let mut compositor = Compositor::new(MemeState::with_image(first));
        compositor.apply(&MemePatch {
            image: Some(second),
            ..MemePatch::default()
        });
        compositor
            .wait_for_image(Duration::from_secs(10))
            .expect("loader alive");
        compositor.poll();
        let image = compositor.image().expect("decoded");
        assert_eq!((image.width(), image.height()), (20, 10));
        let surface = compositor.surface().expect("surface");
        assert_eq!(surface.pixel(400, 200), Some([0, 0, 255, 255]));
    }
}
