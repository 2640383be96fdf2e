use embedded_graphics::{
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
};
use image::{imageops::FilterType, RgbaImage};
use meme_canvas_render::{
    DrawCommand, FrameRect, GuideAxis, GuideCommand, ImageCommand, MemeFrame, RectCommand,
    TextAlign, TextBaseline, TextCommand,
};

use crate::backend::{has_unsupported_glyphs, FontBackend, FontFallbackReason, MonoFontBackend};
use crate::surface::{to_rgb888, RgbaSurface};

/// Upper bound on the outline radius in output pixels.
const MAX_STROKE_RADIUS: u32 = 16;

/// Outline radius for a stroke of `width`, bounded by the glyph
/// magnification so clamped fonts keep a proportional outline.
pub(crate) fn stroke_radius(width: u32, scale: u32) -> i32 {
    let bound = scale.max(1).saturating_mul(2).min(MAX_STROKE_RADIUS);
    width.div_ceil(2).min(bound) as i32
}

/// Rasterizer settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterConfig {
    /// Largest destination area, in pixels, resampled with a filter. Larger
    /// placements are sampled nearest-neighbor over the visible region only.
    pub max_filtered_pixels: u64,
    /// Filter used when resampling the background image.
    pub filter: ResampleFilter,
    /// Draw an outline where the image goes when no pixels are available.
    pub outline_missing_image: bool,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            max_filtered_pixels: 16 * 1024 * 1024,
            filter: ResampleFilter::Triangle,
            outline_missing_image: true,
        }
    }
}

impl RasterConfig {
    pub fn with_max_filtered_pixels(mut self, pixels: u64) -> Self {
        self.max_filtered_pixels = pixels;
        self
    }

    pub fn with_filter(mut self, filter: ResampleFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Background resampling filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
}

impl ResampleFilter {
    fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
        }
    }
}

/// Fallback counters from one rasterization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterDiagnostics {
    pub text_runs: u32,
    pub unknown_family: u32,
    pub size_clamped: u32,
    pub unsupported_glyphs: u32,
    /// Image commands drawn without pixels.
    pub image_fallbacks: u32,
    /// Image commands sampled nearest-neighbor because of size.
    pub unfiltered_images: u32,
}

impl RasterDiagnostics {
    pub fn text_fallbacks(&self) -> u32 {
        self.unknown_family + self.size_clamped + self.unsupported_glyphs
    }

    fn note_text_fallback(&mut self, reason: FontFallbackReason) {
        match reason {
            FontFallbackReason::UnknownFamily => self.unknown_family += 1,
            FontFallbackReason::SizeClamped => self.size_clamped += 1,
            FontFallbackReason::UnsupportedGlyphs => self.unsupported_glyphs += 1,
        }
    }
}

/// Executes [`MemeFrame`] commands onto an [`RgbaSurface`].
#[derive(Clone, Debug)]
pub struct RasterRenderer<B = MonoFontBackend> {
    cfg: RasterConfig,
    backend: B,
}

impl Default for RasterRenderer<MonoFontBackend> {
    fn default() -> Self {
        Self::new(RasterConfig::default())
    }
}

impl RasterRenderer<MonoFontBackend> {
    pub fn new(cfg: RasterConfig) -> Self {
        Self {
            cfg,
            backend: MonoFontBackend,
        }
    }
}

impl<B> RasterRenderer<B>
where
    B: FontBackend,
{
    pub fn with_backend(cfg: RasterConfig, backend: B) -> Self {
        Self { cfg, backend }
    }

    pub fn config(&self) -> RasterConfig {
        self.cfg
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Rasterize `frame` into a new surface of the frame's size.
    pub fn rasterize(&self, frame: &MemeFrame, image: Option<&RgbaImage>) -> RgbaSurface {
        let mut surface = RgbaSurface::new(frame.width, frame.height);
        self.render_frame(frame, image, &mut surface);
        surface
    }

    /// Draw every command of `frame`, in layer order.
    pub fn render_frame(
        &self,
        frame: &MemeFrame,
        image: Option<&RgbaImage>,
        surface: &mut RgbaSurface,
    ) -> RasterDiagnostics {
        let mut diagnostics = RasterDiagnostics::default();
        for cmd in frame.merged_commands_iter() {
            self.draw_command(surface, cmd, image, &mut diagnostics);
        }
        diagnostics
    }

    fn draw_command(
        &self,
        surface: &mut RgbaSurface,
        cmd: &DrawCommand,
        image: Option<&RgbaImage>,
        diagnostics: &mut RasterDiagnostics,
    ) {
        // RgbaSurface drawing is infallible.
        let _ = match cmd {
            DrawCommand::Clear => {
                surface.clear_transparent();
                Ok(())
            }
            DrawCommand::Fill(color) => surface.clear(to_rgb888(*color)),
            DrawCommand::Rect(rect) => draw_rect(surface, rect),
            DrawCommand::Image(placement) => {
                match image {
                    Some(pixels) => self.draw_image(surface, placement, pixels, diagnostics),
                    None => {
                        diagnostics.image_fallbacks += 1;
                        if self.cfg.outline_missing_image {
                            draw_image_outline(surface, placement);
                        }
                    }
                }
                Ok(())
            }
            DrawCommand::Text(text) => self.draw_text(surface, text, diagnostics),
            DrawCommand::Guide(guide) => draw_guide(surface, guide),
        };
    }

    /// Draw one caption line: stroke first, then fill on top.
    pub fn draw_text<D>(
        &self,
        display: &mut D,
        text: &TextCommand,
        diagnostics: &mut RasterDiagnostics,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        if text.text.is_empty() {
            return Ok(());
        }
        let selection = self.backend.resolve_font(&text.font);
        diagnostics.text_runs += 1;
        if let Some(reason) = selection.fallback_reason {
            diagnostics.note_text_fallback(reason);
        }
        if has_unsupported_glyphs(&text.text) {
            diagnostics.note_text_fallback(FontFallbackReason::UnsupportedGlyphs);
        }

        let metrics = self.backend.metrics(&selection);
        let width = self.backend.text_width(&selection, &text.text);
        let left = match text.align {
            TextAlign::Left => text.x,
            TextAlign::Center => text.x.saturating_sub(width / 2),
            TextAlign::Right => text.x.saturating_sub(width),
        };
        let top = match text.baseline {
            TextBaseline::Top => text.y,
            TextBaseline::Bottom => text.y.saturating_sub(metrics.line_height),
        };

        if let Some(stroke) = text.stroke {
            let radius = stroke_radius(stroke.width, selection.scale);
            let limit = i64::from(radius) * i64::from(radius);
            let color = to_rgb888(stroke.color);
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let distance = i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy);
                    if distance == 0 || distance > limit {
                        continue;
                    }
                    self.backend.draw_text_run(
                        display,
                        &selection,
                        &text.text,
                        Point::new(left.saturating_add(dx), top.saturating_add(dy)),
                        color,
                    )?;
                }
            }
        }
        self.backend.draw_text_run(
            display,
            &selection,
            &text.text,
            Point::new(left, top),
            to_rgb888(text.color),
        )?;
        Ok(())
    }

    fn draw_image(
        &self,
        surface: &mut RgbaSurface,
        placement: &ImageCommand,
        pixels: &RgbaImage,
        diagnostics: &mut RasterDiagnostics,
    ) {
        let dest = placement.dest;
        if dest.width == 0 || dest.height == 0 || pixels.width() == 0 || pixels.height() == 0 {
            return;
        }
        let visible = match placement.clip {
            Some(clip) => intersect(dest, clip),
            None => Some(dest),
        };
        let Some((x0, y0, x1, y1)) = visible.and_then(|rect| surface.clip_bounds(rect)) else {
            return;
        };

        let area = dest.width as u64 * dest.height as u64;
        if area <= self.cfg.max_filtered_pixels {
            let resized = if pixels.width() == dest.width && pixels.height() == dest.height {
                None
            } else {
                Some(image::imageops::resize(
                    pixels,
                    dest.width,
                    dest.height,
                    self.cfg.filter.to_image_filter(),
                ))
            };
            let src = resized.as_ref().unwrap_or(pixels);
            for y in y0..y1 {
                let sy = (y as i64 - dest.y as i64) as u32;
                for x in x0..x1 {
                    let sx = (x as i64 - dest.x as i64) as u32;
                    surface.blend_pixel(x as i32, y as i32, src.get_pixel(sx, sy).0);
                }
            }
        } else {
            diagnostics.unfiltered_images += 1;
            log::debug!(
                "image placement {}x{} exceeds filter budget; sampling nearest",
                dest.width,
                dest.height
            );
            let (sw, sh) = (pixels.width() as u64, pixels.height() as u64);
            for y in y0..y1 {
                let dy = (y as i64 - dest.y as i64) as u64;
                let sy = ((dy * sh) / dest.height as u64).min(sh - 1) as u32;
                for x in x0..x1 {
                    let dx = (x as i64 - dest.x as i64) as u64;
                    let sx = ((dx * sw) / dest.width as u64).min(sw - 1) as u32;
                    surface.blend_pixel(x as i32, y as i32, pixels.get_pixel(sx, sy).0);
                }
            }
        }
    }
}

fn intersect(a: FrameRect, b: FrameRect) -> Option<FrameRect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = a.right().min(b.right());
    let y1 = a.bottom().min(b.bottom());
    (x0 < x1 && y0 < y1).then(|| FrameRect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
}

fn to_rectangle(rect: FrameRect) -> Rectangle {
    Rectangle::new(Point::new(rect.x, rect.y), Size::new(rect.width, rect.height))
}

fn draw_rect<D>(display: &mut D, rect: &RectCommand) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let color = to_rgb888(rect.color);
    let style = match rect.stroke_width {
        Some(width) => PrimitiveStyleBuilder::new()
            .stroke_color(color)
            .stroke_width(width)
            .stroke_alignment(StrokeAlignment::Center)
            .build(),
        None => PrimitiveStyle::with_fill(color),
    };
    to_rectangle(rect.rect).into_styled(style).draw(display)
}

fn draw_image_outline(surface: &mut RgbaSurface, placement: &ImageCommand) {
    let rect = placement.clip.unwrap_or(placement.dest);
    let _ = to_rectangle(rect)
        .into_styled(PrimitiveStyle::with_stroke(Rgb888::new(0x80, 0x80, 0x80), 1))
        .draw(surface);
}

fn draw_guide<D>(display: &mut D, guide: &GuideCommand) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let bounds = display.bounding_box();
    let span = match guide.axis {
        GuideAxis::Vertical => bounds.size.height as i32,
        GuideAxis::Horizontal => bounds.size.width as i32,
    };
    let style = PrimitiveStyle::with_stroke(to_rgb888(guide.color), guide.width.max(1));
    let on = guide.dash_on.max(1) as i32;
    let period = on + guide.dash_off as i32;
    let mut start = 0;
    while start < span {
        let end = (start + on - 1).min(span - 1);
        let (a, b) = match guide.axis {
            GuideAxis::Vertical => (
                Point::new(guide.position, start),
                Point::new(guide.position, end),
            ),
            GuideAxis::Horizontal => (
                Point::new(start, guide.position),
                Point::new(end, guide.position),
            ),
        };
        Line::new(a, b).into_styled(style).draw(display)?;
        start += period;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use meme_canvas::{Color, MemeStyle};
    use meme_canvas_render::{FontSpec, TextStroke};

    fn opaque(surface: &RgbaSurface, x: u32, y: u32) -> Option<[u8; 3]> {
        surface
            .pixel(x, y)
            .filter(|p| p[3] == 255)
            .map(|p| [p[0], p[1], p[2]])
    }

    fn frame_with(commands: Vec<DrawCommand>, width: u32, height: u32) -> MemeFrame {
        let mut frame = MemeFrame::new(width, height, MemeStyle::Classic);
        for cmd in commands {
            frame.push_content_command(cmd);
        }
        frame
    }

    #[test]
    fn fill_and_stroked_rect() {
        let frame = frame_with(
            vec![
                DrawCommand::Fill(Color::BLACK),
                DrawCommand::Rect(RectCommand {
                    rect: FrameRect::new(4, 4, 12, 12),
                    color: Color::WHITE,
                    stroke_width: Some(2),
                }),
            ],
            20,
            20,
        );
        let surface = RasterRenderer::default().rasterize(&frame, None);
        assert_eq!(opaque(&surface, 0, 0), Some([0, 0, 0]));
        assert_eq!(opaque(&surface, 4, 10), Some([255, 255, 255]));
        assert_eq!(opaque(&surface, 10, 10), Some([0, 0, 0]));
    }

    #[test]
    fn image_is_scaled_and_clipped() {
        let pixels = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let frame = frame_with(
            vec![
                DrawCommand::Fill(Color::BLACK),
                DrawCommand::Image(ImageCommand {
                    dest: FrameRect::new(0, 0, 20, 20),
                    clip: Some(FrameRect::new(5, 5, 10, 10)),
                }),
            ],
            20,
            20,
        );
        let renderer =
            RasterRenderer::new(RasterConfig::default().with_filter(ResampleFilter::Nearest));
        let surface = renderer.rasterize(&frame, Some(&pixels));
        assert_eq!(opaque(&surface, 10, 10), Some([255, 0, 0]));
        assert_eq!(opaque(&surface, 2, 2), Some([0, 0, 0]));
        assert_eq!(opaque(&surface, 16, 16), Some([0, 0, 0]));
    }

    #[test]
    fn oversized_placements_sample_nearest() {
        let mut pixels = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 255]));
        pixels.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let frame = frame_with(
            vec![DrawCommand::Image(ImageCommand {
                dest: FrameRect::new(-100, 0, 240, 10),
                clip: None,
            })],
            40,
            10,
        );
        let renderer = RasterRenderer::new(RasterConfig::default().with_max_filtered_pixels(10));
        let mut surface = RgbaSurface::new(40, 10);
        let diagnostics = renderer.render_frame(&frame, Some(&pixels), &mut surface);
        assert_eq!(diagnostics.unfiltered_images, 1);
        // x = 0 is 100px into a 240px placement of a 2px image: first half.
        assert_eq!(opaque(&surface, 0, 0), Some([0, 0, 255]));
        assert_eq!(opaque(&surface, 30, 0), Some([0, 255, 0]));
    }

    #[test]
    fn missing_image_draws_outline_and_counts() {
        let frame = frame_with(
            vec![DrawCommand::Image(ImageCommand {
                dest: FrameRect::new(0, 0, 10, 10),
                clip: None,
            })],
            10,
            10,
        );
        let mut surface = RgbaSurface::new(10, 10);
        let diagnostics = RasterRenderer::default().render_frame(&frame, None, &mut surface);
        assert_eq!(diagnostics.image_fallbacks, 1);
        assert!(opaque(&surface, 0, 5).is_some());
        assert!(opaque(&surface, 5, 5).is_none());
    }

    #[test]
    fn stroked_text_has_outline_around_fill() {
        let mut frame = MemeFrame::new(200, 80, MemeStyle::Classic);
        frame.push_content_command(DrawCommand::Fill(Color::rgb(0, 0, 255)));
        frame.push_caption_command(DrawCommand::Text(TextCommand {
            x: 100,
            y: 10,
            text: "I".to_string(),
            font: FontSpec::new("Impact", 900, 36.0),
            align: TextAlign::Center,
            baseline: TextBaseline::Top,
            color: Color::WHITE,
            stroke: Some(TextStroke {
                color: Color::BLACK,
                width: 4,
            }),
        }));
        let surface = RasterRenderer::default().rasterize(&frame, None);
        let mut white = 0;
        let mut black = 0;
        for y in 0..80 {
            for x in 0..200 {
                match opaque(&surface, x, y) {
                    Some([255, 255, 255]) => white += 1,
                    Some([0, 0, 0]) => black += 1,
                    _ => {}
                }
            }
        }
        assert!(white > 0);
        assert!(black > 0);
    }

    #[test]
    fn stroke_radius_follows_glyph_scale() {
        assert_eq!(stroke_radius(5, 2), 3);
        assert_eq!(stroke_radius(2, 1), 1);
        assert_eq!(stroke_radius(40, 3), 6);
        assert_eq!(stroke_radius(100_000, 64), MAX_STROKE_RADIUS as i32);
        assert_eq!(stroke_radius(u32::MAX, u32::MAX), MAX_STROKE_RADIUS as i32);
    }

    #[test]
    fn huge_font_strokes_stay_bounded() {
        let text = TextCommand {
            x: 20,
            y: 0,
            text: "I".to_string(),
            font: FontSpec::new("Impact", 900, 1.0e6),
            align: TextAlign::Center,
            baseline: TextBaseline::Top,
            color: Color::WHITE,
            stroke: Some(TextStroke {
                color: Color::BLACK,
                width: 100_000,
            }),
        };
        let mut surface = RgbaSurface::new(40, 40);
        let mut diagnostics = RasterDiagnostics::default();
        let renderer = RasterRenderer::default();
        assert!(renderer
            .draw_text(&mut surface, &text, &mut diagnostics)
            .is_ok());
        assert_eq!(diagnostics.size_clamped, 1);
        assert_eq!(diagnostics.text_runs, 1);
    }

    #[test]
    fn guides_are_dashed() {
        let mut frame = MemeFrame::new(10, 40, MemeStyle::Classic);
        frame.push_overlay_command(DrawCommand::Guide(GuideCommand {
            axis: GuideAxis::Vertical,
            position: 5,
            dash_on: 5,
            dash_off: 5,
            color: Color::GUIDE,
            width: 1,
        }));
        let surface = RasterRenderer::default().rasterize(&frame, None);
        assert_eq!(opaque(&surface, 5, 2), Some([0x63, 0x66, 0xf1]));
        assert_eq!(opaque(&surface, 5, 7), None);
        assert_eq!(opaque(&surface, 5, 12), Some([0x63, 0x66, 0xf1]));
    }
}
