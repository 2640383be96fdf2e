use meme_canvas::{Color, MemeState, MemeStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::render_ir::{
    ActiveGuides, DrawCommand, FontSpec, FrameMetrics, FrameRect, GuideAxis, GuideCommand,
    ImageCommand, ImageSize, MemeFrame, RectCommand, TextAlign, TextBaseline, TextCommand,
    TextStroke,
};
use crate::text_wrap::{wrap_text, HeuristicMeasurer, TextMeasurer};

/// Layout constants for the three meme styles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Width every background image is scaled to.
    pub reference_width: f32,
    /// Caption wrap width as a fraction of `reference_width`.
    pub text_width_ratio: f32,
    /// Overlay caption line height as a multiple of font size.
    pub line_height_ratio: f32,
    /// Anchors at or below this percent align left; at or above
    /// `100 - edge_align_percent` align right.
    pub edge_align_percent: f32,
    /// Inset of edge-aligned captions, percent of canvas width.
    pub edge_margin_percent: f32,
    /// Overlay stroke width as a fraction of font size.
    pub stroke_ratio: f32,
    /// Lower bound for overlay stroke width.
    pub min_stroke_px: u32,
    pub stroke_color: Color,
    /// Weight of classic caption fonts.
    pub caption_font_weight: u16,
    /// Modern header height before any caption lines.
    pub modern_header_base_px: f32,
    /// Header growth per top caption line, as a multiple of top font size.
    pub modern_header_line_ratio: f32,
    /// Left and top inset of modern header text.
    pub modern_text_inset_px: f32,
    /// Modern header font size as a fraction of top font size.
    pub modern_font_ratio: f32,
    pub modern_font_family: String,
    pub modern_font_weight: u16,
    pub modern_background: Color,
    pub modern_text_color: Color,
    /// Demotivational frame margin around the image on each side.
    pub poster_margin_px: f32,
    /// Extra poster height below the image frame, including the top margin.
    pub poster_band_px: f32,
    pub poster_border_width: u32,
    /// Distance between the border and the image edge.
    pub poster_border_inset_px: f32,
    pub poster_background: Color,
    pub poster_text_color: Color,
    pub poster_font_family: String,
    pub poster_font_weight: u16,
    /// Bottom caption size as a fraction of bottom font size.
    pub poster_bottom_font_ratio: f32,
    /// Poster caption line spacing as a multiple of the unscaled font size.
    pub poster_line_height_ratio: f32,
    /// Bottom caption start, below the image.
    pub poster_bottom_gap_px: f32,
    /// Top caption start, below the image.
    pub poster_top_gap_px: f32,
    /// Minimum space between the bottom caption block and the top caption.
    pub poster_caption_spacing_px: f32,
    pub guide_color: Color,
    pub guide_width: u32,
    pub guide_dash_on: u32,
    pub guide_dash_off: u32,
    /// Largest canvas, in pixels, a session will compose. Narrow, tall images
    /// scaled to `reference_width` can otherwise produce huge canvases.
    pub max_canvas_pixels: u64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            reference_width: 800.0,
            text_width_ratio: 0.9,
            line_height_ratio: 1.1,
            edge_align_percent: 10.0,
            edge_margin_percent: 5.0,
            stroke_ratio: 0.1,
            min_stroke_px: 2,
            stroke_color: Color::BLACK,
            caption_font_weight: 900,
            modern_header_base_px: 100.0,
            modern_header_line_ratio: 0.6,
            modern_text_inset_px: 20.0,
            modern_font_ratio: 0.8,
            modern_font_family: "Inter, sans-serif".to_string(),
            modern_font_weight: 600,
            modern_background: Color::WHITE,
            modern_text_color: Color::BLACK,
            poster_margin_px: 50.0,
            poster_band_px: 250.0,
            poster_border_width: 2,
            poster_border_inset_px: 2.0,
            poster_background: Color::BLACK,
            poster_text_color: Color::WHITE,
            poster_font_family: "\"Times New Roman\", serif".to_string(),
            poster_font_weight: 400,
            poster_bottom_font_ratio: 0.6,
            poster_line_height_ratio: 1.2,
            poster_bottom_gap_px: 20.0,
            poster_top_gap_px: 70.0,
            poster_caption_spacing_px: 10.0,
            guide_color: Color::GUIDE,
            guide_width: 1,
            guide_dash_on: 5,
            guide_dash_off: 5,
            max_canvas_pixels: 32 * 1024 * 1024,
        }
    }
}

impl CanvasConfig {
    /// Caption wrap width.
    pub fn text_max_width(&self) -> f32 {
        self.reference_width * self.text_width_ratio
    }

    pub fn with_reference_width(mut self, width: f32) -> Self {
        self.reference_width = width;
        self
    }

    pub fn with_modern_font_family(mut self, family: impl Into<String>) -> Self {
        self.modern_font_family = family.into();
        self
    }

    pub fn with_poster_font_family(mut self, family: impl Into<String>) -> Self {
        self.poster_font_family = family.into();
        self
    }

    pub fn with_guide_color(mut self, color: Color) -> Self {
        self.guide_color = color;
        self
    }

    pub fn with_max_canvas_pixels(mut self, pixels: u64) -> Self {
        self.max_canvas_pixels = pixels;
        self
    }

    /// True when a `width` x `height` canvas fits the pixel budget.
    pub fn canvas_fits(&self, width: u32, height: u32) -> bool {
        u64::from(width) * u64::from(height) <= self.max_canvas_pixels
    }
}

/// Fonts used for the two captions in the current style.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionFonts {
    pub top: FontSpec,
    pub bottom: FontSpec,
}

/// Turns a [`MemeState`] and an image size into a [`MemeFrame`].
#[derive(Clone)]
pub struct LayoutEngine {
    cfg: CanvasConfig,
    text_measurer: Option<Arc<dyn TextMeasurer>>,
}

impl core::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("cfg", &self.cfg)
            .field("has_text_measurer", &self.text_measurer.is_some())
            .finish()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(CanvasConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(cfg: CanvasConfig) -> Self {
        Self {
            cfg,
            text_measurer: None,
        }
    }

    /// Install the measurer used for wrapping.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.text_measurer = Some(measurer);
        self
    }

    pub fn set_text_measurer(&mut self, measurer: Option<Arc<dyn TextMeasurer>>) {
        self.text_measurer = measurer;
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.cfg
    }

    pub fn has_text_measurer(&self) -> bool {
        self.text_measurer.is_some()
    }

    /// Resolve caption fonts for the state's style.
    pub fn fonts_for(&self, state: &MemeState) -> CaptionFonts {
        let cfg = &self.cfg;
        let classic_family: Arc<str> = Arc::from(state.font_family.as_str());
        let classic =
            |size: f32| FontSpec::new(classic_family.clone(), cfg.caption_font_weight, size);
        match state.style {
            MemeStyle::Classic => CaptionFonts {
                top: classic(state.top_font_size),
                bottom: classic(state.bottom_font_size),
            },
            MemeStyle::Modern => CaptionFonts {
                top: FontSpec::new(
                    cfg.modern_font_family.as_str(),
                    cfg.modern_font_weight,
                    state.top_font_size * cfg.modern_font_ratio,
                ),
                bottom: classic(state.bottom_font_size),
            },
            MemeStyle::Demotivational => {
                let family: Arc<str> = Arc::from(cfg.poster_font_family.as_str());
                CaptionFonts {
                    top: FontSpec::new(
                        family.clone(),
                        cfg.poster_font_weight,
                        state.top_font_size,
                    ),
                    bottom: FontSpec::new(
                        family,
                        cfg.poster_font_weight,
                        state.bottom_font_size * cfg.poster_bottom_font_ratio,
                    ),
                }
            }
        }
    }

    /// Wrap a caption with the installed measurer, or the heuristic one.
    pub fn wrap_caption(&self, text: &str, font: &FontSpec) -> Vec<String> {
        let max_width = self.cfg.text_max_width();
        match self.text_measurer.as_deref() {
            Some(measurer) => wrap_text(text, max_width, font, measurer),
            None => wrap_text(text, max_width, font, &HeuristicMeasurer),
        }
    }

    /// Compose the full frame for `state` over an image of `image` size.
    ///
    /// `guides` are drawn only when provided; callers pass them while a
    /// caption drag is in progress.
    pub fn compose(
        &self,
        image: ImageSize,
        state: &MemeState,
        guides: Option<&ActiveGuides>,
    ) -> MemeFrame {
        let cfg = &self.cfg;
        let fonts = self.fonts_for(state);
        let top_lines = self.wrap_caption(&state.top_text, &fonts.top);
        let bottom_lines = self.wrap_caption(&state.bottom_text, &fonts.bottom);

        let reference_width = sanitize_extent(cfg.reference_width);
        let (reference_scale, scaled_h) = if image.width == 0 || image.height == 0 {
            log::debug!(
                "degenerate image size {}x{}; laying out without image area",
                image.width,
                image.height
            );
            (0.0, 0.0)
        } else {
            let scale = reference_width / image.width as f32;
            (scale, image.height as f32 * scale)
        };

        let top_size = sanitize_extent(state.top_font_size);
        let header_height = match state.style {
            MemeStyle::Modern => {
                cfg.modern_header_base_px
                    + top_lines.len() as f32 * top_size * cfg.modern_header_line_ratio
            }
            _ => 0.0,
        };

        let (canvas_w, canvas_h, image_area) = match state.style {
            MemeStyle::Classic => (
                reference_width,
                scaled_h,
                FrameRect::new(0, 0, to_extent(reference_width), to_extent(scaled_h)),
            ),
            MemeStyle::Modern => (
                reference_width,
                scaled_h + header_height,
                FrameRect::new(
                    0,
                    to_coord(header_height),
                    to_extent(reference_width),
                    to_extent(scaled_h),
                ),
            ),
            MemeStyle::Demotivational => (
                reference_width + 2.0 * cfg.poster_margin_px,
                scaled_h + cfg.poster_band_px,
                FrameRect::new(
                    to_coord(cfg.poster_margin_px),
                    to_coord(cfg.poster_margin_px),
                    to_extent(reference_width),
                    to_extent(scaled_h),
                ),
            ),
        };

        let mut frame = MemeFrame::new(
            to_extent(canvas_w.trunc()),
            to_extent(canvas_h.trunc()),
            state.style,
        );
        frame.metrics = FrameMetrics {
            reference_scale,
            scaled_image_height: scaled_h,
            image_area,
            header_height,
        };

        self.push_background(&mut frame, scaled_h);
        self.push_image(&mut frame, state, reference_width, scaled_h, image_area);

        match state.style {
            MemeStyle::Classic => {
                if !state.top_text.is_empty() {
                    self.push_overlay_caption(
                        &mut frame,
                        &top_lines,
                        state.top_anchor_x(),
                        state.top_offset,
                        false,
                        &fonts.top,
                        state,
                    );
                }
                if !state.bottom_text.is_empty() {
                    self.push_overlay_caption(
                        &mut frame,
                        &bottom_lines,
                        state.bottom_anchor_x(),
                        state.bottom_offset,
                        true,
                        &fonts.bottom,
                        state,
                    );
                }
            }
            MemeStyle::Modern => {
                if !state.top_text.is_empty() {
                    self.push_header_caption(&mut frame, &top_lines, &fonts.top, top_size);
                }
                if !state.bottom_text.is_empty() {
                    self.push_overlay_caption(
                        &mut frame,
                        &bottom_lines,
                        state.bottom_anchor_x(),
                        state.bottom_offset,
                        true,
                        &fonts.bottom,
                        state,
                    );
                }
            }
            MemeStyle::Demotivational => {
                let image_bottom = cfg.poster_margin_px + scaled_h;
                let bottom_y = image_bottom + cfg.poster_bottom_gap_px;
                let bottom_size = sanitize_extent(state.bottom_font_size);
                let bottom_spacing = bottom_size * cfg.poster_line_height_ratio;
                let mut top_y = image_bottom + cfg.poster_top_gap_px;
                if !state.bottom_text.is_empty() && !bottom_lines.is_empty() {
                    self.push_poster_caption(
                        &mut frame,
                        &bottom_lines,
                        bottom_y,
                        bottom_spacing,
                        &fonts.bottom,
                    );
                    let bottom_end = bottom_y
                        + (bottom_lines.len() - 1) as f32 * bottom_spacing
                        + sanitize_extent(fonts.bottom.size_px);
                    top_y = top_y.max(bottom_end + cfg.poster_caption_spacing_px);
                }
                if !state.top_text.is_empty() {
                    let top_spacing = top_size * cfg.poster_line_height_ratio;
                    self.push_poster_caption(
                        &mut frame,
                        &top_lines,
                        top_y,
                        top_spacing,
                        &fonts.top,
                    );
                }
            }
        }

        if let Some(guides) = guides {
            self.push_guides(&mut frame, guides);
        }

        frame.top_lines = top_lines;
        frame.bottom_lines = bottom_lines;
        frame
    }

    fn push_background(&self, frame: &mut MemeFrame, scaled_h: f32) {
        let cfg = &self.cfg;
        match frame.style {
            MemeStyle::Classic => frame.push_content_command(DrawCommand::Clear),
            MemeStyle::Modern => {
                frame.push_content_command(DrawCommand::Fill(cfg.modern_background))
            }
            MemeStyle::Demotivational => {
                frame.push_content_command(DrawCommand::Fill(cfg.poster_background));
                let inset = cfg.poster_margin_px - cfg.poster_border_inset_px;
                let border_w = frame.width as f32 - 2.0 * inset;
                let border_h = scaled_h + 2.0 * cfg.poster_border_inset_px;
                frame.push_content_command(DrawCommand::Rect(RectCommand {
                    rect: FrameRect::new(
                        to_coord(inset),
                        to_coord(inset),
                        to_extent(border_w),
                        to_extent(border_h),
                    ),
                    color: cfg.poster_text_color,
                    stroke_width: Some(cfg.poster_border_width),
                }));
            }
        }
    }

    fn push_image(
        &self,
        frame: &mut MemeFrame,
        state: &MemeState,
        reference_width: f32,
        scaled_h: f32,
        image_area: FrameRect,
    ) {
        if scaled_h <= 0.0 || reference_width <= 0.0 {
            return;
        }
        let zoom = state.image_zoom();
        let (dx, dy) = state.image_offset();
        let dest = FrameRect::new(
            to_coord(image_area.x as f32 + dx),
            to_coord(image_area.y as f32 + dy),
            to_extent(reference_width * zoom),
            to_extent(scaled_h * zoom),
        );
        let clip = match frame.style {
            MemeStyle::Demotivational => Some(image_area),
            _ => None,
        };
        frame.push_content_command(DrawCommand::Image(ImageCommand { dest, clip }));
    }

    #[allow(clippy::too_many_arguments)]
    fn push_overlay_caption(
        &self,
        frame: &mut MemeFrame,
        lines: &[String],
        x_percent: f32,
        y_percent: f32,
        is_bottom: bool,
        font: &FontSpec,
        state: &MemeState,
    ) {
        let cfg = &self.cfg;
        let size = sanitize_extent(font.size_px);
        if size <= 0.0 || lines.is_empty() {
            return;
        }
        let default_y = if is_bottom { 95.0 } else { 5.0 };
        let x_percent = finite_or(x_percent, 50.0);
        let y_percent = finite_or(y_percent, default_y);
        let width = frame.width as f32;
        let anchor_x = width * x_percent / 100.0;
        let anchor_y = frame.height as f32 * y_percent / 100.0;
        let margin = width * cfg.edge_margin_percent / 100.0;

        let (align, draw_x) = if x_percent <= cfg.edge_align_percent {
            (TextAlign::Left, margin)
        } else if x_percent >= 100.0 - cfg.edge_align_percent {
            (TextAlign::Right, width - margin)
        } else {
            (TextAlign::Center, anchor_x)
        };
        let baseline = if is_bottom {
            TextBaseline::Bottom
        } else {
            TextBaseline::Top
        };
        let stroke_width = ((size * cfg.stroke_ratio).round() as u32).max(cfg.min_stroke_px);
        let line_height = size * cfg.line_height_ratio;
        let count = lines.len();

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let line_y = if is_bottom {
                anchor_y - (count - 1 - i) as f32 * line_height
            } else {
                anchor_y + i as f32 * line_height
            };
            frame.push_caption_command(DrawCommand::Text(TextCommand {
                x: to_coord(draw_x),
                y: to_coord(line_y),
                text: line.clone(),
                font: font.clone(),
                align,
                baseline,
                color: state.text_color,
                stroke: Some(TextStroke {
                    color: cfg.stroke_color,
                    width: stroke_width,
                }),
            }));
        }
    }

    fn push_header_caption(
        &self,
        frame: &mut MemeFrame,
        lines: &[String],
        font: &FontSpec,
        top_size: f32,
    ) {
        let cfg = &self.cfg;
        let line_height = top_size * cfg.line_height_ratio;
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            frame.push_caption_command(DrawCommand::Text(TextCommand {
                x: to_coord(cfg.modern_text_inset_px),
                y: to_coord(cfg.modern_text_inset_px + i as f32 * line_height),
                text: line.clone(),
                font: font.clone(),
                align: TextAlign::Left,
                baseline: TextBaseline::Top,
                color: cfg.modern_text_color,
                stroke: None,
            }));
        }
    }

    fn push_poster_caption(
        &self,
        frame: &mut MemeFrame,
        lines: &[String],
        start_y: f32,
        spacing: f32,
        font: &FontSpec,
    ) {
        let center_x = frame.width as f32 / 2.0;
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            frame.push_caption_command(DrawCommand::Text(TextCommand {
                x: to_coord(center_x),
                y: to_coord(start_y + i as f32 * spacing),
                text: line.clone(),
                font: font.clone(),
                align: TextAlign::Center,
                baseline: TextBaseline::Top,
                color: self.cfg.poster_text_color,
                stroke: None,
            }));
        }
    }

    fn push_guides(&self, frame: &mut MemeFrame, guides: &ActiveGuides) {
        let cfg = &self.cfg;
        let guide = |axis, position: f32| {
            DrawCommand::Guide(GuideCommand {
                axis,
                position: to_coord(position),
                dash_on: cfg.guide_dash_on,
                dash_off: cfg.guide_dash_off,
                color: cfg.guide_color,
                width: cfg.guide_width,
            })
        };
        if let Some(x) = guides.x.filter(|v| v.is_finite()) {
            let gx = frame.width as f32 * x / 100.0;
            frame.push_overlay_command(guide(GuideAxis::Vertical, gx));
        }
        if let Some(y) = guides.y.filter(|v| v.is_finite()) {
            let gy = frame.height as f32 * y / 100.0;
            frame.push_overlay_command(guide(GuideAxis::Horizontal, gy));
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Non-finite and negative extents collapse to zero.
fn sanitize_extent(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn to_coord(value: f32) -> i32 {
    // Float-to-int casts saturate; NaN maps to 0.
    value.round() as i32
}

fn to_extent(value: f32) -> u32 {
    sanitize_extent(value).round() as u32
}
