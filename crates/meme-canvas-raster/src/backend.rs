use std::borrow::Cow;
use std::sync::Arc;

use embedded_graphics::{
    mono_font::{
        iso_8859_1::{FONT_10X20, FONT_9X18_BOLD},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::Rgb888,
    prelude::*,
    primitives::Rectangle,
    text::{Baseline, Text},
};
use meme_canvas_render::{FontSpec, TextMeasurer};

/// Largest integer glyph magnification.
const MAX_SCALE: u32 = 64;

/// Why a font request could not be honored exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontFallbackReason {
    /// Family is not one of the known caption faces.
    UnknownFamily,
    /// Size was non-finite, non-positive, or beyond the largest scale.
    SizeClamped,
    /// Text has glyphs outside Latin-1 that render as replacements.
    UnsupportedGlyphs,
}

/// Bitmap face variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonoFace {
    Regular,
    Bold,
}

/// Resolved font for a [`FontSpec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontSelection {
    pub face: MonoFace,
    /// Integer magnification applied to the bitmap face.
    pub scale: u32,
    pub fallback_reason: Option<FontFallbackReason>,
}

/// Backend metrics for a selection, in output pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontMetrics {
    /// Advance per character.
    pub char_width: i32,
    /// Glyph cell height.
    pub line_height: i32,
}

/// Font abstraction used by the rasterizer's text paths.
pub trait FontBackend {
    fn resolve_font(&self, font: &FontSpec) -> FontSelection;
    fn metrics(&self, selection: &FontSelection) -> FontMetrics;

    /// Draw `text` with its top-left corner at `origin`. Returns the advance
    /// width in pixels.
    fn draw_text_run<D>(
        &self,
        display: &mut D,
        selection: &FontSelection,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>;

    /// Width of `text` as this backend would draw it.
    fn text_width(&self, selection: &FontSelection, text: &str) -> i32 {
        let metrics = self.metrics(selection);
        normalize_text_for_mono(text).chars().count() as i32 * metrics.char_width
    }
}

/// Scaled built-in bitmap fonts.
///
/// Every caption family maps onto two Latin-1 faces; size is matched by
/// integer magnification of the glyph cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoFontBackend;

impl MonoFontBackend {
    fn font_for(face: MonoFace) -> &'static MonoFont<'static> {
        match face {
            MonoFace::Regular => &FONT_10X20,
            MonoFace::Bold => &FONT_9X18_BOLD,
        }
    }

    fn face_for_weight(weight: u16) -> MonoFace {
        if weight >= 600 {
            MonoFace::Bold
        } else {
            MonoFace::Regular
        }
    }

    fn family_supported(family: &str) -> bool {
        let primary = family
            .split(',')
            .next()
            .unwrap_or("")
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_ascii_lowercase();
        matches!(
            primary.as_str(),
            "impact"
                | "anton"
                | "bebas neue"
                | "montserrat"
                | "comic neue"
                | "inter"
                | "times new roman"
                | "serif"
                | "sans-serif"
                | "monospace"
                | "cursive"
        )
    }
}

impl FontBackend for MonoFontBackend {
    fn resolve_font(&self, font: &FontSpec) -> FontSelection {
        let face = Self::face_for_weight(font.weight);
        let cell_h = Self::font_for(face).character_size.height.max(1) as f32;
        let mut fallback_reason =
            (!Self::family_supported(&font.family)).then_some(FontFallbackReason::UnknownFamily);

        let scale = if font.size_px.is_finite() && font.size_px > 0.0 {
            let wanted = (font.size_px / cell_h).round();
            if wanted > MAX_SCALE as f32 {
                fallback_reason = Some(FontFallbackReason::SizeClamped);
            }
            (wanted as u32).clamp(1, MAX_SCALE)
        } else {
            fallback_reason = Some(FontFallbackReason::SizeClamped);
            1
        };

        FontSelection {
            face,
            scale,
            fallback_reason,
        }
    }

    fn metrics(&self, selection: &FontSelection) -> FontMetrics {
        let font = Self::font_for(selection.face);
        let scale = selection.scale.max(1) as i32;
        FontMetrics {
            char_width: (font.character_size.width + font.character_spacing) as i32 * scale,
            line_height: font.character_size.height as i32 * scale,
        }
    }

    fn draw_text_run<D>(
        &self,
        display: &mut D,
        selection: &FontSelection,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let font = Self::font_for(selection.face);
        let style = MonoTextStyle::new(font, color);
        let normalized = normalize_text_for_mono(text);
        let mut target = ScaledTarget::new(display, origin, selection.scale);
        Text::with_baseline(normalized.as_ref(), Point::zero(), style, Baseline::Top)
            .draw(&mut target)?;
        Ok(self.text_width(selection, &normalized))
    }
}

/// Map typographic punctuation onto Latin-1 equivalents.
pub(crate) fn normalize_text_for_mono(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|ch| {
        matches!(
            ch,
            '\u{2013}' // en dash
                | '\u{2014}' // em dash
                | '\u{2018}' // left single quote
                | '\u{2019}' // right single quote
                | '\u{201C}' // left double quote
                | '\u{201D}' // right double quote
                | '\u{2026}' // ellipsis
        )
    }) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// True when some glyph falls outside the Latin-1 bitmap faces.
pub(crate) fn has_unsupported_glyphs(text: &str) -> bool {
    normalize_text_for_mono(text)
        .chars()
        .any(|ch| (ch as u32) > 0xFF)
}

/// Draw target adapter that magnifies every pixel into a `scale`-sized block
/// placed relative to `origin`.
pub struct ScaledTarget<'a, D> {
    inner: &'a mut D,
    origin: Point,
    scale: u32,
}

impl<'a, D> ScaledTarget<'a, D>
where
    D: DrawTarget,
{
    pub fn new(inner: &'a mut D, origin: Point, scale: u32) -> Self {
        Self {
            inner,
            origin,
            scale: scale.max(1),
        }
    }

    fn map_rect(&self, area: &Rectangle) -> Rectangle {
        let s = self.scale as i32;
        Rectangle::new(
            Point::new(
                self.origin.x.saturating_add(area.top_left.x.saturating_mul(s)),
                self.origin.y.saturating_add(area.top_left.y.saturating_mul(s)),
            ),
            Size::new(
                area.size.width.saturating_mul(self.scale),
                area.size.height.saturating_mul(self.scale),
            ),
        )
    }
}

impl<D> OriginDimensions for ScaledTarget<'_, D>
where
    D: DrawTarget,
{
    fn size(&self) -> Size {
        let inner = self.inner.bounding_box();
        let span = |extent: u32, start: i32, origin: i32| {
            let visible = (start as i64 + extent as i64 - origin as i64).max(0) as u64;
            visible.div_ceil(self.scale as u64).min(i32::MAX as u64 / 2) as u32
        };
        Size::new(
            span(inner.size.width, inner.top_left.x, self.origin.x),
            span(inner.size.height, inner.top_left.y, self.origin.y),
        )
    }
}

impl<D> DrawTarget for ScaledTarget<'_, D>
where
    D: DrawTarget,
{
    type Color = D::Color;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let block = Size::new(self.scale, self.scale);
        for Pixel(point, color) in pixels {
            let rect = self.map_rect(&Rectangle::new(point, Size::new(1, 1)));
            self.inner
                .fill_solid(&Rectangle::new(rect.top_left, block), color)?;
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let rect = self.map_rect(area);
        self.inner.fill_solid(&rect, color)
    }
}

/// [`TextMeasurer`] backed by a [`FontBackend`], so wrapping decisions use
/// the widths the rasterizer draws.
#[derive(Clone, Debug)]
pub struct RasterTextMeasurer<B = MonoFontBackend> {
    backend: B,
}

impl RasterTextMeasurer<MonoFontBackend> {
    pub fn new() -> Self {
        Self {
            backend: MonoFontBackend,
        }
    }

    /// Shared trait object for layout wiring.
    pub fn shared() -> Arc<dyn TextMeasurer> {
        Arc::new(Self::new())
    }
}

impl Default for RasterTextMeasurer<MonoFontBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> RasterTextMeasurer<B>
where
    B: FontBackend,
{
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }
}

impl<B> TextMeasurer for RasterTextMeasurer<B>
where
    B: FontBackend + Send + Sync,
{
    fn measure_text_px(&self, text: &str, font: &FontSpec) -> f32 {
        let selection = self.backend.resolve_font(font);
        self.backend.text_width(&selection, text).max(0) as f32
    }
}
