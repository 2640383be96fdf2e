use core::fmt;
use serde::{Deserialize, Serialize};

/// Default caption size in pixels.
pub const DEFAULT_FONT_SIZE: f32 = 48.0;
/// Default classic caption typeface.
pub const DEFAULT_FONT_FAMILY: &str = "Impact, sans-serif";

/// Selectable caption typeface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontOption {
    /// Display name.
    pub name: &'static str,
    /// Family stack passed to the renderer.
    pub value: &'static str,
}

/// Typefaces offered by editors for classic captions.
pub const AVAILABLE_FONTS: &[FontOption] = &[
    FontOption {
        name: "Impact",
        value: "Impact, sans-serif",
    },
    FontOption {
        name: "Anton (Modern Impact)",
        value: "Anton, sans-serif",
    },
    FontOption {
        name: "Bebas Neue",
        value: "Bebas Neue, sans-serif",
    },
    FontOption {
        name: "Montserrat Black",
        value: "Montserrat, sans-serif",
    },
    FontOption {
        name: "Comic Style",
        value: "Comic Neue, cursive",
    },
];

/// Starter background template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemeTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub url: &'static str,
}

/// Trending templates shown before the user picks an image.
pub const TRENDING_TEMPLATES: &[MemeTemplate] = &[
    MemeTemplate {
        id: "1",
        name: "Distracted Boyfriend",
        url: "https://picsum.photos/seed/distracted/800/600",
    },
    MemeTemplate {
        id: "2",
        name: "Woman Yelling at Cat",
        url: "https://picsum.photos/seed/cat/800/600",
    },
    MemeTemplate {
        id: "3",
        name: "Drake Hotline Bling",
        url: "https://picsum.photos/seed/drake/800/600",
    },
    MemeTemplate {
        id: "4",
        name: "Success Kid",
        url: "https://picsum.photos/seed/success/800/600",
    },
    MemeTemplate {
        id: "5",
        name: "Two Buttons",
        url: "https://picsum.photos/seed/buttons/800/600",
    },
    MemeTemplate {
        id: "6",
        name: "Think About It",
        url: "https://picsum.photos/seed/think/800/600",
    },
];

/// Layout algorithm used for the whole canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemeStyle {
    /// Captions drawn over a full-bleed image.
    #[default]
    Classic,
    /// White header band with the top caption above the image.
    Modern,
    /// Black poster frame with both captions below the image.
    Demotivational,
}

impl MemeStyle {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Modern => "modern",
            Self::Demotivational => "demotivational",
        }
    }

    /// Parse a lowercase style name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "classic" => Some(Self::Classic),
            "modern" => Some(Self::Modern),
            "demotivational" => Some(Self::Demotivational),
            _ => None,
        }
    }
}

impl fmt::Display for MemeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Humor register requested from the caption service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    #[serde(rename = "sarcastic")]
    Sarcastic,
    #[serde(rename = "wholesome")]
    Wholesome,
    #[serde(rename = "gen-z")]
    GenZ,
    #[serde(rename = "brainrot")]
    Brainrot,
    #[serde(rename = "edgy")]
    Edgy,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Self::Sarcastic,
        Self::Wholesome,
        Self::GenZ,
        Self::Brainrot,
        Self::Edgy,
    ];

    /// Label used in service prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sarcastic => "sarcastic",
            Self::Wholesome => "wholesome",
            Self::GenZ => "gen-z",
            Self::Brainrot => "brainrot",
            Self::Edgy => "edgy",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque RGB color.
///
/// Serialized as `#rrggbb`. Unparseable inputs deserialize as white so a
/// stray value in a stored snapshot never blocks rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Drag guide accent.
    pub const GUIDE: Self = Self::rgb(0x63, 0x66, 0xf1);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb`, `#rrggbb`, or a handful of CSS color names.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        match value.to_ascii_lowercase().as_str() {
            "white" => Some(Self::WHITE),
            "black" => Some(Self::BLACK),
            "red" => Some(Self::rgb(0xff, 0, 0)),
            "green" => Some(Self::rgb(0, 0x80, 0)),
            "lime" => Some(Self::rgb(0, 0xff, 0)),
            "blue" => Some(Self::rgb(0, 0, 0xff)),
            "yellow" => Some(Self::rgb(0xff, 0xff, 0)),
            "orange" => Some(Self::rgb(0xff, 0xa5, 0)),
            "purple" => Some(Self::rgb(0x80, 0, 0x80)),
            "pink" => Some(Self::rgb(0xff, 0xc0, 0xcb)),
            "cyan" => Some(Self::rgb(0, 0xff, 0xff)),
            "magenta" => Some(Self::rgb(0xff, 0, 0xff)),
            "gray" | "grey" => Some(Self::rgb(0x80, 0x80, 0x80)),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            3 => {
                let mut channels = [0u8; 3];
                for (slot, digit) in channels.iter_mut().zip(hex.chars()) {
                    let v = digit.to_digit(16)? as u8;
                    *slot = v * 17;
                }
                Some(Self::rgb(channels[0], channels[1], channels[2]))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::rgb(r, g, b))
            }
            _ => None,
        }
    }

    /// Lowercase `#rrggbb` form.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<String> for Color {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_else(|| {
            log::warn!("unparseable caption color {:?}; using white", value);
            Self::WHITE
        })
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One caption pair proposed by the caption service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub top: String,
    pub bottom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_color: Option<String>,
}

/// Everything needed to render one meme.
///
/// Values are never mutated by the renderer; every edit goes through
/// [`MemeState::apply`] and yields a new state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemeState {
    /// Background image reference (data URL, URL, or path).
    #[serde(rename = "imageUrl")]
    pub image: Option<String>,
    pub top_text: String,
    pub bottom_text: String,
    pub top_font_size: f32,
    pub bottom_font_size: f32,
    /// Caption fill, classic style only.
    pub text_color: Color,
    /// Caption typeface, classic style only.
    pub font_family: String,
    /// Top caption anchor, percent of canvas height.
    pub top_offset: f32,
    /// Bottom caption anchor, percent of canvas height.
    pub bottom_offset: f32,
    /// Top caption anchor, percent of canvas width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_x: Option<f32>,
    /// Bottom caption anchor, percent of canvas width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_x: Option<f32>,
    pub style: MemeStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_x_offset: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_y_offset: Option<f32>,
}

impl Default for MemeState {
    fn default() -> Self {
        Self {
            image: None,
            top_text: "ENTER TOP TEXT".to_string(),
            bottom_text: "ENTER BOTTOM TEXT".to_string(),
            top_font_size: DEFAULT_FONT_SIZE,
            bottom_font_size: DEFAULT_FONT_SIZE,
            text_color: Color::WHITE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            top_offset: 5.0,
            bottom_offset: 95.0,
            top_x: None,
            bottom_x: None,
            style: MemeStyle::Classic,
            image_scale: None,
            image_x_offset: None,
            image_y_offset: None,
        }
    }
}

impl MemeState {
    /// Default state pointing at an image reference.
    pub fn with_image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// Horizontal anchor of the top caption (percent, default centered).
    pub fn top_anchor_x(&self) -> f32 {
        self.top_x.unwrap_or(50.0)
    }

    /// Horizontal anchor of the bottom caption (percent, default centered).
    pub fn bottom_anchor_x(&self) -> f32 {
        self.bottom_x.unwrap_or(50.0)
    }

    /// User zoom applied to the drawn image rectangle.
    pub fn image_zoom(&self) -> f32 {
        match self.image_scale {
            Some(scale) if scale.is_finite() && scale > 0.0 => scale,
            _ => 1.0,
        }
    }

    /// User pan applied to the drawn image rectangle.
    pub fn image_offset(&self) -> (f32, f32) {
        (
            finite_or_zero(self.image_x_offset),
            finite_or_zero(self.image_y_offset),
        )
    }

    /// Return a new state with `patch` applied.
    pub fn apply(&self, patch: &MemePatch) -> Self {
        let mut next = self.clone();
        if let Some(image) = &patch.image {
            next.image = Some(image.clone());
        }
        if let Some(text) = &patch.top_text {
            next.top_text = text.clone();
        }
        if let Some(text) = &patch.bottom_text {
            next.bottom_text = text.clone();
        }
        if let Some(size) = patch.top_font_size {
            next.top_font_size = size;
        }
        if let Some(size) = patch.bottom_font_size {
            next.bottom_font_size = size;
        }
        if let Some(color) = patch.text_color {
            next.text_color = color;
        }
        if let Some(family) = &patch.font_family {
            next.font_family = family.clone();
        }
        if let Some(offset) = patch.top_offset {
            next.top_offset = offset;
        }
        if let Some(offset) = patch.bottom_offset {
            next.bottom_offset = offset;
        }
        if let Some(x) = patch.top_x {
            next.top_x = Some(x);
        }
        if let Some(x) = patch.bottom_x {
            next.bottom_x = Some(x);
        }
        if let Some(style) = patch.style {
            next.style = style;
        }
        if let Some(scale) = patch.image_scale {
            next.image_scale = Some(scale);
        }
        if let Some(x) = patch.image_x_offset {
            next.image_x_offset = Some(x);
        }
        if let Some(y) = patch.image_y_offset {
            next.image_y_offset = Some(y);
        }
        next
    }
}

fn finite_or_zero(value: Option<f32>) -> f32 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Partial update to a [`MemeState`]. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemePatch {
    pub image: Option<String>,
    pub top_text: Option<String>,
    pub bottom_text: Option<String>,
    pub top_font_size: Option<f32>,
    pub bottom_font_size: Option<f32>,
    pub text_color: Option<Color>,
    pub font_family: Option<String>,
    pub top_offset: Option<f32>,
    pub bottom_offset: Option<f32>,
    pub top_x: Option<f32>,
    pub bottom_x: Option<f32>,
    pub style: Option<MemeStyle>,
    pub image_scale: Option<f32>,
    pub image_x_offset: Option<f32>,
    pub image_y_offset: Option<f32>,
}

impl MemePatch {
    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Patch replacing the background image.
    pub fn image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// Patch replacing both caption texts.
    pub fn captions(top: impl Into<String>, bottom: impl Into<String>) -> Self {
        Self {
            top_text: Some(top.into()),
            bottom_text: Some(bottom.into()),
            ..Self::default()
        }
    }

    /// Patch selecting a layout style.
    pub fn style(style: MemeStyle) -> Self {
        Self {
            style: Some(style),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parses_short_long_and_named_forms() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#FF8000"), Some(Color::rgb(0xff, 0x80, 0)));
        assert_eq!(Color::parse("yellow"), Some(Color::rgb(0xff, 0xff, 0)));
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn unparseable_color_deserializes_as_white() {
        let state: MemeState =
            serde_json::from_str(r#"{"textColor":"not-a-color"}"#).expect("parse state");
        assert_eq!(state.text_color, Color::WHITE);
    }

    #[test]
    fn state_serializes_with_camel_case_and_image_url() {
        let mut state = MemeState::with_image("data:image/png;base64,AAAA");
        state.style = MemeStyle::Demotivational;
        state.text_color = Color::rgb(0xff, 0, 0);
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["imageUrl"], "data:image/png;base64,AAAA");
        assert_eq!(json["topText"], "ENTER TOP TEXT");
        assert_eq!(json["style"], "demotivational");
        assert_eq!(json["textColor"], "#ff0000");
        assert!(json.get("topX").is_none());
    }

    #[test]
    fn missing_fields_take_session_defaults() {
        let state: MemeState =
            serde_json::from_str(r#"{"topText":"HI","style":"modern"}"#).expect("parse state");
        assert_eq!(state.top_text, "HI");
        assert_eq!(state.bottom_text, "ENTER BOTTOM TEXT");
        assert_eq!(state.style, MemeStyle::Modern);
        assert_eq!(state.top_offset, 5.0);
        assert_eq!(state.bottom_offset, 95.0);
    }

    #[test]
    fn apply_returns_new_value_and_leaves_original_untouched() {
        let base = MemeState::default();
        let next = base.apply(&MemePatch {
            top_x: Some(12.0),
            image_x_offset: Some(4.0),
            ..MemePatch::default()
        });
        assert_eq!(base.top_x, None);
        assert_eq!(next.top_x, Some(12.0));
        assert_eq!(next.image_offset(), (4.0, 0.0));
        assert_eq!(next.top_text, base.top_text);
    }

    #[test]
    fn anchors_and_image_transform_fall_back_to_defaults() {
        let mut state = MemeState::default();
        assert_eq!(state.top_anchor_x(), 50.0);
        assert_eq!(state.bottom_anchor_x(), 50.0);
        state.image_scale = Some(0.0);
        assert_eq!(state.image_zoom(), 1.0);
        state.image_y_offset = Some(f32::NAN);
        assert_eq!(state.image_offset(), (0.0, 0.0));
    }

    #[test]
    fn tone_labels_round_trip() {
        for tone in Tone::ALL {
            assert_eq!(Tone::from_label(tone.as_str()), Some(tone));
        }
        assert_eq!(
            serde_json::to_string(&Tone::GenZ).expect("serialize"),
            "\"gen-z\""
        );
    }
}
