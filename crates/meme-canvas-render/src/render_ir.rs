use meme_canvas::{Color, MemeStyle};
use std::sync::Arc;

type SplitLayerCommandIter<'a> = core::iter::Chain<
    core::iter::Chain<core::slice::Iter<'a, DrawCommand>, core::slice::Iter<'a, DrawCommand>>,
    core::slice::Iter<'a, DrawCommand>,
>;

/// Iterator over frame commands in content/caption/overlay order.
pub struct MergedCommandIter<'a> {
    inner: SplitLayerCommandIter<'a>,
}

impl<'a> Iterator for MergedCommandIter<'a> {
    type Item = &'a DrawCommand;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Natural pixel size of a decoded background image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in canvas units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FrameRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }
}

/// Snapped guide positions, in percent of the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActiveGuides {
    /// Vertical guide at this horizontal percent.
    pub x: Option<f32>,
    /// Horizontal guide at this vertical percent.
    pub y: Option<f32>,
}

impl ActiveGuides {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }
}

/// Font request resolved by the layout engine.
///
/// Backends map this onto concrete faces; the same value is used for
/// measurement and drawing.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    /// Family stack, most preferred first (CSS-like, comma separated).
    pub family: Arc<str>,
    /// Numeric weight (400 regular, 900 black).
    pub weight: u16,
    /// Size in pixels.
    pub size_px: f32,
}

impl FontSpec {
    pub fn new(family: impl Into<Arc<str>>, weight: u16, size_px: f32) -> Self {
        Self {
            family: family.into(),
            weight,
            size_px,
        }
    }

    /// First family in the stack, without quotes.
    pub fn primary_family(&self) -> &str {
        self.family
            .split(',')
            .next()
            .unwrap_or("")
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
    }
}

/// Horizontal anchoring of a text line relative to its `x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Vertical anchoring of a text line relative to its `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextBaseline {
    /// `y` is the top of the line box.
    Top,
    /// `y` is the bottom of the line box.
    Bottom,
}

/// Outline drawn behind text fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextStroke {
    pub color: Color,
    /// Full stroke width; half of it extends outside the glyphs.
    pub width: u32,
}

/// Frame output commands.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// Reset the whole canvas to transparent.
    Clear,
    /// Fill the whole canvas with an opaque color.
    Fill(Color),
    /// Filled or stroked rectangle.
    Rect(RectCommand),
    /// Background image placement.
    Image(ImageCommand),
    /// One caption line.
    Text(TextCommand),
    /// Dashed drag guide.
    Guide(GuideCommand),
}

/// Rectangle command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RectCommand {
    pub rect: FrameRect,
    pub color: Color,
    /// Stroke width centered on the edge; `None` fills the rectangle.
    pub stroke_width: Option<u32>,
}

/// Background image command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageCommand {
    /// Destination rectangle the whole image is scaled into.
    pub dest: FrameRect,
    /// Optional clip; pixels outside are not drawn.
    pub clip: Option<FrameRect>,
}

/// Text line command.
#[derive(Clone, Debug, PartialEq)]
pub struct TextCommand {
    /// Anchor x; meaning depends on `align`.
    pub x: i32,
    /// Anchor y; meaning depends on `baseline`.
    pub y: i32,
    pub text: String,
    pub font: FontSpec,
    pub align: TextAlign,
    pub baseline: TextBaseline,
    pub color: Color,
    pub stroke: Option<TextStroke>,
}

impl TextCommand {
    /// Top edge of the nominal line box (`font.size_px` tall).
    pub fn top_px(&self) -> f32 {
        match self.baseline {
            TextBaseline::Top => self.y as f32,
            TextBaseline::Bottom => self.y as f32 - self.font.size_px,
        }
    }

    /// Bottom edge of the nominal line box.
    pub fn bottom_px(&self) -> f32 {
        self.top_px() + self.font.size_px
    }
}

/// Guide direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuideAxis {
    /// Vertical line at `position` on the x axis.
    Vertical,
    /// Horizontal line at `position` on the y axis.
    Horizontal,
}

/// Dashed guide line spanning the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuideCommand {
    pub axis: GuideAxis,
    pub position: i32,
    pub dash_on: u32,
    pub dash_off: u32,
    pub color: Color,
    pub width: u32,
}

/// Layout measurements reported alongside a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameMetrics {
    /// Factor mapping natural image width onto the reference width.
    pub reference_scale: f32,
    /// Natural image height times `reference_scale`.
    pub scaled_image_height: f32,
    /// Area reserved for the image before user pan/zoom.
    pub image_area: FrameRect,
    /// Modern-style header band height (0 for other styles).
    pub header_height: f32,
}

/// One composed meme: canvas size plus ordered draw commands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemeFrame {
    pub width: u32,
    pub height: u32,
    pub style: MemeStyle,
    /// Background fill and image placement.
    pub content_commands: Vec<DrawCommand>,
    /// Caption lines.
    pub caption_commands: Vec<DrawCommand>,
    /// Drag guides, present only while a caption drag is active.
    pub overlay_commands: Vec<DrawCommand>,
    /// Wrapped top caption lines.
    pub top_lines: Vec<String>,
    /// Wrapped bottom caption lines.
    pub bottom_lines: Vec<String>,
    pub metrics: FrameMetrics,
}

impl MemeFrame {
    /// Create an empty frame.
    pub fn new(width: u32, height: u32, style: MemeStyle) -> Self {
        Self {
            width,
            height,
            style,
            ..Self::default()
        }
    }

    pub fn push_content_command(&mut self, cmd: DrawCommand) {
        self.content_commands.push(cmd);
    }

    pub fn push_caption_command(&mut self, cmd: DrawCommand) {
        self.caption_commands.push(cmd);
    }

    pub fn push_overlay_command(&mut self, cmd: DrawCommand) {
        self.overlay_commands.push(cmd);
    }

    /// Number of commands across all layers.
    pub fn merged_commands_len(&self) -> usize {
        self.content_commands.len() + self.caption_commands.len() + self.overlay_commands.len()
    }

    /// Iterate all layers without allocating.
    pub fn merged_commands_iter(&self) -> MergedCommandIter<'_> {
        MergedCommandIter {
            inner: self
                .content_commands
                .iter()
                .chain(self.caption_commands.iter())
                .chain(self.overlay_commands.iter()),
        }
    }

    /// Caption text commands in draw order.
    pub fn text_commands(&self) -> impl Iterator<Item = &TextCommand> {
        self.caption_commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Text(text) => Some(text),
            _ => None,
        })
    }

    /// Canvas bounds as a rectangle at the origin.
    pub fn bounds(&self) -> FrameRect {
        FrameRect::new(0, 0, self.width, self.height)
    }
}
