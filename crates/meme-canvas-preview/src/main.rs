use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use meme_canvas::{Color, FileFetcher, FileGallery, GalleryStore, MemeState, MemeStyle};
use meme_canvas_raster::{
    Compositor, ImageLoader, RasterConfig, RasterRenderer, ResampleFilter,
    DEFAULT_MAX_IMAGE_PIXELS,
};
use meme_canvas_render::{
    CanvasConfig, CanvasStatus, ClientPoint, DisplayRect, InteractionConfig, LayoutEngine,
};
use serde::{Deserialize, Serialize};

const DEFAULT_OUT_PATH: &str = "target/meme-preview/meme.png";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Debug, Default)]
struct Args {
    state_path: Option<String>,
    config_path: Option<String>,
    image: Option<String>,
    style: Option<MemeStyle>,
    top: Option<String>,
    bottom: Option<String>,
    top_size: Option<f32>,
    bottom_size: Option<f32>,
    color: Option<Color>,
    font: Option<String>,
    out_path: Option<String>,
    out_dir: Option<String>,
    drag: Vec<(f32, f32)>,
    gallery_path: Option<String>,
    embed: bool,
    timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct PreviewConfig {
    canvas: CanvasConfig,
    hit_tolerance: f32,
    snap_threshold: f32,
    max_filtered_pixels: u64,
    max_image_pixels: u64,
    filter: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let interaction = InteractionConfig::default();
        let raster = RasterConfig::default();
        Self {
            canvas: CanvasConfig::default(),
            hit_tolerance: interaction.hit_tolerance,
            snap_threshold: interaction.snap_threshold,
            max_filtered_pixels: raster.max_filtered_pixels,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
            filter: "triangle".to_string(),
        }
    }
}

impl PreviewConfig {
    fn load(path: &str) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("read config {}: {}", path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| format!("parse config {}: {}", path, e))
    }

    fn resample_filter(&self) -> Result<ResampleFilter, String> {
        match self.filter.as_str() {
            "nearest" => Ok(ResampleFilter::Nearest),
            "triangle" => Ok(ResampleFilter::Triangle),
            "catmull-rom" => Ok(ResampleFilter::CatmullRom),
            other => Err(format!("invalid filter '{}'", other)),
        }
    }

    fn interaction(&self) -> InteractionConfig {
        InteractionConfig::default()
            .with_hit_tolerance(self.hit_tolerance)
            .with_snap_threshold(self.snap_threshold)
    }

    fn raster(&self) -> Result<RasterConfig, String> {
        Ok(RasterConfig::default()
            .with_max_filtered_pixels(self.max_filtered_pixels)
            .with_filter(self.resample_filter()?))
    }
}

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cli = parse_args(args)?;
    let cfg = match &cli.config_path {
        Some(path) => PreviewConfig::load(path)?,
        None => PreviewConfig::default(),
    };
    let state = build_state(&cli)?;
    if state.image.is_none() {
        return Err("no image: pass --image or a --state file with imageUrl".to_string());
    }

    let renderer = RasterRenderer::new(cfg.raster()?);
    let loader = ImageLoader::new(Arc::new(FileFetcher), cfg.max_image_pixels);
    let mut compositor = Compositor::with_parts(
        LayoutEngine::new(cfg.canvas.clone()),
        cfg.interaction(),
        renderer,
        loader,
        state,
    );

    let status = compositor
        .wait_for_image(Duration::from_millis(cli.timeout_ms))
        .map_err(|e| e.to_string())?
        .clone();
    match status {
        CanvasStatus::Ready => {}
        CanvasStatus::Failed(msg) => return Err(format!("image load failed: {}", msg)),
        CanvasStatus::Loading => {
            return Err(format!("image load timed out after {}ms", cli.timeout_ms))
        }
        CanvasStatus::Placeholder => return Err("no image to render".to_string()),
    }

    if !cli.drag.is_empty() {
        replay_drag(&mut compositor, &cli.drag)?;
    }

    let exported = compositor.export_png().map_err(|e| e.to_string())?;
    let written = match (&cli.out_dir, &cli.out_path) {
        (Some(dir), _) => {
            std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
            meme_canvas_raster::save_to_dir(&exported, Path::new(dir))
                .map_err(|e| e.to_string())?
        }
        (None, path) => {
            let path = Path::new(path.as_deref().unwrap_or(DEFAULT_OUT_PATH)).to_path_buf();
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
            }
            meme_canvas_raster::save_png(&exported, &path).map_err(|e| e.to_string())?;
            path
        }
    };

    let commands = compositor
        .frame()
        .map(|frame| frame.merged_commands_len())
        .unwrap_or(0);
    let diagnostics = compositor.last_diagnostics();
    println!(
        "wrote {} ({}x{}, style={}, commands={}, text_fallbacks={})",
        written.display(),
        exported.width,
        exported.height,
        compositor.state().style.as_str(),
        commands,
        diagnostics.text_fallbacks(),
    );

    if let Some(path) = &cli.gallery_path {
        let mut gallery = FileGallery::open(path);
        let saved = gallery
            .save(compositor.state())
            .map_err(|e| e.to_string())?;
        if saved {
            println!("saved to gallery {} ({} entries)", path, gallery.list().len());
        }
    }

    if cli.embed {
        println!("{}", exported.to_data_url());
    }
    Ok(())
}

fn build_state(cli: &Args) -> Result<MemeState, String> {
    let mut state = match &cli.state_path {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|e| format!("read state {}: {}", path, e))?;
            serde_json::from_slice::<MemeState>(&bytes)
                .map_err(|e| format!("parse state {}: {}", path, e))?
        }
        None => MemeState::default(),
    };
    if let Some(image) = &cli.image {
        state.image = Some(image.clone());
    }
    if let Some(style) = cli.style {
        state.style = style;
    }
    if let Some(top) = &cli.top {
        state.top_text = top.clone();
    }
    if let Some(bottom) = &cli.bottom {
        state.bottom_text = bottom.clone();
    }
    if let Some(size) = cli.top_size {
        state.top_font_size = size;
    }
    if let Some(size) = cli.bottom_size {
        state.bottom_font_size = size;
    }
    if let Some(color) = cli.color {
        state.text_color = color;
    }
    if let Some(font) = &cli.font {
        state.font_family = font.clone();
    }
    Ok(state)
}

/// Press at the first point, move through the rest, release. Points are in
/// canvas pixels; the canvas is treated as displayed at native size.
fn replay_drag(compositor: &mut Compositor, points: &[(f32, f32)]) -> Result<(), String> {
    let (width, height) = compositor
        .frame()
        .map(|frame| (frame.width, frame.height))
        .ok_or_else(|| "no frame to drag on".to_string())?;
    let display = DisplayRect::new(0.0, 0.0, width as f32, height as f32);
    let mut iter = points.iter().map(|&(x, y)| ClientPoint::new(x, y));
    let Some(start) = iter.next() else {
        return Ok(());
    };
    let target = compositor
        .pointer_down(start, display)
        .ok_or_else(|| "drag did not start".to_string())?;
    for point in iter {
        compositor.pointer_move(point, display);
    }
    if let Some(committed) = compositor.pointer_up() {
        println!(
            "drag {:?}: top=({:.1}%, {:.1}%) bottom=({:.1}%, {:.1}%) image_offset=({:.1}, {:.1})",
            target,
            committed.top_anchor_x(),
            committed.top_offset,
            committed.bottom_anchor_x(),
            committed.bottom_offset,
            committed.image_offset().0,
            committed.image_offset().1,
        );
    }
    Ok(())
}

fn parse_drag(value: &str) -> Result<Vec<(f32, f32)>, String> {
    value
        .split(';')
        .filter(|p| !p.trim().is_empty())
        .map(|point| {
            let (x, y) = point
                .split_once(',')
                .ok_or_else(|| format!("invalid drag point '{}'", point))?;
            let x = x
                .trim()
                .parse::<f32>()
                .map_err(|_| format!("invalid drag x '{}'", x))?;
            let y = y
                .trim()
                .parse::<f32>()
                .map_err(|_| format!("invalid drag y '{}'", y))?;
            Ok((x, y))
        })
        .collect()
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }

    let mut cfg = Args {
        timeout_ms: DEFAULT_TIMEOUT_MS,
        ..Args::default()
    };

    let mut i = 1usize;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--embed" => {
                cfg.embed = true;
                i += 1;
                continue;
            }
            "--state" | "--config" | "--image" | "--style" | "--top" | "--bottom"
            | "--top-size" | "--bottom-size" | "--color" | "--font" | "--out" | "--out-dir"
            | "--drag" | "--gallery" | "--timeout-ms" => {}
            other => return Err(format!("unknown argument '{}'", other)),
        }
        let v = args
            .get(i + 1)
            .ok_or_else(|| format!("{} requires a value", flag))?
            .clone();
        match flag {
            "--state" => cfg.state_path = Some(v),
            "--config" => cfg.config_path = Some(v),
            "--image" => cfg.image = Some(v),
            "--style" => {
                cfg.style = Some(
                    MemeStyle::from_name(&v)
                        .ok_or_else(|| format!("invalid --style value '{}'", v))?,
                );
            }
            "--top" => cfg.top = Some(v),
            "--bottom" => cfg.bottom = Some(v),
            "--top-size" => {
                cfg.top_size = Some(
                    v.parse::<f32>()
                        .map_err(|_| format!("invalid --top-size value '{}'", v))?,
                );
            }
            "--bottom-size" => {
                cfg.bottom_size = Some(
                    v.parse::<f32>()
                        .map_err(|_| format!("invalid --bottom-size value '{}'", v))?,
                );
            }
            "--color" => {
                cfg.color =
                    Some(Color::parse(&v).ok_or_else(|| format!("invalid --color value '{}'", v))?);
            }
            "--font" => cfg.font = Some(v),
            "--out" => cfg.out_path = Some(v),
            "--out-dir" => cfg.out_dir = Some(v),
            "--drag" => cfg.drag = parse_drag(&v)?,
            "--gallery" => cfg.gallery_path = Some(v),
            "--timeout-ms" => {
                cfg.timeout_ms = v
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --timeout-ms value '{}'", v))?;
            }
            _ => {}
        }
        i += 2;
    }
    Ok(cfg)
}

fn help_text() -> &'static str {
    r#"meme-preview - render a meme to PNG with meme-canvas

USAGE:
  cargo run -p meme-canvas-preview --bin meme-preview -- [options]

OPTIONS:
  --state <file>          MemeState JSON (camelCase fields, e.g. imageUrl, topText)
  --image <ref>           background: data URL, file:// URL or path
  --style <name>          classic|modern|demotivational
  --top <text>            top caption
  --bottom <text>         bottom caption
  --top-size <px>         top caption font size (default: 48)
  --bottom-size <px>      bottom caption font size (default: 48)
  --color <color>         caption color, #rgb, #rrggbb or a CSS name (classic only)
  --font <family>         caption font family (classic only)
  --config <file>         JSON layout/raster config; missing fields take defaults
  --out <file>            output PNG path (default: target/meme-preview/meme.png)
  --out-dir <dir>         write meme-<timestamp>.png into <dir> instead of --out
  --drag <points>         replay a drag, "x,y;x,y;..." in canvas pixels
  --gallery <file>        also save the final state to a JSON gallery file
  --embed                 print the PNG as a data URL
  --timeout-ms <n>        image load timeout (default: 10000)
"#
}
