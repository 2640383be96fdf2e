use core::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::surface::RgbaSurface;

/// Encoded PNG snapshot of a composed canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ExportedImage {
    /// Snapshot as a `data:image/png;base64,...` URL, the form galleries
    /// store.
    pub fn to_data_url(&self) -> String {
        meme_canvas::encode_data_url("image/png", &self.bytes)
    }
}

/// Export failure.
#[derive(Debug)]
pub enum ExportError {
    /// Nothing has been rendered yet.
    NotReady,
    Encode(image::ImageError),
    Io(std::io::Error),
    /// The clipboard rejected the image.
    Clipboard(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "canvas has not been rendered"),
            Self::Encode(err) => write!(f, "png encode error: {}", err),
            Self::Io(err) => write!(f, "export write error: {}", err),
            Self::Clipboard(msg) => write!(f, "clipboard error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<image::ImageError> for ExportError {
    fn from(value: image::ImageError) -> Self {
        Self::Encode(value)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Encode the surface as an RGBA PNG at its native size.
pub fn encode_png(surface: &RgbaSurface) -> Result<ExportedImage, ExportError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        surface.pixels().as_raw(),
        surface.width(),
        surface.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(ExportedImage {
        bytes,
        width: surface.width(),
        height: surface.height(),
    })
}

/// Download name for a snapshot taken at `timestamp_ms`.
pub fn download_file_name(timestamp_ms: u128) -> String {
    format!("meme-{}.png", timestamp_ms)
}

/// Milliseconds since the Unix epoch, `0` if the clock is before it.
pub fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Write the PNG to `path`.
pub fn save_png(image: &ExportedImage, path: &Path) -> Result<(), ExportError> {
    std::fs::write(path, &image.bytes)?;
    log::info!(
        "saved {}x{} meme to {}",
        image.width,
        image.height,
        path.display()
    );
    Ok(())
}

/// Write the PNG into `dir` under a timestamped `meme-<ms>.png` name.
pub fn save_to_dir(image: &ExportedImage, dir: &Path) -> Result<PathBuf, ExportError> {
    let path = dir.join(download_file_name(timestamp_ms()));
    save_png(image, &path)?;
    Ok(path)
}

/// Destination for clipboard copies.
pub trait ClipboardSink {
    fn write_png(&mut self, image: &ExportedImage) -> Result<(), String>;
}

/// Copy the PNG to `sink`. Failures are logged and returned, never fatal.
pub fn copy_to_clipboard<S>(sink: &mut S, image: &ExportedImage) -> Result<(), ExportError>
where
    S: ClipboardSink + ?Sized,
{
    sink.write_png(image).map_err(|msg| {
        log::warn!("clipboard copy failed: {}", msg);
        ExportError::Clipboard(msg)
    })
}

/// OS clipboard through `arboard`.
#[cfg(feature = "system-clipboard")]
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

#[cfg(feature = "system-clipboard")]
impl SystemClipboard {
    pub fn new() -> Result<Self, ExportError> {
        arboard::Clipboard::new()
            .map(|inner| Self { inner })
            .map_err(|err| ExportError::Clipboard(err.to_string()))
    }
}

#[cfg(feature = "system-clipboard")]
impl ClipboardSink for SystemClipboard {
    fn write_png(&mut self, image: &ExportedImage) -> Result<(), String> {
        // arboard takes raw RGBA rather than encoded PNG.
        let rgba = image::load_from_memory(&image.bytes)
            .map_err(|err| err.to_string())?
            .to_rgba8();
        let data = arboard::ImageData {
            width: rgba.width() as usize,
            height: rgba.height() as usize,
            bytes: std::borrow::Cow::Owned(rgba.into_raw()),
        };
        self.inner.set_image(data).map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingClipboard {
        copies: Vec<(u32, u32)>,
        fail: bool,
    }

    impl ClipboardSink for RecordingClipboard {
        fn write_png(&mut self, image: &ExportedImage) -> Result<(), String> {
            if self.fail {
                return Err("clipboard busy".to_string());
            }
            self.copies.push((image.width, image.height));
            Ok(())
        }
    }

    #[test]
    fn png_keeps_native_size_and_pixels() {
        let mut surface = RgbaSurface::new(5, 3);
        surface.blend_pixel(4, 2, [9, 8, 7, 255]);
        let exported = encode_png(&surface).expect("encode");
        assert_eq!((exported.width, exported.height), (5, 3));
        assert!(exported.bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let decoded = image::load_from_memory(&exported.bytes)
            .expect("decode")
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (5, 3));
        assert_eq!(decoded.get_pixel(4, 2).0, [9, 8, 7, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert!(exported.to_data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn download_name_uses_timestamp() {
        assert_eq!(download_file_name(1_700_000_000_123), "meme-1700000000123.png");
        assert!(timestamp_ms() > 0);
    }

    #[test]
    fn clipboard_failures_are_reported() {
        let exported = encode_png(&RgbaSurface::new(2, 2)).expect("encode");
        let mut ok = RecordingClipboard::default();
        copy_to_clipboard(&mut ok, &exported).expect("copy");
        assert_eq!(ok.copies, vec![(2, 2)]);

        let mut busy = RecordingClipboard {
            fail: true,
            ..RecordingClipboard::default()
        };
        let err = copy_to_clipboard(&mut busy, &exported).expect_err("should fail");
        assert!(matches!(err, ExportError::Clipboard(ref msg) if msg == "clipboard busy"));
    }

    #[test]
    fn saves_into_directory() {
        let dir = std::env::temp_dir().join(format!("meme-canvas-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let exported = encode_png(&RgbaSurface::new(1, 1)).expect("encode");
        let path = save_to_dir(&exported, &dir).expect("save");
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        assert!(name.starts_with("meme-") && name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).expect("read"), exported.bytes);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
