//! Image references: data URLs, file paths and remote URLs.
//!
//! A meme's background is stored as a single string. Uploaded bytes are
//! encoded into a `data:` URL so every source is handled the same way by the
//! loader, which resolves the string back into bytes before decoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use core::fmt;
use std::path::Path;

/// Mime type assumed for bare base64 payloads.
const FALLBACK_MIME: &str = "image/jpeg";

/// Decoded inline image payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Classified image reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageRef<'a> {
    /// `data:` URL carrying the bytes inline.
    Data(&'a str),
    /// `http://` or `https://` URL.
    Remote(&'a str),
    /// Local file, either a plain path or a `file://` URL.
    File(&'a str),
}

/// Image reference resolution error.
#[derive(Debug)]
pub enum SourceError {
    /// Reference string was empty.
    Empty,
    /// `data:` URL did not match `data:<mime>;base64,<payload>`.
    MalformedDataUrl,
    /// Base64 payload failed to decode.
    Base64(base64::DecodeError),
    /// Reading a local file failed.
    Io(std::io::Error),
    /// No fetcher is able to resolve this URL scheme.
    UnsupportedScheme(String),
    /// A fetcher reported a failure.
    Fetch(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "image reference is empty"),
            Self::MalformedDataUrl => write!(f, "malformed data URL"),
            Self::Base64(err) => write!(f, "invalid base64 image payload: {}", err),
            Self::Io(err) => write!(f, "failed to read image file: {}", err),
            Self::UnsupportedScheme(url) => write!(f, "unsupported image URL: {}", url),
            Self::Fetch(msg) => write!(f, "image fetch failed: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Base64(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<base64::DecodeError> for SourceError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Base64(value)
    }
}

impl From<std::io::Error> for SourceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Encode raw image bytes as a `data:` URL.
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Strictly parse `data:<mime>;base64,<payload>`.
pub fn parse_data_url(url: &str) -> Result<InlineImage, SourceError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or(SourceError::MalformedDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(SourceError::MalformedDataUrl)?;
    let mime_type = header
        .strip_suffix(";base64")
        .filter(|mime| !mime.is_empty())
        .ok_or(SourceError::MalformedDataUrl)?;
    let bytes = BASE64.decode(payload.trim())?;
    Ok(InlineImage {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// Parse a data URL, treating anything else as a bare base64 JPEG payload.
///
/// Service payloads are sometimes handed over without the `data:` header.
pub fn parse_base64_image(value: &str) -> Result<InlineImage, SourceError> {
    if value.trim_start().starts_with("data:") {
        return parse_data_url(value);
    }
    let bytes = BASE64.decode(value.trim())?;
    Ok(InlineImage {
        mime_type: FALLBACK_MIME.to_string(),
        bytes,
    })
}

/// Classify an image reference string by scheme.
pub fn classify_image_ref(reference: &str) -> Result<ImageRef<'_>, SourceError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(SourceError::Empty);
    }
    let lower_prefix: String = trimmed
        .chars()
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if lower_prefix.starts_with("data:") {
        Ok(ImageRef::Data(trimmed))
    } else if lower_prefix.starts_with("http://") || lower_prefix.starts_with("https://") {
        Ok(ImageRef::Remote(trimmed))
    } else if lower_prefix.starts_with("file://") {
        Ok(ImageRef::File(&trimmed["file://".len()..]))
    } else {
        Ok(ImageRef::File(trimmed))
    }
}

/// Source of bytes for references that are not inline.
pub trait ImageFetcher: Send + Sync {
    /// Fetch bytes for a remote URL.
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, SourceError>;

    /// Read bytes for a local path.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        Ok(std::fs::read(path)?)
    }
}

/// Default fetcher: reads local files, rejects network URLs.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetcher;

impl ImageFetcher for FileFetcher {
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        Err(SourceError::UnsupportedScheme(url.to_string()))
    }
}

/// Resolve an image reference into bytes plus a mime type.
pub fn resolve_image(
    reference: &str,
    fetcher: &dyn ImageFetcher,
) -> Result<InlineImage, SourceError> {
    match classify_image_ref(reference)? {
        ImageRef::Data(url) => parse_data_url(url),
        ImageRef::Remote(url) => {
            let bytes = fetcher.fetch_remote(url)?;
            Ok(InlineImage {
                mime_type: mime_for_path(url).to_string(),
                bytes,
            })
        }
        ImageRef::File(path) => {
            let bytes = fetcher.read_file(path)?;
            Ok(InlineImage {
                mime_type: mime_for_path(path).to_string(),
                bytes,
            })
        }
    }
}

fn mime_for_path(path: &str) -> &'static str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => FALLBACK_MIME,
    }
}
