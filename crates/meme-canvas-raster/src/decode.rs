use core::fmt;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbaImage;
use meme_canvas::{resolve_image, FileFetcher, ImageFetcher, SourceError};
use meme_canvas_render::{ImageSize, LoadTicket};

/// Default pixel budget for decoded backgrounds.
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 40_000_000;

/// Background image load failure.
#[derive(Debug)]
pub enum LoadError {
    /// Reference could not be resolved into bytes.
    Source(SourceError),
    /// Bytes were not a decodable image.
    Decode(image::ImageError),
    /// Decoded image exceeds the pixel budget.
    TooLarge { width: u32, height: u32, limit: u64 },
    /// Image has a zero dimension.
    Empty,
    /// The loader thread is gone.
    Disconnected,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(err) => write!(f, "image source error: {}", err),
            Self::Decode(err) => write!(f, "image decode error: {}", err),
            Self::TooLarge {
                width,
                height,
                limit,
            } => write!(
                f,
                "image {}x{} exceeds the {} pixel limit",
                width, height, limit
            ),
            Self::Empty => write!(f, "image has no pixels"),
            Self::Disconnected => write!(f, "image loader stopped"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SourceError> for LoadError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

impl From<image::ImageError> for LoadError {
    fn from(value: image::ImageError) -> Self {
        Self::Decode(value)
    }
}

/// Decoded background pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl DecodedImage {
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, LoadError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(LoadError::Empty);
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Natural size used for layout.
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width(), self.height())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Decode encoded image bytes, sniffing the format from content.
pub fn decode_image(bytes: &[u8], max_pixels: u64) -> Result<DecodedImage, LoadError> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| LoadError::Decode(image::ImageError::IoError(err)))?;
    let (width, height) = reader.into_dimensions()?;
    if width as u64 * height as u64 > max_pixels {
        return Err(LoadError::TooLarge {
            width,
            height,
            limit: max_pixels,
        });
    }
    let decoded = image::load_from_memory(bytes)?;
    DecodedImage::from_rgba(decoded.to_rgba8())
}

/// Resolve an image reference and decode it.
pub fn load_image(
    reference: &str,
    fetcher: &dyn ImageFetcher,
    max_pixels: u64,
) -> Result<DecodedImage, LoadError> {
    let inline = resolve_image(reference, fetcher)?;
    log::debug!(
        "decoding {} bytes declared as {}",
        inline.bytes.len(),
        inline.mime_type
    );
    decode_image(&inline.bytes, max_pixels)
}

/// Finished load reported by [`ImageLoader`].
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub result: Result<DecodedImage, LoadError>,
}

struct LoadJob {
    ticket: LoadTicket,
    reference: String,
}

/// Background worker that resolves and decodes images off the caller's
/// thread.
pub struct ImageLoader {
    jobs: Option<Sender<LoadJob>>,
    results: Receiver<LoadOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(Arc::new(FileFetcher), DEFAULT_MAX_IMAGE_PIXELS)
    }
}

impl ImageLoader {
    /// Start the worker thread.
    pub fn new(fetcher: Arc<dyn ImageFetcher>, max_pixels: u64) -> Self {
        let (job_tx, job_rx) = channel::<LoadJob>();
        let (result_tx, result_rx) = channel();
        let spawned = std::thread::Builder::new()
            .name("meme-image-loader".to_string())
            .spawn(move || {
                for job in job_rx {
                    let result = load_image(&job.reference, fetcher.as_ref(), max_pixels);
                    let outcome = LoadOutcome {
                        ticket: job.ticket,
                        result,
                    };
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        let worker = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("failed to spawn image loader: {}", err);
                None
            }
        };
        Self {
            jobs: worker.as_ref().map(|_| job_tx),
            results: result_rx,
            worker,
        }
    }

    /// Queue a load. Returns `false` when the worker is unavailable.
    pub fn request(&self, ticket: LoadTicket, reference: impl Into<String>) -> bool {
        let Some(jobs) = &self.jobs else {
            return false;
        };
        jobs.send(LoadJob {
            ticket,
            reference: reference.into(),
        })
        .is_ok()
    }

    /// Next finished load, if any, without blocking.
    pub fn try_next(&self) -> Option<LoadOutcome> {
        self.results.try_recv().ok()
    }

    /// Wait up to `timeout` for the next finished load.
    pub fn next_timeout(&self, timeout: Duration) -> Result<Option<LoadOutcome>, LoadError> {
        match self.results.recv_timeout(timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LoadError::Disconnected),
        }
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
