//! Meme state model, image sources, and collaborator contracts.
//!
//! This crate holds the data side of `meme-canvas`: the immutable
//! [`MemeState`] value that drives rendering, typed partial updates
//! ([`MemePatch`]), image references and data URLs, the contracts consumed
//! from caption/background services, and the small gallery and history
//! containers used by editors.
//!
//! Layout and rasterization live in `meme-canvas-render` and
//! `meme-canvas-raster`.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod gallery;
pub mod history;
pub mod image_source;
mod model;
pub mod services;

pub use gallery::{FileGallery, GalleryError, GalleryStore, MemoryGallery, GALLERY_CAPACITY};
pub use history::{History, HISTORY_CAPACITY};
pub use image_source::{
    classify_image_ref, encode_data_url, parse_base64_image, parse_data_url, resolve_image,
    FileFetcher, ImageFetcher, ImageRef, InlineImage, SourceError,
};
pub use model::{
    Color, FontOption, MemePatch, MemeState, MemeStyle, MemeTemplate, Suggestion, Tone,
    AVAILABLE_FONTS, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, TRENDING_TEMPLATES,
};
pub use services::{
    apply_first_suggestion, background_prompt, caption_prompt, edit_prompt, parse_suggestions,
    BackgroundService, CaptionService, ServiceContext, ServiceError, SuggestionSet, DEFAULT_MODEL,
};
