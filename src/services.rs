//! Contracts for the generative caption and background services.
//!
//! The services are remote and opaque. Core code only depends on these traits
//! and on an explicitly passed [`ServiceContext`]; credentials are never read
//! from ambient state inside rendering code.

use core::fmt;

use crate::model::{Color, MemePatch, MemeState, Suggestion, Tone};

/// Default model identifier passed to service implementations.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Explicit configuration for service calls.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceContext {
    /// API key, if the backend needs one.
    pub api_key: Option<String>,
    /// Backend model identifier.
    pub model: String,
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("has_api_key", &self.api_key.is_some())
            .field("model", &self.model)
            .finish()
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ServiceContext {
    /// Context with an explicit key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        let trimmed = key.trim();
        Self {
            api_key: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..Self::default()
        }
    }

    /// Context whose key is read once from the named environment variable.
    pub fn from_env_var(name: &str) -> Self {
        match std::env::var(name) {
            Ok(key) => Self::with_api_key(key),
            Err(_) => Self::default(),
        }
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Service call failure.
#[derive(Debug)]
pub enum ServiceError {
    /// No credentials were configured.
    MissingCredentials,
    /// The service rejected the request (content policy, quota, ...).
    Rejected(String),
    /// Transport or backend failure.
    Backend(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "service credentials are not configured"),
            Self::Rejected(msg) => write!(f, "service rejected the request: {}", msg),
            Self::Backend(msg) => write!(f, "service call failed: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Caption suggestion service.
pub trait CaptionService {
    /// Suggest caption pairs for an image in the requested tone, best first.
    fn suggest_captions(
        &self,
        ctx: &ServiceContext,
        image: &[u8],
        mime_type: &str,
        tone: Tone,
    ) -> Result<Vec<Suggestion>, ServiceError>;
}

/// Background generation and image editing service.
///
/// Implementations return a new image reference (usually a PNG data URL) or
/// `None` when the backend produced no image.
pub trait BackgroundService {
    fn generate_background(
        &self,
        ctx: &ServiceContext,
        prompt: &str,
    ) -> Result<Option<String>, ServiceError>;

    fn edit_image(
        &self,
        ctx: &ServiceContext,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<Option<String>, ServiceError>;
}

/// Prompt used to request caption pairs.
pub fn caption_prompt(tone: Tone) -> String {
    format!(
        "Analyze this image and suggest 5 pairs of hilarious, relevant meme captions (Top text and Bottom text) in a \"{}\" tone. Return ONLY a JSON array of objects with 'top' and 'bottom' properties.",
        tone.as_str()
    )
}

/// Prompt used to generate a fresh background.
pub fn background_prompt(description: &str) -> String {
    format!(
        "Create a cinematic, meme-worthy, high-resolution background image based on this description: {}. Do not include any text in the image.",
        description.trim()
    )
}

/// Prompt used to edit an existing background.
pub fn edit_prompt(instruction: &str) -> String {
    format!(
        "Modify this image based on the following instruction: \"{}\". Respond with ONLY the modified image.",
        instruction.trim()
    )
}

/// Parse a caption-service JSON payload.
///
/// Malformed payloads yield an empty list.
pub fn parse_suggestions(json: &str) -> Vec<Suggestion> {
    let payload = if json.trim().is_empty() { "[]" } else { json };
    match serde_json::from_str::<Vec<Suggestion>>(payload) {
        Ok(list) => list,
        Err(err) => {
            log::warn!("failed to parse caption suggestions: {}", err);
            Vec::new()
        }
    }
}

/// Prefill captions and color from the first suggestion.
///
/// Returns `None` when there are no suggestions.
pub fn apply_first_suggestion(state: &MemeState, suggestions: &[Suggestion]) -> Option<MemeState> {
    let first = suggestions.first()?;
    let color = first
        .suggested_color
        .as_deref()
        .and_then(Color::parse)
        .unwrap_or(Color::WHITE);
    Some(state.apply(&MemePatch {
        top_text: Some(first.top.clone()),
        bottom_text: Some(first.bottom.clone()),
        text_color: Some(color),
        ..MemePatch::default()
    }))
}

/// Suggestions kept around as user-selectable alternatives.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SuggestionSet {
    items: Vec<Suggestion>,
}

impl SuggestionSet {
    pub fn new(items: Vec<Suggestion>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        self.items.iter()
    }

    /// Drop all alternatives, e.g. after a new image upload.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Apply the suggestion at `index` to `state`. The text color changes only
    /// when the suggestion carries a parseable color.
    pub fn select(&self, state: &MemeState, index: usize) -> Option<MemeState> {
        let chosen = self.items.get(index)?;
        Some(state.apply(&MemePatch {
            top_text: Some(chosen.top.clone()),
            bottom_text: Some(chosen.bottom.clone()),
            text_color: chosen.suggested_color.as_deref().and_then(Color::parse),
            ..MemePatch::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_parse_with_optional_color() {
        let list = parse_suggestions(
            r##"[{"top":"me","bottom":"also me","suggestedColor":"#ffff00"},{"top":"a","bottom":"b"}]"##,
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].suggested_color.as_deref(), Some("#ffff00"));
        assert_eq!(list[1].suggested_color, None);
    }

    #[test]
    fn malformed_or_empty_payloads_yield_no_suggestions() {
        assert!(parse_suggestions("").is_empty());
        assert!(parse_suggestions("{not json").is_empty());
        assert!(parse_suggestions(r#"{"top":"x"}"#).is_empty());
    }

    #[test]
    fn first_suggestion_prefills_captions_and_color() {
        let state = MemeState::default();
        let suggestions = vec![
            Suggestion {
                top: "when the build".to_string(),
                bottom: "finally passes".to_string(),
                suggested_color: Some("#ffff00".to_string()),
            },
            Suggestion {
                top: "alt".to_string(),
                bottom: "alt".to_string(),
                suggested_color: None,
            },
        ];
        let next = apply_first_suggestion(&state, &suggestions).expect("has suggestions");
        assert_eq!(next.top_text, "when the build");
        assert_eq!(next.bottom_text, "finally passes");
        assert_eq!(next.text_color, Color::rgb(0xff, 0xff, 0));
        assert!(apply_first_suggestion(&state, &[]).is_none());

        let mut colored = state.clone();
        colored.text_color = Color::BLACK;
        let reset = apply_first_suggestion(&colored, &suggestions[1..]).expect("has suggestion");
        assert_eq!(reset.text_color, Color::WHITE);
    }

    #[test]
    fn alternatives_can_be_selected_later() {
        let set = SuggestionSet::new(vec![
            Suggestion {
                top: "one".to_string(),
                bottom: "two".to_string(),
                suggested_color: None,
            },
            Suggestion {
                top: "three".to_string(),
                bottom: "four".to_string(),
                suggested_color: None,
            },
            Suggestion {
                top: "five".to_string(),
                bottom: "six".to_string(),
                suggested_color: Some("#ff0000".to_string()),
            },
        ]);
        let yellow = MemeState {
            text_color: Color::rgb(255, 255, 0),
            ..MemeState::default()
        };
        let picked = set.select(&yellow, 1).expect("index in range");
        assert_eq!(picked.top_text, "three");
        assert_eq!(picked.text_color, Color::rgb(255, 255, 0));

        let colored = set.select(&yellow, 2).expect("index in range");
        assert_eq!(colored.bottom_text, "six");
        assert_eq!(colored.text_color, Color::rgb(255, 0, 0));
        assert!(set.select(&MemeState::default(), 5).is_none());
    }

    #[test]
    fn context_debug_hides_the_key() {
        let ctx = ServiceContext::with_api_key("  secret  ");
        assert_eq!(ctx.api_key.as_deref(), Some("secret"));
        let debug = format!("{:?}", ctx);
        assert!(!debug.contains("secret"));
        assert!(ServiceContext::with_api_key("   ").api_key.is_none());
    }

    #[test]
    fn prompts_embed_tone_and_instructions() {
        assert!(caption_prompt(Tone::GenZ).contains("\"gen-z\" tone"));
        assert!(background_prompt(" a cat ").contains("description: a cat."));
        assert!(edit_prompt("add a hat").contains("\"add a hat\""));
    }
}
