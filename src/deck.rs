//! Deck and slide types, plus a thin JSON deck loader.
//!
//! Slides arrive pre-validated by the deck tooling; this loader only
//! deserializes and hands the theme to the theme resolver. Transition names
//! stay strings here — conversion to the closed variant happens at the
//! render boundary.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::theme::{Theme, ThemeValidationError};

/// Per-slide presentation metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Frontmatter {
    pub title: String,
    #[serde(default)]
    pub big_text: Option<String>,
    #[serde(default)]
    pub gradient: Option<String>,
    #[serde(default)]
    pub theme_override: Option<Value>,
    #[serde(default = "default_transition")]
    pub transition: String,
    #[serde(default)]
    pub meta: Option<String>,
}

fn default_transition() -> String {
    "typewriter".to_string()
}

/// One presentation unit. Immutable.
#[derive(Debug, Clone)]
pub struct Slide {
    pub frontmatter: Frontmatter,
    pub body: String,
    pub notes: Option<String>,
    pub index: usize,
}

/// Ordered slides plus the deck theme.
#[derive(Debug, Clone)]
pub struct Deck {
    pub slides: Vec<Slide>,
    pub theme: Theme,
}

#[derive(Debug, Deserialize)]
struct RawDeck {
    #[serde(default)]
    theme: Option<Value>,
    slides: Vec<RawSlide>,
}

#[derive(Debug, Deserialize)]
struct RawSlide {
    #[serde(flatten)]
    frontmatter: Frontmatter,
    #[serde(default)]
    body: String,
    #[serde(default)]
    notes: Option<String>,
}

/// Errors from loading a deck file.
#[derive(Debug)]
pub enum DeckError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    ThemeError(ThemeValidationError),
}

impl std::fmt::Display for DeckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckError::IoError { path, source } => {
                write!(f, "Failed to read deck file '{}': {}", path.display(), source)
            }
            DeckError::ParseError { path, source } => {
                write!(f, "Failed to parse deck file '{}': {}", path.display(), source)
            }
            DeckError::ThemeError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DeckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeckError::IoError { source, .. } => Some(source),
            DeckError::ParseError { source, .. } => Some(source),
            DeckError::ThemeError(e) => Some(e),
        }
    }
}

impl From<ThemeValidationError> for DeckError {
    fn from(e: ThemeValidationError) -> Self {
        DeckError::ThemeError(e)
    }
}

impl Deck {
    /// Load a deck from a JSON file: `{ "theme": {...}, "slides": [...] }`.
    /// A missing theme falls back to the built-in matrix theme.
    pub fn load(path: &Path) -> Result<Deck, DeckError> {
        let content = std::fs::read_to_string(path).map_err(|e| DeckError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Deck::from_json(&content).map_err(|e| match e {
            DeckError::ParseError { source, .. } => DeckError::ParseError {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse a deck from JSON text.
    pub fn from_json(text: &str) -> Result<Deck, DeckError> {
        let raw: RawDeck = serde_json::from_str(text).map_err(|e| DeckError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        let theme = match raw.theme {
            Some(value) => Theme::create(&value)?,
            None => Theme::matrix(),
        };
        let slides = raw
            .slides
            .into_iter()
            .enumerate()
            .map(|(index, s)| Slide {
                frontmatter: s.frontmatter,
                body: s.body,
                notes: s.notes,
                index,
            })
            .collect();
        Ok(Deck { slides, theme })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = r#"{
        "slides": [
            { "title": "One", "transition": "glitch", "body": "first" },
            { "title": "Two", "big_text": "HI", "gradient": "matrix", "body": "second" }
        ]
    }"#;

    #[test]
    fn test_load_minimal_deck() {
        let deck = Deck::from_json(DECK).unwrap();
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[0].frontmatter.title, "One");
        assert_eq!(deck.slides[1].index, 1);
        assert_eq!(deck.theme.name, "matrix");
    }

    #[test]
    fn test_default_transition() {
        let deck = Deck::from_json(r#"{ "slides": [{ "title": "t", "body": "" }] }"#).unwrap();
        assert_eq!(deck.slides[0].frontmatter.transition, "typewriter");
    }

    #[test]
    fn test_invalid_theme_is_fatal() {
        let text = r##"{
            "theme": { "name": "x", "colors": { "primary": "nope", "accent": "#fff",
                "background": "#000", "text": "#fff", "muted": "#888" } },
            "slides": []
        }"##;
        assert!(matches!(
            Deck::from_json(text),
            Err(DeckError::ThemeError(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Deck::from_json("not json"),
            Err(DeckError::ParseError { .. })
        ));
    }
}
