//! Decoding of the assistant's book suggestions.
//!
//! `POST /chat` answers with one text blob. It holds zero or more fragments
//! separated by a literal `{}`; in each fragment, lines 1 to 4 carry the
//! `"key": "value",` pairs of one suggestion. The layout is fixed by the
//! backend's prompt, so the decoding sits behind [`ChatSuggestionParser`] and
//! can be swapped once the backend returns structured JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatPrompt {
    pub name: String,
    pub category: String,
    pub topic: String,
    pub author: String,
}

/// One suggested book. Only the fields the assistant actually sent are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub trait ChatSuggestionParser: Send + Sync {
    /// Decodes `raw` into suggestions, tagging each with `library_id`.
    /// Best effort: malformed parts are skipped, never fatal.
    fn parse(&self, raw: &str, library_id: &str) -> Vec<Suggestion>;
}

/// The line-positional format the backend emits today.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedTextParser;

impl DelimitedTextParser {
    pub const DELIMITER: &'static str = "{}";
    /// Fragments with fewer lines than this are incomplete.
    pub const MIN_LINES: usize = 6;

    /// The JSON text synthesized for each complete fragment, in order.
    pub fn candidates(raw: &str, library_id: &str) -> Vec<String> {
        let library = Value::String(library_id.to_string());
        raw.split(Self::DELIMITER)
            .filter_map(|fragment| {
                let lines: Vec<&str> = fragment.split('\n').collect();
                if lines.len() < Self::MIN_LINES {
                    return None;
                }
                let body = lines[1..=4].join(" ");
                let open = if body.trim_start().starts_with('{') { "" } else { "{" };
                Some(format!("{}{} \"library\": {}}}", open, body, library))
            })
            .collect()
    }
}

impl ChatSuggestionParser for DelimitedTextParser {
    fn parse(&self, raw: &str, library_id: &str) -> Vec<Suggestion> {
        Self::candidates(raw, library_id)
            .into_iter()
            .filter_map(|text| match serde_json::from_str::<Suggestion>(&text) {
                Ok(s) => Some(s),
                Err(e) => {
                    log::warn!("Skipping unparseable suggestion ({}): {}", e, text);
                    None
                }
            })
            .collect()
    }
}

/// Running list of every suggestion received this session, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    suggestions: Vec<Suggestion>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a decoded batch and returns the index of its first element.
    pub fn extend(&mut self, batch: Vec<Suggestion>) -> usize {
        let start = self.suggestions.len();
        self.suggestions.extend(batch);
        start
    }

    pub fn get(&self, index: usize) -> Option<&Suggestion> {
        self.suggestions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter()
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}
