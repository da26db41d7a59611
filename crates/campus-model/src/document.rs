use serde::{Deserialize, Serialize};

/// A fetched page handed to the extractors.
///
/// The text is already decoded; `encoding` records the charset label the
/// decoder settled on, when one was known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// What a document's payload looks like on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Hypertext markup (anything starting with `<`).
    Markup,
    /// Delimited rows, e.g. a CSV export.
    Tabular,
}

impl RawDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encoding: None,
        }
    }

    pub fn with_encoding(text: impl Into<String>, encoding: Option<String>) -> Self {
        Self {
            text: text.into(),
            encoding,
        }
    }

    /// Sniff the payload format from its first non-blank character.
    pub fn kind(&self) -> DocumentKind {
        let trimmed = self.text.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('<') {
            DocumentKind::Markup
        } else {
            DocumentKind::Tabular
        }
    }
}

/// Records pulled from a document, plus an explanation when nothing matched.
///
/// Source pages are third-party and drift; an empty result with a
/// diagnostic is the normal way to report an unrecognized layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extracted<T> {
    pub records: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl<T> Extracted<T> {
    pub fn found(records: Vec<T>) -> Self {
        Self {
            records,
            diagnostic: None,
        }
    }

    pub fn empty(diagnostic: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
