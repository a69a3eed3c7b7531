//! Core data types shared across the store, engine, and session layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two conversation contexts. Sources and message logs are both
/// partitioned by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// General transition-advisor conversation.
    Advisor,
    /// Document-repository conversation (per-document Q&A).
    Repository,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Advisor => write!(f, "advisor"),
            Category::Repository => write!(f, "repository"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "advisor" => Ok(Category::Advisor),
            "repository" => Ok(Category::Repository),
            other => Err(format!(
                "unknown category: '{}'. Use advisor or repository.",
                other
            )),
        }
    }
}

/// What kind of content a source holds. Determined once at creation from
/// the file extension or supplied MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// PDF or word-processing document.
    Document,
    /// Spreadsheet (xlsx, xls, csv).
    Spreadsheet,
    /// Plain inline text.
    Text,
    /// Content fetched from an external URL.
    Link,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SourceKind::Document => "document",
            SourceKind::Spreadsheet => "spreadsheet",
            SourceKind::Text => "text",
            SourceKind::Link => "link",
        };
        write!(f, "{}", label)
    }
}

/// The content carried by a source: inline text, or an encoded binary
/// blob with its MIME type. Binary sources may additionally carry text
/// extracted at ingestion time, which grounds the local fallback answerer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum SourcePayload {
    Text { content: String },
    Binary {
        /// Base64-encoded raw bytes.
        data: String,
        mime_type: String,
        /// Best-effort plain text pulled out of the bytes; `None` when
        /// extraction failed or the format is unsupported.
        extracted_text: Option<String>,
    },
}

impl SourcePayload {
    /// The text usable for local keyword matching, if any.
    pub fn fallback_text(&self) -> Option<&str> {
        match self {
            SourcePayload::Text { content } => Some(content),
            SourcePayload::Binary { extracted_text, .. } => extracted_text.as_deref(),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, SourcePayload::Binary { .. })
    }
}

/// A stored unit of knowledge content. Immutable after creation except
/// for the `selected` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    pub category: Category,
    pub payload: SourcePayload,
    /// Whether this source participates in answer construction.
    pub selected: bool,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to create a source; id and timestamp are assigned
/// by the store on insertion.
#[derive(Debug, Clone)]
pub struct SourceDraft {
    pub name: String,
    pub kind: SourceKind,
    pub category: Category,
    pub payload: SourcePayload,
}

impl SourceDraft {
    pub fn into_source(self) -> Source {
        Source {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            kind: self.kind,
            category: self.category,
            payload: self.payload,
            selected: true,
            created_at: Utc::now(),
        }
    }
}

/// Who authored a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversational turn. Messages are append-only within a log and
/// never edited or removed individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
