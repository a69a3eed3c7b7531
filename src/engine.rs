//! Answer engine: strategy seam, source selection policy, and the mapping
//! from strategy failures to user-facing Arabic phrases.
//!
//! The engine never surfaces a raw error to the conversation. Status-mapped
//! failures (rate limit, bad payload) translate to fixed phrases and stop
//! there; infrastructure failures (transport, malformed reply, missing
//! configuration) silently degrade to the local keyword strategy.

use async_trait::async_trait;

use crate::fallback::KeywordAnswerer;
use crate::models::{Category, Message, Source};
use crate::phrases;

/// Failure modes a strategy can report. The engine decides which of these
/// reach the user as a phrase and which trigger the local fallback.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    /// The strategy is not configured (no API key, provider disabled).
    #[error("answer strategy not configured")]
    NotConfigured,
    /// The remote call never produced an HTTP status.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The remote call returned a non-success HTTP status.
    #[error("remote returned HTTP {0}")]
    Status(u16),
    /// The remote reply parsed but carried no usable text.
    #[error("malformed reply: {0}")]
    Malformed(String),
    /// The local strategy found no topic covering the question.
    #[error("question outside available sources")]
    OutOfScope,
}

/// Anything that can turn a question plus sources plus history into text.
#[async_trait]
pub trait AnswerStrategy: Send + Sync {
    async fn produce_answer(
        &self,
        question: &str,
        sources: &[&Source],
        history: &[Message],
    ) -> Result<String, AnswerError>;
}

/// Sources participating in an answer for `category`.
///
/// A focused source wins outright when it exists and is selected; callers
/// pass a focused id for repository turns only, so focus never reaches into
/// the advisor category. Otherwise
/// the selected sources of the active category apply; when that category has
/// none, every selected source participates regardless of category, so a
/// collection uploaded under one tab still grounds the other.
pub fn relevant_sources<'a>(
    category: Category,
    focused: Option<&str>,
    all: &'a [Source],
) -> Vec<&'a Source> {
    if let Some(id) = focused {
        if let Some(source) = all.iter().find(|s| s.id == id && s.selected) {
            return vec![source];
        }
    }

    let in_category: Vec<&Source> = all
        .iter()
        .filter(|s| s.selected && s.category == category)
        .collect();
    if !in_category.is_empty() {
        return in_category;
    }

    all.iter().filter(|s| s.selected).collect()
}

/// Dual-strategy answer engine: an optional remote strategy with the local
/// keyword strategy underneath.
pub struct AnswerEngine {
    remote: Option<Box<dyn AnswerStrategy>>,
    local: KeywordAnswerer,
}

impl AnswerEngine {
    pub fn new(remote: Option<Box<dyn AnswerStrategy>>) -> Self {
        Self {
            remote,
            local: KeywordAnswerer,
        }
    }

    /// Answer a question against the participating sources. Always returns
    /// displayable Arabic text, never an error and never an empty string.
    pub async fn answer(
        &self,
        question: &str,
        sources: &[&Source],
        history: &[Message],
    ) -> String {
        if sources.is_empty() {
            return phrases::NO_SOURCES.to_string();
        }

        if let Some(remote) = &self.remote {
            match remote.produce_answer(question, sources, history).await {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        return text.to_string();
                    }
                    tracing::warn!("remote strategy returned empty text, using local fallback");
                }
                // Status-mapped failures reach the user directly; retrying
                // locally would mask a rate limit or a payload problem.
                Err(AnswerError::Status(429)) => return phrases::SYSTEM_BUSY.to_string(),
                Err(AnswerError::Status(400)) => return phrases::FILE_ERROR.to_string(),
                Err(AnswerError::Status(code)) => {
                    tracing::warn!(status = code, "remote strategy failed");
                    return phrases::GENERIC_APOLOGY.to_string();
                }
                Err(e) => {
                    tracing::warn!("remote strategy unavailable, using local fallback: {}", e);
                }
            }
        }

        match self.local.produce_answer(question, sources, history).await {
            Ok(text) => text,
            Err(_) => phrases::OUT_OF_SCOPE.to_string(),
        }
    }
}
