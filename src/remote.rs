//! Remote generative strategy speaking the Gemini `generateContent` wire
//! format.
//!
//! Request construction is a pure function over question, sources, and
//! history so the payload shape is testable without a network. Sources ride
//! inside the final user turn: binary sources as inline base64 data parts,
//! text sources as labelled text parts.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::engine::{AnswerError, AnswerStrategy};
use crate::models::{Message, Role, Source, SourcePayload};
use crate::phrases;

pub struct GeminiChat {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: String,
}

impl GeminiChat {
    /// Build the strategy from config, or `None` when the provider is
    /// disabled or the key environment variable is unset.
    pub fn from_config(config: &ModelConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!(
                    env = %config.api_key_env,
                    "model provider enabled but API key env var is unset"
                );
                return None;
            }
        };
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn source_part(source: &Source) -> Value {
        match &source.payload {
            SourcePayload::Binary {
                data, mime_type, ..
            } => json!({
                "inline_data": { "mime_type": mime_type, "data": data }
            }),
            SourcePayload::Text { content } => json!({
                "text": format!("[مصدر: {}]\n{}", source.name, content)
            }),
        }
    }

    /// Assemble the `generateContent` request body.
    pub fn build_request(
        config: &ModelConfig,
        question: &str,
        sources: &[&Source],
        history: &[Message],
    ) -> Value {
        let mut contents: Vec<Value> = history
            .iter()
            .rev()
            .take(config.history_turns * 2)
            .rev()
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    },
                    "parts": [{ "text": m.text }]
                })
            })
            .collect();

        let mut parts: Vec<Value> = sources.iter().map(|s| Self::source_part(s)).collect();
        parts.push(json!({ "text": question }));
        contents.push(json!({ "role": "user", "parts": parts }));

        json!({
            "systemInstruction": {
                "parts": [{ "text": phrases::SYSTEM_INSTRUCTION }]
            },
            "contents": contents,
            "generationConfig": {
                "temperature": config.temperature,
                "topP": config.top_p,
                "topK": config.top_k,
                "maxOutputTokens": config.max_output_tokens,
            },
            "safetySettings": [
                { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
                { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" },
            ],
        })
    }

    /// Pull the answer text out of a `generateContent` response body.
    pub fn parse_response(body: &Value) -> Result<String, AnswerError> {
        body.pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AnswerError::Malformed("no candidate text in response".to_string()))
    }
}

#[async_trait]
impl AnswerStrategy for GeminiChat {
    async fn produce_answer(
        &self,
        question: &str,
        sources: &[&Source],
        history: &[Message],
    ) -> Result<String, AnswerError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
            self.api_key
        );
        let request = Self::build_request(&self.config, question, sources, history);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnswerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnswerError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AnswerError::Malformed(e.to_string()))?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, SourceDraft, SourceKind};

    fn text_source(name: &str, content: &str) -> Source {
        SourceDraft {
            name: name.to_string(),
            kind: SourceKind::Text,
            category: Category::Repository,
            payload: SourcePayload::Text {
                content: content.to_string(),
            },
        }
        .into_source()
    }

    fn binary_source(name: &str) -> Source {
        SourceDraft {
            name: name.to_string(),
            kind: SourceKind::Document,
            category: Category::Repository,
            payload: SourcePayload::Binary {
                data: "UERG".to_string(),
                mime_type: "application/pdf".to_string(),
                extracted_text: None,
            },
        }
        .into_source()
    }

    #[test]
    fn request_carries_system_instruction_and_generation_config() {
        let config = ModelConfig::default();
        let body = GeminiChat::build_request(&config, "سؤال", &[], &[]);

        let instruction = body
            .pointer("/systemInstruction/parts/0/text")
            .and_then(Value::as_str)
            .unwrap();
        assert_eq!(instruction, phrases::SYSTEM_INSTRUCTION);
        assert_eq!(
            body.pointer("/generationConfig/temperature"),
            Some(&json!(0.7))
        );
        assert_eq!(
            body.pointer("/safetySettings").unwrap().as_array().unwrap().len(),
            4
        );
    }

    #[test]
    fn final_turn_holds_sources_then_question() {
        let config = ModelConfig::default();
        let text = text_source("دليل", "بدل السكن 25%");
        let pdf = binary_source("لائحة");
        let body = GeminiChat::build_request(&config, "كم بدل السكن؟", &[&text, &pdf], &[]);

        let contents = body.get("contents").and_then(Value::as_array).unwrap();
        assert_eq!(contents.len(), 1);
        let parts = contents[0].get("parts").and_then(Value::as_array).unwrap();
        assert_eq!(parts.len(), 3);

        let labelled = parts[0].get("text").and_then(Value::as_str).unwrap();
        assert!(labelled.starts_with("[مصدر: دليل]"));
        assert!(labelled.contains("بدل السكن 25%"));

        assert_eq!(
            parts[1].pointer("/inline_data/mime_type"),
            Some(&json!("application/pdf"))
        );
        assert_eq!(parts[1].pointer("/inline_data/data"), Some(&json!("UERG")));

        assert_eq!(parts[2], json!({ "text": "كم بدل السكن؟" }));
    }

    #[test]
    fn focused_source_is_the_only_source_part_in_the_request() {
        let config = ModelConfig::default();
        let sources = vec![
            text_source("دليل عام", "الإجازة السنوية ثلاثون يوماً"),
            text_source("سلم الرواتب", "بدل السكن 25%"),
            text_source("التأمين", "التأمين الطبي شامل"),
        ];

        let relevant = crate::engine::relevant_sources(
            crate::models::Category::Repository,
            Some(&sources[1].id),
            &sources,
        );
        let body = GeminiChat::build_request(&config, "كم بدل السكن؟", &relevant, &[]);

        let contents = body.get("contents").and_then(Value::as_array).unwrap();
        let parts = contents[0].get("parts").and_then(Value::as_array).unwrap();
        // One source part plus the question part; the other selected
        // sources contribute nothing.
        assert_eq!(parts.len(), 2);
        let labelled = parts[0].get("text").and_then(Value::as_str).unwrap();
        assert!(labelled.starts_with("[مصدر: سلم الرواتب]"));
        assert!(!body.to_string().contains("الإجازة السنوية"));
        assert!(!body.to_string().contains("التأمين الطبي"));
    }

    #[test]
    fn history_is_trimmed_to_trailing_turns() {
        let mut config = ModelConfig::default();
        config.history_turns = 1;
        let history: Vec<Message> = (0..6)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("سؤال {}", i))
                } else {
                    Message::assistant(format!("جواب {}", i))
                }
            })
            .collect();

        let body = GeminiChat::build_request(&config, "الأخير", &[], &history);
        let contents = body.get("contents").and_then(Value::as_array).unwrap();
        // One trailing exchange (2 messages) plus the final user turn.
        assert_eq!(contents.len(), 3);
        assert_eq!(
            contents[0].pointer("/parts/0/text"),
            Some(&json!("سؤال 4"))
        );
        assert_eq!(contents[1].get("role"), Some(&json!("model")));
    }

    #[test]
    fn response_text_is_extracted_across_parts() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "بدل السكن " },
                        { "text": "خمسة وعشرون بالمئة" }
                    ]
                }
            }]
        });
        assert_eq!(
            GeminiChat::parse_response(&body).unwrap(),
            "بدل السكن خمسة وعشرون بالمئة"
        );
    }

    #[test]
    fn empty_candidates_are_malformed() {
        let body = json!({ "candidates": [] });
        assert!(matches!(
            GeminiChat::parse_response(&body),
            Err(AnswerError::Malformed(_))
        ));
    }

    #[test]
    fn whitespace_only_text_is_malformed() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "   " }] } }]
        });
        assert!(matches!(
            GeminiChat::parse_response(&body),
            Err(AnswerError::Malformed(_))
        ));
    }

    #[test]
    fn disabled_provider_yields_no_strategy() {
        let config = ModelConfig::default();
        assert!(GeminiChat::from_config(&config).is_none());
    }
}
