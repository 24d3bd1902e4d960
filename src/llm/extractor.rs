//! Turns a free-text job description into per-element text via a chat model

use crate::config::ExtractionConfig;
use crate::error::{RelativityError, Result};
use crate::llm::prompts::{PromptTemplates, SYSTEM_PROMPT};
use crate::processing::element::{EcElement, ElementTextMap};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

const CODE_FENCE_PATTERN: &str = r"```(?:json)?\s*([\s\S]*?)\s*```";

pub trait ElementExtractor: Send + Sync {
    fn extract_elements(&self, description: &str) -> impl Future<Output = Result<ElementTextMap>> + Send;
}

/// Client for `POST {base_url}/chat/completions`
pub struct OpenAiElementExtractor {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    prompts: PromptTemplates,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiElementExtractor {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ec-relativity/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RelativityError::Extraction(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            model: model.to_string(),
            temperature,
            prompts: PromptTemplates::default(),
        })
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            log::warn!(
                "{} is not set; extraction requests will be sent without credentials",
                config.api_key_env
            );
        }
        Self::new(
            &config.base_url,
            api_key,
            &config.model,
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelativityError::Extraction(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelativityError::Extraction(format!(
                "Chat API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RelativityError::Extraction(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RelativityError::Extraction("Assistant returned no content".to_string()))
    }
}

impl ElementExtractor for OpenAiElementExtractor {
    async fn extract_elements(&self, description: &str) -> Result<ElementTextMap> {
        let start_time = Instant::now();
        let prompt = self.prompts.render_element_extraction(description);
        let raw = self.complete(&prompt).await?;

        log::debug!("Extraction response in {:.2?}: {} chars", start_time.elapsed(), raw.len());
        parse_extraction_response(&raw)
    }
}

/// Parse the assistant's JSON answer, tolerating markdown code fences
pub fn parse_extraction_response(raw: &str) -> Result<ElementTextMap> {
    let fence = Regex::new(CODE_FENCE_PATTERN)
        .map_err(|e| RelativityError::Extraction(format!("Invalid fence pattern: {}", e)))?;
    let cleaned = fence.replace_all(raw, "$1");
    let cleaned = cleaned.trim();

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        RelativityError::Extraction(format!("Could not parse EC elements: {}. Response: {}", e, raw))
    })?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(RelativityError::Extraction(format!(
                "Expected a JSON object keyed by element, got: {}",
                other
            )))
        }
    };

    let mut texts = ElementTextMap::new();
    for (key, value) in object {
        match EcElement::from_name(&key) {
            Some(element) => texts.insert(element, value_to_text(value)),
            None => log::debug!("Ignoring unknown element in extraction output: {}", key),
        }
    }
    Ok(texts)
}

/// Read pre-extracted elements from a JSON file
pub fn load_elements_file(path: &Path) -> Result<ElementTextMap> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RelativityError::InvalidInput(format!("Cannot read elements file {}: {}", path.display(), e))
    })?;
    parse_extraction_response(&content)
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Array(items) => items
            .into_iter()
            .map(value_to_text)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_is_accepted() {
        let raw = "```json\n{\"Decision Making\": \"Approves budgets\"}\n```";
        let texts = parse_extraction_response(raw).unwrap();
        assert_eq!(texts.get(EcElement::DecisionMaking), "Approves budgets");
    }

    #[test]
    fn test_prose_around_fence_is_rejected() {
        let raw = "Here you go:\n```json\n{\"Decision Making\": \"Approves budgets\"}\n```";
        assert!(matches!(
            parse_extraction_response(raw),
            Err(RelativityError::Extraction(_))
        ));
    }

    #[test]
    fn test_value_shapes() {
        let raw = r#"{
            "communication": ["Briefs senior management", "Writes memos"],
            "Physical Effort": null,
            "Working Conditions": 3,
            "Salary": "n/a"
        }"#;
        let texts = parse_extraction_response(raw).unwrap();
        assert_eq!(
            texts.get(EcElement::Communication),
            "Briefs senior management\nWrites memos"
        );
        assert_eq!(texts.get(EcElement::PhysicalEffort), "");
        assert_eq!(texts.get(EcElement::WorkingConditions), "3");
        assert_eq!(texts.populated().len(), 2);
    }

    #[test]
    fn test_non_object_is_an_error() {
        assert!(matches!(
            parse_extraction_response("[\"Decision Making\"]"),
            Err(RelativityError::Extraction(_))
        ));
        assert!(matches!(
            parse_extraction_response("not json"),
            Err(RelativityError::Extraction(_))
        ));
    }
}
