//! Embedding services: the OpenAI-compatible HTTP API and local Model2Vec models

use crate::config::EmbeddingConfig;
use crate::error::{RelativityError, Result};
use model2vec_rs::model::StaticModel;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

/// Text in, fixed-length vector out.
///
/// Every vector returned by one service has `dimensions()` entries.
pub trait EmbeddingService: Send + Sync {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Upper bound on a single embedding call unless configured otherwise
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Embed `text`, failing with `EmbeddingService` when the call outlives `limit`
/// or the vector length differs from `dimensions()`.
pub async fn embed_with_timeout<E: EmbeddingService>(
    embedder: &E,
    text: &str,
    limit: Duration,
    label: &str,
) -> Result<Vec<f32>> {
    let vector = tokio::time::timeout(limit, embedder.embed(text))
        .await
        .map_err(|_| {
            RelativityError::EmbeddingService(format!("Embedding {} timed out after {:?}", label, limit))
        })??;

    if vector.len() != embedder.dimensions() {
        return Err(RelativityError::EmbeddingService(format!(
            "Expected {} dimensions for {}, got {}",
            embedder.dimensions(),
            label,
            vector.len()
        )));
    }
    Ok(vector)
}

/// Client for `POST {base_url}/embeddings`
pub struct OpenAiEmbeddingService {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingService {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ec-relativity/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RelativityError::EmbeddingService(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            model: model.to_string(),
            dimensions,
        })
    }

    /// Build from config, reading the API key from the configured environment variable
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            log::warn!(
                "{} is not set; embedding requests will be sent without credentials",
                config.api_key_env
            );
        }
        Self::new(
            &config.base_url,
            api_key,
            &config.model,
            config.dimensions,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start_time = Instant::now();
        let url = format!("{}/embeddings", self.base_url);

        let mut request = self.http.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RelativityError::EmbeddingService(format!("Request to {} timed out", url))
            } else {
                RelativityError::EmbeddingService(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelativityError::EmbeddingService(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RelativityError::EmbeddingService(format!("Failed to parse response: {}", e)))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RelativityError::EmbeddingService("Response contained no embeddings".to_string()))?;

        log::debug!(
            "Embedded {} chars with {} in {:.2?}",
            text.len(),
            self.model,
            start_time.elapsed()
        );
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Local static embeddings via Model2Vec
pub struct Model2VecEmbeddingService {
    model: StaticModel,
    model_name: String,
    dimensions: usize,
}

impl Model2VecEmbeddingService {
    /// Load from a local model folder or a Hugging Face repo id
    pub fn load(repo_or_path: &str) -> Result<Self> {
        let start_time = Instant::now();
        log::info!("Loading Model2Vec embedding model from: {}", repo_or_path);

        let model = StaticModel::from_pretrained(repo_or_path, None, None, None)?;
        let dimensions = model.encode_single("dimension probe").len();
        if dimensions == 0 {
            return Err(RelativityError::EmbeddingService(format!(
                "Model2Vec model '{}' produced empty embeddings",
                repo_or_path
            )));
        }

        log::info!("Model loaded in {:.2?} ({} dimensions)", start_time.elapsed(), dimensions);
        Ok(Self {
            model,
            model_name: repo_or_path.to_string(),
            dimensions,
        })
    }
}

impl EmbeddingService for Model2VecEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.model.encode_single(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// The embedding service selected in configuration
pub enum ConfiguredEmbedder {
    OpenAi(OpenAiEmbeddingService),
    Model2Vec(Model2VecEmbeddingService),
}

impl ConfiguredEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        match config.provider.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi(OpenAiEmbeddingService::from_config(config)?)),
            "model2vec" => {
                let source = config
                    .model2vec_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|| config.model.clone());
                Ok(Self::Model2Vec(Model2VecEmbeddingService::load(&source)?))
            }
            other => Err(RelativityError::Configuration(format!(
                "Unknown embedding provider: {}. Supported: openai, model2vec",
                other
            ))),
        }
    }
}

impl EmbeddingService for ConfiguredEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Self::OpenAi(service) => service.embed(text).await,
            Self::Model2Vec(service) => service.embed(text).await,
        }
    }

    fn dimensions(&self) -> usize {
        match self {
            Self::OpenAi(service) => service.dimensions(),
            Self::Model2Vec(service) => service.dimensions(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Self::OpenAi(service) => service.model_name(),
            Self::Model2Vec(service) => service.model_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Never answers
    struct StalledEmbedder;

    impl EmbeddingService for StalledEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            std::future::pending().await
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let err = embed_with_timeout(&StalledEmbedder, "Approves budgets", Duration::from_millis(10), "Decision Making")
            .await
            .unwrap_err();
        match err {
            RelativityError::EmbeddingService(message) => assert!(message.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_openai_service_trims_base_url() {
        let service = OpenAiEmbeddingService::new(
            "https://api.openai.com/v1/ ",
            Some("  ".to_string()),
            "text-embedding-3-small",
            1536,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(service.base_url(), "https://api.openai.com/v1");
        assert_eq!(service.dimensions(), 1536);
        assert!(service.api_key.is_none());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            ConfiguredEmbedder::from_config(&config),
            Err(RelativityError::Configuration(_))
        ));
    }
}
