//! Configuration management for EC relativity search

use crate::error::{RelativityError, Result};
use crate::processing::comparator::{Paging, MAX_RETAINED_RESULTS};
use crate::processing::element::EcElement;
use crate::processing::embeddings::DEFAULT_OPENAI_BASE_URL;
use crate::processing::weights::{default_weight, ElementWeights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub extraction: ExtractionConfig,
    pub corpus: CorpusConfig,
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `openai` or `model2vec`
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model2vec_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub default_top_k: usize,
    pub display_step: usize,
    /// Results retained per search; at most 25
    pub max_results: usize,
    /// Element name to weight; must cover all nine elements and sum to 1.0
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub detailed: bool,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
    Markdown,
    Html,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: 1536,
            timeout_secs: 30,
            model2vec_path: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            temperature: 0.0,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("ec-relativity");

        Self {
            path: data_dir.join("ec_embeddings.json.gz"),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            display_step: 5,
            max_results: 25,
            weights: EcElement::ALL
                .iter()
                .map(|e| (e.name().to_string(), default_weight(*e)))
                .collect(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Console,
            detailed: false,
            color_output: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            extraction: ExtractionConfig::default(),
            corpus: CorpusConfig::default(),
            scoring: ScoringConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults there on first run
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelativityError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| RelativityError::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RelativityError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("ec-relativity")
            .join("config.toml")
    }

    /// Validated weight table from the `scoring.weights` section
    pub fn element_weights(&self) -> Result<ElementWeights> {
        let mut pairs = Vec::with_capacity(self.scoring.weights.len());
        for (name, weight) in &self.scoring.weights {
            let element = EcElement::from_name(name).ok_or_else(|| {
                RelativityError::Configuration(format!("Unknown element in scoring.weights: {}", name))
            })?;
            pairs.push((element, *weight));
        }
        ElementWeights::from_pairs(&pairs)
    }

    /// Result window settings from the `scoring` section
    pub fn paging(&self) -> Result<Paging> {
        let scoring = &self.scoring;
        if scoring.max_results > MAX_RETAINED_RESULTS {
            return Err(RelativityError::Configuration(format!(
                "scoring.max_results is {} but at most {} results are retained",
                scoring.max_results, MAX_RETAINED_RESULTS
            )));
        }
        Paging::new(scoring.default_top_k, scoring.display_step, scoring.max_results)
            .map_err(|e| RelativityError::Configuration(format!("Invalid scoring section: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_weights_validate() {
        let config = Config::default();
        let weights = config.element_weights().unwrap();
        assert_eq!(weights, ElementWeights::default());
    }

    #[test]
    fn test_unknown_weight_name_rejected() {
        let mut config = Config::default();
        config.scoring.weights.insert("Budgeting".to_string(), 0.0);
        assert!(matches!(
            config.element_weights(),
            Err(RelativityError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_weight_rejected() {
        let mut config = Config::default();
        config.scoring.weights.remove("Sensory Effort");
        assert!(matches!(
            config.element_weights(),
            Err(RelativityError::InvalidWeights(_))
        ));
    }

    #[test]
    fn test_default_paging() {
        assert_eq!(Config::default().paging().unwrap(), Paging::default());
    }

    #[test]
    fn test_result_limit_above_retained_cap_rejected() {
        let mut config = Config::default();
        config.scoring.max_results = 40;
        assert!(matches!(config.paging(), Err(RelativityError::Configuration(_))));

        config.scoring.max_results = 10;
        config.scoring.default_top_k = 12;
        assert!(matches!(config.paging(), Err(RelativityError::Configuration(_))));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.embedding.provider = "model2vec".to_string();
        config.output.format = OutputFormat::Markdown;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.embedding.provider, "model2vec");
        assert_eq!(loaded.output.format, OutputFormat::Markdown);
        assert_eq!(loaded.scoring.weights.len(), 9);
    }

    #[test]
    fn test_output_format_is_lowercase_in_toml() {
        let content = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(content.contains("format = \"console\""));
    }

    #[test]
    fn test_unparseable_file_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "embedding = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(RelativityError::Configuration(_))
        ));
    }
}
