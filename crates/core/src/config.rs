//! TOML configuration loaded once before the pipeline is built.
//!
//! Only `system_prompt` is required; every table falls back to its defaults.
//!
//! ```toml
//! system_prompt = """
//! Answer using only the context.
//! #Context:
//! {context}
//! #Question:
//! {question}
//! """
//!
//! [retrieval]
//! top_k = 4
//!
//! [llm]
//! model = "midm-2.0-base-instruct-q5_k_m"
//! ```

use crate::chunking::{ChunkingConfig, Chunker};
use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use crate::error::ConfigError;
use crate::prompt::PromptTemplate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "midm-2.0-base-instruct-q5_k_m";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_QDRANT_COLLECTION: &str = "doc_chunks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    pub system_prompt: String,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    Ngram {
        #[serde(default = "default_dimensions")]
        dimensions: usize,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Ngram {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum IndexConfig {
    #[default]
    Memory,
    Qdrant {
        #[serde(default = "default_qdrant_url")]
        url: String,
        #[serde(default = "default_qdrant_collection")]
        collection: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

fn default_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_qdrant_collection() -> String {
    DEFAULT_QDRANT_COLLECTION.to_string()
}

impl QaConfig {
    /// Config with default tables around the given prompt template.
    pub fn with_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            llm: LlmConfig::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.prompt_template()?;
        Chunker::from_config(self.chunking)
            .map_err(|error| ConfigError::InvalidValue(error.to_string()))?;

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if self.llm.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "llm.max_attempts must be at least 1".to_string(),
            ));
        }
        if let EmbeddingConfig::Ngram { dimensions: 0 } = self.embedding {
            return Err(ConfigError::InvalidValue(
                "embedding.dimensions must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn prompt_template(&self) -> Result<PromptTemplate, ConfigError> {
        PromptTemplate::parse(self.system_prompt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"system_prompt = "Context: {context}\nQuestion: {question}""#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = QaConfig::from_toml_str(MINIMAL).expect("config parses");

        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.chunking.max_chars, 300);
        assert_eq!(config.chunking.overlap_chars, 30);
        assert_eq!(config.index, IndexConfig::Memory);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.temperature, 0.0);
    }

    #[test]
    fn tables_override_defaults() {
        let raw = format!(
            "{MINIMAL}\n\n[chunking]\nmax_chars = 500\n\n[embedding]\nbackend = \"ollama\"\nmodel = \"bge-m3\"\n\n[index]\nbackend = \"qdrant\"\ncollection = \"guide\"\n"
        );
        let config = QaConfig::from_toml_str(&raw).expect("config parses");

        assert_eq!(config.chunking.max_chars, 500);
        assert_eq!(config.chunking.overlap_chars, 30);
        assert_eq!(
            config.embedding,
            EmbeddingConfig::Ollama {
                base_url: DEFAULT_OLLAMA_URL.to_string(),
                model: "bge-m3".to_string()
            }
        );
        assert_eq!(
            config.index,
            IndexConfig::Qdrant {
                url: DEFAULT_QDRANT_URL.to_string(),
                collection: "guide".to_string()
            }
        );
    }

    #[test]
    fn bundled_config_is_valid() {
        let config = QaConfig::from_toml_str(include_str!("../../../config/rag.toml"))
            .expect("bundled config parses");
        assert_eq!(config.retrieval.top_k, DEFAULT_TOP_K);
        assert_eq!(config.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn missing_prompt_key_is_malformed() {
        assert!(matches!(
            QaConfig::from_toml_str("[retrieval]\ntop_k = 2\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn prompt_without_question_slot_is_rejected() {
        assert!(matches!(
            QaConfig::from_toml_str(r#"system_prompt = "Context: {context}""#),
            Err(ConfigError::MissingPlaceholder(_))
        ));
    }

    #[test]
    fn degenerate_chunking_is_rejected() {
        let raw = format!("{MINIMAL}\n[chunking]\nmax_chars = 30\noverlap_chars = 30\n");
        assert!(matches!(
            QaConfig::from_toml_str(&raw),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let raw = format!("{MINIMAL}\n[retrieval]\ntop_k = 0\n");
        assert!(QaConfig::from_toml_str(&raw).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(matches!(
            QaConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));

        let path = dir.path().join("rag.toml");
        fs::write(&path, MINIMAL)?;
        assert!(QaConfig::load(&path).is_ok());
        Ok(())
    }
}
