use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps text to a fixed-length vector. The same text must always map to the same vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;

    /// Length of every vector this embedder returns; 0 while still unknown.
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Offline embedder: hashed character trigrams, L2-normalised.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embeddings served by an Ollama instance (`POST /api/embeddings`).
///
/// The vector length is fixed by the model, so it is learned from the first
/// response and every later response must match it.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    dimensions: OnceLock<usize>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(EMBED_TIMEOUT).build()?;
        let endpoint = Url::parse(base_url)?.join("api/embeddings")?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            dimensions: OnceLock::new(),
        })
    }

    fn check_dimensions(&self, vector: Vec<f32>) -> Result<Vec<f32>, SearchError> {
        let expected = *self.dimensions.get_or_init(|| vector.len());
        if vector.len() != expected {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!(
                    "embedding dimension {} != {} from model {}",
                    vector.len(),
                    expected,
                    self.model
                ),
            });
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: EmbeddingResponse = response.json().await?;
        if payload.embedding.is_empty() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("empty embedding from model {}", self.model),
            });
        }

        self.check_dimensions(payload.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions.get().copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{CharacterNgramEmbedder, Embedder, OllamaEmbedder};

    #[tokio::test]
    async fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Monthly allowance and leave").await.unwrap();
        let second = embedder.embed("Monthly allowance and leave").await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_sync("abc");
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn embedder_output_is_unit_length() {
        let vector = CharacterNgramEmbedder::default().embed_sync("The allowance is 500 units.");
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn batch_matches_single_calls() {
        let embedder = CharacterNgramEmbedder::new(64);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch[1], embedder.embed_sync("beta"));
    }

    #[test]
    fn ollama_embedder_rejects_bad_base_url() {
        assert!(OllamaEmbedder::new("not a url", "nomic-embed-text").is_err());
    }

    #[test]
    fn ngram_dimensions_match_vector_length() {
        let embedder = CharacterNgramEmbedder::new(48);
        assert_eq!(embedder.dimensions(), 48);
        assert_eq!(embedder.embed_sync("allowance").len(), embedder.dimensions());
    }

    #[test]
    fn ollama_dimensions_are_learned_and_enforced() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:11434", "bge-m3").unwrap();
        assert_eq!(embedder.dimensions(), 0);

        assert_eq!(embedder.check_dimensions(vec![0.5; 4]).unwrap().len(), 4);
        assert_eq!(embedder.dimensions(), 4);
        assert!(embedder.check_dimensions(vec![0.5; 3]).is_err());
    }
}
