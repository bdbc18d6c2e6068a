pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod retry;
pub mod session;
pub mod stores;
pub mod traits;

pub use chunking::{normalize_whitespace, Chunker, ChunkingConfig};
pub use config::{EmbeddingConfig, IndexConfig, LlmConfig, QaConfig, RetrievalConfig};
pub use embeddings::{CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, GenerationError, IngestError, PipelineError, SearchError};
pub use extractor::{extract_page_texts, DocumentFormat, LopdfExtractor, PageExtractor, TextExtractor};
pub use generator::OllamaClient;
pub use ingest::{digest_file, discover_documents, load_document, load_documents};
pub use models::{Answer, Chunk, Document, DocumentFingerprint, PageText, Role, SearchHit, Turn};
pub use orchestrator::{PipelineCache, PipelineStats, QaPipeline};
pub use prompt::PromptTemplate;
pub use retriever::Retriever;
pub use retry::RetryPolicy;
pub use session::{ChatSession, Transcript};
pub use stores::{InMemoryIndex, QdrantStore};
pub use traits::{LanguageModel, VectorIndex};
