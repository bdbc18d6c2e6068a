use crate::chunking::Chunker;
use crate::config::{EmbeddingConfig, IndexConfig, QaConfig};
use crate::embeddings::{CharacterNgramEmbedder, Embedder, OllamaEmbedder};
use crate::generator::OllamaClient;
use crate::ingest::load_documents;
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;
use crate::stores::{InMemoryIndex, QdrantStore};
use crate::traits::{LanguageModel, VectorIndex};
use crate::{Answer, Chunk, ConfigError, IngestError, PipelineError, SearchError, SearchHit};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
}

/// A built question-answering pipeline: retriever, prompt template and model.
///
/// Built once by [`QaPipeline::setup`] and then only read, so one handle can
/// serve concurrent `ask` calls from several sessions.
pub struct QaPipeline {
    retriever: Retriever,
    template: PromptTemplate,
    model: Arc<dyn LanguageModel>,
    stats: PipelineStats,
}

impl std::fmt::Debug for QaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaPipeline")
            .field("retriever", &self.retriever)
            .field("stats", &self.stats)
            .finish()
    }
}

impl QaPipeline {
    /// Loads, chunks, embeds and indexes `paths`, answering with the Ollama model from `config`.
    pub async fn setup<P: AsRef<Path>>(paths: &[P], config: &QaConfig) -> Result<Self, PipelineError> {
        let model = OllamaClient::new(&config.llm)?;
        info!(model = %model.model(), "language model configured");
        Self::setup_with_model(paths, config, Arc::new(model)).await
    }

    pub async fn setup_with_model<P: AsRef<Path>>(
        paths: &[P],
        config: &QaConfig,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, PipelineError> {
        let started = Instant::now();
        config.validate()?;
        let template = config.prompt_template()?;
        let chunker = Chunker::from_config(config.chunking)?;

        let documents = load_documents(paths)?;
        let pages = documents.iter().map(|document| document.pages.len()).sum();
        let chunks = chunker.chunk_documents(&documents);
        if chunks.is_empty() {
            return Err(IngestError::NoChunks(documents.len()).into());
        }

        let embedder = build_embedder(&config.embedding)?;
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        let index = build_index(&config.index, chunks, embeddings).await?;

        let retriever = Retriever::new(embedder, index, config.retrieval.top_k)?;
        let stats = PipelineStats {
            documents: documents.len(),
            pages,
            chunks: retriever.index_len(),
        };

        info!(
            documents = stats.documents,
            pages = stats.pages,
            chunks = stats.chunks,
            top_k = retriever.top_k(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline ready"
        );

        Ok(Self {
            retriever,
            template,
            model,
            stats,
        })
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieves context for `question` and returns the filled prompt with the hits used.
    pub async fn prepare_prompt(&self, question: &str) -> Result<(String, Vec<SearchHit>), PipelineError> {
        let hits = self.retriever.retrieve(question).await?;
        let prompt = self.template.render(&hits, question);
        Ok((prompt, hits))
    }

    pub async fn ask(&self, question: &str) -> Result<String, PipelineError> {
        Ok(self.ask_with_sources(question).await?.text)
    }

    pub async fn ask_with_sources(&self, question: &str) -> Result<Answer, PipelineError> {
        let (prompt, sources) = self.prepare_prompt(question).await?;
        debug!(prompt_chars = prompt.chars().count(), sources = sources.len(), "prompt assembled");

        let text = self.model.generate(&prompt).await?;

        Ok(Answer {
            question: question.to_string(),
            text,
            sources,
        })
    }
}

pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, SearchError> {
    let embedder: Arc<dyn Embedder> = match config {
        EmbeddingConfig::Ngram { dimensions } => Arc::new(CharacterNgramEmbedder::new(*dimensions)),
        EmbeddingConfig::Ollama { base_url, model } => {
            Arc::new(OllamaEmbedder::new(base_url, model.clone())?)
        }
    };
    Ok(embedder)
}

pub async fn build_index(
    config: &IndexConfig,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
) -> Result<Arc<dyn VectorIndex>, SearchError> {
    let index: Arc<dyn VectorIndex> = match config {
        IndexConfig::Memory => Arc::new(InMemoryIndex::build(chunks, embeddings)?),
        IndexConfig::Qdrant { url, collection } => Arc::new(
            QdrantStore::build(url.as_str(), collection.as_str(), &chunks, &embeddings).await?,
        ),
    };
    Ok(index)
}

/// Host-owned cache of built pipelines keyed by the document path list and
/// a digest of the configuration they were built with.
///
/// The first caller for a key builds the pipeline; concurrent callers wait
/// for that build and every later caller gets the same handle.
#[derive(Default)]
pub struct PipelineCache {
    entries: Mutex<HashMap<CacheKey, Arc<QaPipeline>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    paths: Vec<PathBuf>,
    config_digest: String,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_setup<P: AsRef<Path>>(
        &self,
        paths: &[P],
        config: &QaConfig,
    ) -> Result<Arc<QaPipeline>, PipelineError> {
        self.get_or_setup_with(paths, config, || QaPipeline::setup(paths, config))
            .await
    }

    pub async fn get_or_setup_with<P, F, Fut>(
        &self,
        paths: &[P],
        config: &QaConfig,
        build: F,
    ) -> Result<Arc<QaPipeline>, PipelineError>
    where
        P: AsRef<Path>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<QaPipeline, PipelineError>>,
    {
        let key = cache_key(paths, config)?;
        let mut entries = self.entries.lock().await;

        if let Some(existing) = entries.get(&key) {
            debug!(documents = key.paths.len(), "reusing cached pipeline");
            return Ok(Arc::clone(existing));
        }

        let pipeline = Arc::new(build().await?);
        entries.insert(key, Arc::clone(&pipeline));
        Ok(pipeline)
    }

    pub async fn get<P: AsRef<Path>>(&self, paths: &[P], config: &QaConfig) -> Option<Arc<QaPipeline>> {
        let key = cache_key(paths, config).ok()?;
        self.entries.lock().await.get(&key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn cache_key<P: AsRef<Path>>(paths: &[P], config: &QaConfig) -> Result<CacheKey, ConfigError> {
    let encoded = serde_json::to_vec(config)
        .map_err(|error| ConfigError::InvalidValue(format!("cannot fingerprint config: {error}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);

    Ok(CacheKey {
        paths: paths.iter().map(|path| path.as_ref().to_path_buf()).collect(),
        config_digest: format!("{:x}", hasher.finalize()),
    })
}
