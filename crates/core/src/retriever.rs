use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{SearchError, SearchHit};
use std::sync::Arc;
use tracing::debug;

/// Embeds a question and returns the `top_k` closest chunks from a read-only index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("index_len", &self.index.len())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
    ) -> Result<Self, SearchError> {
        if top_k == 0 {
            return Err(SearchError::Request("top_k must be at least 1".to_string()));
        }
        if !index.is_empty() && embedder.dimensions() != index.dimensions() {
            return Err(SearchError::Request(format!(
                "embedder produces {} dimensions but the index holds {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }

        Ok(Self {
            embedder,
            index,
            top_k,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.retrieve_k(question, self.top_k).await
    }

    pub async fn retrieve_k(&self, question: &str, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        if top_k == 0 {
            return Err(SearchError::Request("top_k must be at least 1".to_string()));
        }
        if question.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if self.index.is_empty() {
            return Err(SearchError::EmptyIndex);
        }

        let query_vector = self.embedder.embed(question).await?;
        let mut hits = self.index.search_vector(&query_vector, top_k).await?;

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then(left.chunk.chunk_index.cmp(&right.chunk.chunk_index))
        });
        hits.truncate(top_k);

        debug!(
            requested = top_k,
            returned = hits.len(),
            best_score = ?hits.first().map(|hit| hit.score),
            "retrieved context"
        );

        Ok(hits)
    }
}
