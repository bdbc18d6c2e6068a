use crate::{GenerationError, SearchError, SearchHit};
use async_trait::async_trait;

/// Nearest-neighbour lookup over chunk vectors. Implementations are built once and then only read.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the stored vectors; 0 for an index built without entries.
    fn dimensions(&self) -> usize;

    /// Returns at most `top_k` hits ordered by descending score.
    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
