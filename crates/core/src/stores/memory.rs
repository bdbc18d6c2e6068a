use crate::traits::VectorIndex;
use crate::{Chunk, SearchError, SearchHit};
use async_trait::async_trait;

/// Exact cosine-similarity index held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    entries: Vec<Entry>,
    dimensions: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f32,
}

impl InMemoryIndex {
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                if vector.len() != dimensions || dimensions == 0 {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        vector.len(),
                        dimensions
                    )));
                }
                let norm = l2_norm(&vector);
                Ok(Entry {
                    chunk,
                    vector,
                    norm,
                })
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        Ok(Self {
            entries,
            dimensions,
        })
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimensions {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let query_norm = l2_norm(query_vector);
        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                (position, cosine(query_vector, query_norm, &entry.vector, entry.norm))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(position, score)| SearchHit {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(left: &[f32], left_norm: f32, right: &[f32], right_norm: f32) -> f64 {
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    f64::from(dot / (left_norm * right_norm))
}
