//! Embedding backends used for indexing and query-time retrieval.

use async_trait::async_trait;

use crate::error::StoreError;

pub mod hashing;
pub mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

/// Maps text to fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds every input, returning one vector per input in the same order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;

    /// Preferred number of inputs per [`embed`](Self::embed) call.
    fn batch_size(&self) -> usize {
        32
    }

    /// Embeds a single string.
    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, StoreError> {
        let mut vectors = self.embed(&[input.to_string()]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            other => Err(StoreError::EmbeddingCount {
                expected: 1,
                found: vectors.len() + usize::from(other.is_some()),
            }),
        }
    }
}
