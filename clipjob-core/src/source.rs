//! Streaming byte sources
//!
//! Artifacts can be large, so they are moved from the provider to disk one
//! chunk at a time. The provider client implements [`ByteSource`] over an
//! HTTP response body; tests use [`MemorySource`].

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;

/// A stream of byte chunks read until exhaustion
#[async_trait]
pub trait ByteSource: Send {
    /// Returns the next chunk, or `None` once the source is exhausted
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>>;
}

/// In-memory byte source
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    chunks: VecDeque<Bytes>,
}

impl MemorySource {
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        Ok(self.chunks.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_yields_chunks_in_order() {
        let mut source = MemorySource::from_chunks(vec![&b"ab"[..], &b"cd"[..]]);
        assert_eq!(source.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert_eq!(source.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"cd"));
        assert!(source.next_chunk().await.unwrap().is_none());
    }
}
