use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub(crate) fn ser<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Serialization(err.to_string())
}

/// Key/document persistence contract.
///
/// Documents are opaque JSON text; callers own their shape.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Fetch the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn read_document(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the document under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be stored.
    async fn write_document(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the document under `key`; missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove_document(&self, key: &str) -> Result<(), StorageError>;

    /// All stored keys, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    documents: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryRepository {
    async fn read_document(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn write_document(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove_document(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips_documents() {
        let repo = InMemoryRepository::new();
        repo.write_document("b", "2").await.unwrap();
        repo.write_document("a", "1").await.unwrap();
        repo.write_document("a", "3").await.unwrap();

        assert_eq!(repo.read_document("a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(repo.list_keys().await.unwrap(), ["a", "b"]);

        repo.remove_document("a").await.unwrap();
        repo.remove_document("missing").await.unwrap();
        assert!(repo.read_document("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clones_share_documents() {
        let repo = InMemoryRepository::new();
        let other = repo.clone();
        repo.write_document("k", "v").await.unwrap();
        assert_eq!(other.read_document("k").await.unwrap().as_deref(), Some("v"));
    }
}
