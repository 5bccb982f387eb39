//! In-memory object store for tests and embedding.

use crate::pipe::CHUNK_SIZE;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use stowage_core::{ByteStream, ObjectDescriptor, ObjectStore, RemoteObject, Result};
use tokio::sync::RwLock;

/// An object held by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Bytes,
}

/// Object store backed by a map, counting requests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting a request.
    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.write().await.insert(
            key.into(),
            StoredObject {
                content_type: crate::archiver::TAR_CONTENT_TYPE.to_string(),
                data: data.into(),
            },
        );
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let Some(object) = self.object(key).await else {
            return Ok(None);
        };

        let data = object.data;
        let chunks: Vec<Result<Bytes>> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
            .collect();

        Ok(Some(RemoteObject {
            descriptor: ObjectDescriptor {
                content_length: Some(data.len() as u64),
            },
            body: Box::pin(futures::stream::iter(chunks)),
        }))
    }

    async fn put_object(&self, key: &str, content_type: &str, mut body: ByteStream) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut data = BytesMut::new();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
        }

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                data: data.freeze(),
            },
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
