//! Fetch/put behaviour of `RemoteCacheStorage` over in-process stores.

use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stowage_cache::{FilesystemObjectStore, MemoryObjectStore, RemoteCacheStorage};
use stowage_core::{
    ByteStream, CacheKey, CacheStorage, Error, ObjectDescriptor, ObjectStore, RemoteObject, Result,
};

fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

/// Acknowledges every request but never sends a body byte.
struct StalledStore;

#[async_trait]
impl ObjectStore for StalledStore {
    async fn get_object(&self, _key: &str) -> Result<Option<RemoteObject>> {
        Ok(Some(RemoteObject {
            descriptor: ObjectDescriptor::default(),
            body: Box::pin(futures::stream::pending::<Result<Bytes>>()),
        }))
    }

    async fn put_object(&self, _key: &str, _content_type: &str, _body: ByteStream) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

/// Serves a valid archive prefix and then drops the connection.
struct FailingBodyStore {
    prefix: Bytes,
}

#[async_trait]
impl ObjectStore for FailingBodyStore {
    async fn get_object(&self, _key: &str) -> Result<Option<RemoteObject>> {
        let body = futures::stream::iter(vec![
            Ok(self.prefix.clone()),
            Err(Error::Transport("connection reset by peer".into())),
        ]);
        Ok(Some(RemoteObject {
            descriptor: ObjectDescriptor::default(),
            body: Box::pin(body),
        }))
    }

    async fn put_object(&self, _key: &str, _content_type: &str, _body: ByteStream) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Hides the content length of another store's objects.
struct UnsizedStore(Arc<MemoryObjectStore>);

#[async_trait]
impl ObjectStore for UnsizedStore {
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>> {
        Ok(self.0.get_object(key).await?.map(|object| RemoteObject {
            descriptor: ObjectDescriptor::default(),
            body: object.body,
        }))
    }

    async fn put_object(&self, key: &str, content_type: &str, body: ByteStream) -> Result<()> {
        self.0.put_object(key, content_type, body).await
    }

    fn name(&self) -> &str {
        "unsized"
    }
}

#[tokio::test]
async fn test_put_then_fetch_round_trip() {
    let store = Arc::new(MemoryObjectStore::new());
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "dist/out.js", b"console.log('built')");

    let key = CacheKey::new("abc123");
    RemoteCacheStorage::new(store.clone(), src.path())
        .put(&key, &[PathBuf::from("dist/out.js")])
        .await
        .unwrap();

    let stored = store.object("abc123").await.unwrap();
    assert_eq!(stored.content_type, "application/x-tar");
    let mut archive = tar::Archive::new(stored.data.as_ref());
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["dist/out.js"]);

    let dest = tempfile::tempdir().unwrap();
    let hit = RemoteCacheStorage::new(store, dest.path())
        .fetch(&key)
        .await
        .unwrap();

    assert!(hit);
    assert_eq!(
        std::fs::read(dest.path().join("dist/out.js")).unwrap(),
        b"console.log('built')"
    );
}

#[tokio::test]
async fn test_missing_hash_is_a_miss() {
    let store = Arc::new(MemoryObjectStore::new());
    let dest = tempfile::tempdir().unwrap();

    let hit = RemoteCacheStorage::new(store, dest.path())
        .fetch(&CacheKey::new("missing-hash"))
        .await
        .unwrap();

    assert!(!hit);
    assert!(is_empty_dir(dest.path()));
}

#[tokio::test]
async fn test_declared_oversize_object_is_skipped() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("abc123", vec![0u8; 4096]).await;
    let dest = tempfile::tempdir().unwrap();

    let hit = RemoteCacheStorage::new(store, dest.path())
        .with_size_limit(Some(1024))
        .fetch(&CacheKey::new("abc123"))
        .await
        .unwrap();

    assert!(!hit);
    assert!(is_empty_dir(dest.path()));
}

#[tokio::test]
async fn test_unsized_oversize_object_is_skipped() {
    let memory = Arc::new(MemoryObjectStore::new());
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "big.bin", &vec![7u8; 64 * 1024]);
    RemoteCacheStorage::new(memory.clone(), src.path())
        .put(&CacheKey::new("abc123"), &[PathBuf::from("big.bin")])
        .await
        .unwrap();

    let dest = tempfile::tempdir().unwrap();
    let hit = RemoteCacheStorage::new(Arc::new(UnsizedStore(memory)), dest.path())
        .with_size_limit(Some(1024))
        .fetch(&CacheKey::new("abc123"))
        .await
        .unwrap();

    assert!(!hit);
    assert!(is_empty_dir(dest.path()));
}

#[tokio::test]
async fn test_oversize_output_is_not_uploaded() {
    let store = Arc::new(MemoryObjectStore::new());
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "dist/a.js", &[1u8; 600]);
    write_file(src.path(), "dist/b.js", &[2u8; 600]);

    RemoteCacheStorage::new(store.clone(), src.path())
        .with_size_limit(Some(1000))
        .put(
            &CacheKey::new("abc123"),
            &[PathBuf::from("dist/a.js"), PathBuf::from("dist/b.js")],
        )
        .await
        .unwrap();

    assert_eq!(store.put_count(), 0);
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn test_output_within_limit_is_uploaded() {
    let store = Arc::new(MemoryObjectStore::new());
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "dist/a.js", &[1u8; 600]);

    RemoteCacheStorage::new(store.clone(), src.path())
        .with_size_limit(Some(1000))
        .put(&CacheKey::new("abc123"), &[PathBuf::from("dist/a.js")])
        .await
        .unwrap();

    assert_eq!(store.keys().await, vec!["abc123"]);
}

#[tokio::test]
async fn test_prefix_is_prepended_to_object_key() {
    let store = Arc::new(MemoryObjectStore::new());
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "out.js", b"1");

    let storage = RemoteCacheStorage::new(store.clone(), src.path()).with_prefix("ci/main/");
    storage
        .put(&CacheKey::new("abc123"), &[PathBuf::from("out.js")])
        .await
        .unwrap();

    assert_eq!(store.keys().await, vec!["ci/main/abc123"]);
    assert!(storage.fetch(&CacheKey::new("abc123")).await.unwrap());
}

#[tokio::test]
async fn test_stalled_download_times_out_with_key() {
    let dest = tempfile::tempdir().unwrap();
    let storage = RemoteCacheStorage::new(Arc::new(StalledStore), dest.path())
        .with_hang_timeout(Duration::from_millis(200));

    let err = storage.fetch(&CacheKey::new("abc123")).await.unwrap_err();

    match err {
        Error::Timeout(message) => {
            assert_eq!(message, "The fetch request to abc123 seems to be hanging")
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(is_empty_dir(dest.path()));
}

#[tokio::test]
async fn test_stalled_download_message_names_hash_not_prefix() {
    let dest = tempfile::tempdir().unwrap();
    let storage = RemoteCacheStorage::new(Arc::new(StalledStore), dest.path())
        .with_prefix("ci/main/")
        .with_hang_timeout(Duration::from_millis(200));

    let err = storage.fetch(&CacheKey::new("abc123")).await.unwrap_err();

    assert!(
        matches!(err, Error::Timeout(ref m) if m == "The fetch request to abc123 seems to be hanging"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_failed_download_writes_nothing() {
    // A complete first entry followed by a dropped connection.
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "dist/out.js", b"partial build");
    let mut prefix = Vec::new();
    stowage_cache::archiver::create_archive(
        &mut prefix,
        src.path(),
        &[PathBuf::from("dist/out.js")],
    )
    .unwrap();

    let store = FailingBodyStore {
        prefix: Bytes::from(prefix),
    };
    let dest = tempfile::tempdir().unwrap();

    let err = RemoteCacheStorage::new(Arc::new(store), dest.path())
        .fetch(&CacheKey::new("abc123"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(ref m) if m == "connection reset by peer"));
    assert!(is_empty_dir(dest.path()));
}

#[tokio::test]
async fn test_filesystem_store_round_trip_with_directories() {
    let objects = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemObjectStore::new(objects.path()));

    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "lib/index.js", b"module.exports = 1");
    write_file(src.path(), "lib/util/strings.js", b"exports.x = 'y'");
    write_file(src.path(), "types/index.d.ts", b"export {}");

    let key = CacheKey::new("0f3a9c");
    RemoteCacheStorage::new(store.clone(), src.path())
        .put(&key, &[PathBuf::from("lib"), PathBuf::from("types/index.d.ts")])
        .await
        .unwrap();

    let dest = tempfile::tempdir().unwrap();
    assert!(RemoteCacheStorage::new(store, dest.path())
        .fetch(&key)
        .await
        .unwrap());

    for rel in ["lib/index.js", "lib/util/strings.js", "types/index.d.ts"] {
        assert_eq!(
            std::fs::read(dest.path().join(rel)).unwrap(),
            std::fs::read(src.path().join(rel)).unwrap(),
            "{} differs",
            rel
        );
    }
}

#[tokio::test]
async fn test_filesystem_store_keeps_similar_keys_apart() {
    let objects = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemObjectStore::new(objects.path()));
    let work = tempfile::tempdir().unwrap();
    write_file(work.path(), "out.js", b"from a/b");

    let storage = RemoteCacheStorage::new(store, work.path());
    storage
        .put(&CacheKey::new("a/b"), &[PathBuf::from("out.js")])
        .await
        .unwrap();
    std::fs::remove_file(work.path().join("out.js")).unwrap();

    assert!(!storage.fetch(&CacheKey::new("a_b")).await.unwrap());
    assert!(!work.path().join("out.js").exists());

    assert!(storage.fetch(&CacheKey::new("a/b")).await.unwrap());
    assert_eq!(std::fs::read(work.path().join("out.js")).unwrap(), b"from a/b");
}

#[tokio::test]
async fn test_missing_output_fails_and_stores_nothing() {
    let objects = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemObjectStore::new(objects.path()));
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "dist/out.js", b"1");

    let err = RemoteCacheStorage::new(store.clone(), src.path())
        .put(
            &CacheKey::new("abc123"),
            &[PathBuf::from("dist/out.js"), PathBuf::from("dist/missing.js")],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Archive(ref m) if m.contains("dist/missing.js")));
    assert!(store.get_object("abc123").await.unwrap().is_none());
}

#[tokio::test]
async fn test_escaping_path_is_rejected() {
    let store = Arc::new(MemoryObjectStore::new());
    let src = tempfile::tempdir().unwrap();

    let err = RemoteCacheStorage::new(store.clone(), src.path())
        .put(&CacheKey::new("abc123"), &[PathBuf::from("../x")])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidPath(ref p) if p == Path::new("../x")));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_concurrent_fetches_of_same_key_both_complete() {
    let store = Arc::new(MemoryObjectStore::new());
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "dist/out.js", b"shared");
    let key = CacheKey::new("abc123");
    RemoteCacheStorage::new(store.clone(), src.path())
        .put(&key, &[PathBuf::from("dist/out.js")])
        .await
        .unwrap();

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let a = RemoteCacheStorage::new(store.clone(), first.path());
    let b = RemoteCacheStorage::new(store.clone(), second.path());

    let (hit_a, hit_b) = tokio::join!(a.fetch(&key), b.fetch(&key));
    assert!(hit_a.unwrap());
    assert!(hit_b.unwrap());
    assert_eq!(store.get_count(), 2);
    assert_eq!(std::fs::read(first.path().join("dist/out.js")).unwrap(), b"shared");
    assert_eq!(std::fs::read(second.path().join("dist/out.js")).unwrap(), b"shared");
}
