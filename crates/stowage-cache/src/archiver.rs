//! Tar archive packing and extraction over byte streams.

use crate::pipe::{ChannelReader, ChannelWriter, PIPE_DEPTH};
use futures::StreamExt;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use stowage_core::{ByteStream, Error, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Content type of cache archives on the wire.
pub const TAR_CONTENT_TYPE: &str = "application/x-tar";

/// Reject entries that are absolute or climb out of the archive root.
pub fn validate_entry(path: &Path) -> Result<()> {
    let escapes = path.as_os_str().is_empty()
        || path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
    if escapes {
        return Err(Error::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

/// Stream a tar archive of `entries` (relative to `root`).
///
/// Entries are emitted in order as they are packed; a packing failure is
/// delivered as the final item of the stream. Must be called from within a
/// Tokio runtime.
pub fn pack(root: PathBuf, entries: Vec<PathBuf>) -> ByteStream {
    let (tx, rx) = mpsc::channel(PIPE_DEPTH);
    tokio::task::spawn_blocking(move || {
        let writer = ChannelWriter::new(tx.clone());
        if let Err(e) = create_archive(writer, &root, &entries) {
            // The consumer may already be gone.
            let _ = tx.blocking_send(Err(e));
        }
    });
    Box::pin(ReceiverStream::new(rx))
}

/// Write a tar archive of `entries` (relative to `root`) into `writer`.
pub fn create_archive<W: Write>(writer: W, root: &Path, entries: &[PathBuf]) -> Result<()> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for entry in entries {
        validate_entry(entry)?;
        let abs_path = root.join(entry);
        let metadata = std::fs::symlink_metadata(&abs_path).map_err(|e| {
            Error::Archive(format!("Failed to pack {}: {}", entry.display(), e))
        })?;

        if metadata.is_dir() {
            builder.append_dir_all(entry, &abs_path)
        } else {
            builder.append_path_with_name(&abs_path, entry)
        }
        .map_err(|e| Error::Archive(format!("Failed to pack {}: {}", entry.display(), e)))?;
    }

    let mut writer = builder
        .into_inner()
        .map_err(|e| Error::Archive(format!("Failed to finish tar: {}", e)))?;
    writer.flush()?;
    Ok(())
}

/// Extract a tar archive stream into `root`.
///
/// Files are materialized as entries complete. If `body` fails, the
/// extractor is aborted and the stream's error is returned rather than the
/// extractor's.
pub async fn unpack(mut body: ByteStream, root: &Path) -> Result<()> {
    let (tx, rx) = mpsc::channel::<io::Result<bytes::Bytes>>(PIPE_DEPTH);
    let dest = root.to_path_buf();
    let extractor = tokio::task::spawn_blocking(move || extract_archive(ChannelReader::new(rx), &dest));

    let mut upstream = Ok(());
    while let Some(item) = body.next().await {
        match item {
            Ok(chunk) => {
                if tx.send(Ok(chunk)).await.is_err() {
                    // Extractor stopped: finished or failed, its result says which.
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(io::Error::other("archive stream aborted"))).await;
                upstream = Err(e);
                break;
            }
        }
    }
    drop(tx);

    let extracted = extractor
        .await
        .map_err(|e| Error::Internal(format!("Extraction task failed: {}", e)))?;
    upstream?;
    extracted
}

/// Extract a tar archive from `reader` into `dest`.
pub fn extract_archive<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_mtime(true);
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::Archive(format!("Failed to unpack archive: {}", e)))
}
