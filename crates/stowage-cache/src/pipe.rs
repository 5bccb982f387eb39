//! Bounded channels bridging blocking archive code and async byte streams.
//!
//! The tar codec is synchronous and runs on blocking threads. These adapters
//! connect it to the async side through bounded channels, so a slow consumer
//! suspends the producer on either side of the bridge.

use bytes::{Buf, Bytes, BytesMut};
use std::io::{self, Read, Write};
use stowage_core::Result;
use tokio::sync::mpsc;

/// Size of the chunks handed across the bridge.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks in flight between two stages.
pub const PIPE_DEPTH: usize = 16;

/// `Write` end that forwards fixed-size chunks into a bounded channel.
///
/// Must be used from a blocking thread: a full channel blocks the writer.
pub struct ChannelWriter {
    tx: mpsc::Sender<Result<Bytes>>,
    buf: BytesMut,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<Result<Bytes>>) -> Self {
        Self {
            tx,
            buf: BytesMut::with_capacity(CHUNK_SIZE),
        }
    }

    fn send(&self, chunk: Bytes) -> io::Result<()> {
        self.tx.blocking_send(Ok(chunk)).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "archive consumer went away")
        })
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= CHUNK_SIZE {
            let chunk = self.buf.split_to(CHUNK_SIZE).freeze();
            self.send(chunk)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = self.buf.split().freeze();
        self.send(chunk)
    }
}

/// `Read` end that drains a bounded channel.
///
/// A closed channel reads as end-of-file; an `Err` item aborts the reader.
/// Must be used from a blocking thread.
pub struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    current: Bytes,
}

impl ChannelReader {
    pub fn new(rx: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self {
            rx,
            current: Bytes::new(),
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.current.is_empty() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }
        let n = out.len().min(self.current.len());
        out[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writer_chunks_and_flushes() {
        let (tx, mut rx) = mpsc::channel(PIPE_DEPTH);
        let payload = vec![7u8; CHUNK_SIZE + 10];

        let expected = payload.clone();
        let writer = tokio::task::spawn_blocking(move || {
            let mut writer = ChannelWriter::new(tx);
            writer.write_all(&payload).unwrap();
            writer.flush().unwrap();
        });

        let mut received = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = rx.recv().await {
            received.extend_from_slice(&chunk.unwrap());
            chunks += 1;
        }
        writer.await.unwrap();

        assert_eq!(chunks, 2);
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_writer_reports_broken_pipe() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = tokio::task::spawn_blocking(move || {
            let mut writer = ChannelWriter::new(tx);
            writer.write_all(b"data").unwrap();
            writer.flush().unwrap_err()
        })
        .await
        .unwrap();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_reader_reads_until_close() {
        let (tx, rx) = mpsc::channel(PIPE_DEPTH);
        tx.send(Ok(Bytes::from_static(b"hello "))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"world"))).await.unwrap();
        drop(tx);

        let text = tokio::task::spawn_blocking(move || {
            let mut text = String::new();
            ChannelReader::new(rx).read_to_string(&mut text).unwrap();
            text
        })
        .await
        .unwrap();

        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_reader_surfaces_abort() {
        let (tx, rx) = mpsc::channel(PIPE_DEPTH);
        tx.send(Ok(Bytes::from_static(b"partial"))).await.unwrap();
        tx.send(Err(io::Error::other("upstream failed"))).await.unwrap();
        drop(tx);

        let err = tokio::task::spawn_blocking(move || {
            let mut sink = Vec::new();
            ChannelReader::new(rx).read_to_end(&mut sink).unwrap_err()
        })
        .await
        .unwrap();

        assert_eq!(err.to_string(), "upstream failed");
    }
}
