//! Buffer stage that withholds data until its source completes.
//!
//! Extraction writes files as soon as entries arrive, so it must never see
//! a stream that could still fail. The sponge drains its source completely,
//! holding every chunk, and only releases the chunks (in arrival order) once
//! the source has ended cleanly. A failing source yields its error and
//! nothing else.
//!
//! The ceiling bounds how large an artifact this path can carry: the whole
//! artifact is held in memory before extraction starts.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use stowage_core::{Error, Result};

/// Default ceiling on buffered bytes (1 TiB).
pub const DEFAULT_BUFFER_LIMIT: u64 = 1024 * 1024 * 1024 * 1024;

enum SpongeState {
    Filling,
    Draining,
    Done,
}

/// Stream adapter that buffers its whole source before forwarding it.
pub struct Sponge<S> {
    inner: S,
    buffered: VecDeque<Bytes>,
    buffered_len: u64,
    limit: u64,
    state: SpongeState,
}

impl<S> Sponge<S> {
    pub fn new(inner: S) -> Self {
        Self::with_limit(inner, DEFAULT_BUFFER_LIMIT)
    }

    /// Buffer at most `limit` bytes; a larger source fails with
    /// [`Error::BufferOverflow`].
    pub fn with_limit(inner: S, limit: u64) -> Self {
        Self {
            inner,
            buffered: VecDeque::new(),
            buffered_len: 0,
            limit,
            state: SpongeState::Filling,
        }
    }

    /// Bytes currently held back.
    pub fn buffered_len(&self) -> u64 {
        self.buffered_len
    }

    fn discard(&mut self) {
        self.buffered.clear();
        self.buffered_len = 0;
        self.state = SpongeState::Done;
    }
}

impl<S> Stream for Sponge<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.state {
                SpongeState::Filling => match ready!(this.inner.poll_next_unpin(cx)) {
                    Some(Ok(chunk)) => {
                        this.buffered_len += chunk.len() as u64;
                        if this.buffered_len > this.limit {
                            this.discard();
                            return Poll::Ready(Some(Err(Error::BufferOverflow {
                                limit: this.limit,
                            })));
                        }
                        this.buffered.push_back(chunk);
                    }
                    Some(Err(e)) => {
                        this.discard();
                        return Poll::Ready(Some(Err(e)));
                    }
                    None => this.state = SpongeState::Draining,
                },
                SpongeState::Draining => {
                    return match this.buffered.pop_front() {
                        Some(chunk) => {
                            this.buffered_len -= chunk.len() as u64;
                            Poll::Ready(Some(Ok(chunk)))
                        }
                        None => {
                            this.state = SpongeState::Done;
                            Poll::Ready(None)
                        }
                    };
                }
                SpongeState::Done => return Poll::Ready(None),
            }
        }
    }
}
