//! First-byte deadline for download streams.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use stowage_core::{Error, Result};
use tokio::time::{sleep, Sleep};

/// How long a download may go without delivering its first byte.
pub const HANG_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Fails a stream whose first chunk does not arrive in time.
///
/// The deadline starts when the adapter is constructed and is disarmed
/// permanently by the first chunk; later gaps are never timed. When it
/// fires, the stream yields [`Error::Timeout`] with the configured message
/// and ends.
pub struct HangTimeout<S> {
    inner: S,
    deadline: Option<Pin<Box<Sleep>>>,
    message: String,
    finished: bool,
}

impl<S> HangTimeout<S> {
    pub fn new(inner: S, timeout: Duration, message: impl Into<String>) -> Self {
        Self {
            inner,
            deadline: Some(Box::pin(sleep(timeout))),
            message: message.into(),
            finished: false,
        }
    }

    /// Whether the first-byte deadline is still running.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

impl<S> Stream for HangTimeout<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Poll::Ready(item) = this.inner.poll_next_unpin(cx) {
            // Any event from the source, including its end, means it is alive.
            this.deadline = None;
            if item.is_none() {
                this.finished = true;
            }
            return Poll::Ready(item);
        }

        if let Some(deadline) = this.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                this.deadline = None;
                this.finished = true;
                return Poll::Ready(Some(Err(Error::Timeout(std::mem::take(
                    &mut this.message,
                )))));
            }
        }
        Poll::Pending
    }
}
