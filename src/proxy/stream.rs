//! Cancellation-aware stream over a passthrough upstream body.
//!
//! # Responsibilities
//! - Forward upstream data frames untouched, without buffering
//! - Fail reads with [`StreamError::Cancelled`] once the bound token fires
//! - Release the upstream body exactly once
//!
//! # Design Decisions
//! - The body lives in a slot shared with a watcher task. Whoever moves it
//!   out of the slot first (completion, error, `close`, drop or the watcher
//!   on cancellation) releases it; everyone else sees it already gone
//! - Cancellation releases the body even when nobody is reading
//! - The cancellation future is polled before the body, so a pending read
//!   is woken by cancellation instead of hanging

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use thiserror::Error;
use tokio_util::io::StreamReader;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::proxy::BoxError;

type UpstreamBody = UnsyncBoxBody<Bytes, BoxError>;

/// Errors returned while reading a passthrough stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The bound cancellation token fired.
    #[error("response stream cancelled")]
    Cancelled,

    /// The upstream body failed mid-stream.
    #[error("upstream body error: {0}")]
    Body(#[source] BoxError),

    /// The stream was explicitly closed.
    #[error("response stream closed")]
    Closed,
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        io::Error::other(err)
    }
}

enum State {
    Open(UpstreamBody),
    Finished,
    Closed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Open(_) => "open",
            State::Finished => "finished",
            State::Closed => "closed",
        }
    }

    /// Move the body out, leaving `next`. A released state is left as is.
    fn take_body(&mut self, next: State) -> Option<UpstreamBody> {
        if !matches!(self, State::Open(_)) {
            return None;
        }
        match std::mem::replace(self, next) {
            State::Open(body) => Some(body),
            _ => None,
        }
    }
}

struct Slot {
    state: Mutex<State>,
    /// Fired once the body is gone so the watcher task can exit.
    released: CancellationToken,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, next: State) -> bool {
        let body = self.lock().take_body(next);
        match body {
            Some(body) => {
                drop(body);
                self.released.cancel();
                true
            }
            None => false,
        }
    }
}

/// Owned handle to a still-open upstream body.
pub struct ResponseStream {
    slot: Arc<Slot>,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl ResponseStream {
    /// Wrap `body`, binding it to `token`.
    ///
    /// Inside a tokio runtime a watcher task releases the body as soon as
    /// `token` fires. Outside one, release on cancellation happens on the
    /// next read.
    pub fn new<B>(body: B, token: CancellationToken) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let slot = Arc::new(Slot {
            state: Mutex::new(State::Open(body.map_err(Into::into).boxed_unsync())),
            released: CancellationToken::new(),
        });
        watch_cancellation(slot.clone(), token.clone());

        Self {
            slot,
            cancelled: Box::pin(token.clone().cancelled_owned()),
            token,
        }
    }

    /// Close the upstream body.
    ///
    /// Returns `true` only for the call that actually released it. Reads
    /// after a successful `close` fail with [`StreamError::Closed`].
    pub fn close(&mut self) -> bool {
        let released = self.slot.release(State::Closed);
        if released {
            tracing::trace!("Passthrough stream closed");
        }
        released
    }

    /// Whether [`close`](Self::close) is what released the body.
    pub fn is_closed(&self) -> bool {
        matches!(*self.slot.lock(), State::Closed)
    }

    /// Whether the upstream body has been released for any reason.
    pub fn is_released(&self) -> bool {
        !matches!(*self.slot.lock(), State::Open(_))
    }

    /// Token bound to this stream. Cancelling it aborts pending and future reads.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Adapt into an [`AsyncRead`](tokio::io::AsyncRead).
    pub fn into_reader(self) -> StreamReader<Self, Bytes> {
        StreamReader::new(self)
    }
}

fn watch_cancellation(slot: Arc<Slot>, token: CancellationToken) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    handle.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                if slot.release(State::Finished) {
                    tracing::debug!("Passthrough body released on cancellation");
                }
            }
            _ = slot.released.cancelled() => {}
        }
    });
}

impl Stream for ResponseStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.token.is_cancelled() || this.cancelled.as_mut().poll(cx).is_ready() {
            if this.slot.release(State::Finished) {
                tracing::debug!("Passthrough stream cancelled");
            }
            return Poll::Ready(Some(Err(StreamError::Cancelled)));
        }

        let mut state = this.slot.lock();
        let (item, spent) = loop {
            let body = match &mut *state {
                State::Open(body) => body,
                State::Finished => return Poll::Ready(None),
                State::Closed => return Poll::Ready(Some(Err(StreamError::Closed))),
            };

            match Pin::new(body).poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                    Ok(data) if !data.is_empty() => return Poll::Ready(Some(Ok(data))),
                    // empty data and trailers
                    _ => continue,
                },
                Poll::Ready(Some(Err(e))) => {
                    break (Some(Err(StreamError::Body(e))), state.take_body(State::Finished));
                }
                Poll::Ready(None) => break (None, state.take_body(State::Finished)),
                Poll::Pending => return Poll::Pending,
            }
        };
        drop(state);

        if let Some(body) = spent {
            drop(body);
            this.slot.released.cancel();
            tracing::trace!("Upstream body released");
        }
        Poll::Ready(item)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if self.slot.release(State::Finished) {
            tracing::trace!("Passthrough stream dropped before completion");
        }
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("state", &self.slot.lock().name())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
