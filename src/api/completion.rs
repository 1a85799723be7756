//! Response completion hook
//!
//! Wraps a response body so a oneshot fires once the body has been handed
//! to the transport in full, or dropped. The signal means hyper has the
//! bytes, not that the peer has read them.

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http_body::{Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

struct CompletionBody {
    inner: Body,
    done: Option<oneshot::Sender<()>>,
}

impl CompletionBody {
    fn fire(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl http_body::Body for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.fire();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CompletionBody {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Wraps `response` so `done` fires once its body has completed
pub fn notify_on_complete(response: Response, done: oneshot::Sender<()>) -> Response {
    let (parts, body) = response.into_parts();
    let body = Body::new(CompletionBody {
        inner: body,
        done: Some(done),
    });
    Response::from_parts(parts, body)
}
