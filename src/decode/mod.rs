//! Streaming item decoding
//!
//! [`PageDecoder`] turns one page's byte stream into a stream of decoded
//! items as they arrive on the wire. Faults mid-body (connection resets,
//! read timeouts, truncated or malformed JSON) are contained to the page:
//! the decoder yields everything decoded so far, then a single
//! [`DecodeEvent::Aborted`], and ends. It never retries; a fresh page request
//! is the only retry path, and that decision belongs upstream.

mod scanner;

#[cfg(test)]
mod tests;

pub use scanner::{ArrayScanner, ScanStep};

use crate::types::JsonValue;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::warn;

/// Dot path of the item array inside the service envelope
pub const ENVELOPE_ITEM_PATH: [&str; 2] = ["data", "data"];

/// Byte stream of a page body
pub type BodyStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// One event from a page's decode
#[derive(Debug, Clone)]
pub enum DecodeEvent {
    /// A decoded item, in source array order
    Item(JsonValue),
    /// The page faulted mid-decode; no more items will follow from it
    Aborted,
}

pin_project! {
    /// Lazily decodes one page body into items.
    ///
    /// Dropping the decoder drops the body stream and with it the
    /// connection; nothing is read ahead of the consumer.
    pub struct PageDecoder<S> {
        #[pin]
        body: S,
        scanner: ArrayScanner,
        yielded: usize,
        drained: bool,
    }
}

impl PageDecoder<BodyStream> {
    /// Decode a page response's body
    pub fn from_response(response: reqwest::Response) -> Self {
        use futures::StreamExt;
        Self::new(response.bytes_stream().boxed())
    }
}

impl<S> PageDecoder<S>
where
    S: Stream<Item = reqwest::Result<Bytes>>,
{
    /// Decode items from a raw body stream
    pub fn new(body: S) -> Self {
        Self {
            body,
            scanner: ArrayScanner::new(ENVELOPE_ITEM_PATH),
            yielded: 0,
            drained: false,
        }
    }

    /// Items successfully yielded so far.
    ///
    /// After the decoder ends this is the page's final count, which decides
    /// whether another page is worth requesting.
    pub fn items_yielded(&self) -> usize {
        self.yielded
    }
}

impl<S> Stream for PageDecoder<S>
where
    S: Stream<Item = reqwest::Result<Bytes>>,
{
    type Item = DecodeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.drained {
            return Poll::Ready(None);
        }

        loop {
            match this.scanner.step() {
                Ok(ScanStep::Item(bytes)) => match serde_json::from_slice(&bytes) {
                    Ok(value) => {
                        *this.yielded += 1;
                        return Poll::Ready(Some(DecodeEvent::Item(value)));
                    }
                    Err(e) => {
                        warn!(error = %e, "item failed to decode");
                        *this.drained = true;
                        return Poll::Ready(Some(DecodeEvent::Aborted));
                    }
                },
                Ok(ScanStep::End) => {
                    *this.drained = true;
                    return Poll::Ready(None);
                }
                Ok(ScanStep::NeedMore) => match this.body.as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(chunk))) => this.scanner.push(&chunk),
                    Poll::Ready(Some(Err(e))) => {
                        if e.is_timeout() {
                            warn!(error = %e, "page read timed out");
                        } else {
                            warn!(error = %e, "connection fault while reading page");
                        }
                        *this.drained = true;
                        return Poll::Ready(Some(DecodeEvent::Aborted));
                    }
                    Poll::Ready(None) => {
                        warn!("page body ended mid-document");
                        *this.drained = true;
                        return Poll::Ready(Some(DecodeEvent::Aborted));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Err(e) => {
                    warn!(error = %e, "malformed page body");
                    *this.drained = true;
                    return Poll::Ready(Some(DecodeEvent::Aborted));
                }
            }
        }
    }
}
