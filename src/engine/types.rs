//! Engine types
//!
//! Event and result types for collection reads.

use crate::types::JsonValue;
use futures::stream::BoxStream;
use futures::Stream;
use reqwest::StatusCode;
use std::pin::Pin;
use std::task::{Context, Poll};

/// One event observed while consuming a collection
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A decoded item, in ascending collection order
    Item(JsonValue),
    /// The current page faulted; items already delivered stand, but the
    /// collection ends here. Callers may treat this as end-of-data.
    PageAborted,
}

impl StreamEvent {
    /// Check if this is an item event
    pub fn is_item(&self) -> bool {
        matches!(self, Self::Item(_))
    }

    /// Consume the event, returning the item if there is one
    pub fn into_item(self) -> Option<JsonValue> {
        match self {
            Self::Item(value) => Some(value),
            Self::PageAborted => None,
        }
    }
}

/// Lazy item sequence over a whole collection.
///
/// Pulling this stream is the only thing that drives network activity:
/// page N+1 is not requested until page N is fully consumed. Dropping the
/// stream releases the in-flight connection and stops all fetching.
pub struct ItemStream {
    inner: BoxStream<'static, StreamEvent>,
}

impl ItemStream {
    pub(crate) fn new(inner: impl Stream<Item = StreamEvent> + Send + 'static) -> Self {
        use futures::StreamExt;
        Self {
            inner: inner.boxed(),
        }
    }
}

impl Stream for ItemStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ItemStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStream").finish_non_exhaustive()
    }
}

/// Outcome of opening a collection
#[derive(Debug)]
pub enum CollectionRead {
    /// The remote accepted the first page request; items stream lazily
    Open {
        /// Initial HTTP status (always 200 here)
        status: StatusCode,
        /// The lazy item sequence
        items: ItemStream,
    },
    /// The remote rejected the request, or it could not be made at all
    Rejected {
        /// HTTP status, or a synthetic 500 when retries were exhausted
        status: StatusCode,
        /// Best-effort decoded error body, or the internal-error sentinel
        body: JsonValue,
    },
}

impl CollectionRead {
    /// Check if the collection opened
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The initial HTTP status
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Open { status, .. } | Self::Rejected { status, .. } => *status,
        }
    }
}

/// Counters for one collection read
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadStats {
    /// Pages fetched with a 200 status
    pub pages_fetched: usize,
    /// Items delivered to the consumer
    pub items_yielded: usize,
}

impl ReadStats {
    /// Count a fetched page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Count delivered items
    pub fn add_items(&mut self, count: usize) {
        self.items_yielded += count;
    }
}
