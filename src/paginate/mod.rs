//! Page sequencing
//!
//! [`PageSequencer`] walks a collection endpoint offset by offset, producing
//! a lazy, non-restartable sequence of page responses. It never requests page
//! N+1 until the consumer has reported how much of page N it decoded: a full
//! page advances the cursor, anything less terminates the sequence for good.


use crate::error::Result;
use crate::fetch::{PageClient, PageRequest};
use crate::types::StringMap;
use reqwest::{Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

// ============================================================================
// Collection Spec
// ============================================================================

/// Describes the collection to walk: endpoint, ordering and filters.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    /// Collection endpoint
    pub url: Url,
    /// Field defining ascending collection order
    pub order_key: String,
    /// Caller-supplied filter parameters added to every page request
    pub filter: StringMap,
    /// Items per page; `None` uses the client config's page size
    pub page_size: Option<usize>,
}

impl CollectionSpec {
    /// Create a spec for the given endpoint URL
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url.as_ref())?,
            order_key: "id".to_string(),
            filter: StringMap::new(),
            page_size: None,
        })
    }

    /// Set the ordering key
    #[must_use]
    pub fn with_order_key(mut self, key: impl Into<String>) -> Self {
        self.order_key = key.into();
        self
    }

    /// Add a filter parameter
    #[must_use]
    pub fn with_filter_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    /// Override the page size
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Where the sequencer is in its walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// The next pull fetches this page index
    Fetching { index: u64 },
    /// A 200 page is out with the consumer; waiting for its decoded count
    AwaitConsumption { index: u64 },
    /// No further pages will ever be requested
    Terminated,
}

// ============================================================================
// Page Sequencer
// ============================================================================

/// Lazy walk over a collection's pages.
///
/// Dropping the sequencer mid-walk drops whatever response body is in flight,
/// releasing its connection; nothing is prefetched.
#[derive(Debug)]
pub struct PageSequencer {
    client: PageClient,
    spec: CollectionSpec,
    page_size: usize,
    state: CursorState,
}

impl PageSequencer {
    /// Create a sequencer positioned before the first page
    pub fn new(client: PageClient, spec: CollectionSpec) -> Self {
        let page_size = spec.page_size.unwrap_or(client.config().page_size);
        Self {
            client,
            spec,
            page_size,
            state: CursorState::Fetching { index: 0 },
        }
    }

    /// Items per page this sequencer requests
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether the walk has ended
    pub fn is_terminated(&self) -> bool {
        self.state == CursorState::Terminated
    }

    /// Fetch the next page, with fresh retry state for this page alone.
    ///
    /// Returns `None` once terminated. A non-200 response or a fetch that
    /// exhausted its retries is yielded to the caller and ends the walk;
    /// a 200 response parks the cursor until [`Self::record_consumed`].
    pub async fn next_page(&mut self) -> Option<Result<Response>> {
        let index = match self.state {
            CursorState::Fetching { index } => index,
            CursorState::AwaitConsumption { .. } => {
                // Pulled again without reporting consumption: the page was
                // abandoned, and the walk cannot continue coherently.
                warn!("page pulled before prior page was consumed; terminating");
                self.state = CursorState::Terminated;
                return None;
            }
            CursorState::Terminated => return None,
        };

        let request = PageRequest {
            url: self.spec.url.clone(),
            offset: index * self.page_size as u64,
            limit: self.page_size,
            order_key: self.spec.order_key.clone(),
            filter: self.spec.filter.clone(),
        };

        debug!(url = %request.url, page = index, "fetching page");
        match self.client.fetch_page(&request).await {
            Ok(response) if response.status() == StatusCode::OK => {
                self.state = CursorState::AwaitConsumption { index };
                Some(Ok(response))
            }
            Ok(response) => {
                self.state = CursorState::Terminated;
                Some(Ok(response))
            }
            Err(e) => {
                self.state = CursorState::Terminated;
                Some(Err(e))
            }
        }
    }

    /// Report how many items the consumer decoded from the current page.
    ///
    /// Exactly `page_size` items means the page was full and the cursor
    /// advances; fewer means the collection ended (or the page faulted
    /// mid-decode) and the walk terminates. Termination is final.
    pub fn record_consumed(&mut self, items: usize) {
        self.state = match self.state {
            CursorState::AwaitConsumption { index } if items == self.page_size => {
                CursorState::Fetching { index: index + 1 }
            }
            _ => CursorState::Terminated,
        };
    }
}
