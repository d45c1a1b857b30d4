//! Collection streaming
//!
//! The entry point callers use: [`open_collection`] issues the first page up
//! front so the caller learns immediately whether the remote accepted the
//! request, then hands back a lazy item stream that fetches, decodes and
//! advances pages strictly as it is consumed.

mod types;


pub use types::{CollectionRead, ItemStream, ReadStats, StreamEvent};

use crate::decode::{BodyStream, DecodeEvent, PageDecoder};
use crate::fetch::PageClient;
use crate::paginate::{CollectionSpec, PageSequencer};
use crate::types::{internal_error_payload, JsonValue};
use futures::StreamExt;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

/// Open a collection for streaming.
///
/// The first page is fetched before this returns. A 200 means the stream is
/// live: consume [`CollectionRead::Open::items`] to pull the rest of the
/// collection page by page. Anything else (a well-formed error status, or
/// retries exhausted without any response) comes back as
/// [`CollectionRead::Rejected`] with the error body materialized (falling
/// back to the internal-error sentinel when it cannot be decoded).
pub async fn open_collection(client: &PageClient, spec: CollectionSpec) -> CollectionRead {
    let mut sequencer = PageSequencer::new(client.clone(), spec);

    let first = match sequencer.next_page().await {
        Some(first) => first,
        None => {
            // A fresh sequencer always has a first page; treat anything else
            // as a failed open.
            return CollectionRead::Rejected {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: internal_error_payload(),
            };
        }
    };

    match first {
        Err(e) => {
            warn!(error = %e, "collection open failed");
            CollectionRead::Rejected {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: internal_error_payload(),
            }
        }
        Ok(response) if response.status() == StatusCode::OK => {
            let mut stats = ReadStats::default();
            stats.add_page();
            let state = ReadState {
                sequencer,
                page: Some(PageDecoder::from_response(response)),
                stats,
                done: false,
            };
            let inner = futures::stream::unfold(state, |mut state| async move {
                let event = state.next_event().await?;
                Some((event, state))
            });
            CollectionRead::Open {
                status: StatusCode::OK,
                items: ItemStream::new(inner),
            }
        }
        Ok(response) => {
            let status = response.status();
            info!(%status, "collection open rejected");
            let body: JsonValue = response
                .json()
                .await
                .unwrap_or_else(|_| internal_error_payload());
            CollectionRead::Rejected { status, body }
        }
    }
}

/// Pull-chain state behind an [`ItemStream`]
struct ReadState {
    sequencer: PageSequencer,
    page: Option<PageDecoder<BodyStream>>,
    stats: ReadStats,
    done: bool,
}

/// What became of the current page on this pull
enum PageOutcome {
    Item(JsonValue),
    Aborted { consumed: usize },
    Finished { consumed: usize },
}

impl ReadState {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if self.done {
                return None;
            }

            if let Some(decoder) = self.page.as_mut() {
                let outcome = match decoder.next().await {
                    Some(DecodeEvent::Item(value)) => PageOutcome::Item(value),
                    Some(DecodeEvent::Aborted) => PageOutcome::Aborted {
                        consumed: decoder.items_yielded(),
                    },
                    None => PageOutcome::Finished {
                        consumed: decoder.items_yielded(),
                    },
                };

                match outcome {
                    PageOutcome::Item(value) => {
                        self.stats.add_items(1);
                        return Some(StreamEvent::Item(value));
                    }
                    PageOutcome::Aborted { consumed } => {
                        self.page = None;
                        self.sequencer.record_consumed(consumed);
                        self.finish(true);
                        return Some(StreamEvent::PageAborted);
                    }
                    PageOutcome::Finished { consumed } => {
                        self.page = None;
                        self.sequencer.record_consumed(consumed);
                        // The sequencer now decides whether another page
                        // exists; loop back around to ask it.
                    }
                }
            } else {
                match self.sequencer.next_page().await {
                    None => {
                        self.finish(false);
                        return None;
                    }
                    Some(Ok(response)) if response.status() == StatusCode::OK => {
                        self.stats.add_page();
                        self.page = Some(PageDecoder::from_response(response));
                    }
                    Some(Ok(response)) => {
                        warn!(status = %response.status(), "page fetch returned error status");
                        self.finish(true);
                        return Some(StreamEvent::PageAborted);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "page fetch gave up");
                        self.finish(true);
                        return Some(StreamEvent::PageAborted);
                    }
                }
            }
        }
    }

    fn finish(&mut self, aborted: bool) {
        self.done = true;
        debug!(
            pages = self.stats.pages_fetched,
            items = self.stats.items_yielded,
            aborted,
            "collection stream finished"
        );
    }
}
