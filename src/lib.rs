//! # pagestream
//!
//! A resilient streaming client for large paginated JSON APIs.
//!
//! Remote services hand out big collections a page at a time; networks drop
//! connections, stall mid-body and truncate JSON. pagestream turns all of
//! that into a single lazy item stream: transient transport faults are
//! retried with exponential backoff, page faults are contained so
//! already-delivered items are never lost, and nothing is fetched ahead of
//! what the consumer actually pulls.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use pagestream::{
//!     open_collection, CollectionRead, CollectionSpec, Credentials, EngineConfig, PageClient,
//!     StreamEvent,
//! };
//!
//! #[tokio::main]
//! async fn main() -> pagestream::Result<()> {
//!     let credentials = Credentials::bearer("token").with_service_id("svc");
//!     let client = PageClient::new(EngineConfig::from_env()?, &credentials)?;
//!     let spec = CollectionSpec::new("https://api.example.com/v4/vehicles")?
//!         .with_filter_param("site", "bog");
//!
//!     match open_collection(&client, spec).await {
//!         CollectionRead::Open { mut items, .. } => {
//!             while let Some(event) = items.next().await {
//!                 match event {
//!                     StreamEvent::Item(item) => println!("{item}"),
//!                     StreamEvent::PageAborted => break,
//!                 }
//!             }
//!         }
//!         CollectionRead::Rejected { status, body } => {
//!             eprintln!("rejected: {status} {body}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! caller ── open_collection ──► engine (lazy item stream)
//!                                 │ pulls pages one at a time
//!                               paginate (offset cursor, stop on short page)
//!                                 │ one fresh retry state per page
//!                               fetch (GET + backoff, shared pool)
//!                                 │ 200 bodies stream into
//!                               decode (incremental item framing)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Engine configuration
pub mod config;

/// Retry delay policy
pub mod backoff;

/// Page fetching and plain JSON queries
pub mod fetch;

/// Page sequencing over offsets
pub mod paginate;

/// Streaming item decoding
pub mod decode;

/// Collection streaming entry point
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::Backoff;
pub use config::EngineConfig;
pub use engine::{open_collection, CollectionRead, ItemStream, ReadStats, StreamEvent};
pub use error::{Error, Result};
pub use fetch::{Credentials, PageClient, PageRequest};
pub use paginate::{CollectionSpec, PageSequencer};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
