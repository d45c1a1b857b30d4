//! CLI command execution

use super::commands::{parse_key_value, Cli, Commands};
use crate::config::EngineConfig;
use crate::engine::{open_collection, CollectionRead, StreamEvent};
use crate::error::{Error, Result};
use crate::fetch::{Credentials, PageClient};
use crate::paginate::CollectionSpec;
use crate::types::StringMap;
use futures::StreamExt;
use reqwest::StatusCode;
use tracing::warn;

/// Executes a parsed CLI invocation
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a runner for the parsed arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the requested command
    pub async fn run(self) -> Result<()> {
        let config = EngineConfig::from_env()?;
        let credentials = Credentials {
            token: self.cli.token,
            service_id: self.cli.service_id,
        };
        let client = PageClient::new(config, &credentials)?;

        match self.cli.command {
            Commands::Stream {
                url,
                order_key,
                page_size,
                filters,
            } => Self::run_stream(&client, &url, order_key, page_size, &filters).await,
            Commands::Get { url, params } => Self::run_get(&client, &url, &params).await,
        }
    }

    async fn run_stream(
        client: &PageClient,
        url: &str,
        order_key: String,
        page_size: Option<usize>,
        filters: &[String],
    ) -> Result<()> {
        let mut spec = CollectionSpec::new(url)?.with_order_key(order_key);
        if let Some(size) = page_size {
            spec = spec.with_page_size(size);
        }
        for filter in filters {
            let (key, value) = parse_key_value(filter)?;
            spec = spec.with_filter_param(key, value);
        }

        match open_collection(client, spec).await {
            CollectionRead::Rejected { status, body } => Err(Error::Other(format!(
                "collection rejected with HTTP {status}: {body}"
            ))),
            CollectionRead::Open { mut items, .. } => {
                let mut aborted = false;
                while let Some(event) = items.next().await {
                    match event {
                        StreamEvent::Item(value) => {
                            println!("{}", serde_json::to_string(&value)?);
                        }
                        StreamEvent::PageAborted => {
                            warn!("collection cut short by a page fault");
                            aborted = true;
                        }
                    }
                }
                if aborted {
                    Err(Error::Other("collection ended early".to_string()))
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn run_get(client: &PageClient, url: &str, params: &[String]) -> Result<()> {
        let mut query = StringMap::new();
        for param in params {
            let (key, value) = parse_key_value(param)?;
            query.insert(key, value);
        }

        let (status, payload) = client.get_json(url, &query).await?;
        println!("{}", serde_json::to_string_pretty(&payload)?);

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(Error::Other(format!("query returned HTTP {status}")))
        }
    }
}
