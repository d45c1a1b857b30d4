//! CLI commands and argument parsing

use crate::error::{Error, Result};
use clap::{Parser, Subcommand};

/// Stream large paginated JSON collections from an HTTP service
#[derive(Parser, Debug)]
#[command(name = "pagestream")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Bearer token sent in the Authorization header
    #[arg(short, long, global = true)]
    pub token: Option<String>,

    /// Service identifier sent in the X-SERVICE-TOKEN header
    #[arg(short, long, global = true)]
    pub service_id: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a collection to stdout as JSON Lines
    Stream {
        /// Collection endpoint URL
        url: String,

        /// Field defining ascending collection order
        #[arg(long, default_value = "id")]
        order_key: String,

        /// Items per page (defaults to the configured page size)
        #[arg(long)]
        page_size: Option<usize>,

        /// Filter parameter added to every page request
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },

    /// Issue a single JSON GET query and print the payload
    Get {
        /// Endpoint URL
        url: String,

        /// Query parameter
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
}

/// Split a `KEY=VALUE` argument
pub fn parse_key_value(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(Error::config(format!(
            "expected KEY=VALUE, got '{arg}'"
        ))),
    }
}
