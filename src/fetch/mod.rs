//! Page fetching
//!
//! [`PageClient`] is the only component that talks to the network. It issues
//! one GET per page with offset/limit/order query parameters and the
//! service's auth headers, absorbing transient transport faults with
//! exponential backoff. Any well-formed HTTP response, success or error
//! status alike, is returned immediately without retry; interpreting a non-200
//! status is the caller's job.
//!
//! Plain (non-streamed) JSON queries share the same retry policy and return
//! the `(status, payload)` pair directly.

mod rate_limit;


pub use rate_limit::{RateLimiter, RateLimiterConfig};

use crate::backoff::Backoff;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::types::{internal_error_payload, JsonValue, StringMap};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

/// Header carrying the service identifier on every request
pub const SERVICE_TOKEN_HEADER: &str = "X-SERVICE-TOKEN";

// ============================================================================
// Credentials
// ============================================================================

/// Auth material attached to every request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Bearer token for the `Authorization` header
    pub token: Option<String>,
    /// Service identifier for the `X-SERVICE-TOKEN` header
    pub service_id: Option<String>,
}

impl Credentials {
    /// Credentials with a bearer token only
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            service_id: None,
        }
    }

    /// Set the service identifier
    #[must_use]
    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        if let Some(service_id) = &self.service_id {
            let value = HeaderValue::from_str(service_id)
                .map_err(|e| Error::invalid_config("service_id", e.to_string()))?;
            headers.insert(SERVICE_TOKEN_HEADER, value);
        }
        if let Some(token) = &self.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::invalid_config("token", e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

// ============================================================================
// Page Request
// ============================================================================

/// One page's worth of request parameters. Immutable once issued.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Collection endpoint
    pub url: Url,
    /// Absolute item offset (page index × page size)
    pub offset: u64,
    /// Items requested
    pub limit: usize,
    /// Field defining ascending collection order
    pub order_key: String,
    /// Caller-supplied filter parameters
    pub filter: StringMap,
}

impl PageRequest {
    /// Render the query string pairs for this page.
    ///
    /// Filter keys are sorted so identical requests serialize identically.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("offset".to_string(), self.offset.to_string()),
            ("limit".to_string(), self.limit.to_string()),
            (
                "order".to_string(),
                format!(r#"[["{}","ASC"]]"#, self.order_key),
            ),
        ];
        let mut filter: Vec<_> = self.filter.iter().collect();
        filter.sort();
        params.extend(filter.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

// ============================================================================
// Page Client
// ============================================================================

/// HTTP client for page fetches and plain JSON queries
#[derive(Clone)]
pub struct PageClient {
    http: Client,
    headers: HeaderMap,
    config: EngineConfig,
    backoff: Backoff,
    rate_limiter: Option<RateLimiter>,
}

impl PageClient {
    /// Build a client from config and credentials.
    ///
    /// The underlying connection pool is shared by every clone of this
    /// client, so unrelated streams reuse sockets without sharing any other
    /// state.
    pub fn new(config: EngineConfig, credentials: &Credentials) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(config.pool_max_idle)
            .user_agent(concat!("pagestream/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let backoff = Backoff::new(config.base_delay, config.max_delay);
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            http,
            headers: credentials.header_map()?,
            config,
            backoff,
            rate_limiter,
        })
    }

    /// The config this client was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch one page, retrying transient transport faults.
    ///
    /// Each attempt is its own request; a failed attempt's connection is
    /// released before the backoff sleep. Returns the response as soon as the
    /// remote produces one, whatever its status; the body has not been read
    /// yet. Exhaustion returns [`Error::RetriesExhausted`], which callers
    /// surface as a synthetic HTTP 500.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<Response> {
        let params = request.query_params();
        let attempts = self.config.max_retries.max(1);
        for attempt in 0..attempts {
            self.throttle().await;
            let result = self
                .http
                .get(request.url.clone())
                .query(&params)
                .headers(self.headers.clone())
                .send()
                .await;
            match result {
                Ok(response) => {
                    debug!(url = %request.url, offset = request.offset, status = %response.status(), "page fetched");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(url = %request.url, offset = request.offset, attempt, error = %e, "page fetch failed");
                    if attempt + 1 != attempts {
                        tokio::time::sleep(self.backoff.delay(attempt)).await;
                    }
                }
            }
        }
        Err(Error::RetriesExhausted { attempts })
    }

    // ------------------------------------------------------------------------
    // Plain queries
    // ------------------------------------------------------------------------

    /// Single-shot GET returning `(status, payload)`.
    ///
    /// On 200 the `data` envelope field is unwrapped; on any other status the
    /// whole error body is returned as-is. Transient faults (including an
    /// undecodable body) are retried; exhaustion yields
    /// `(500, ["Internal Error"])`.
    pub async fn get_json(&self, url: &str, params: &StringMap) -> Result<(StatusCode, JsonValue)> {
        self.request_json(Method::GET, url, params, None).await
    }

    /// Single-shot POST with a JSON payload, same contract as [`Self::get_json`]
    pub async fn post_json(
        &self,
        url: &str,
        payload: &JsonValue,
    ) -> Result<(StatusCode, JsonValue)> {
        self.request_json(Method::POST, url, &StringMap::new(), Some(payload))
            .await
    }

    /// Single-shot PUT with a JSON payload, same contract as [`Self::get_json`]
    pub async fn put_json(&self, url: &str, payload: &JsonValue) -> Result<(StatusCode, JsonValue)> {
        self.request_json(Method::PUT, url, &StringMap::new(), Some(payload))
            .await
    }

    async fn request_json(
        &self,
        method: Method,
        url: &str,
        params: &StringMap,
        payload: Option<&JsonValue>,
    ) -> Result<(StatusCode, JsonValue)> {
        let url = Url::parse(url)?;
        let attempts = self.config.max_retries.max(1);
        for attempt in 0..attempts {
            self.throttle().await;
            match self.send_json(method.clone(), &url, params, payload).await {
                Ok(pair) => return Ok(pair),
                Err(e) if e.is_transient() => {
                    warn!(%url, attempt, error = %e, "query failed");
                    if attempt + 1 != attempts {
                        tokio::time::sleep(self.backoff.delay(attempt)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            internal_error_payload(),
        ))
    }

    async fn send_json(
        &self,
        method: Method,
        url: &Url,
        params: &StringMap,
        payload: Option<&JsonValue>,
    ) -> Result<(StatusCode, JsonValue)> {
        let mut request = self
            .http
            .request(method, url.clone())
            .headers(self.headers.clone())
            .timeout(self.config.query_timeout);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let body: JsonValue = response.json().await?;

        if status == StatusCode::OK {
            match body.get("data") {
                Some(data) => Ok((status, data.clone())),
                None => Err(Error::decode("response missing 'data' envelope")),
            }
        } else {
            Ok((status, body))
        }
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }
    }
}

impl std::fmt::Debug for PageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
