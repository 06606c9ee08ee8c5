//! Confluence REST client.
//!
//! One [`ConfluenceClient`] is built from config and shared for every request
//! of a run. Both endpoints go through the same [`RetryPolicy`].

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use wikireq_shared::{
    ConfluenceConfig, RawDocument, RequirementIndex, Result, WikiReqError, resolve_token,
};

use crate::index::{IndexStats, parse_index};
use crate::page_ref::PageRef;
use crate::retry::RetryPolicy;

/// User-Agent string for Confluence requests.
const USER_AGENT: &str = concat!("wikireq/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// FetchFailure
// ---------------------------------------------------------------------------

/// Why a single HTTP attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Transport(String),
}

impl FetchFailure {
    /// Rate limiting, server errors, timeouts and connect failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status } => *status == 429 || (500..600).contains(status),
            Self::Timeout | Self::Connect(_) => true,
            Self::Transport(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    body: Option<ContentBody>,
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    #[serde(default)]
    storage: Option<StorageValue>,
}

#[derive(Debug, Deserialize)]
struct StorageValue {
    #[serde(default)]
    value: Option<String>,
}

// ---------------------------------------------------------------------------
// ConfluenceClient
// ---------------------------------------------------------------------------

/// Client for the page content and requirements endpoints.
#[derive(Clone)]
pub struct ConfluenceClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
    retry: RetryPolicy,
    index_page_size: u32,
}

impl fmt::Debug for ConfluenceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("retry", &self.retry)
            .field("index_page_size", &self.index_page_size)
            .finish()
    }
}

impl ConfluenceClient {
    /// Build a client from `[confluence]` config. The bearer token is read
    /// from the env var named by `token_env`.
    pub fn new(config: &ConfluenceConfig, retry: RetryPolicy) -> Result<Self> {
        let base = config.base_url.trim();
        if base.is_empty() {
            return Err(WikiReqError::config(
                "confluence.base_url is not set (run `wikireq config init` and edit the file)",
            ));
        }

        let base_url = Url::parse(base)
            .map_err(|e| WikiReqError::config(format!("invalid confluence.base_url {base:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(WikiReqError::config(format!(
                "confluence.base_url {base:?} cannot carry a path"
            )));
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WikiReqError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            token: resolve_token(config),
            retry,
            index_page_size: config.index_page_size,
        })
    }

    /// Override the token resolved from the environment.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/rest/api/content/{pageId}?expand=body.storage`
    pub fn page_url(&self, page: &PageRef) -> Result<Url> {
        let mut url = self.endpoint(&["rest", "api", "content", &page.page_id])?;
        url.query_pairs_mut().append_pair("expand", "body.storage");
        Ok(url)
    }

    /// `{base}/rest/reqs/1/page/{space}/{pageId}?numberOfRequirements={n}`
    pub fn index_url(&self, page: &PageRef) -> Result<Url> {
        let mut url =
            self.endpoint(&["rest", "reqs", "1", "page", &page.space_key, &page.page_id])?;
        url.query_pairs_mut()
            .append_pair("numberOfRequirements", &self.index_page_size.to_string());
        Ok(url)
    }

    /// Fetch the page's storage-format markup.
    ///
    /// A response without `body.storage.value` yields an empty document.
    #[instrument(skip_all, fields(page = %page))]
    pub async fn fetch_page_markup(&self, page: &PageRef) -> Result<RawDocument> {
        let url = self.page_url(page)?;
        let body = self.get_text("page", &url).await?;

        let response: ContentResponse = serde_json::from_str(&body)
            .map_err(|e| WikiReqError::malformed(format!("{url}: unexpected page response: {e}")))?;

        let markup = response
            .body
            .and_then(|b| b.storage)
            .and_then(|s| s.value)
            .unwrap_or_default();

        if markup.trim().is_empty() {
            warn!(%url, "page response has no storage body");
        } else {
            info!(bytes = markup.len(), "page markup fetched");
        }

        Ok(RawDocument::new(markup).with_origin(url.to_string()))
    }

    /// Fetch and parse the requirements index for the page.
    #[instrument(skip_all, fields(page = %page))]
    pub async fn fetch_index(&self, page: &PageRef) -> Result<(RequirementIndex, IndexStats)> {
        let url = self.index_url(page)?;
        let body = self.get_text("requirements index", &url).await?;
        parse_index(&body, &page.space_key)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| WikiReqError::config(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, what: &str, url: &Url) -> Result<String> {
        self.retry
            .run(what, |attempt| self.get_once(url, attempt), FetchFailure::is_retryable)
            .await
            .map_err(|e| WikiReqError::unavailable(what, format!("{url}: {e}")))
    }

    async fn get_once(&self, url: &Url, attempt: u32) -> std::result::Result<String, FetchFailure> {
        debug!(%url, attempt, "GET");

        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
