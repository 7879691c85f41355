//! Page fetching and text extraction.
//!
//! [`Fetcher`] retrieves a target page over HTTP and reduces it to
//! normalized body text: boilerplate markup is stripped via a curated
//! selector list, remaining text is extracted from `<body>` only, and
//! whitespace runs collapse to single spaces. A pure fetch+transform with no
//! caching and no retries; failures propagate to the caller.

mod extract;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use pagewatch_shared::{FetchConfig, PagewatchError, Result};

pub use extract::{StripList, extract_text, normalize_whitespace};

/// Page fetcher with a shared HTTP client. Cheap to clone.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    strip: Arc<StripList>,
}

impl Fetcher {
    /// Build a fetcher from config. Compiles the strip list and constructs
    /// the HTTP client once; both are shared across clones.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let strip = StripList::compile(&config.strip_selectors)?;

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PagewatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            strip: Arc::new(strip),
        })
    }

    /// Fetch `url` and return its normalized text content.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        debug!(%url, "fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PagewatchError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PagewatchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| PagewatchError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(extract_text(&body, &self.strip))
    }
}
