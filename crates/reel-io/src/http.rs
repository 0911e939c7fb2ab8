//! Dislike counts over HTTP.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::{CountFetcher, LookupError, Result};

const USER_AGENT: &str = concat!("Reel/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Votes {
    dislikes: u64,
}

/// Extract the dislike count from a vote API response body.
pub fn parse_count(body: &str) -> Result<u64> {
    let votes: Votes = serde_json::from_str(body)?;
    Ok(votes.dislikes)
}

/// `GET {endpoint}?videoId={id}` with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpCountFetcher {
    endpoint: Url,
    client: reqwest::blocking::Client,
}

impl HttpCountFetcher {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| LookupError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        let scheme = endpoint.scheme().to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(LookupError::BlockedScheme(scheme));
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { endpoint, client })
    }

    pub fn from_config(config: &reel_config::LookupConfig) -> Result<Self> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }

    pub fn request_url(&self, id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("videoId", id);
        url
    }
}

impl CountFetcher for HttpCountFetcher {
    fn fetch_count(&self, id: &str) -> Result<u64> {
        let url = self.request_url(id);
        log::debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }
        parse_count(&response.text()?)
    }
}
