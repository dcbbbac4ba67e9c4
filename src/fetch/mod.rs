//! Loading the event log from disk or over HTTP.

mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;
pub use auth::UrlParam;

use anyhow::{Context, Result};
use tracing::debug;

/// Query parameter the sensor channel expects its read key in.
pub const API_KEY_PARAM: &str = "api_key";

pub const DEFAULT_CHANNEL_BASE_URL: &str = "https://api.thingspeak.com";

/// Largest page the channel CSV export returns; without `results` it only
/// returns the latest 100 entries.
pub const DEFAULT_CHANNEL_RESULTS: u32 = 8000;

pub async fn fetch_bytes<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse()?,
    );

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Reads `source` from a local path, or fetches it when it is an HTTP(S) URL.
///
/// An `api_key`, when given, is appended to HTTP requests as a query parameter.
#[tracing::instrument(skip(api_key), fields(authenticated = api_key.is_some()))]
pub async fn load_source(source: &str, api_key: Option<&str>) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        match api_key {
            Some(key) => {
                let client = UrlParam {
                    inner: BasicClient::new()?,
                    param_name: API_KEY_PARAM.to_string(),
                    key: key.to_string(),
                };
                fetch_bytes(&client, source).await?
            }
            None => fetch_bytes(&BasicClient::new()?, source).await?,
        }
    } else {
        std::fs::read(source).with_context(|| format!("failed to read {source}"))?
    };

    debug!(bytes = bytes.len(), "Event log loaded");
    Ok(bytes)
}

/// CSV export URL for a sensor channel's feed.
pub fn channel_feed_url(base_url: &str, channel_id: u64, results: Option<u32>) -> String {
    let base = base_url.trim_end_matches('/');
    match results {
        Some(n) => format!("{base}/channels/{channel_id}/feeds.csv?results={n}"),
        None => format!("{base}/channels/{channel_id}/feeds.csv"),
    }
}

/// Picks the event-log location: an explicit path or URL, else the export of
/// `channel` (asking for `results` entries), else `default_log`.
pub fn resolve_source(
    source: Option<String>,
    channel: Option<u64>,
    results: u32,
    default_log: &str,
) -> String {
    match (source, channel) {
        (Some(source), _) => source,
        (None, Some(channel)) => {
            channel_feed_url(DEFAULT_CHANNEL_BASE_URL, channel, Some(results))
        }
        (None, None) => default_log.to_string(),
    }
}
