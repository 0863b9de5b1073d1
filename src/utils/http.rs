// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::FeedConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FeedConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body asynchronously.
///
/// Non-success statuses are reported as errors rather than returned as text.
/// Parsing is left to the caller so no `scraper::Html` is held across awaits.
pub async fn fetch_text_async(client: &reqwest::Client, url: &str) -> Result<String> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}
