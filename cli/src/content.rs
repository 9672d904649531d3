//! Content API client.
//!
//! Any failure (no URL, network, non-2xx, bad JSON) resolves to the
//! built-in fallback note, so callers always get something to lay out.

use canvas::notes::{ContentRecord, parse_records, records_or_fallback};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("no content URL configured")]
    NotConfigured,
    #[error("content request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content API returned HTTP {0}")]
    Status(u16),
    #[error("invalid content JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// GET `url` and decode the records.
///
/// # Errors
///
/// Transport failures, non-2xx statuses and malformed bodies.
pub async fn fetch_records(client: &reqwest::Client, url: &str) -> Result<Vec<ContentRecord>, ContentError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ContentError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    Ok(parse_records(&body)?)
}

/// Fetch records from `url`, falling back to the built-in note on failure.
/// Records come back in `order_index` order.
pub async fn load_records(client: &reqwest::Client, url: Option<&str>) -> Vec<ContentRecord> {
    let result = match url {
        Some(url) => fetch_records(client, url).await,
        None => Err(ContentError::NotConfigured),
    };
    records_or_fallback(result)
}

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;
