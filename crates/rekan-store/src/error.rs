//! Mapping of transport and persistence failures onto [`StoreError`].

use rekan_core::error::StoreError;

/// Classify a reqwest failure.
pub(crate) fn from_reqwest(e: reqwest::Error, base_url: &str, timeout_secs: u64) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(timeout_secs)
    } else if e.is_connect() {
        StoreError::Unreachable(format!("store not reachable at {base_url}"))
    } else if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Unreachable(e.to_string())
    }
}

/// Turn a non-success response into `Rejected`, keeping the body as the message.
pub(crate) async fn rejected(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StoreError::Rejected { status, message }
}

pub(crate) fn from_io(e: std::io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

pub(crate) fn from_json(e: serde_json::Error) -> StoreError {
    StoreError::Decode(e.to_string())
}
