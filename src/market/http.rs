//! Shared HTTP plumbing for REST market sources

use super::SourceError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build a client with the per-request timeout applied
pub(crate) fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("volspike/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// GET `url` with query parameters and decode the JSON body
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, SourceError> {
    let response = client.get(url).query(query).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: truncate(body, 256),
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode(format!("{url}: {e}")))
}

fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
    s
}
