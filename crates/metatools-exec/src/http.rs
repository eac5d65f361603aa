use metatools_core::{MetatoolsError, MetatoolsResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const ERROR_EXCERPT_LEN: usize = 200;

/// POSTs `args` as JSON to `url` and returns the reply.
///
/// A JSON reply is returned as structured data; anything else comes back as a
/// string. Non-2xx statuses are upstream failures carrying a body excerpt.
pub async fn call_http(
    client: &reqwest::Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    args: &Map<String, Value>,
) -> MetatoolsResult<Value> {
    info!(url = %url, "HTTP backend call");

    let mut request = client.post(url).json(args);
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| MetatoolsError::Upstream(format!("HTTP request to {url} failed: {e}")))?;

    let status = response.status();
    let body_bytes = response
        .bytes()
        .await
        .map_err(|e| MetatoolsError::Upstream(format!("Failed to read response body: {e}")))?;

    if body_bytes.len() > MAX_RESPONSE_SIZE {
        return Err(MetatoolsError::Upstream(format!(
            "Response too large: {} bytes (max: {MAX_RESPONSE_SIZE} bytes)",
            body_bytes.len()
        )));
    }

    let body = String::from_utf8_lossy(&body_bytes);
    if !status.is_success() {
        let excerpt: String = body.chars().take(ERROR_EXCERPT_LEN).collect();
        return Err(MetatoolsError::Upstream(format!(
            "{url} returned {status}: {excerpt}"
        )));
    }

    Ok(serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body.into_owned())))
}
