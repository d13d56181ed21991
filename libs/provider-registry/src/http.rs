//! Outbound HTTP plumbing shared by the adapters.
//!
//! Every call goes through [`execute`] or [`download`], which attach the
//! per-request timeout, record round-trip metrics and turn `reqwest` failures
//! into typed [`ProviderError`]s.

use std::time::{Duration, Instant};

use bytes::Bytes;
use metrics::{counter, histogram};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{Value, json};
use tracing::debug;
use wamsg_core::ProviderKind;

use crate::errors::ProviderError;

const MAX_RAW_BODY: usize = 2048;

/// Status and parsed JSON body of an upstream reply.
#[derive(Debug)]
pub(crate) struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

pub(crate) fn build_client(
    provider: ProviderKind,
    user_agent: &str,
) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|err| {
            ProviderError::configuration(
                format!("{}_client", code_prefix(provider)),
                "failed to create HTTP client",
            )
            .with_source(err)
        })
}

pub(crate) async fn execute(
    provider: ProviderKind,
    endpoint: &'static str,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Reply, ProviderError> {
    let started = Instant::now();
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| transport_error(provider, endpoint, err))?;

    let status = response.status();
    record_roundtrip(provider, endpoint, status, started);

    let text = response
        .text()
        .await
        .map_err(|err| transport_error(provider, endpoint, err))?;
    let body = parse_body(&text);

    if !status.is_success() {
        counter!(
            "wamsg_errors_total",
            "provider" => provider.as_str(),
            "kind" => "upstream",
            "endpoint" => endpoint
        )
        .increment(1);
    }
    debug!(provider = %provider, endpoint, status = status.as_u16(), "upstream replied");
    Ok(Reply { status, body })
}

/// Fetches a binary body. Non-success statuses are returned, not raised.
pub(crate) async fn download(
    provider: ProviderKind,
    endpoint: &'static str,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<(StatusCode, Bytes), ProviderError> {
    let started = Instant::now();
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| transport_error(provider, endpoint, err))?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| transport_error(provider, endpoint, err))?;
    record_roundtrip(provider, endpoint, status, started);
    Ok((status, bytes))
}

fn record_roundtrip(
    provider: ProviderKind,
    endpoint: &'static str,
    status: StatusCode,
    started: Instant,
) {
    histogram!(
        "wamsg_upstream_roundtrip_seconds",
        "provider" => provider.as_str(),
        "endpoint" => endpoint,
        "status" => status.as_str().to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

fn transport_error(
    provider: ProviderKind,
    endpoint: &'static str,
    err: reqwest::Error,
) -> ProviderError {
    counter!(
        "wamsg_errors_total",
        "provider" => provider.as_str(),
        "kind" => "transport",
        "endpoint" => endpoint
    )
    .increment(1);
    let detail = if err.is_timeout() {
        "the request timed out"
    } else if err.is_connect() {
        "the connection failed"
    } else {
        "the request failed"
    };
    ProviderError::transport(
        format!("{}_transport", code_prefix(provider)),
        format!("Could not reach the {provider} WhatsApp API: {detail}"),
    )
    .with_source(err)
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| {
        let mut end = text.len().min(MAX_RAW_BODY);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        json!({ "body": &text[..end] })
    })
}

/// Non-empty string (or number) found at a JSON pointer.
pub(crate) fn string_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Payload stored in audit entries when no upstream body exists.
pub(crate) fn transport_payload(err: &ProviderError) -> Value {
    json!({
        "transport_error": {
            "code": err.code(),
            "message": err.message(),
        }
    })
}

pub(crate) fn generic_failure(provider: ProviderKind, status: StatusCode) -> String {
    format!(
        "{provider} WhatsApp API request failed with status {}",
        status.as_u16()
    )
}

pub(crate) fn code_prefix(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Meta => "meta",
        ProviderKind::Exotel => "exotel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_json_bodies_are_wrapped() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("<html>oops</html>"), json!({"body": "<html>oops</html>"}));
        assert_eq!(parse_body(r#"{"ok":true}"#), json!({"ok": true}));
    }

    #[test]
    fn string_at_reads_strings_and_numbers() {
        let value = json!({"a": [{"id": "x"}, {"id": 7}], "blank": " "});
        assert_eq!(string_at(&value, "/a/0/id").as_deref(), Some("x"));
        assert_eq!(string_at(&value, "/a/1/id").as_deref(), Some("7"));
        assert_eq!(string_at(&value, "/blank"), None);
        assert_eq!(string_at(&value, "/missing"), None);
    }
}
