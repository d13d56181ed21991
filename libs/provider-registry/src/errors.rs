use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde_json::Value;
use wamsg_core::{StoreError, UnknownProvider};

/// Failure classes shared by every adapter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown provider or missing settings. Fatal, never retried.
    Configuration,
    /// Upstream answered 4xx/5xx.
    UpstreamRejection,
    /// Network failure or timeout; no upstream envelope exists.
    Transport,
    /// Upstream data did not match the expected shape.
    NormalizationGap,
    /// The caller's request cannot be expressed for this provider.
    InvalidRequest,
    /// The provider does not offer this operation.
    Unsupported,
    /// Either phase of a media download failed.
    MediaFetch,
    /// The local template store or audit log failed.
    Store,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::UpstreamRejection => "upstream_rejection",
            ErrorKind::Transport => "transport",
            ErrorKind::NormalizationGap => "normalization_gap",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::MediaFetch => "media_fetch",
            ErrorKind::Store => "store",
        }
    }
}

/// Error emitted by provider adapters and the services built on them.
#[derive(Debug)]
pub struct ProviderError {
    kind: ErrorKind,
    code: String,
    message: String,
    title: Option<String>,
    status: Option<u16>,
    raw: Value,
    source: Option<anyhow::Error>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            title: None,
            status: None,
            raw: Value::Null,
            source: None,
        }
    }

    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, code, message)
    }

    /// Upstream rejection carrying the HTTP status and the raw error body.
    pub fn upstream(
        code: impl Into<String>,
        message: impl Into<String>,
        status: u16,
        raw: Value,
    ) -> Self {
        let mut err = Self::new(ErrorKind::UpstreamRejection, code, message);
        err.status = Some(status);
        err.raw = raw;
        err
    }

    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, code, message)
    }

    pub fn normalization(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NormalizationGap, code, message)
    }

    pub fn invalid_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, code, message)
    }

    pub fn unsupported(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, code, message)
    }

    pub fn media_fetch(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MediaFetch, code, message)
    }

    /// Attaches a source error for debugging purposes.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the machine-readable error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Message suitable for showing to an operator.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Raw provider payload, `Null` when none was received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Configuration
    }

    /// Whether an outer retry policy may try again. Adapters never retry themselves.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Transport => true,
            ErrorKind::UpstreamRejection => {
                matches!(self.status, Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err.as_ref() as &(dyn Error + 'static))
    }
}

impl From<UnknownProvider> for ProviderError {
    fn from(err: UnknownProvider) -> Self {
        ProviderError::configuration("unknown_provider", err.to_string()).with_source(err)
    }
}

impl From<StoreError> for ProviderError {
    fn from(err: StoreError) -> Self {
        ProviderError::new(ErrorKind::Store, "store_error", err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_failures() {
        assert!(ProviderError::transport("t", "timeout").is_retryable());
        assert!(ProviderError::upstream("u", "busy", 503, Value::Null).is_retryable());
        assert!(ProviderError::upstream("u", "slow down", 429, Value::Null).is_retryable());
        assert!(!ProviderError::upstream("u", "bad", 400, Value::Null).is_retryable());
        assert!(!ProviderError::configuration("c", "missing").is_retryable());
    }

    #[test]
    fn unknown_provider_is_fatal() {
        let err = ProviderError::from(UnknownProvider("Acme".into()));
        assert!(err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "unknown_provider: Unknown WhatsApp provider: Acme");
        assert!(err.source().is_some());
    }
}
