//! Exotel WhatsApp API adapter.
//!
//! Exotel authenticates every call with HTTP basic auth (`api_key:api_token`)
//! against `https://{subdomain}/v2/accounts/{sid}/...`.

mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};
use wamsg_core::{
    ExotelSettings, MediaAsset, ProviderConfig, ProviderKind, SendRequest, SendResult, Template,
    Timeouts,
};

use crate::errors::ProviderError;
use crate::http::{self, Reply, generic_failure, string_at, transport_payload};
use crate::registry::{ProviderRegistry, RegistryError};
use crate::traits::ProviderAdapter;
use crate::wire;

const USER_AGENT: &str = "wamsg-exotel-provider/0.1";

pub fn register(registry: &mut ProviderRegistry) -> Result<(), RegistryError> {
    registry.register(ProviderKind::Exotel, |config: &ProviderConfig| {
        ExotelAdapter::from_config(config)
            .map(|adapter| Arc::new(adapter) as Arc<dyn ProviderAdapter>)
    })
}

pub struct ExotelAdapter {
    client: reqwest::Client,
    settings: ExotelSettings,
    timeouts: Timeouts,
    account_base: String,
}

impl ExotelAdapter {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let settings = config.exotel.clone().ok_or_else(|| {
            ProviderError::configuration(
                "exotel_missing_settings",
                "Exotel settings are not configured",
            )
        })?;
        Self::new(settings, config.timeouts)
    }

    pub fn new(settings: ExotelSettings, timeouts: Timeouts) -> Result<Self, ProviderError> {
        let required = [
            ("exotel_missing_api_key", settings.api_key.as_str(), "Exotel API key"),
            ("exotel_missing_api_token", settings.api_token.expose(), "Exotel API token"),
            ("exotel_missing_subdomain", settings.subdomain.as_str(), "Exotel subdomain"),
            ("exotel_missing_sid", settings.sid.as_str(), "Exotel account SID"),
            ("exotel_missing_from", settings.from.as_str(), "Exotel sender number"),
        ];
        for (code, value, label) in required {
            if value.trim().is_empty() {
                return Err(ProviderError::configuration(
                    code,
                    format!("{label} is not configured"),
                ));
            }
        }

        let api_base = settings.api_base();
        url::Url::parse(&api_base).map_err(|err| {
            ProviderError::configuration(
                "exotel_invalid_url",
                format!("invalid Exotel API base `{api_base}`: {err}"),
            )
            .with_source(err)
        })?;

        let account_base = format!("{api_base}/v2/accounts/{}", settings.sid.trim());
        Ok(Self {
            client: http::build_client(ProviderKind::Exotel, USER_AGENT)?,
            settings,
            timeouts,
            account_base,
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.settings.api_key, Some(self.settings.api_token.expose()))
    }

    fn build_payload(&self, request: &SendRequest) -> Result<Value, ProviderError> {
        let to = wire::recipient(request, "exotel")?;
        let (kind, content) = wire::content(request, "exotel")?;
        let mut message_content = json!({ "type": kind });
        message_content[kind] = content;
        Ok(json!({
            "whatsapp": {
                "messages": [{
                    "from": self.settings.from,
                    "to": to,
                    "content": message_content,
                }]
            }
        }))
    }
}

/// Exotel reports errors at the top level or per message.
fn error_message(body: &Value) -> Option<String> {
    string_at(body, "/message")
        .or_else(|| string_at(body, "/response/whatsapp/messages/0/error_data/message"))
        .or_else(|| string_at(body, "/response/whatsapp/messages/0/error_data/description"))
}

fn rejection(code: &str, reply: Reply) -> ProviderError {
    let message = error_message(&reply.body)
        .unwrap_or_else(|| generic_failure(ProviderKind::Exotel, reply.status));
    ProviderError::upstream(code, message, reply.status.as_u16(), reply.body)
}

#[async_trait]
impl ProviderAdapter for ExotelAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Exotel
    }

    async fn send(&self, request: &SendRequest) -> Result<SendResult, ProviderError> {
        let payload = self.build_payload(request)?;
        let call = self
            .authed(self.client.post(format!("{}/messages", self.account_base)))
            .json(&payload);

        let sent = http::execute(ProviderKind::Exotel, "messages", call, self.timeouts.api()).await;
        let reply = match sent {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    provider = "Exotel",
                    code = err.code(),
                    error = %err,
                    "send transport failure"
                );
                return Ok(SendResult::failed(err.message(), transport_payload(&err)));
            }
        };

        if !reply.status.is_success() {
            let message = error_message(&reply.body)
                .unwrap_or_else(|| generic_failure(ProviderKind::Exotel, reply.status));
            warn!(
                provider = "Exotel",
                status = reply.status.as_u16(),
                error = %message,
                "send rejected"
            );
            return Ok(SendResult::failed(message, reply.body));
        }

        match string_at(&reply.body, "/response/whatsapp/messages/0/data/sid") {
            Some(sid) => Ok(SendResult::sent(sid, reply.body)),
            None => {
                // 2xx envelopes can still carry a per-message failure.
                let message = error_message(&reply.body)
                    .unwrap_or_else(|| "Exotel response did not include a message sid".into());
                Ok(SendResult::failed(message, reply.body))
            }
        }
    }

    async fn fetch_templates(&self) -> Result<Vec<Template>, ProviderError> {
        let mut call = self.authed(self.client.get(format!("{}/templates", self.account_base)));
        let waba_id = self
            .settings
            .waba_id
            .as_deref()
            .filter(|id| !id.trim().is_empty());
        if let Some(waba_id) = waba_id {
            call = call.query(&[("waba_id", waba_id)]);
        }

        let reply =
            http::execute(ProviderKind::Exotel, "templates", call, self.timeouts.api()).await?;
        if !reply.status.is_success() {
            return Err(rejection("exotel_templates_failed", reply));
        }

        // Exotel wraps lists in its `response` envelope; older accounts return `data`.
        let entries = reply
            .body
            .pointer("/response/whatsapp/templates")
            .or_else(|| reply.body.get("data"))
            .and_then(Value::as_array)
            .cloned();
        let Some(entries) = entries else {
            return Err(ProviderError::normalization(
                "exotel_templates_missing_data",
                "No templates data received from the provider.",
            )
            .with_raw(reply.body));
        };

        let fetched = templates::normalize(entries);
        info!(provider = "Exotel", count = fetched.len(), "fetched templates");
        Ok(fetched)
    }

    async fn get_media_asset(&self, media_id: &str) -> Result<MediaAsset, ProviderError> {
        Err(ProviderError::unsupported(
            "exotel_media_unsupported",
            format!("Exotel does not expose media retrieval (media id {media_id})"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wamsg_core::Secret;

    fn settings() -> ExotelSettings {
        ExotelSettings {
            api_key: "key".into(),
            api_token: Secret::new("token"),
            subdomain: "api.exotel.com".into(),
            sid: "acme1".into(),
            from: "+919000000000".into(),
            waba_id: None,
            base_url: None,
        }
    }

    #[test]
    fn account_base_uses_subdomain_and_sid() {
        let adapter = ExotelAdapter::new(settings(), Timeouts::default()).unwrap();
        assert_eq!(adapter.account_base, "https://api.exotel.com/v2/accounts/acme1");
    }

    #[test]
    fn payload_nests_message_under_whatsapp() {
        let adapter = ExotelAdapter::new(settings(), Timeouts::default()).unwrap();
        let payload = adapter
            .build_payload(&SendRequest::text("+91 98765 43210", "Hello"))
            .unwrap();
        assert_eq!(
            payload,
            json!({"whatsapp": {"messages": [{
                "from": "+919000000000",
                "to": "+919876543210",
                "content": {"type": "text", "text": {"preview_url": false, "body": "Hello"}}
            }]}})
        );
    }

    #[test]
    fn missing_sid_is_configuration_error() {
        let mut settings = settings();
        settings.sid = String::new();
        let err = ExotelAdapter::new(settings, Timeouts::default()).err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.code(), "exotel_missing_sid");
    }

    #[test]
    fn error_message_prefers_top_level() {
        let body = json!({
            "message": "Authentication failed",
            "response": {"whatsapp": {"messages": [{"error_data": {"message": "inner"}}]}}
        });
        assert_eq!(error_message(&body).as_deref(), Some("Authentication failed"));
        let nested = json!({
            "response": {"whatsapp": {"messages": [{"error_data": {"message": "inner"}}]}}
        });
        assert_eq!(error_message(&nested).as_deref(), Some("inner"));
    }
}
