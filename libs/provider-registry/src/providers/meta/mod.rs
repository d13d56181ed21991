//! Meta WhatsApp Cloud API adapter.

mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use wamsg_core::{
    MediaAsset, MetaSettings, ProviderConfig, ProviderKind, SendRequest, SendResult, Template,
    TemplateDeletion, TemplateStatus, TemplateSubmission, Timeouts, normalize_language_code,
    normalize_template_name,
};

use crate::errors::ProviderError;
use crate::http::{self, Reply, generic_failure, string_at, transport_payload};
use crate::registry::{ProviderRegistry, RegistryError};
use crate::traits::ProviderAdapter;
use crate::wire;

const USER_AGENT: &str = "wamsg-meta-provider/0.1";
const MAX_TEMPLATE_PAGES: usize = 50;
const TEMPLATE_NOT_FOUND_TITLE: &str = "Message Template Not Found";

pub fn register(registry: &mut ProviderRegistry) -> Result<(), RegistryError> {
    registry.register(ProviderKind::Meta, |config: &ProviderConfig| {
        MetaAdapter::from_config(config)
            .map(|adapter| Arc::new(adapter) as Arc<dyn ProviderAdapter>)
    })
}

pub struct MetaAdapter {
    client: reqwest::Client,
    settings: MetaSettings,
    timeouts: Timeouts,
    api_base: String,
}

impl MetaAdapter {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let settings = config.meta.clone().ok_or_else(|| {
            ProviderError::configuration(
                "meta_missing_settings",
                "Meta settings are not configured",
            )
        })?;
        Self::new(settings, config.timeouts)
    }

    pub fn new(settings: MetaSettings, timeouts: Timeouts) -> Result<Self, ProviderError> {
        if settings.token.is_blank() {
            return Err(ProviderError::configuration(
                "meta_missing_token",
                "WhatsApp access token is not configured",
            ));
        }
        if settings.phone_id.trim().is_empty() {
            return Err(ProviderError::configuration(
                "meta_missing_phone_id",
                "WhatsApp phone number id is not configured",
            ));
        }
        url::Url::parse(&settings.url).map_err(|err| {
            ProviderError::configuration("meta_invalid_url", format!("invalid Meta API url: {err}"))
                .with_source(err)
        })?;

        let api_base = format!(
            "{}/{}",
            settings.url.trim_end_matches('/'),
            settings.version.trim_matches('/')
        );
        Ok(Self {
            client: http::build_client(ProviderKind::Meta, USER_AGENT)?,
            settings,
            timeouts,
            api_base,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn token(&self) -> &str {
        self.settings.token.expose()
    }

    fn business_id(&self) -> Result<&str, ProviderError> {
        self.settings
            .business_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::configuration(
                    "meta_missing_business_id",
                    "Meta Business ID is not set in WhatsApp Settings. Cannot manage templates.",
                )
            })
    }

    fn app_id(&self) -> Result<&str, ProviderError> {
        self.settings
            .app_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::configuration(
                    "meta_missing_app_id",
                    "Meta App ID is not set in WhatsApp Settings. Cannot upload header samples.",
                )
            })
    }

    fn build_payload(&self, request: &SendRequest) -> Result<Value, ProviderError> {
        let to = wire::recipient(request, "meta")?;
        let (kind, content) = wire::content(request, "meta")?;
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": kind,
        });
        payload[kind] = content;
        Ok(payload)
    }

    async fn get(&self, endpoint: &'static str, url: &str) -> Result<Reply, ProviderError> {
        let request = self.client.get(url).bearer_auth(self.token());
        http::execute(ProviderKind::Meta, endpoint, request, self.timeouts.api()).await
    }
}

/// Message and title from a Graph API `error` envelope.
///
/// Sends prefer the technical `message`; template management prefers the
/// user-facing `error_user_msg`.
fn error_envelope(body: &Value, prefer_user_msg: bool) -> (Option<String>, Option<String>) {
    let message = string_at(body, "/error/message");
    let user_message = string_at(body, "/error/error_user_msg");
    let chosen = if prefer_user_msg {
        user_message.or(message)
    } else {
        message.or(user_message)
    };
    (chosen, string_at(body, "/error/error_user_title"))
}

fn rejection(code: &str, reply: Reply) -> ProviderError {
    let (message, title) = error_envelope(&reply.body, true);
    let message = message.unwrap_or_else(|| generic_failure(ProviderKind::Meta, reply.status));
    ProviderError::upstream(code, message, reply.status.as_u16(), reply.body).with_title(title)
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

#[async_trait]
impl ProviderAdapter for MetaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Meta
    }

    async fn send(&self, request: &SendRequest) -> Result<SendResult, ProviderError> {
        let payload = self.build_payload(request)?;
        let url = self.endpoint(&format!("{}/messages", self.settings.phone_id.trim()));
        let call = self.client.post(url).bearer_auth(self.token()).json(&payload);

        let sent = http::execute(ProviderKind::Meta, "messages", call, self.timeouts.api()).await;
        let reply = match sent {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    provider = "Meta",
                    code = err.code(),
                    error = %err,
                    "send transport failure"
                );
                return Ok(SendResult::failed(err.message(), transport_payload(&err)));
            }
        };

        if !reply.status.is_success() {
            let (message, title) = error_envelope(&reply.body, false);
            let message =
                message.unwrap_or_else(|| generic_failure(ProviderKind::Meta, reply.status));
            warn!(
                provider = "Meta",
                status = reply.status.as_u16(),
                error = %message,
                "send rejected"
            );
            return Ok(SendResult::failed(message, reply.body).with_title(title));
        }

        match string_at(&reply.body, "/messages/0/id") {
            Some(message_id) => Ok(SendResult::sent(message_id, reply.body)),
            None => Ok(SendResult::failed(
                "WhatsApp response did not include a message id",
                reply.body,
            )),
        }
    }

    async fn fetch_templates(&self) -> Result<Vec<Template>, ProviderError> {
        let business_id = self.business_id()?;
        let mut next = Some(self.endpoint(&format!("{}/message_templates", business_id.trim())));
        let mut fetched = Vec::new();
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            if pages == MAX_TEMPLATE_PAGES {
                warn!(provider = "Meta", pages, "template paging limit reached");
                break;
            }
            pages += 1;

            let reply = self.get("message_templates", &url).await?;
            if !reply.status.is_success() {
                return Err(rejection("meta_templates_failed", reply));
            }
            let page: templates::TemplatePage =
                serde_json::from_value(reply.body).map_err(|err| {
                    ProviderError::normalization(
                        "meta_templates_missing_data",
                        "No templates data received from the provider.",
                    )
                    .with_source(err)
                })?;
            fetched.extend(templates::normalize(page.data));
            next = page
                .paging
                .and_then(|paging| paging.next)
                .filter(|link| !link.trim().is_empty());
        }

        info!(provider = "Meta", count = fetched.len(), pages, "fetched templates");
        Ok(fetched)
    }

    async fn get_media_asset(&self, media_id: &str) -> Result<MediaAsset, ProviderError> {
        let media_id = media_id.trim();
        if media_id.is_empty() {
            return Err(ProviderError::invalid_request(
                "meta_missing_media_id",
                "media id required",
            ));
        }
        let failure = |detail: String| {
            ProviderError::media_fetch(
                "meta_media_fetch",
                format!("Error fetching media {media_id}: {detail}"),
            )
        };

        let metadata_reply = self
            .get("media.metadata", &self.endpoint(&format!("{media_id}/")))
            .await
            .map_err(|err| failure(err.message().to_string()).with_source(err))?;
        if !metadata_reply.status.is_success() {
            let status = metadata_reply.status.as_u16();
            return Err(failure(format!("metadata lookup returned status {status}"))
                .with_status(status)
                .with_raw(metadata_reply.body));
        }
        let metadata: MediaMetadata = serde_json::from_value(metadata_reply.body.clone())
            .map_err(|err| {
                failure("metadata response is not an object".into()).with_source(err)
            })?;
        let Some(download_url) = metadata.url.filter(|url| !url.trim().is_empty()) else {
            return Err(failure("metadata response has no download url".into())
                .with_raw(metadata_reply.body));
        };

        let request = self.client.get(&download_url).bearer_auth(self.token());
        let (status, bytes) = http::download(
            ProviderKind::Meta,
            "media.download",
            request,
            self.timeouts.download(),
        )
        .await
        .map_err(|err| failure(err.message().to_string()).with_source(err))?;
        if !status.is_success() {
            return Err(failure(format!("download returned status {}", status.as_u16()))
                .with_status(status.as_u16()));
        }

        let asset = MediaAsset::new(bytes, metadata.mime_type.as_deref());
        info!(
            provider = "Meta",
            media_id,
            mime_type = %asset.mime_type,
            size = asset.len(),
            "downloaded media"
        );
        Ok(asset)
    }

    async fn create_template(
        &self,
        template: &Template,
    ) -> Result<TemplateSubmission, ProviderError> {
        let business_id = self.business_id()?;
        if template.body().is_none() {
            return Err(ProviderError::invalid_request(
                "meta_template_missing_body",
                "template body is required",
            ));
        }
        let payload = json!({
            "name": normalize_template_name(&template.name),
            "language": normalize_language_code(&template.language_code),
            "category": template.category,
            "components": wire::template_components(template),
        });
        let url = self.endpoint(&format!("{}/message_templates", business_id.trim()));
        let call = self.client.post(url).bearer_auth(self.token()).json(&payload);
        let reply = http::execute(
            ProviderKind::Meta,
            "message_templates.create",
            call,
            self.timeouts.api(),
        )
        .await?;
        if !reply.status.is_success() {
            return Err(rejection("meta_template_create_failed", reply));
        }

        let provider_template_id = string_at(&reply.body, "/id").ok_or_else(|| {
            ProviderError::normalization("meta_template_missing_id", "template response has no id")
                .with_raw(reply.body.clone())
        })?;
        let status = string_at(&reply.body, "/status")
            .map(TemplateStatus::from)
            .unwrap_or(TemplateStatus::Pending);
        info!(
            provider = "Meta",
            template = %template.name,
            id = %provider_template_id,
            "template submitted"
        );
        Ok(TemplateSubmission {
            provider_template_id,
            status,
        })
    }

    async fn delete_template(&self, name: &str) -> Result<TemplateDeletion, ProviderError> {
        let business_id = self.business_id()?;
        let url = self.endpoint(&format!("{}/message_templates", business_id.trim()));
        let call = self
            .client
            .delete(url)
            .query(&[("name", name)])
            .bearer_auth(self.token());
        let reply = http::execute(
            ProviderKind::Meta,
            "message_templates.delete",
            call,
            self.timeouts.api(),
        )
        .await?;
        if reply.status.is_success() {
            return Ok(TemplateDeletion::Deleted);
        }
        let title = string_at(&reply.body, "/error/error_user_title");
        if title.as_deref() == Some(TEMPLATE_NOT_FOUND_TITLE) {
            info!(provider = "Meta", template = name, "template already absent upstream");
            return Ok(TemplateDeletion::NotFoundUpstream);
        }
        Err(rejection("meta_template_delete_failed", reply))
    }

    async fn update_template(&self, template: &Template) -> Result<(), ProviderError> {
        let template_id = template.provider_template_id.trim();
        if template_id.is_empty() {
            return Err(ProviderError::invalid_request(
                "meta_template_missing_id",
                "template id is required to update a template",
            ));
        }
        if template.body().is_none() {
            return Err(ProviderError::invalid_request(
                "meta_template_missing_body",
                "template body is required",
            ));
        }
        let payload = json!({ "components": wire::template_components(template) });
        let call = self
            .client
            .post(self.endpoint(template_id))
            .bearer_auth(self.token())
            .json(&payload);
        let reply = http::execute(
            ProviderKind::Meta,
            "message_templates.update",
            call,
            self.timeouts.api(),
        )
        .await?;
        if !reply.status.is_success() {
            return Err(rejection("meta_template_update_failed", reply));
        }
        info!(provider = "Meta", template = %template.name, id = template_id, "template updated");
        Ok(())
    }

    /// Resumable upload: open a session on the app, then post the bytes to it.
    async fn upload_header_sample(&self, sample: &MediaAsset) -> Result<String, ProviderError> {
        let app_id = self.app_id()?;
        if sample.is_empty() {
            return Err(ProviderError::invalid_request(
                "meta_empty_header_sample",
                "header sample is empty",
            ));
        }

        let session = self
            .client
            .post(self.endpoint(&format!("{}/uploads", app_id.trim())))
            .bearer_auth(self.token())
            .query(&[
                ("file_length", sample.len().to_string()),
                ("file_type", sample.mime_type.clone()),
                ("messaging_product", "whatsapp".to_string()),
            ]);
        let reply =
            http::execute(ProviderKind::Meta, "uploads.session", session, self.timeouts.api())
                .await?;
        if !reply.status.is_success() {
            return Err(rejection("meta_upload_session_failed", reply));
        }
        let session_id = string_at(&reply.body, "/id").ok_or_else(|| {
            ProviderError::normalization("meta_upload_missing_session", "upload session has no id")
                .with_raw(reply.body.clone())
        })?;

        let transfer = self
            .client
            .post(self.endpoint(&session_id))
            .header(reqwest::header::AUTHORIZATION, format!("OAuth {}", self.token()))
            .header("file_offset", "0")
            .body(sample.bytes.clone());
        let reply = http::execute(
            ProviderKind::Meta,
            "uploads.transfer",
            transfer,
            self.timeouts.download(),
        )
        .await?;
        if !reply.status.is_success() {
            return Err(rejection("meta_upload_failed", reply));
        }
        let handle = string_at(&reply.body, "/h").ok_or_else(|| {
            ProviderError::normalization("meta_upload_missing_handle", "upload reply has no handle")
                .with_raw(reply.body.clone())
        })?;
        info!(
            provider = "Meta",
            mime_type = %sample.mime_type,
            size = sample.len(),
            "header sample uploaded"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wamsg_core::{Secret, TemplateMessage};

    fn adapter() -> MetaAdapter {
        MetaAdapter::new(
            MetaSettings {
                token: Secret::new("token-123"),
                url: "https://graph.facebook.com/".into(),
                version: "v19.0".into(),
                phone_id: "phone-1".into(),
                business_id: None,
                app_id: None,
            },
            Timeouts::default(),
        )
        .unwrap()
    }

    #[test]
    fn endpoints_join_url_and_version() {
        assert_eq!(
            adapter().endpoint("phone-1/messages"),
            "https://graph.facebook.com/v19.0/phone-1/messages"
        );
    }

    #[test]
    fn builds_template_payload() {
        let request = SendRequest::template(
            "+1 555 0100",
            TemplateMessage {
                name: "order_update".into(),
                language_code: "en_US".into(),
                header: None,
                body_parameters: vec!["Sam".into()],
            },
        );
        let payload = adapter().build_payload(&request).unwrap();
        assert_eq!(payload["to"], "+15550100");
        assert_eq!(payload["type"], "template");
        assert_eq!(payload["messaging_product"], "whatsapp");
        assert_eq!(payload["template"]["language"]["code"], "en_US");
        assert_eq!(
            payload["template"]["components"][0]["parameters"][0]["text"],
            "Sam"
        );
    }

    #[test]
    fn builds_text_payload() {
        let payload = adapter()
            .build_payload(&SendRequest::text("15550001111", "Hello"))
            .unwrap();
        assert_eq!(payload["type"], "text");
        assert_eq!(payload["text"], json!({"preview_url": false, "body": "Hello"}));
    }

    #[test]
    fn missing_business_id_is_configuration_error() {
        let err = adapter().business_id().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code(), "meta_missing_business_id");
    }

    #[test]
    fn rejects_missing_token() {
        let err = MetaAdapter::new(
            MetaSettings {
                token: Secret::new(" "),
                url: "https://graph.facebook.com".into(),
                version: "v19.0".into(),
                phone_id: "phone-1".into(),
                business_id: None,
                app_id: None,
            },
            Timeouts::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), "meta_missing_token");
    }

    #[test]
    fn error_envelope_prefers_message_for_sends() {
        let body = json!({"error": {
            "message": "Unsupported post request.",
            "error_user_msg": "Try again",
            "error_user_title": "Error"
        }});
        assert_eq!(
            error_envelope(&body, false),
            (Some("Unsupported post request.".into()), Some("Error".into()))
        );
        assert_eq!(error_envelope(&body, true).0.as_deref(), Some("Try again"));
    }
}
