use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wamsg_core::{
    AuditEntry, AuditLog, HeaderFormat, HeaderValue, ProviderKind, SendRequest, SendResult,
    TemplateKey, TemplateMessage, TemplateRecord, TemplateStore, placeholder_count,
};
use wamsg_provider_registry::{ProviderAdapter, ProviderError};

/// Language used when the stored record has none.
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

/// Caller-supplied header value for a template send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeaderParameter {
    Text { text: String },
    /// Link to the image, video or document shown in a media header.
    Media { link: String },
}

/// Placeholder values for one template send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParameters {
    #[serde(default)]
    pub body: Vec<String>,
    #[serde(default)]
    pub header: Option<HeaderParameter>,
}

impl TemplateParameters {
    pub fn body<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            body: values.into_iter().map(Into::into).collect(),
            header: None,
        }
    }

    pub fn with_header(mut self, header: HeaderParameter) -> Self {
        self.header = Some(header);
        self
    }
}

impl From<Vec<String>> for TemplateParameters {
    fn from(body: Vec<String>) -> Self {
        Self { body, header: None }
    }
}

/// Builds send requests from stored template records and audits every failure.
pub struct MessageDispatcher {
    adapter: Arc<dyn ProviderAdapter>,
    store: Arc<dyn TemplateStore>,
    audit: Arc<dyn AuditLog>,
}

impl MessageDispatcher {
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        store: Arc<dyn TemplateStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            adapter,
            store,
            audit,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.adapter.kind()
    }

    /// Sends a stored template. A rejected send comes back as a failed
    /// [`SendResult`]; `Err` is reserved for requests that cannot be built.
    pub async fn send_template_message(
        &self,
        to: &str,
        template_name: &str,
        parameters: impl Into<TemplateParameters>,
    ) -> Result<SendResult, ProviderError> {
        let key = TemplateKey::new(self.provider(), template_name);
        let record = self.store.read(&key)?.ok_or_else(|| {
            ProviderError::invalid_request(
                "template_not_found",
                format!(
                    "WhatsApp template {template_name} has not been synced for {}",
                    key.provider
                ),
            )
        })?;
        let message = build_template_message(&record, parameters.into())?;
        self.dispatch(SendRequest::template(to, message)).await
    }

    pub async fn send_text_message(
        &self,
        to: &str,
        body: &str,
    ) -> Result<SendResult, ProviderError> {
        self.dispatch(SendRequest::text(to, body)).await
    }

    async fn dispatch(&self, request: SendRequest) -> Result<SendResult, ProviderError> {
        let provider = self.provider();
        let result = self.adapter.send(&request).await?;

        let status = if result.is_sent() { "sent" } else { "failed" };
        counter!(
            "wamsg_send_total",
            "provider" => provider.as_str(),
            "status" => status
        )
        .increment(1);

        if result.is_sent() {
            info!(
                provider = %provider,
                template = request.audit_label(),
                message_id = result.message_id().unwrap_or_default(),
                "whatsapp message sent"
            );
        } else {
            let entry = AuditEntry::new(
                provider,
                request.audit_label(),
                result.error_message().map(str::to_string),
                result.raw_response().clone(),
            );
            if let Err(err) = self.audit.record(entry) {
                warn!(provider = %provider, error = %err, "failed to write send audit entry");
            }
        }
        Ok(result)
    }
}

fn build_template_message(
    record: &TemplateRecord,
    parameters: TemplateParameters,
) -> Result<TemplateMessage, ProviderError> {
    let name = &record.key.name;
    let expected = record.body_text.as_deref().map(placeholder_count).unwrap_or(0);
    if parameters.body.len() != expected {
        return Err(ProviderError::invalid_request(
            "template_parameter_mismatch",
            format!(
                "template {name} expects {expected} body parameters, got {}",
                parameters.body.len()
            ),
        ));
    }

    let header = header_value(record, parameters.header)?;
    let language_code = record
        .language_code
        .clone()
        .filter(|code| !code.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE_CODE.to_string());

    Ok(TemplateMessage {
        name: name.clone(),
        language_code,
        header,
        body_parameters: parameters.body,
    })
}

fn header_value(
    record: &TemplateRecord,
    parameter: Option<HeaderParameter>,
) -> Result<Option<HeaderValue>, ProviderError> {
    let name = &record.key.name;
    let format = record.header_type.as_deref().map(HeaderFormat::from);
    let mismatch = |detail: String| {
        ProviderError::invalid_request(
            "template_header_mismatch",
            format!("template {name}: {detail}"),
        )
    };

    match (format, parameter) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(mismatch("has no header".into())),
        (Some(format), Some(HeaderParameter::Media { link })) if format.is_media() => {
            Ok(Some(HeaderValue::Media { format, link }))
        }
        (Some(format), None) if format.is_media() => {
            Err(mismatch(format!("{} header requires a media link", format.as_str())))
        }
        (Some(format), Some(HeaderParameter::Text { .. })) if format.is_media() => {
            Err(mismatch(format!("{} header requires a media link", format.as_str())))
        }
        (Some(_), Some(HeaderParameter::Text { text })) => Ok(Some(HeaderValue::Text { text })),
        (Some(_), Some(HeaderParameter::Media { .. })) => {
            Err(mismatch("text header cannot take a media link".into()))
        }
        (Some(_), None) => {
            let placeholders = record.header_text.as_deref().map(placeholder_count).unwrap_or(0);
            if placeholders > 0 {
                Err(mismatch("header text parameter missing".into()))
            } else {
                Ok(None)
            }
        }
    }
}
