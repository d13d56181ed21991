use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\d+)\s*\}\}").expect("placeholder pattern is valid"));

/// Upstream WhatsApp providers known to the runtime.
///
/// ```
/// use wamsg_core::ProviderKind;
///
/// let kind: ProviderKind = "exotel".parse().unwrap();
/// assert_eq!(kind, ProviderKind::Exotel);
/// assert_eq!(kind.as_str(), "Exotel");
/// assert!("Acme".parse::<ProviderKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    Meta,
    Exotel,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Meta, ProviderKind::Exotel];

    /// Returns the configuration name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Meta => "Meta",
            ProviderKind::Exotel => "Exotel",
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown WhatsApp provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownProvider(trimmed.to_string()))
    }
}

/// Review status reported by the provider for a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TemplateStatus {
    Pending,
    Approved,
    Rejected,
    /// Any other upstream status, kept verbatim.
    Other(String),
}

impl TemplateStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TemplateStatus::Pending => "PENDING",
            TemplateStatus::Approved => "APPROVED",
            TemplateStatus::Rejected => "REJECTED",
            TemplateStatus::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for TemplateStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => TemplateStatus::Pending,
            "APPROVED" => TemplateStatus::Approved,
            "REJECTED" => TemplateStatus::Rejected,
            _ => TemplateStatus::Other(value.to_string()),
        }
    }
}

impl From<String> for TemplateStatus {
    fn from(value: String) -> Self {
        TemplateStatus::from(value.as_str())
    }
}

impl From<TemplateStatus> for String {
    fn from(value: TemplateStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Media or text format of a template header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HeaderFormat {
    Text,
    Image,
    Video,
    Document,
    Other(String),
}

impl HeaderFormat {
    pub fn as_str(&self) -> &str {
        match self {
            HeaderFormat::Text => "TEXT",
            HeaderFormat::Image => "IMAGE",
            HeaderFormat::Video => "VIDEO",
            HeaderFormat::Document => "DOCUMENT",
            HeaderFormat::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(
            self,
            HeaderFormat::Image | HeaderFormat::Video | HeaderFormat::Document
        )
    }
}

impl From<&str> for HeaderFormat {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "TEXT" => HeaderFormat::Text,
            "IMAGE" => HeaderFormat::Image,
            "VIDEO" => HeaderFormat::Video,
            "DOCUMENT" => HeaderFormat::Document,
            _ => HeaderFormat::Other(value.to_string()),
        }
    }
}

impl From<String> for HeaderFormat {
    fn from(value: String) -> Self {
        HeaderFormat::from(value.as_str())
    }
}

impl From<HeaderFormat> for String {
    fn from(value: HeaderFormat) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub format: HeaderFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub example_text: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_media_handle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub text: String,
    /// `example_values[i]` is the sample for placeholder `{{i+1}}`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub example_values: Vec<String>,
}

impl Body {
    /// Highest positional placeholder referenced by the body text.
    pub fn placeholder_count(&self) -> usize {
        placeholder_count(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footer {
    pub text: String,
}

/// Provider button descriptors, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buttons {
    pub items: Vec<Value>,
}

/// One part of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Header(Header),
    Body(Body),
    Footer(Footer),
    Buttons(Buttons),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Header(_) => "HEADER",
            Component::Body(_) => "BODY",
            Component::Footer(_) => "FOOTER",
            Component::Buttons(_) => "BUTTONS",
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("template already has a {0} component")]
pub struct DuplicateComponent(pub &'static str);

/// Provider-independent message template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub provider_template_id: String,
    pub status: TemplateStatus,
    pub language_code: String,
    pub category: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        provider_template_id: impl Into<String>,
        status: TemplateStatus,
        language_code: &str,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider_template_id: provider_template_id.into(),
            status,
            language_code: normalize_language_code(language_code),
            category: category.into(),
            components: Vec::new(),
        }
    }

    /// Appends a component, refusing a second header, body or footer.
    pub fn push_component(&mut self, component: Component) -> Result<(), DuplicateComponent> {
        let kind = component.kind();
        if self.components.iter().any(|existing| existing.kind() == kind) {
            return Err(DuplicateComponent(kind));
        }
        self.components.push(component);
        Ok(())
    }

    pub fn header(&self) -> Option<&Header> {
        self.components.iter().find_map(|c| match c {
            Component::Header(header) => Some(header),
            _ => None,
        })
    }

    pub fn body(&self) -> Option<&Body> {
        self.components.iter().find_map(|c| match c {
            Component::Body(body) => Some(body),
            _ => None,
        })
    }

    pub fn footer(&self) -> Option<&Footer> {
        self.components.iter().find_map(|c| match c {
            Component::Footer(footer) => Some(footer),
            _ => None,
        })
    }

    pub fn buttons(&self) -> Option<&Buttons> {
        self.components.iter().find_map(|c| match c {
            Component::Buttons(buttons) => Some(buttons),
            _ => None,
        })
    }
}

/// Converts `en-US` style tags into the underscore form providers expect.
pub fn normalize_language_code(code: &str) -> String {
    code.trim().replace('-', "_")
}

/// Lowercases a display name and replaces spaces, matching upstream naming rules.
pub fn normalize_template_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Highest `{{n}}` index found in `text`, zero when there are none.
pub fn placeholder_count(text: &str) -> usize {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
        .max()
        .unwrap_or(0)
}

/// Header value supplied when sending a template message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeaderValue {
    Text { text: String },
    Media { format: HeaderFormat, link: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMessage {
    pub name: String,
    pub language_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderValue>,
    #[serde(default)]
    pub body_parameters: Vec<String>,
}

/// Message payload independent of the provider wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { body: String, preview_url: bool },
    Template(TemplateMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub to: String,
    #[serde(default)]
    pub template_name: Option<String>,
    pub content: MessageContent,
}

impl SendRequest {
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            template_name: None,
            content: MessageContent::Text {
                body: body.into(),
                preview_url: false,
            },
        }
    }

    pub fn template(to: impl Into<String>, message: TemplateMessage) -> Self {
        Self {
            to: to.into(),
            template_name: Some(message.name.clone()),
            content: MessageContent::Template(message),
        }
    }

    /// Name recorded in audit entries for this request.
    pub fn audit_label(&self) -> &str {
        self.template_name.as_deref().unwrap_or("Text Message")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendStatus {
    Sent,
    Failed,
}

/// Outcome of a send. A `Sent` result always carries a message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SendResultFields")]
pub struct SendResult {
    message_id: Option<String>,
    status: SendStatus,
    raw_response: Value,
    error_message: Option<String>,
    error_title: Option<String>,
}

impl SendResult {
    pub fn sent(message_id: impl Into<String>, raw_response: Value) -> Self {
        Self {
            message_id: Some(message_id.into()),
            status: SendStatus::Sent,
            raw_response,
            error_message: None,
            error_title: None,
        }
    }

    pub fn failed(error_message: impl Into<String>, raw_response: Value) -> Self {
        Self {
            message_id: None,
            status: SendStatus::Failed,
            raw_response,
            error_message: Some(error_message.into()),
            error_title: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.error_title = title;
        self
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn status(&self) -> SendStatus {
        self.status
    }

    pub fn is_sent(&self) -> bool {
        self.status == SendStatus::Sent
    }

    pub fn raw_response(&self) -> &Value {
        &self.raw_response
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_title(&self) -> Option<&str> {
        self.error_title.as_deref()
    }
}

#[derive(Deserialize)]
struct SendResultFields {
    #[serde(default)]
    message_id: Option<String>,
    status: SendStatus,
    #[serde(default)]
    raw_response: Value,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_title: Option<String>,
}

impl TryFrom<SendResultFields> for SendResult {
    type Error = String;

    fn try_from(fields: SendResultFields) -> Result<Self, Self::Error> {
        let has_id = fields
            .message_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        match (fields.status, has_id) {
            (SendStatus::Sent, false) => Err("sent result without a message id".into()),
            (SendStatus::Failed, true) => Err("failed result with a message id".into()),
            _ => Ok(Self {
                message_id: fields.message_id,
                status: fields.status,
                raw_response: fields.raw_response,
                error_message: fields.error_message,
                error_title: fields.error_title,
            }),
        }
    }
}

/// Upstream acknowledgement of a submitted template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSubmission {
    pub provider_template_id: String,
    pub status: TemplateStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateDeletion {
    Deleted,
    /// The provider no longer knew the template; only the local copy remains.
    NotFoundUpstream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_names_are_case_insensitive() {
        assert_eq!(" META ".parse::<ProviderKind>(), Ok(ProviderKind::Meta));
        assert_eq!(
            "Acme".parse::<ProviderKind>(),
            Err(UnknownProvider("Acme".into()))
        );
    }

    #[test]
    fn status_passes_unknown_values_through() {
        assert_eq!(TemplateStatus::from("approved"), TemplateStatus::Approved);
        let paused = TemplateStatus::from("PAUSED");
        assert_eq!(paused, TemplateStatus::Other("PAUSED".into()));
        assert_eq!(paused.as_str(), "PAUSED");
        assert_eq!(serde_json::to_value(&paused).unwrap(), json!("PAUSED"));
    }

    #[test]
    fn decoded_send_results_are_validated() {
        let sent = SendResult::sent("wamid.1", json!({"messages": [{"id": "wamid.1"}]}));
        let decoded: SendResult =
            serde_json::from_value(serde_json::to_value(&sent).unwrap()).unwrap();
        assert_eq!(decoded, sent);

        let sent_without_id = json!({"status": "Sent", "raw_response": {}});
        assert!(serde_json::from_value::<SendResult>(sent_without_id).is_err());
        let failed_with_id = json!({"status": "Failed", "message_id": "wamid.2"});
        assert!(serde_json::from_value::<SendResult>(failed_with_id).is_err());
    }

    #[test]
    fn language_codes_use_underscores() {
        let template = Template::new("t", "1", TemplateStatus::Pending, "en-US", "UTILITY");
        assert_eq!(template.language_code, "en_US");
        assert_eq!(normalize_language_code("pt_BR"), "pt_BR");
    }

    #[test]
    fn template_names_are_snake_cased() {
        assert_eq!(normalize_template_name(" Order Update "), "order_update");
    }

    #[test]
    fn counts_highest_placeholder() {
        assert_eq!(placeholder_count("Hi {{1}}, order {{2}} ships {{ 2 }}"), 2);
        assert_eq!(placeholder_count("no variables"), 0);
        assert_eq!(placeholder_count("{{3}} only"), 3);
    }

    #[test]
    fn rejects_second_body() {
        let mut template = Template::new("t", "1", TemplateStatus::Approved, "en", "MARKETING");
        template
            .push_component(Component::Body(Body {
                text: "one".into(),
                example_values: vec![],
            }))
            .unwrap();
        let err = template
            .push_component(Component::Body(Body {
                text: "two".into(),
                example_values: vec![],
            }))
            .unwrap_err();
        assert_eq!(err, DuplicateComponent("BODY"));
        assert_eq!(template.body().map(|b| b.text.as_str()), Some("one"));
    }

    #[test]
    fn failed_results_have_no_message_id() {
        let failed = SendResult::failed("boom", json!({}));
        assert!(!failed.is_sent());
        assert_eq!(failed.message_id(), None);
        let sent = SendResult::sent("wamid.1", json!({}));
        assert_eq!(sent.status(), SendStatus::Sent);
        assert_eq!(sent.message_id(), Some("wamid.1"));
    }

    #[test]
    fn text_requests_audit_as_text_message() {
        assert_eq!(SendRequest::text("1555", "hi").audit_label(), "Text Message");
    }
}
