//! Canonical → provider payload fragments shared by the adapters.

use serde_json::{Map, Value, json};
use wamsg_core::{Component, HeaderValue, MessageContent, SendRequest, Template, TemplateMessage};

use crate::errors::ProviderError;

/// Validated recipient number.
pub(crate) fn recipient(request: &SendRequest, code_prefix: &str) -> Result<String, ProviderError> {
    let to: String = request.to.chars().filter(|c| !c.is_whitespace()).collect();
    if to.is_empty() {
        return Err(ProviderError::invalid_request(
            format!("{code_prefix}_missing_to"),
            "recipient phone number required",
        ));
    }
    Ok(to)
}

/// `type` + typed object pair used by both providers for message content.
pub(crate) fn content(
    request: &SendRequest,
    code_prefix: &str,
) -> Result<(&'static str, Value), ProviderError> {
    match &request.content {
        MessageContent::Text { body, preview_url } => {
            if body.trim().is_empty() {
                return Err(ProviderError::invalid_request(
                    format!("{code_prefix}_missing_text"),
                    "message text cannot be empty",
                ));
            }
            Ok(("text", json!({ "preview_url": preview_url, "body": body })))
        }
        MessageContent::Template(message) => {
            if message.name.trim().is_empty() {
                return Err(ProviderError::invalid_request(
                    format!("{code_prefix}_missing_template"),
                    "template name cannot be empty",
                ));
            }
            Ok(("template", template_object(message)))
        }
    }
}

/// The `template` object of a send payload.
pub(crate) fn template_object(message: &TemplateMessage) -> Value {
    let mut components = Vec::new();
    if let Some(header) = &message.header {
        components.push(json!({
            "type": "header",
            "parameters": [header_parameter(header)],
        }));
    }
    if !message.body_parameters.is_empty() {
        let parameters: Vec<Value> = message
            .body_parameters
            .iter()
            .map(|text| json!({ "type": "text", "text": text }))
            .collect();
        components.push(json!({ "type": "body", "parameters": parameters }));
    }

    let mut template = Map::new();
    template.insert("name".into(), json!(message.name));
    template.insert("language".into(), json!({ "code": message.language_code }));
    if !components.is_empty() {
        template.insert("components".into(), Value::Array(components));
    }
    Value::Object(template)
}

fn header_parameter(header: &HeaderValue) -> Value {
    match header {
        HeaderValue::Text { text } => json!({ "type": "text", "text": text }),
        HeaderValue::Media { format, link } => {
            let kind = format.as_str().to_ascii_lowercase();
            let mut parameter = Map::new();
            parameter.insert("type".into(), json!(kind));
            parameter.insert(kind, json!({ "link": link }));
            Value::Object(parameter)
        }
    }
}

/// Re-serializes template components in their canonical order.
pub(crate) fn template_components(template: &Template) -> Vec<Value> {
    template
        .components
        .iter()
        .map(|component| match component {
            Component::Header(header) => {
                let mut value = Map::new();
                value.insert("type".into(), json!("HEADER"));
                value.insert("format".into(), json!(header.format.as_str()));
                if let Some(text) = &header.text {
                    value.insert("text".into(), json!(text));
                }
                if !header.example_text.is_empty() {
                    value.insert(
                        "example".into(),
                        json!({ "header_text": header.example_text }),
                    );
                } else if let Some(handle) = &header.example_media_handle {
                    value.insert("example".into(), json!({ "header_handle": [handle] }));
                }
                Value::Object(value)
            }
            Component::Body(body) => {
                let mut value = json!({ "type": "BODY", "text": body.text });
                if !body.example_values.is_empty() {
                    value["example"] = json!({ "body_text": [body.example_values] });
                }
                value
            }
            Component::Footer(footer) => json!({ "type": "FOOTER", "text": footer.text }),
            Component::Buttons(buttons) => json!({ "type": "BUTTONS", "buttons": buttons.items }),
        })
        .collect()
}
