//! Provider JSON → canonical template mapping shared by the adapters.
//!
//! Both supported APIs describe components with the Cloud API schema:
//!
//! | source path                        | canonical field                  |
//! |------------------------------------|----------------------------------|
//! | `type`                             | `Component` variant              |
//! | `format`                           | `Header.format`                  |
//! | `text`                             | `Header.text` / `Body.text` / `Footer.text` |
//! | `example.header_text[]`            | `Header.example_text`            |
//! | `example.header_handle[0]`         | `Header.example_media_handle`    |
//! | `example.body_text[0][]`           | `Body.example_values`            |
//! | `buttons[]`                        | `Buttons.items`                  |
//!
//! Only the first inner list of `body_text` is read; upstream nests one sample
//! set inside an extra array. An `example` of any other shape is dropped on its
//! own and the component is kept.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use wamsg_core::{
    Body, Buttons, Component, Footer, Header, HeaderFormat, ProviderKind, Template,
    TemplateStatus,
};

#[derive(Debug, Deserialize)]
struct RawComponent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    example: Value,
    #[serde(default)]
    buttons: Vec<Value>,
}

/// Sample values of one component. Each field is read on its own so a
/// malformed sample never costs the component.
#[derive(Debug, Default)]
struct Example {
    header_text: Vec<String>,
    header_handle: Option<String>,
    body_text: Vec<String>,
}

impl Example {
    fn parse(kind: &str, raw: &Value) -> Self {
        let mut example = Self::default();
        if raw.is_null() {
            return example;
        }
        if !raw.is_object() {
            warn!(component = kind, "dropping malformed template example");
            return example;
        }
        if let Some(values) = raw.get("header_text") {
            match values.as_array() {
                Some(values) => example.header_text = values.iter().map(stringify).collect(),
                None => warn!(component = kind, "dropping malformed header_text example"),
            }
        }
        if let Some(values) = raw.get("header_handle") {
            match values.as_array() {
                Some(values) => example.header_handle = values.first().map(stringify),
                None => warn!(component = kind, "dropping malformed header_handle example"),
            }
        }
        if let Some(values) = raw.get("body_text") {
            match values.get(0).and_then(Value::as_array) {
                Some(first) => example.body_text = first.iter().map(stringify).collect(),
                None if values.as_array().is_some_and(Vec::is_empty) => {}
                None => warn!(component = kind, "dropping malformed body_text example"),
            }
        }
        example
    }
}

/// Provider-neutral view of one upstream template after field renaming.
#[derive(Debug)]
pub(crate) struct TemplateFields {
    pub name: String,
    /// Empty when upstream omitted the identifier.
    pub id: String,
    pub status: Option<String>,
    pub language: String,
    pub category: Option<String>,
    pub components: Vec<Value>,
}

/// Maps a component, returning the reason when it has to be dropped.
pub(crate) fn normalize_component(raw: &Value) -> Result<Component, String> {
    let component: RawComponent = serde_json::from_value(raw.clone())
        .map_err(|err| format!("malformed component: {err}"))?;
    let kind = component.kind.trim().to_ascii_uppercase();
    let example = Example::parse(&kind, &component.example);

    match kind.as_str() {
        "HEADER" => {
            let format = component
                .format
                .map(HeaderFormat::from)
                .ok_or_else(|| "header without format".to_string())?;
            Ok(Component::Header(Header {
                format,
                text: component.text,
                example_text: example.header_text,
                example_media_handle: example.header_handle,
            }))
        }
        "BODY" => {
            let text = component
                .text
                .ok_or_else(|| "body without text".to_string())?;
            Ok(Component::Body(Body {
                text,
                example_values: example.body_text,
            }))
        }
        "FOOTER" => {
            let text = component
                .text
                .ok_or_else(|| "footer without text".to_string())?;
            Ok(Component::Footer(Footer { text }))
        }
        "BUTTONS" => Ok(Component::Buttons(Buttons {
            items: component.buttons,
        })),
        other => Err(format!("unrecognized component type `{other}`")),
    }
}

/// Builds a canonical template, dropping unusable components. Returns the
/// reason when the whole template has to be skipped.
pub(crate) fn assemble_template(
    provider: ProviderKind,
    fields: TemplateFields,
) -> Result<Template, String> {
    if fields.name.trim().is_empty() {
        return Err("template without name".into());
    }

    let status = fields
        .status
        .as_deref()
        .map(TemplateStatus::from)
        .unwrap_or_else(|| TemplateStatus::Other("UNKNOWN".into()));
    let mut template = Template::new(
        fields.name,
        fields.id,
        status,
        &fields.language,
        fields.category.unwrap_or_default(),
    );

    for raw in &fields.components {
        let component = match normalize_component(raw) {
            Ok(component) => component,
            Err(reason) => {
                warn!(
                    provider = %provider,
                    template = %template.name,
                    reason = %reason,
                    "dropping template component"
                );
                continue;
            }
        };
        if let Err(err) = template.push_component(component) {
            warn!(
                provider = %provider,
                template = %template.name,
                reason = %err,
                "dropping duplicate template component"
            );
        }
    }

    if template.body().is_none() {
        return Err(format!("template `{}` has no body", template.name));
    }
    Ok(template)
}

/// Normalizes a `data[]` array, skipping entries that cannot be mapped.
pub(crate) fn normalize_entries<F>(
    provider: ProviderKind,
    entries: Vec<Value>,
    map: F,
) -> Vec<Template>
where
    F: Fn(Value) -> Result<TemplateFields, String>,
{
    let mut templates = Vec::with_capacity(entries.len());
    for entry in entries {
        match map(entry).and_then(|fields| assemble_template(provider, fields)) {
            Ok(template) => templates.push(template),
            Err(reason) => {
                warn!(provider = %provider, reason = %reason, "skipping upstream template");
            }
        }
    }
    templates
}

pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Upstream template id as text; ids arrive as strings or numbers.
pub(crate) fn provider_id(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => stringify(other),
    }
}
