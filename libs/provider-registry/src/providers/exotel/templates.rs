use serde::Deserialize;
use serde_json::Value;
use wamsg_core::{ProviderKind, Template};

use crate::normalize::{TemplateFields, normalize_entries, provider_id};

/// Exotel field names: `template_id` → provider id, `lang` (or `language`) →
/// language code.
#[derive(Debug, Deserialize)]
struct ExotelTemplate {
    name: String,
    #[serde(default)]
    template_id: Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    components: Vec<Value>,
}

pub(super) fn normalize(entries: Vec<Value>) -> Vec<Template> {
    normalize_entries(ProviderKind::Exotel, entries, |entry| {
        let raw: ExotelTemplate = serde_json::from_value(entry)
            .map_err(|err| format!("malformed Exotel template: {err}"))?;
        let id = provider_id(&raw.template_id);
        let language = raw
            .lang
            .or(raw.language)
            .ok_or_else(|| format!("template `{}` without language", raw.name))?;
        Ok(TemplateFields {
            name: raw.name,
            id,
            status: raw.status,
            language,
            category: raw.category,
            components: raw.components,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wamsg_core::TemplateStatus;

    #[test]
    fn maps_template_id_and_lang() {
        let templates = normalize(vec![json!({
            "name": "delivery_notice",
            "template_id": 98765,
            "status": "approved",
            "lang": "en-IN",
            "category": "UTILITY",
            "components": [
                {"type": "body", "text": "Parcel {{1}} is out for delivery",
                 "example": {"body_text": [["AB12"]]}},
                {"type": "footer", "text": "Reply STOP to opt out"}
            ]
        })]);
        assert_eq!(templates.len(), 1);
        let template = &templates[0];
        assert_eq!(template.provider_template_id, "98765");
        assert_eq!(template.language_code, "en_IN");
        assert_eq!(template.status, TemplateStatus::Approved);
        assert_eq!(template.body().unwrap().example_values, vec!["AB12".to_string()]);
        assert_eq!(template.footer().unwrap().text, "Reply STOP to opt out");
    }

    #[test]
    fn accepts_language_field_name() {
        let templates = normalize(vec![json!({
            "name": "hello",
            "template_id": "tpl-1",
            "language": "en",
            "components": [{"type": "BODY", "text": "Hello"}]
        })]);
        assert_eq!(templates[0].language_code, "en");
    }

    #[test]
    fn skips_entries_without_body() {
        let templates = normalize(vec![json!({
            "name": "orphan",
            "template_id": "1",
            "lang": "en",
            "components": [{"type": "FOOTER", "text": "bye"}]
        })]);
        assert!(templates.is_empty());
    }
}
