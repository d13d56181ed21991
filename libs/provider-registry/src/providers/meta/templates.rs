use serde::Deserialize;
use serde_json::Value;
use wamsg_core::{ProviderKind, Template};

use crate::normalize::{TemplateFields, normalize_entries, provider_id};

/// One page of `GET {business_id}/message_templates`.
#[derive(Debug, Deserialize)]
pub(super) struct TemplatePage {
    pub data: Vec<Value>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

/// Meta field names: `id` → provider id, `language` → language code.
#[derive(Debug, Deserialize)]
struct MetaTemplate {
    name: String,
    #[serde(default)]
    id: Value,
    #[serde(default)]
    status: Option<String>,
    language: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    components: Vec<Value>,
}

pub(super) fn normalize(entries: Vec<Value>) -> Vec<Template> {
    normalize_entries(ProviderKind::Meta, entries, |entry| {
        let raw: MetaTemplate = serde_json::from_value(entry)
            .map_err(|err| format!("malformed Meta template: {err}"))?;
        Ok(TemplateFields {
            name: raw.name,
            id: provider_id(&raw.id),
            status: raw.status,
            language: raw.language,
            category: raw.category,
            components: raw.components,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wamsg_core::{Component, HeaderFormat, TemplateStatus};

    #[test]
    fn normalizes_order_update() {
        let templates = normalize(vec![json!({
            "name": "order_update",
            "id": "1234",
            "status": "APPROVED",
            "language": "en_US",
            "category": "UTILITY",
            "components": [{
                "type": "BODY",
                "text": "Hi {{1}}",
                "example": {"body_text": [["Sam"]]}
            }]
        })]);
        assert_eq!(templates.len(), 1);
        let template = &templates[0];
        assert_eq!(template.name, "order_update");
        assert_eq!(template.provider_template_id, "1234");
        assert_eq!(template.language_code, "en_US");
        assert_eq!(template.category, "UTILITY");
        assert_eq!(template.status, TemplateStatus::Approved);
        assert_eq!(template.components.len(), 1);
        assert_eq!(template.body().unwrap().example_values, vec!["Sam".to_string()]);
    }

    #[test]
    fn identifier_and_status_are_optional() {
        let templates = normalize(vec![json!({
            "name": "order_update",
            "language": "en_US",
            "category": "UTILITY",
            "components": [{"type": "BODY", "text": "Hi {{1}}",
                            "example": {"body_text": [["Sam"]]}}]
        })]);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].provider_template_id, "");
        assert_eq!(templates[0].status, TemplateStatus::Other("UNKNOWN".into()));
        assert_eq!(templates[0].body().unwrap().example_values, vec!["Sam".to_string()]);
    }

    #[test]
    fn odd_optional_fields_keep_the_template() {
        let templates = normalize(vec![
            json!({
                "name": "flat_example",
                "id": "1",
                "language": "en_US",
                "components": [{"type": "BODY", "text": "Hi {{1}}",
                                "example": {"body_text": ["Sam"]}}]
            }),
            json!({
                "name": "numeric_id",
                "id": 42,
                "language": "en_US",
                "components": [{"type": "BODY", "text": "Hello"}]
            }),
        ]);
        let names: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["flat_example", "numeric_id"]);
        assert!(templates[0].body().unwrap().example_values.is_empty());
        assert_eq!(templates[1].provider_template_id, "42");
    }

    #[test]
    fn keeps_every_specified_field() {
        let templates = normalize(vec![json!({
            "name": "shipping",
            "id": "77",
            "status": "PENDING",
            "language": "pt-BR",
            "category": "UTILITY",
            "components": [
                {"type": "HEADER", "format": "TEXT", "text": "Pedido {{1}}",
                 "example": {"header_text": ["#9"]}},
                {"type": "BODY", "text": "Olá {{1}}"},
                {"type": "FOOTER", "text": "Obrigado"},
                {"type": "BUTTONS", "buttons": [{"type": "QUICK_REPLY", "text": "OK"}]}
            ]
        })]);
        let template = &templates[0];
        assert_eq!(template.language_code, "pt_BR");
        let header = template.header().unwrap();
        assert_eq!(header.format, HeaderFormat::Text);
        assert_eq!(header.text.as_deref(), Some("Pedido {{1}}"));
        assert_eq!(header.example_text, vec!["#9".to_string()]);
        assert_eq!(template.footer().unwrap().text, "Obrigado");
        assert_eq!(
            template.buttons().unwrap().items,
            vec![json!({"type": "QUICK_REPLY", "text": "OK"})]
        );
        assert!(matches!(template.components[0], Component::Header(_)));
    }

    #[test]
    fn skips_malformed_entries_only() {
        let templates = normalize(vec![
            json!({"name": "no_language", "id": "1", "components": []}),
            json!({"name": "ok", "id": "2", "language": "en",
                   "components": [{"type": "BODY", "text": "fine"}]}),
        ]);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "ok");
    }
}
