use std::fmt::{self, Display, Formatter};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Component, ProviderKind, Template};

/// Key of a persisted template: provider plus template name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateKey {
    pub provider: ProviderKind,
    pub name: String,
}

impl TemplateKey {
    pub fn new(provider: ProviderKind, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
        }
    }
}

impl Display for TemplateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.name)
    }
}

/// Flat template record as the external store keeps it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub key: TemplateKey,
    #[serde(default)]
    pub provider_template_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub header_type: Option<String>,
    #[serde(default)]
    pub header_text: Option<String>,
    /// Header example: text samples joined with `", "`, or the media handle.
    #[serde(default)]
    pub header_sample: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    /// Body examples, one per placeholder.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub buttons: Option<Value>,
}

impl TemplateRecord {
    pub fn new(key: TemplateKey) -> Self {
        Self {
            key,
            provider_template_id: None,
            status: None,
            language_code: None,
            category: None,
            header_type: None,
            header_text: None,
            header_sample: None,
            body_text: None,
            sample_values: Vec::new(),
            footer: None,
            buttons: None,
        }
    }

    /// Clears every field derived from template components.
    pub fn reset_components(&mut self) {
        self.header_type = None;
        self.header_text = None;
        self.header_sample = None;
        self.body_text = None;
        self.sample_values.clear();
        self.footer = None;
        self.buttons = None;
    }

    /// Copies the canonical template onto the record. Component fields that the
    /// template does not carry are left as they are; call `reset_components` first
    /// to drop stale values.
    pub fn apply_template(&mut self, template: &Template) {
        self.provider_template_id = Some(template.provider_template_id.clone());
        self.status = Some(template.status.as_str().to_string());
        self.language_code = Some(template.language_code.clone());
        self.category = Some(template.category.clone());

        for component in &template.components {
            match component {
                Component::Header(header) => {
                    self.header_type = Some(header.format.as_str().to_string());
                    self.header_text = header.text.clone();
                    self.header_sample = if !header.example_text.is_empty() {
                        Some(header.example_text.join(", "))
                    } else {
                        header.example_media_handle.clone()
                    };
                }
                Component::Body(body) => {
                    self.body_text = Some(body.text.clone());
                    self.sample_values = body.example_values.clone();
                }
                Component::Footer(footer) => {
                    self.footer = Some(footer.text.clone());
                }
                Component::Buttons(buttons) => {
                    self.buttons = Some(Value::Array(buttons.items.clone()));
                }
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("template store backend failed: {0}")]
    Backend(String),
    #[error("template store i/o error")]
    Io(#[from] std::io::Error),
    #[error("template store encoding error")]
    Encoding(#[from] serde_json::Error),
}

/// Upsert-by-key persistence for template records.
pub trait TemplateStore: Send + Sync {
    fn read(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError>;

    /// Persists one record, replacing any record with the same key.
    fn commit(&self, record: TemplateRecord) -> Result<(), StoreError>;

    fn remove(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError>;

    fn list(&self, provider: ProviderKind) -> Result<Vec<TemplateRecord>, StoreError>;

    /// Existing record for `key`, or a fresh one ready to be filled in.
    fn upsert(&self, key: &TemplateKey) -> Result<TemplateRecord, StoreError> {
        Ok(self
            .read(key)?
            .unwrap_or_else(|| TemplateRecord::new(key.clone())))
    }
}

/// In-memory store suitable for tests and embedding.
#[derive(Default)]
pub struct InMemoryTemplateStore {
    inner: DashMap<TemplateKey, TemplateRecord>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn read(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError> {
        Ok(self.inner.get(key).map(|entry| entry.clone()))
    }

    fn commit(&self, record: TemplateRecord) -> Result<(), StoreError> {
        self.inner.insert(record.key.clone(), record);
        Ok(())
    }

    fn remove(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError> {
        Ok(self.inner.remove(key).map(|(_, record)| record))
    }

    fn list(&self, provider: ProviderKind) -> Result<Vec<TemplateRecord>, StoreError> {
        let mut records: Vec<TemplateRecord> = self
            .inner
            .iter()
            .filter(|entry| entry.key().provider == provider)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Body, Footer, Header, HeaderFormat, TemplateStatus};

    fn template_with_footer(footer: Option<&str>) -> Template {
        let mut template = Template::new(
            "order_update",
            "42",
            TemplateStatus::Approved,
            "en_US",
            "UTILITY",
        );
        template
            .push_component(Component::Header(Header {
                format: HeaderFormat::Text,
                text: Some("Order {{1}}".into()),
                example_text: vec!["#100".into()],
                example_media_handle: None,
            }))
            .unwrap();
        template
            .push_component(Component::Body(Body {
                text: "Hi {{1}}".into(),
                example_values: vec!["Sam".into()],
            }))
            .unwrap();
        if let Some(text) = footer {
            template
                .push_component(Component::Footer(Footer { text: text.into() }))
                .unwrap();
        }
        template
    }

    #[test]
    fn apply_populates_fields() {
        let mut record = TemplateRecord::new(TemplateKey::new(ProviderKind::Meta, "order_update"));
        record.apply_template(&template_with_footer(Some("Thanks")));
        assert_eq!(record.provider_template_id.as_deref(), Some("42"));
        assert_eq!(record.status.as_deref(), Some("APPROVED"));
        assert_eq!(record.header_type.as_deref(), Some("TEXT"));
        assert_eq!(record.header_sample.as_deref(), Some("#100"));
        assert_eq!(record.body_text.as_deref(), Some("Hi {{1}}"));
        assert_eq!(record.sample_values, vec!["Sam".to_string()]);
        assert_eq!(record.footer.as_deref(), Some("Thanks"));
    }

    #[test]
    fn reset_then_apply_clears_removed_footer() {
        let mut record = TemplateRecord::new(TemplateKey::new(ProviderKind::Meta, "order_update"));
        record.apply_template(&template_with_footer(Some("Thanks")));
        record.reset_components();
        record.apply_template(&template_with_footer(None));
        assert_eq!(record.footer, None);
        assert_eq!(record.body_text.as_deref(), Some("Hi {{1}}"));
    }

    #[test]
    fn sample_values_keep_embedded_commas() {
        let mut template = Template::new("invoice", "7", TemplateStatus::Approved, "en", "UTILITY");
        template
            .push_component(Component::Body(Body {
                text: "You owe {{1}} by {{2}}".into(),
                example_values: vec!["1,000".into(), "Friday".into()],
            }))
            .unwrap();
        let mut record = TemplateRecord::new(TemplateKey::new(ProviderKind::Meta, "invoice"));
        record.apply_template(&template);

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: TemplateRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.sample_values, vec!["1,000".to_string(), "Friday".to_string()]);
    }

    #[test]
    fn upsert_returns_fresh_record_for_unknown_key() {
        let store = InMemoryTemplateStore::new();
        let key = TemplateKey::new(ProviderKind::Exotel, "welcome");
        let record = store.upsert(&key).unwrap();
        assert_eq!(record, TemplateRecord::new(key.clone()));
        assert!(store.is_empty());

        store.commit(record).unwrap();
        assert_eq!(store.list(ProviderKind::Exotel).unwrap().len(), 1);
        assert!(store.list(ProviderKind::Meta).unwrap().is_empty());
        assert!(store.remove(&key).unwrap().is_some());
        assert!(store.is_empty());
    }
}
