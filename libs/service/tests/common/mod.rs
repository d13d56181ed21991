#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use wamsg_core::{
    Body, Component, Footer, InMemoryTemplateStore, MediaAsset, ProviderKind, SendRequest,
    SendResult, StoreError, Template, TemplateKey, TemplateRecord, TemplateStatus, TemplateStore,
};
use wamsg_provider_registry::{ErrorKind, ProviderAdapter, ProviderError};

/// Adapter returning canned templates and recording every send.
pub struct FakeAdapter {
    pub templates: Mutex<Vec<Template>>,
    pub fetch_error: Mutex<Option<(ErrorKind, String)>>,
    pub sent: Mutex<Vec<SendRequest>>,
    pub reject_sends: bool,
}

impl FakeAdapter {
    pub fn with_templates(templates: Vec<Template>) -> Self {
        Self {
            templates: Mutex::new(templates),
            fetch_error: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            reject_sends: false,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject_sends: true,
            ..Self::with_templates(Vec::new())
        }
    }

    pub fn set_templates(&self, templates: Vec<Template>) {
        *self.templates.lock().unwrap() = templates;
    }

    pub fn fail_fetch(&self, kind: ErrorKind, message: &str) {
        *self.fetch_error.lock().unwrap() = Some((kind, message.to_string()));
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Meta
    }

    async fn send(&self, request: &SendRequest) -> Result<SendResult, ProviderError> {
        self.sent.lock().unwrap().push(request.clone());
        if self.reject_sends {
            let raw = json!({"error": {"message": "Recipient not on allow list", "code": 131030}});
            return Ok(SendResult::failed("Recipient not on allow list", raw));
        }
        Ok(SendResult::sent("wamid.FAKE", json!({"messages": [{"id": "wamid.FAKE"}]})))
    }

    async fn fetch_templates(&self) -> Result<Vec<Template>, ProviderError> {
        if let Some((kind, message)) = self.fetch_error.lock().unwrap().clone() {
            return Err(ProviderError::new(kind, "fake_fetch", message));
        }
        Ok(self.templates.lock().unwrap().clone())
    }

    async fn get_media_asset(&self, media_id: &str) -> Result<MediaAsset, ProviderError> {
        Ok(MediaAsset::new(media_id.as_bytes().to_vec(), Some("image/png")))
    }
}

/// In-memory store whose commits fail for the listed template names.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryTemplateStore,
    pub failing: Vec<String>,
}

impl TemplateStore for FlakyStore {
    fn read(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError> {
        self.inner.read(key)
    }

    fn commit(&self, record: TemplateRecord) -> Result<(), StoreError> {
        if self.failing.contains(&record.key.name) {
            return Err(StoreError::Backend(format!("write rejected for {}", record.key.name)));
        }
        self.inner.commit(record)
    }

    fn remove(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError> {
        self.inner.remove(key)
    }

    fn list(&self, provider: ProviderKind) -> Result<Vec<TemplateRecord>, StoreError> {
        self.inner.list(provider)
    }
}

pub fn template(name: &str, body: &str, footer: Option<&str>) -> Template {
    let mut template = Template::new(
        name,
        format!("id-{name}"),
        TemplateStatus::Approved,
        "en_US",
        "UTILITY",
    );
    template
        .push_component(Component::Body(Body {
            text: body.to_string(),
            example_values: vec!["Sam".into()],
        }))
        .unwrap();
    if let Some(text) = footer {
        template
            .push_component(Component::Footer(Footer { text: text.to_string() }))
            .unwrap();
    }
    template
}
