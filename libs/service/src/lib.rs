//! Template sync, message dispatch and media retrieval wired to the provider
//! named in [`ProviderConfig`].

pub mod dispatcher;
pub mod media;
pub mod sync;

use std::sync::Arc;

use tracing::info;
use wamsg_core::{
    AuditLog, MediaAsset, ProviderConfig, ProviderKind, SendResult, Template, TemplateDeletion,
    TemplateKey, TemplateRecord, TemplateStatus, TemplateStore, TemplateSubmission,
    normalize_template_name,
};
use wamsg_provider_registry::{ProviderAdapter, ProviderError, ProviderRegistry};

pub use dispatcher::{HeaderParameter, MessageDispatcher, TemplateParameters};
pub use media::MediaRetriever;
pub use sync::{SyncReport, TemplateSyncEngine};

/// Entry point used by the CLI and embedders.
pub struct WhatsAppService {
    adapter: Arc<dyn ProviderAdapter>,
    store: Arc<dyn TemplateStore>,
    sync: TemplateSyncEngine,
    dispatcher: MessageDispatcher,
    media: MediaRetriever,
}

impl WhatsAppService {
    /// Resolves the configured provider. Fails before any network call when the
    /// provider is unknown or its settings are missing.
    pub fn new(
        registry: &ProviderRegistry,
        config: &ProviderConfig,
        store: Arc<dyn TemplateStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self, ProviderError> {
        let adapter = registry.resolve(config)?;
        Ok(Self::from_adapter(adapter, store, audit))
    }

    pub fn from_adapter(
        adapter: Arc<dyn ProviderAdapter>,
        store: Arc<dyn TemplateStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            sync: TemplateSyncEngine::new(adapter.clone(), store.clone()),
            dispatcher: MessageDispatcher::new(adapter.clone(), store.clone(), audit),
            media: MediaRetriever::new(adapter.clone()),
            adapter,
            store,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.adapter.kind()
    }

    pub async fn sync_templates(&self) -> Result<SyncReport, ProviderError> {
        self.sync.sync().await
    }

    pub async fn send_message(
        &self,
        to: &str,
        template_name: &str,
        parameters: impl Into<TemplateParameters>,
    ) -> Result<SendResult, ProviderError> {
        self.dispatcher
            .send_template_message(to, template_name, parameters)
            .await
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<SendResult, ProviderError> {
        self.dispatcher.send_text_message(to, body).await
    }

    pub async fn fetch_media(&self, media_id: &str) -> Result<MediaAsset, ProviderError> {
        self.media.fetch(media_id).await
    }

    /// Submits a template upstream and stores the returned id and status.
    pub async fn create_template(
        &self,
        template: &Template,
    ) -> Result<TemplateSubmission, ProviderError> {
        let submission = self.adapter.create_template(template).await?;

        let mut stored = template.clone();
        stored.name = normalize_template_name(&template.name);
        stored.provider_template_id = submission.provider_template_id.clone();
        stored.status = submission.status.clone();

        let key = TemplateKey::new(self.provider(), stored.name.clone());
        let mut record = self.store.upsert(&key)?;
        record.reset_components();
        record.apply_template(&stored);
        self.store.commit(record)?;
        info!(template = %key, id = %submission.provider_template_id, "template created");
        Ok(submission)
    }

    /// Pushes new components for a stored template, then mirrors them locally.
    /// Language, category and status stay as last reported by the provider.
    pub async fn update_template(&self, template: &Template) -> Result<(), ProviderError> {
        let key = TemplateKey::new(self.provider(), normalize_template_name(&template.name));
        let mut record = self.store.read(&key)?.ok_or_else(|| {
            ProviderError::invalid_request(
                "template_not_found",
                format!(
                    "WhatsApp template {} has not been synced for {}",
                    key.name, key.provider
                ),
            )
        })?;

        let mut updated = template.clone();
        updated.name = key.name.clone();
        if updated.provider_template_id.trim().is_empty() {
            updated.provider_template_id = record.provider_template_id.clone().unwrap_or_default();
        }
        self.adapter.update_template(&updated).await?;

        if let Some(status) = record.status.as_deref() {
            updated.status = TemplateStatus::from(status);
        }
        if let Some(language) = record.language_code.clone() {
            updated.language_code = language;
        }
        if let Some(category) = record.category.clone() {
            updated.category = category;
        }
        record.reset_components();
        record.apply_template(&updated);
        self.store.commit(record)?;
        info!(template = %key, id = %updated.provider_template_id, "template updated");
        Ok(())
    }

    /// Uploads a media header sample; the handle goes into the header's
    /// `example_media_handle` before the template is created.
    pub async fn upload_header_sample(&self, sample: &MediaAsset) -> Result<String, ProviderError> {
        self.adapter.upload_header_sample(sample).await
    }

    /// Deletes a template upstream, then locally. A template the provider no
    /// longer knows is still removed from the store.
    ///
    /// `name` is normalized the same way `create_template` does, so the
    /// display name used at creation also works here.
    pub async fn delete_template(&self, name: &str) -> Result<TemplateDeletion, ProviderError> {
        let name = normalize_template_name(name);
        let outcome = self.adapter.delete_template(&name).await?;
        let key = TemplateKey::new(self.provider(), name);
        self.store.remove(&key)?;
        info!(template = %key, outcome = ?outcome, "template deleted");
        Ok(outcome)
    }

    pub fn templates(&self) -> Result<Vec<TemplateRecord>, ProviderError> {
        Ok(self.store.list(self.provider())?)
    }
}
