use async_trait::async_trait;
use wamsg_core::{
    MediaAsset, ProviderKind, SendRequest, SendResult, Template, TemplateDeletion,
    TemplateSubmission,
};

use crate::errors::ProviderError;

/// Uniform surface over one upstream WhatsApp API.
///
/// Adapters hold only immutable configuration and a shared HTTP client, so one
/// instance may serve concurrent callers. Dropping a returned future abandons the
/// outbound call.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Sends a message. Upstream rejections and transport failures come back as
    /// `Ok` with a failed [`SendResult`]; `Err` means the request could not be built.
    async fn send(&self, request: &SendRequest) -> Result<SendResult, ProviderError>;

    /// Fetches and normalizes every template the provider exposes. Malformed
    /// entries are skipped with a warning.
    async fn fetch_templates(&self) -> Result<Vec<Template>, ProviderError>;

    async fn get_media_asset(&self, media_id: &str) -> Result<MediaAsset, ProviderError>;

    async fn create_template(
        &self,
        _template: &Template,
    ) -> Result<TemplateSubmission, ProviderError> {
        Err(ProviderError::unsupported(
            "template_create_unsupported",
            format!("{} does not support creating templates", self.kind()),
        ))
    }

    /// Replaces the components of an existing template, addressed by its
    /// provider id.
    async fn update_template(&self, _template: &Template) -> Result<(), ProviderError> {
        Err(ProviderError::unsupported(
            "template_update_unsupported",
            format!("{} does not support updating templates", self.kind()),
        ))
    }

    /// Uploads a media header sample and returns the handle that goes into
    /// `example.header_handle`.
    async fn upload_header_sample(&self, _sample: &MediaAsset) -> Result<String, ProviderError> {
        Err(ProviderError::unsupported(
            "header_sample_upload_unsupported",
            format!("{} does not support header sample uploads", self.kind()),
        ))
    }

    async fn delete_template(&self, _name: &str) -> Result<TemplateDeletion, ProviderError> {
        Err(ProviderError::unsupported(
            "template_delete_unsupported",
            format!("{} does not support deleting templates", self.kind()),
        ))
    }
}
