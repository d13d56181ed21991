use std::sync::Arc;

use tracing::{debug, warn};
use wamsg_core::MediaAsset;
use wamsg_provider_registry::{ProviderAdapter, ProviderError};

/// Downloads inbound media through whichever adapter is configured.
pub struct MediaRetriever {
    adapter: Arc<dyn ProviderAdapter>,
}

impl MediaRetriever {
    pub fn new(adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self { adapter }
    }

    pub async fn fetch(&self, media_id: &str) -> Result<MediaAsset, ProviderError> {
        let provider = self.adapter.kind();
        match self.adapter.get_media_asset(media_id).await {
            Ok(asset) => {
                debug!(
                    provider = %provider,
                    media_id,
                    extension = %asset.file_extension,
                    "media retrieved"
                );
                Ok(asset)
            }
            Err(err) => {
                warn!(
                    provider = %provider,
                    media_id,
                    code = err.code(),
                    error = %err,
                    "media retrieval failed"
                );
                Err(err)
            }
        }
    }
}
