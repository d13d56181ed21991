use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use wamsg_core::{ProviderConfig, ProviderKind};

use crate::errors::ProviderError;
use crate::traits::ProviderAdapter;

/// Builds an adapter from the resolved configuration.
pub type AdapterFactory =
    Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError> + Send + Sync>;

/// Registry of adapter factories keyed by provider.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<ProviderKind, AdapterFactory>,
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("provider `{0}` already registered")]
    AlreadyRegistered(ProviderKind),
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every adapter compiled into this build.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        crate::providers::register_all(&mut registry)?;
        Ok(registry)
    }

    pub fn register<F>(&mut self, kind: ProviderKind, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        if self.factories.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.factories.insert(kind, Arc::new(factory));
        Ok(())
    }

    /// Resolves a provider by name. Unknown names and providers without a
    /// registered factory are configuration errors; no network call is made.
    pub fn get(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let kind: ProviderKind = name.parse()?;
        let factory = self.factories.get(&kind).ok_or_else(|| {
            ProviderError::configuration(
                "provider_not_registered",
                format!("WhatsApp provider {kind} is not enabled in this build"),
            )
        })?;
        let adapter = factory(config)?;
        debug!(provider = %kind, "resolved provider adapter");
        Ok(adapter)
    }

    /// Resolves the provider named by `config.provider`.
    pub fn resolve(
        &self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.get(&config.provider, config)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.factories.keys().copied()
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.factories.contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use async_trait::async_trait;
    use wamsg_core::{MediaAsset, SendRequest, SendResult, Template};

    struct Stub;

    #[async_trait]
    impl ProviderAdapter for Stub {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Meta
        }

        async fn send(&self, _request: &SendRequest) -> Result<SendResult, ProviderError> {
            Ok(SendResult::sent("stub", serde_json::Value::Null))
        }

        async fn fetch_templates(&self) -> Result<Vec<Template>, ProviderError> {
            Ok(Vec::new())
        }

        async fn get_media_asset(&self, _media_id: &str) -> Result<MediaAsset, ProviderError> {
            Err(ProviderError::unsupported("stub", "no media"))
        }
    }

    fn stub_factory(_: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        Ok(Arc::new(Stub))
    }

    fn config(provider: &str) -> ProviderConfig {
        ProviderConfig {
            provider: provider.into(),
            meta: None,
            exotel: None,
            timeouts: Default::default(),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register(ProviderKind::Meta, stub_factory).unwrap();
        let err = registry.register(ProviderKind::Meta, stub_factory).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(ProviderKind::Meta)));
    }

    #[test]
    fn names_resolve_case_insensitively() {
        let mut registry = ProviderRegistry::new();
        registry.register(ProviderKind::Meta, stub_factory).unwrap();
        let adapter = registry.get("meta", &config("meta")).unwrap();
        assert_eq!(adapter.kind(), ProviderKind::Meta);
    }

    #[test]
    fn unknown_provider_is_configuration_error() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve(&config("Acme")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.message(), "Unknown WhatsApp provider: Acme");
    }

    #[test]
    fn unregistered_provider_is_configuration_error() {
        let registry = ProviderRegistry::new();
        let err = registry.get("Exotel", &config("Exotel")).err().unwrap();
        assert_eq!(err.code(), "provider_not_registered");
        assert!(err.is_fatal());
    }

    #[test]
    fn defaults_register_every_enabled_provider() {
        let registry = ProviderRegistry::with_defaults().unwrap();
        assert_eq!(registry.contains(ProviderKind::Meta), cfg!(feature = "meta"));
        assert_eq!(registry.contains(ProviderKind::Exotel), cfg!(feature = "exotel"));
    }
}
