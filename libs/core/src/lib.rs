//! Canonical WhatsApp value types shared by every provider adapter.
//!
//! Templates, components, send requests/results and media assets live here in a
//! provider-independent shape, together with the contracts of the external
//! template store and audit log the runtime writes to.
pub mod audit;
pub mod config;
pub mod media;
pub mod store;
pub mod types;

pub use audit::{AuditEntry, AuditLog, InMemoryAuditLog, TracingAuditLog};
pub use config::{ConfigError, ExotelSettings, MetaSettings, ProviderConfig, Secret, Timeouts};
pub use media::{MediaAsset, extension_for_mime};
pub use store::{InMemoryTemplateStore, StoreError, TemplateKey, TemplateRecord, TemplateStore};
pub use types::*;
