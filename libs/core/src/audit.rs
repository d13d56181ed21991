use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::store::StoreError;
use crate::types::ProviderKind;

/// Diagnostic record written for every failed send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub provider: ProviderKind,
    /// Template name, or `Text Message` for free-form sends.
    pub template: String,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Full provider error payload.
    pub meta_data: Value,
    pub recorded_at: String,
}

impl AuditEntry {
    pub fn new(
        provider: ProviderKind,
        template: impl Into<String>,
        error_message: Option<String>,
        meta_data: Value,
    ) -> Self {
        let recorded_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            provider,
            template: template.into(),
            error_message,
            meta_data,
            recorded_at,
        }
    }
}

pub trait AuditLog: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), StoreError>;
}

/// Keeps entries in memory; handy for tests.
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("audit log lock poisoned".into()))?
            .push(entry);
        Ok(())
    }
}

/// Emits each entry as a structured `warn!` event.
#[derive(Default, Clone, Copy)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), StoreError> {
        warn!(
            provider = %entry.provider,
            template = %entry.template,
            error = entry.error_message.as_deref().unwrap_or_default(),
            meta_data = %entry.meta_data,
            "whatsapp send failed"
        );
        Ok(())
    }
}
