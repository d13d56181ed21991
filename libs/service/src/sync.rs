use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};
use wamsg_core::{ProviderKind, Template, TemplateKey, TemplateStore};
use wamsg_provider_registry::{ProviderAdapter, ProviderError};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub provider: ProviderKind,
    /// Templates returned by the provider after normalization.
    pub fetched: usize,
    pub upserted: usize,
    /// Templates whose local commit failed.
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl SyncReport {
    fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            fetched: 0,
            upserted: 0,
            skipped: 0,
            warnings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Synced {} of {} templates from the {} WhatsApp provider",
            self.upserted, self.fetched, self.provider
        );
        if self.skipped > 0 {
            summary.push_str(&format!(" ({} skipped)", self.skipped));
        }
        for warning in &self.warnings {
            summary.push_str("\nwarning: ");
            summary.push_str(warning);
        }
        summary
    }
}

/// Upserts upstream templates into the local store, one commit per template.
pub struct TemplateSyncEngine {
    adapter: Arc<dyn ProviderAdapter>,
    store: Arc<dyn TemplateStore>,
}

impl TemplateSyncEngine {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, store: Arc<dyn TemplateStore>) -> Self {
        Self { adapter, store }
    }

    /// Runs one pass. Fetch failures end the pass with an empty report and a
    /// warning; only configuration errors are returned as `Err`.
    pub async fn sync(&self) -> Result<SyncReport, ProviderError> {
        let provider = self.adapter.kind();
        let mut report = SyncReport::new(provider);

        let templates = match self.adapter.fetch_templates().await {
            Ok(templates) => templates,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(
                    provider = %provider,
                    code = err.code(),
                    error = %err,
                    "template fetch failed"
                );
                report
                    .warnings
                    .push(format!("Could not fetch templates: {}", err.message()));
                return Ok(report);
            }
        };

        let templates = last_per_name(templates, &mut report);
        report.fetched = templates.len();

        for template in &templates {
            let key = TemplateKey::new(provider, template.name.clone());
            match self.upsert(&key, template) {
                Ok(()) => report.upserted += 1,
                Err(err) => {
                    warn!(template = %key, error = %err, "template commit failed");
                    report.skipped += 1;
                    report
                        .warnings
                        .push(format!("Could not save template {}: {err}", key.name));
                }
            }
        }

        counter!("wamsg_templates_synced_total", "provider" => provider.as_str())
            .increment(report.upserted as u64);
        info!(
            provider = %provider,
            fetched = report.fetched,
            upserted = report.upserted,
            skipped = report.skipped,
            "template sync finished"
        );
        Ok(report)
    }

    fn upsert(&self, key: &TemplateKey, template: &Template) -> Result<(), wamsg_core::StoreError> {
        let mut record = self.store.upsert(key)?;
        record.reset_components();
        record.apply_template(template);
        self.store.commit(record)
    }
}

/// Keeps the last occurrence of each template name, in upstream order.
fn last_per_name(templates: Vec<Template>, report: &mut SyncReport) -> Vec<Template> {
    let mut last: HashMap<String, usize> = HashMap::new();
    for (index, template) in templates.iter().enumerate() {
        if last.insert(template.name.clone(), index).is_some() {
            report.warnings.push(format!(
                "Duplicate upstream template {}; keeping the last one",
                template.name
            ));
        }
    }
    templates
        .into_iter()
        .enumerate()
        .filter(|(index, template)| last.get(&template.name) == Some(index))
        .map(|(_, template)| template)
        .collect()
}
