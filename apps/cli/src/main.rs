mod file_store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{Instrument, field, info_span};
use wamsg_core::{
    Component, MediaAsset, ProviderConfig, SendResult, Template, TemplateRecord, TracingAuditLog,
};
use wamsg_provider_registry::ProviderRegistry;
use wamsg_service::{HeaderParameter, TemplateParameters, WhatsAppService};

use crate::file_store::JsonFileStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "WhatsApp template sync and messaging CLI")]
struct Cli {
    /// Emit JSON output
    #[arg(long, global = true)]
    json: bool,
    /// Provider configuration file; the WHATSAPP_* / EXOTEL_* environment is used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Local template store
    #[arg(long, global = true, default_value = "wamsg-templates.json")]
    store: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pull templates from the provider into the local store
    Sync,
    /// List templates in the local store
    Templates,
    /// Send a stored template
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        template: String,
        /// Body placeholder values, in order
        #[arg(long = "param")]
        params: Vec<String>,
        #[arg(long, conflicts_with = "header_link")]
        header_text: Option<String>,
        /// Link for an image, video or document header
        #[arg(long)]
        header_link: Option<String>,
    },
    /// Send a free-form text message
    Text {
        #[arg(long)]
        to: String,
        #[arg(long)]
        body: String,
    },
    /// Download an inbound media asset
    Media {
        #[arg()]
        media_id: String,
        /// Output file; defaults to `<media_id>.<extension>`
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Submit a template described by a JSON file
    Create {
        #[arg()]
        file: PathBuf,
        /// Image or document uploaded as the media header example
        #[arg(long)]
        header_sample: Option<PathBuf>,
    },
    /// Replace the components of a stored template from a JSON file
    Update {
        #[arg()]
        file: PathBuf,
    },
    /// Delete a template upstream and locally
    Delete {
        #[arg()]
        name: String,
    },
}

#[derive(Serialize)]
struct MediaSaved {
    media_id: String,
    path: PathBuf,
    mime_type: String,
    size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    wamsg_telemetry::install("wamsg")?;
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let store = Arc::new(
        JsonFileStore::open(&cli.store)
            .with_context(|| format!("opening template store {}", cli.store.display()))?,
    );
    let registry = ProviderRegistry::with_defaults()?;
    let service = WhatsAppService::new(&registry, &config, store, Arc::new(TracingAuditLog))?;
    let provider = service.provider().as_str();

    match cli.command {
        Commands::Sync => {
            let span = info_span!(
                "sync",
                provider = field::Empty,
                template = field::Empty,
                message_id = field::Empty
            );
            wamsg_telemetry::with_common_fields(&span, provider, None, None);
            let report = service.sync_templates().instrument(span).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
            }
        }
        Commands::Templates => {
            let records = service.templates()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No {provider} templates stored in {}", cli.store.display());
            } else {
                print_table(&records);
            }
        }
        Commands::Send {
            to,
            template,
            params,
            header_text,
            header_link,
        } => {
            let mut parameters = TemplateParameters::from(params);
            if let Some(text) = header_text {
                parameters = parameters.with_header(HeaderParameter::Text { text });
            } else if let Some(link) = header_link {
                parameters = parameters.with_header(HeaderParameter::Media { link });
            }
            let span = info_span!(
                "send",
                provider = field::Empty,
                template = field::Empty,
                message_id = field::Empty
            );
            wamsg_telemetry::with_common_fields(&span, provider, Some(&template), None);
            let result = service
                .send_message(&to, &template, parameters)
                .instrument(span.clone())
                .await?;
            wamsg_telemetry::with_common_fields(
                &span,
                provider,
                Some(&template),
                result.message_id(),
            );
            report_send(&result, cli.json)?;
        }
        Commands::Text { to, body } => {
            let result = service.send_text(&to, &body).await?;
            report_send(&result, cli.json)?;
        }
        Commands::Media { media_id, out } => {
            let asset = service.fetch_media(&media_id).await?;
            let path = out
                .unwrap_or_else(|| PathBuf::from(format!("{media_id}.{}", asset.file_extension)));
            std::fs::write(&path, &asset.bytes)
                .with_context(|| format!("writing media to {}", path.display()))?;
            let saved = MediaSaved {
                media_id,
                path,
                mime_type: asset.mime_type.clone(),
                size: asset.len(),
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&saved)?);
            } else {
                println!(
                    "Saved {} ({}, {} bytes) to {}",
                    saved.media_id,
                    saved.mime_type,
                    saved.size,
                    saved.path.display()
                );
            }
        }
        Commands::Create {
            file,
            header_sample,
        } => {
            let mut template = read_template(&file)?;
            if let Some(sample) = header_sample {
                let handle = upload_sample(&service, &sample).await?;
                attach_header_handle(&mut template, handle)?;
            }
            let submission = service.create_template(&template).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&submission)?);
            } else {
                println!(
                    "Submitted {} as {} ({})",
                    template.name,
                    submission.provider_template_id,
                    submission.status.as_str()
                );
            }
        }
        Commands::Update { file } => {
            let template = read_template(&file)?;
            service.update_template(&template).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&template)?);
            } else {
                println!("Updated {}", template.name);
            }
        }
        Commands::Delete { name } => {
            let outcome = service.delete_template(&name).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Deleted {name} ({outcome:?})");
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<ProviderConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(ProviderConfig::from_json(&content)?)
        }
        None => Ok(ProviderConfig::from_env()?),
    }
}

fn read_template(file: &std::path::Path) -> Result<Template> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading template {}", file.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing template {}", file.display()))
}

async fn upload_sample(service: &WhatsAppService, path: &std::path::Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading header sample {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let sample = MediaAsset::new(bytes, Some(mime.essence_str()));
    let handle = service.upload_header_sample(&sample).await?;
    tracing::info!(
        sample = %path.display(),
        mime_type = %sample.mime_type,
        "header sample uploaded"
    );
    Ok(handle)
}

fn attach_header_handle(template: &mut Template, handle: String) -> Result<()> {
    let header = template.components.iter_mut().find_map(|component| match component {
        Component::Header(header) => Some(header),
        _ => None,
    });
    let Some(header) = header else {
        bail!("template {} has no header to attach the sample to", template.name);
    };
    if !header.format.is_media() {
        bail!(
            "template {} has a {} header; samples are only uploaded for media headers",
            template.name,
            header.format.as_str()
        );
    }
    header.example_text.clear();
    header.example_media_handle = Some(handle);
    Ok(())
}

fn report_send(result: &SendResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    }
    match result.message_id() {
        Some(id) if result.is_sent() => {
            if !json {
                println!("Sent message {id}");
            }
            Ok(())
        }
        _ => {
            let message = result.error_message().unwrap_or("unknown error");
            match result.error_title() {
                Some(title) => bail!("{title}: {message}"),
                None => bail!("{message}"),
            }
        }
    }
}

fn print_table(records: &[TemplateRecord]) {
    println!(
        "{:<32} {:<10} {:<8} {:<12} {:<}",
        "NAME", "STATUS", "LANG", "CATEGORY", "ID"
    );
    for record in records {
        println!(
            "{:<32} {:<10} {:<8} {:<12} {}",
            record.key.name,
            record.status.as_deref().unwrap_or("-"),
            record.language_code.as_deref().unwrap_or("-"),
            record.category.as_deref().unwrap_or("-"),
            record.provider_template_id.as_deref().unwrap_or("-"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wamsg_core::{Body, Header, HeaderFormat, TemplateStatus};

    fn template_with_header(format: HeaderFormat) -> Template {
        let mut template = Template::new("invoice", "", TemplateStatus::Pending, "en", "UTILITY");
        template
            .push_component(Component::Header(Header {
                format,
                text: None,
                example_text: vec!["stale".into()],
                example_media_handle: None,
            }))
            .unwrap();
        template
            .push_component(Component::Body(Body {
                text: "Your invoice".into(),
                example_values: vec![],
            }))
            .unwrap();
        template
    }

    #[test]
    fn handle_replaces_header_examples() {
        let mut template = template_with_header(HeaderFormat::Document);
        attach_header_handle(&mut template, "4::ZG9j".into()).unwrap();
        let header = template.header().unwrap();
        assert_eq!(header.example_media_handle.as_deref(), Some("4::ZG9j"));
        assert!(header.example_text.is_empty());
    }

    #[test]
    fn text_headers_take_no_sample() {
        let mut template = template_with_header(HeaderFormat::Text);
        assert!(attach_header_handle(&mut template, "4::ZG9j".into()).is_err());
    }
}
