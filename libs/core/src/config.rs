use std::fmt;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_PROVIDER: &str = "Meta";
pub const DEFAULT_META_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_META_VERSION: &str = "v19.0";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Credential value that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MetaSettings {
    pub token: Secret,
    #[serde(default = "default_meta_url")]
    pub url: String,
    #[serde(default = "default_meta_version")]
    pub version: String,
    pub phone_id: String,
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ExotelSettings {
    pub api_key: String,
    pub api_token: Secret,
    /// API host such as `api.exotel.com`.
    pub subdomain: String,
    pub sid: String,
    /// Sender WhatsApp number.
    pub from: String,
    #[serde(default)]
    pub waba_id: Option<String>,
    /// Replaces `https://{subdomain}` when set.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ExotelSettings {
    pub fn api_base(&self) -> String {
        match self.base_url.as_deref() {
            Some(base) if !base.trim().is_empty() => base.trim_end_matches('/').to_string(),
            _ => format!("https://{}", self.subdomain.trim_end_matches('/')),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_api_timeout")]
    pub api_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_secs: u64,
}

impl Timeouts {
    /// Timeout for JSON API calls and media metadata lookups.
    pub fn api(&self) -> Duration {
        Duration::from_secs(self.api_secs)
    }

    /// Timeout for binary media downloads.
    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            api_secs: DEFAULT_API_TIMEOUT_SECS,
            download_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

/// Resolved provider configuration handed to adapters at construction.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub meta: Option<MetaSettings>,
    #[serde(default)]
    pub exotel: Option<ExotelSettings>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ProviderConfig {
    pub fn meta(settings: MetaSettings) -> Self {
        Self {
            provider: "Meta".into(),
            meta: Some(settings),
            exotel: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn exotel(settings: ExotelSettings) -> Self {
        Self {
            provider: "Exotel".into(),
            meta: None,
            exotel: Some(settings),
            timeouts: Timeouts::default(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: ProviderConfig = serde_json::from_str(content)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Reads the `WHATSAPP_*` and `EXOTEL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let meta = match (get("WHATSAPP_TOKEN"), get("WHATSAPP_PHONE_ID")) {
            (Some(token), Some(phone_id)) => Some(MetaSettings {
                token: Secret::new(token),
                url: get("WHATSAPP_URL").unwrap_or_else(default_meta_url),
                version: get("WHATSAPP_VERSION").unwrap_or_else(default_meta_version),
                phone_id,
                business_id: get("WHATSAPP_BUSINESS_ID"),
                app_id: get("WHATSAPP_APP_ID"),
            }),
            _ => None,
        };

        let exotel = match (
            get("EXOTEL_API_KEY"),
            get("EXOTEL_API_TOKEN"),
            get("EXOTEL_SUBDOMAIN"),
            get("EXOTEL_SID"),
            get("EXOTEL_FROM"),
        ) {
            (Some(api_key), Some(api_token), Some(subdomain), Some(sid), Some(from)) => {
                Some(ExotelSettings {
                    api_key,
                    api_token: Secret::new(api_token),
                    subdomain,
                    sid,
                    from,
                    waba_id: get("EXOTEL_WABA_ID"),
                    base_url: get("EXOTEL_BASE_URL"),
                })
            }
            _ => None,
        };

        let parse_secs = |key: &str, default: u64| -> Result<u64, ConfigError> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| {
                        ConfigError::Invalid(format!("{key} must be a number of seconds"))
                    }),
                None => Ok(default),
            }
        };

        let config = Self {
            provider: get("WHATSAPP_PROVIDER").unwrap_or_else(default_provider),
            meta,
            exotel,
            timeouts: Timeouts {
                api_secs: parse_secs("WHATSAPP_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?,
                download_secs: parse_secs(
                    "WHATSAPP_DOWNLOAD_TIMEOUT_SECS",
                    DEFAULT_DOWNLOAD_TIMEOUT_SECS,
                )?,
            },
        };
        config.ensure_valid()?;
        Ok(config)
    }

    fn ensure_valid(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("provider must not be empty".into()));
        }
        if self.timeouts.api_secs == 0 || self.timeouts.download_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        if let Some(meta) = &self.meta {
            url::Url::parse(&meta.url)
                .map_err(|err| ConfigError::Invalid(format!("meta.url: {err}")))?;
        }
        if let Some(exotel) = &self.exotel {
            url::Url::parse(&exotel.api_base())
                .map_err(|err| ConfigError::Invalid(format!("exotel base url: {err}")))?;
        }
        Ok(())
    }
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_meta_url() -> String {
    DEFAULT_META_URL.to_string()
}

fn default_meta_version() -> String {
    DEFAULT_META_VERSION.to_string()
}

fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

fn default_download_timeout() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn json_config_applies_defaults() {
        let config = ProviderConfig::from_json(
            r#"{"meta": {"token": "t0k", "phone_id": "123", "business_id": "999"}}"#,
        )
        .unwrap();
        assert_eq!(config.provider, "Meta");
        let meta = config.meta.unwrap();
        assert_eq!(meta.url, DEFAULT_META_URL);
        assert_eq!(meta.version, DEFAULT_META_VERSION);
        assert_eq!(config.timeouts.api(), Duration::from_secs(10));
        assert_eq!(config.timeouts.download(), Duration::from_secs(30));
    }

    #[test]
    fn secrets_are_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn env_lookup_builds_exotel_section() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("WHATSAPP_PROVIDER", "Exotel"),
            ("EXOTEL_API_KEY", "key"),
            ("EXOTEL_API_TOKEN", "token"),
            ("EXOTEL_SUBDOMAIN", "api.exotel.com"),
            ("EXOTEL_SID", "acme1"),
            ("EXOTEL_FROM", "+911234"),
            ("WHATSAPP_API_TIMEOUT_SECS", "5"),
        ]);
        let config =
            ProviderConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.provider, "Exotel");
        assert!(config.meta.is_none());
        let exotel = config.exotel.unwrap();
        assert_eq!(exotel.api_base(), "https://api.exotel.com");
        assert_eq!(config.timeouts.api_secs, 5);
        assert_eq!(config.timeouts.download_secs, 30);
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = ProviderConfig::from_lookup(|key| {
            (key == "WHATSAPP_DOWNLOAD_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("WHATSAPP_DOWNLOAD_TIMEOUT_SECS"));
    }
}
