//! Configuration for the delivery channel and the submission controller.
//!
//! Channel credentials come from the hosting environment. Any value the
//! environment does not provide falls back to a documented placeholder, which
//! the probe treats as unset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ConfigField;

pub const PLACEHOLDER_SERVICE_ID: &str = "your_service_id";
pub const PLACEHOLDER_TEMPLATE_ID: &str = "your_template_id";
pub const PLACEHOLDER_PUBLIC_KEY: &str = "your_public_key";

/// Credentials identifying the email-relay service, template and account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            service_id: PLACEHOLDER_SERVICE_ID.to_string(),
            template_id: PLACEHOLDER_TEMPLATE_ID.to_string(),
            public_key: PLACEHOLDER_PUBLIC_KEY.to_string(),
        }
    }
}

impl ChannelConfig {
    pub fn new(
        service_id: impl Into<String>,
        template_id: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            template_id: template_id.into(),
            public_key: public_key.into(),
        }
    }

    /// Read the credentials from `EMAILJS_*` environment variables, falling
    /// back to a `.env` file found in the working directory or its parents.
    ///
    /// The file is parsed on every call and never written into the process
    /// environment, so edits to it are picked up by the next call.
    pub fn from_env() -> Self {
        let file: HashMap<String, String> = dotenvy::dotenv_iter()
            .map(|iter| iter.filter_map(|item| item.ok()).collect())
            .unwrap_or_default();
        Self::from_env_and(file)
    }

    /// Like [`ChannelConfig::from_env`] with an explicit `.env` path.
    pub fn from_env_file(path: impl AsRef<Path>) -> Self {
        let file: HashMap<String, String> = dotenvy::from_path_iter(path.as_ref())
            .map(|iter| iter.filter_map(|item| item.ok()).collect())
            .unwrap_or_else(|e| {
                tracing::debug!(path = %path.as_ref().display(), error = %e, "No .env file loaded");
                HashMap::new()
            });
        Self::from_env_and(file)
    }

    // Process environment wins over the file
    fn from_env_and(file: HashMap<String, String>) -> Self {
        Self::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file.get(name).cloned())
        })
    }

    /// Build the credentials from an arbitrary variable lookup, substituting
    /// placeholders for anything missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |field: ConfigField| {
            lookup(field.env_var()).unwrap_or_else(|| Self::placeholder(field).to_string())
        };
        Self {
            service_id: read(ConfigField::Service),
            template_id: read(ConfigField::Template),
            public_key: read(ConfigField::PublicKey),
        }
    }

    /// Value of the given field.
    pub fn get(&self, field: ConfigField) -> &str {
        match field {
            ConfigField::Service => &self.service_id,
            ConfigField::Template => &self.template_id,
            ConfigField::PublicKey => &self.public_key,
        }
    }

    /// Placeholder the field defaults to when the environment leaves it unset.
    pub fn placeholder(field: ConfigField) -> &'static str {
        match field {
            ConfigField::Service => PLACEHOLDER_SERVICE_ID,
            ConfigField::Template => PLACEHOLDER_TEMPLATE_ID,
            ConfigField::PublicKey => PLACEHOLDER_PUBLIC_KEY,
        }
    }
}

/// Where the relay lives and how long a single send may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Base URL of the relay API
    pub endpoint: String,

    /// Path of the send operation
    pub send_path: String,

    /// Timeout for the single send attempt in milliseconds
    pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.emailjs.com".to_string(),
            send_path: "/api/v1.0/email/send".to_string(),
            timeout_ms: 30000,
        }
    }
}

/// Behaviour of a submission controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Delay between a successful submission and the redirect signal
    pub reset_delay_ms: u64,

    /// Address offered for direct contact while the channel is blocked
    pub fallback_address: String,

    /// Subject of the direct-contact message
    pub fallback_subject: String,

    /// Message shown after a successful submission. Defaults per form when unset.
    pub success_message: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reset_delay_ms: 3000,
            fallback_address: "contact@qverify.org".to_string(),
            fallback_subject: "Certification Application".to_string(),
            success_message: None,
        }
    }
}

/// Supplies channel credentials to a controller.
///
/// Loading is async so that credentials can come from somewhere slower than
/// process memory. The controller calls [`ConfigSource::load`] once per probe.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> ChannelConfig;
}

/// A fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource(pub ChannelConfig);

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn load(&self) -> ChannelConfig {
        self.0.clone()
    }
}

/// Reads the environment on every load, so a retried probe sees fixes made
/// after the controller was created.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigSource {
    /// `.env` file to read. Searched for from the working directory when unset.
    pub dotenv_path: Option<PathBuf>,
}

impl EnvConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            dotenv_path: Some(path.into()),
        }
    }
}

#[async_trait]
impl ConfigSource for EnvConfigSource {
    async fn load(&self) -> ChannelConfig {
        match &self.dotenv_path {
            Some(path) => ChannelConfig::from_env_file(path),
            None => ChannelConfig::from_env(),
        }
    }
}
