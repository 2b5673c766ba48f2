use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub line: LineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            webhook_path: default_webhook_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_secret: Option<String>,
    #[serde(default)]
    pub channel_access_token: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Check `X-Line-Signature` against the channel secret before handling events.
    #[serde(default)]
    pub verify_signature: bool,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: None,
            channel_access_token: None,
            api_base_url: default_api_base_url(),
            verify_signature: false,
        }
    }
}

/// The two channel secrets. Either may be absent at startup; the webhook
/// reports the gap when a request needs them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub channel_secret: Option<String>,
    pub channel_access_token: Option<String>,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.is_empty())
        }
        present(&self.channel_secret) && present(&self.channel_access_token)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_webhook_path() -> String {
    "/api/getUser".to_string()
}

fn default_api_base_url() -> String {
    "https://api.line.me".to_string()
}

impl Config {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            channel_secret: self.line.channel_secret.clone(),
            channel_access_token: self.line.channel_access_token.clone(),
        }
    }

    /// Load from `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// Environment wins over the file. `lookup` is injected so tests don't
    /// touch the process environment.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("CHANNEL_SECRET") {
            self.line.channel_secret = Some(secret);
        }
        if let Some(token) = lookup("CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = Some(token);
        }
        if let Some(url) = lookup("LINE_API_BASE_URL") {
            self.line.api_base_url = url;
        }
        if let Some(addr) = lookup("BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
    }
}
