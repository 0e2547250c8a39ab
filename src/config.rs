use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default = "default_preview_config")]
    pub preview: PreviewConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreviewConfig {
    /// Upper bound for the preview body, capped at Discord's embed
    /// description limit.
    #[serde(default = "default_max_body_length")]
    pub max_body_length: usize,
}

fn default_max_body_length() -> usize {
    // Discord rejects embed descriptions above 4096 characters.
    4096
}

fn default_preview_config() -> PreviewConfig {
    PreviewConfig {
        max_body_length: default_max_body_length(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
