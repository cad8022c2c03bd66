mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variables that override file configuration.
pub const ENV_DOWNLOAD_PATH: &str = "DOWNLOAD_PATH";
pub const ENV_LOGO_PATH: &str = "LOGO_PATH";
pub const ENV_END_VIDEO_PATH: &str = "END_VIDEO_PATH";
pub const ENV_CHANNEL_ID: &str = "CHANNEL_ID";
pub const ENV_ACCESS_TOKEN: &str = "VIDRELAY_ACCESS_TOKEN";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./vidrelay.toml",
        "./config.toml",
        "~/.config/vidrelay/config.toml",
        "/etc/vidrelay/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Defaults plus environment, the way the relay is usually deployed
    let mut config = Config::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_DOWNLOAD_PATH) {
        config.paths.download_dir = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_LOGO_PATH) {
        config.transform.overlay_path = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_END_VIDEO_PATH) {
        config.transform.closing_segment_path = PathBuf::from(v);
    }
    if let Some(v) = get(ENV_CHANNEL_ID) {
        config.channel_id = v.trim().to_string();
    }
    if let Some(v) = get(ENV_ACCESS_TOKEN) {
        config.auth.access_token = Some(v);
    }
}

fn expand(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(s.as_ref()).as_ref())
}

fn expand_paths(config: &mut Config) {
    config.paths.download_dir = expand(&config.paths.download_dir);
    config.paths.cache_dir = config.paths.cache_dir.as_deref().map(expand);
    config.paths.checkpoint_file = expand(&config.paths.checkpoint_file);
    config.paths.ledger_file = expand(&config.paths.ledger_file);
    config.transform.overlay_path = expand(&config.transform.overlay_path);
    config.transform.closing_segment_path = expand(&config.transform.closing_segment_path);
    config.auth.credentials_file = expand(&config.auth.credentials_file);
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.transform.overlay_height == 0 {
        anyhow::bail!("transform.overlay_height must be greater than 0");
    }

    let tolerance = config.transform.duration_tolerance_secs;
    if tolerance.is_nan() || tolerance < 0.0 {
        anyhow::bail!("transform.duration_tolerance_secs must be non-negative");
    }

    if config.pipeline.concurrency == 0 {
        anyhow::bail!("pipeline.concurrency must be at least 1");
    }

    if config.pipeline.max_videos == 0 {
        anyhow::bail!("pipeline.max_videos must be at least 1");
    }

    if config.pipeline.max_pages == 0 {
        anyhow::bail!("pipeline.max_pages must be at least 1");
    }

    if config.pipeline.retry_failed && config.pipeline.max_attempts == 0 {
        anyhow::bail!("pipeline.max_attempts must be at least 1 when retry_failed is enabled");
    }

    if config.publish.description_mode != DescriptionMode::Source
        && config
            .publish
            .common_description
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
    {
        anyhow::bail!(
            "publish.description_mode = {:?} requires publish.common_description",
            config.publish.description_mode
        );
    }

    if !config.youtube.watch_url_template.contains("{id}") {
        anyhow::bail!("youtube.watch_url_template must contain {{id}}");
    }

    Ok(())
}

/// Checks that only matter when a pipeline run is about to start.
pub fn validate_for_run(config: &Config) -> Result<()> {
    if config.channel_id.trim().is_empty() {
        anyhow::bail!(
            "No channel configured: set channel_id in the config file or {}",
            ENV_CHANNEL_ID
        );
    }

    if config.auth.access_token.is_none() && !config.auth.credentials_file.exists() {
        anyhow::bail!(
            "No credentials: set {} or provide {:?}",
            ENV_ACCESS_TOKEN,
            config.auth.credentials_file
        );
    }

    // Missing media assets fail each item at the transform stage instead.
    if !config.transform.overlay_path.exists() {
        tracing::warn!("Overlay image does not exist: {:?}", config.transform.overlay_path);
    }
    if !config.transform.closing_segment_path.exists() {
        tracing::warn!(
            "Closing segment does not exist: {:?}",
            config.transform.closing_segment_path
        );
    }

    Ok(())
}
