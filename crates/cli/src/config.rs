use anima_core::EvolutionConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where the config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EvolutionConfig,
    pub source: ConfigSource,
}

/// Config file path: ~/.config/anima/evolution.toml
pub fn default_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Cannot determine config directory")?
        .join("anima");
    Ok(config_dir.join("evolution.toml"))
}

pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_path(),
    }
}

/// Load config from file, falling back to defaults when the default path
/// does not exist. An explicit `--config` path must exist.
/// Environment variables override file values.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = resolve_path(explicit)?;
    let (mut config, source) = if explicit.is_some() || path.exists() {
        (EvolutionConfig::load_from_path(&path)?, ConfigSource::File(path))
    } else {
        (EvolutionConfig::default(), ConfigSource::Defaults)
    };

    config.apply_env_overrides()?;
    Ok(LoadedConfig { config, source })
}

/// Write the default config. Refuses to overwrite unless `force`.
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = EvolutionConfig::default().to_toml_string()?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
