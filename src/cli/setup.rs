use crate::core::config::AppConfig;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::info;

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example configuration to `path`, or to the default config
/// location when no path is given. Returns where the file was written.
pub fn setup(path: Option<&str>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };
    setup_at_path(&path)?;
    Ok(path)
}

/// Writes the example configuration to `path`. An existing file is never replaced.
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    info!("Created default configuration at {}", path.display());
    Ok(())
}
