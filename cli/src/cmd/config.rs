use anyhow::{Context, Result};
use isomount_sdk::MounterOptions;
use std::path::{Path, PathBuf};

/// `<config_dir>/isomount/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("isomount").join("config.json"))
}

/// Load options from `explicit`, else from the default config file if it
/// exists, else fall back to defaults.
pub fn load_options(explicit: Option<&Path>) -> Result<MounterOptions> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(MounterOptions::default()),
        },
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let options: MounterOptions = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::debug!("Loaded options from {}", path.display());
    Ok(options)
}

/// Apply command-line overrides on top of loaded options.
pub fn apply_overrides(
    mut options: MounterOptions,
    mount_root: Option<PathBuf>,
    max_concurrent: Option<usize>,
) -> MounterOptions {
    if let Some(root) = mount_root {
        options.mount_root = root;
    }
    if let Some(max) = max_concurrent {
        options.max_concurrent_mounts = max;
    }
    options
}
