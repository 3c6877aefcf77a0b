// src/config.rs

//! Configuration loading utilities.
//!
//! Convenience functions for loading the service configuration and an
//! organization rubric from TOML files.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::{Config, OrganizationConfig};

/// Default service configuration file name.
pub const CONFIG_FILE: &str = "bidreview.toml";

/// Default organization rubric file name.
pub const ORGANIZATION_FILE: &str = "organization.toml";

fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::config(format!("Cannot read {}: {e}", path.display())))?;
    Ok(toml::from_str(&content)?)
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file cannot be loaded, but rejects a
/// configuration that loads and fails validation.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = load_toml(path).unwrap_or_else(|e| {
        log::warn!("Failed to load config from {path:?}: {e}");
        log::warn!("Using default configuration.");
        Config::default()
    });
    config.validate()?;
    Ok(config)
}

/// Load an organization rubric and refuse it when validation reports errors.
pub fn load_organization(path: &Path) -> Result<OrganizationConfig> {
    let organization: OrganizationConfig = load_toml(path)?;
    let report = organization.validate();

    for warning in &report.warnings {
        log::warn!("{}: {}", organization.id, warning);
    }
    if !report.valid {
        return Err(AppError::config(format!(
            "Invalid organization config {}: {}",
            organization.id,
            report.errors.join("; ")
        )));
    }

    log::info!(
        "Loaded organization '{}' with {} active rules",
        organization.name,
        organization.active_rules().count()
    );
    Ok(organization)
}

/// Load `bidreview.toml` and `organization.toml` from a directory.
pub fn load_all(base_path: &Path) -> Result<(Config, OrganizationConfig)> {
    let config = load_config(&base_path.join(CONFIG_FILE))?;
    let organization = load_organization(&base_path.join(ORGANIZATION_FILE))?;
    Ok((config, organization))
}
