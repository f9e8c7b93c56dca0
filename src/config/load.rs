//! Loading and saving `generate.yaml`

use super::schema::GenerateConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Load a base configuration from a YAML file.
///
/// An empty file is an empty configuration.
///
/// # Errors
///
/// `Error::Config` when the file is missing, unreadable or not valid YAML
/// for the schema.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<GenerateConfig> {
    let path = config_path.as_ref();
    if !path.exists() {
        return Err(Error::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&yaml_content)
}

/// Parse a configuration from YAML text
pub fn parse_config(yaml: &str) -> Result<GenerateConfig> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?;

    if value.is_null() {
        return Ok(GenerateConfig::default());
    }

    serde_yaml::from_value(value)
        .map_err(|e| Error::Config(format!("Invalid config structure: {}", e)))
}

/// Write a configuration as YAML, keeping section order
pub fn save_config<P: AsRef<Path>>(config: &GenerateConfig, path: P) -> Result<()> {
    let content = serde_yaml::to_string(config)?;
    fs::write(path.as_ref(), content)?;
    Ok(())
}
