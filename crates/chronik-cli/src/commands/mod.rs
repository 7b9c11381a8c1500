pub mod checkpoint;
pub mod read;
pub mod setup;
pub mod status;

use anyhow::{Context, Result};
use chronik::ChronikConfig;
use std::path::Path;

/// Read the optional config file and apply command-line overrides
pub fn load_config(path: Option<&Path>, table: Option<String>) -> Result<ChronikConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<ChronikConfig>(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => ChronikConfig::default(),
    };
    if let Some(table) = table {
        config.events.table_name = table;
    }
    Ok(config)
}
