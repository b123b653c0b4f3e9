use std::path::Path;

use tracing::debug;

use crate::config::{Configuration, RawConfiguration};
use crate::error::ConfigError;

/// Load a [`Configuration`] from an optional TOML file.
///
/// A missing `path` is not an error: the caller gets built-in defaults. A
/// file that exists but fails to read or parse is.
pub fn load(path: Option<&Path>) -> Result<Configuration, ConfigError> {
    let Some(path) = path else {
        debug!("no config file given, using built-in defaults");
        let config = Configuration::default();
        config.validate()?;
        return Ok(config);
    };

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawConfiguration = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(path = %path.display(), "loaded configuration file");

    let config = Configuration::default().merge(raw);
    config.validate()?;
    Ok(config)
}
