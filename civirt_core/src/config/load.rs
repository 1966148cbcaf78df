use serde_json::Value;
use std::fs;
use std::path::Path;

// Error Handling
use civirt_error::{CastError, CivirtError, ConfigError, TomlError};
use log::{debug, info};
use miette::{IntoDiagnostic, Report, Result};

/// Where raw configuration documents come from.
pub trait ConfigSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Value, CivirtError>;
}

/*
* Read configuration documents from the filesystem.
* Files ending in .yaml/.yml are read as yaml, anything else as toml.
*/
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl ConfigSource for FileSource {
    fn load(&self, path: &Path) -> Result<Value, CivirtError> {
        info!("Read config file {:?}.", path);
        let string = fs::read_to_string(path).map_err(|origin| ConfigError::Unreadable {
            path: path.display().to_string(),
            origin,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let res = if is_yaml {
            from_yaml(&string)
        } else {
            from_toml(&string)
        };
        let value = res.map_err(|origin| ConfigError::Malformed {
            path: path.display().to_string(),
            origin,
        })?;
        debug!("{:#?}", value);
        Ok(value)
    }
}

/**
* Returns a Value from a toml string
*/
pub fn from_toml(string: &str) -> Result<Value, Report> {
    match toml::from_str::<Value>(string) {
        Ok(res) => Ok(res),
        Err(e) => {
            let err = CastError::TomlError(TomlError::new(e, string));
            Err(err.into())
        }
    }
}

/**
* Returns a Value from a yaml string
*/
pub fn from_yaml(string: &str) -> Result<Value, Report> {
    serde_yaml::from_str::<Value>(string).into_diagnostic()
}
