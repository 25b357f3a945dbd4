//! Configuration loading from disk.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML (or `.json`) file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let config = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };

    prepare_config(config)
}

/// Resolve named args and validate an already-deserialized config.
pub fn prepare_config(mut config: RouterConfig) -> Result<RouterConfig, ConfigError> {
    substitute_named_args(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Fill channel name and args of sources and routes from the named
/// argument sets declared under `channels.<name>.named_args`.
///
/// References that resolve to nothing are left in place; validation
/// reports them.
pub fn substitute_named_args(config: &mut RouterConfig) {
    let mut named: HashMap<&str, (&str, &HashMap<String, String>)> = HashMap::new();
    for (channel_name, channel) in &config.channels {
        for (arg_name, args) in &channel.named_args {
            named.insert(arg_name.as_str(), (channel_name.as_str(), args));
        }
    }

    for source in &mut config.sources {
        if let Some((channel, args)) = source.named_args.as_deref().and_then(|n| named.get(n)) {
            source.pub_channel_name = Some(channel.to_string());
            source.pub_channel_args = (*args).clone();
        }
    }

    for route in &mut config.routes {
        if let Some((channel, args)) = route.named_args.as_deref().and_then(|n| named.get(n)) {
            route.sub_channel_name = channel.to_string();
            route.sub_channel_args = (*args).clone();
        }
    }
}
