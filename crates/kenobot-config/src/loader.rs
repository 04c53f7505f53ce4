//! Config discovery and layered loading.
//!
//! Implements the `load()` algorithm:
//! 1. Parse embedded `defaults.toml` → base
//! 2. Deep-merge the user's config file (when present)
//! 3. Apply `KENOBOT_*` environment overrides
//! 4. Deserialize merged tree → [`Config`]
//! 5. Validate

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Environment overrides: variable name → TOML dotted path.
const ENV_OVERRIDES: &[(&str, &[&str])] = &[
    ("KENOBOT_DATA_DIR", &["data_dir"]),
    ("KENOBOT_HOST", &["server", "host"]),
    ("KENOBOT_PORT", &["server", "port"]),
    ("KENOBOT_API_KEY", &["auth", "api_key"]),
    ("KENOBOT_WEBHOOK_SECRET", &["auth", "webhook_secret"]),
    ("KENOBOT_PROVIDER_API_KEY", &["provider", "api_key"]),
    ("KENOBOT_PROVIDER_MODEL", &["provider", "model"]),
    ("KENOBOT_LOG_LEVEL", &["logging", "level"]),
    ("KENOBOT_LOG_FORMAT", &["logging", "format"]),
];

/// Load configuration, optionally merging a config file over the defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any layer is malformed or if the merged
/// configuration fails validation.
pub fn load(config_file: Option<&Path>) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|source| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source,
        })?;

    if let Some(path) = config_file {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        let overlay: toml::Value =
            toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
                path: path.display().to_string(),
                source,
            })?;
        deep_merge(&mut merged, overlay);
        info!(path = %path.display(), "loaded config file");
    }

    apply_env_overrides(&mut merged);

    let config: Config = merged
        .try_into()
        .map_err(|source| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Parse a configuration from a TOML string layered over the defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the string is malformed or validation fails.
pub fn load_from_str(raw: &str) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|source| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source,
        })?;
    let overlay: toml::Value = toml::from_str(raw).map_err(|source| ConfigError::ParseError {
        path: "<string>".to_owned(),
        source,
    })?;
    deep_merge(&mut merged, overlay);

    let config: Config = merged
        .try_into()
        .map_err(|source| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Recursively merge `overlay` into `base`. Tables merge key-by-key;
/// everything else is replaced wholesale.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_table.insert(key, value);
                    },
                }
            }
        },
        (slot, value) => *slot = value,
    }
}

/// Apply `KENOBOT_*` environment overrides onto the merged tree.
fn apply_env_overrides(merged: &mut toml::Value) {
    for (var, path) in ENV_OVERRIDES {
        let Ok(raw) = std::env::var(var) else {
            continue;
        };
        debug!(var, "applying environment override");
        set_path(merged, path, coerce(&raw));
    }
}

/// Numbers stay numbers so `KENOBOT_PORT=8080` deserializes into a `u16`.
fn coerce(raw: &str) -> toml::Value {
    if let Ok(n) = raw.parse::<i64>() {
        return toml::Value::Integer(n);
    }
    toml::Value::String(raw.to_string())
}

fn set_path(tree: &mut toml::Value, path: &[&str], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = tree;
    for segment in parents {
        let table = match cursor {
            toml::Value::Table(t) => t,
            _ => return,
        };
        cursor = table
            .entry((*segment).to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    if let toml::Value::Table(table) = cursor {
        table.insert((*last).to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_and_validate() {
        let config = load(None).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[breaker]\nthreshold = 5\n",
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.breaker.threshold, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.limits.rate_limit, 60);
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server\nport=").unwrap();

        assert!(matches!(
            load(Some(&path)),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_load_from_str_rejects_invalid_values() {
        let result = load_from_str("[sleep]\ntarget_hour = 99\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_deep_merge_replaces_scalars_and_merges_tables() {
        let mut base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\nz = 4\n").unwrap();
        deep_merge(&mut base, overlay);

        let table = base.get("a").unwrap();
        assert_eq!(table.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(table.get("y").unwrap().as_integer(), Some(3));
        assert_eq!(table.get("z").unwrap().as_integer(), Some(4));
    }
}
