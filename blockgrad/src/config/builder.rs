//! Build [`GraphConfig`] from environment variables.

use super::constants::{ENV_CLIP_MODE, ENV_DEFAULT_CLIP, ENV_PREFIX, ENV_ZERO_BRANCH};
use super::GraphConfig;
use crate::ConfigError;

/// Returns the full environment variable key for a suffix (`CLIP_MODE` → `BLOCKGRAD_CLIP_MODE`).
#[must_use]
pub fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

/// Reads an environment variable and parses it into `T`.
///
/// `Ok(None)` when unset, [`ConfigError::Parse`] when set but unparsable.
pub fn env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let s = match std::env::var(key) {
        Ok(s) => s,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(e) => {
            return Err(ConfigError::EnvVar {
                key: key.to_string(),
                message: e.to_string(),
            })
        }
    };
    match s.trim().parse() {
        Ok(t) => Ok(Some(t)),
        Err(e) => Err(ConfigError::Parse {
            key: key.to_string(),
            value: s,
            message: e.to_string(),
        }),
    }
}

/// Builds a validated [`GraphConfig`], falling back to [`GraphConfig::default`] for unset keys.
pub fn from_env() -> Result<GraphConfig, ConfigError> {
    let default = GraphConfig::default();
    let config = GraphConfig {
        default_clip: env_parsed(&env_key(ENV_DEFAULT_CLIP))?.unwrap_or(default.default_clip),
        zero_branch: env_parsed(&env_key(ENV_ZERO_BRANCH))?.unwrap_or(default.zero_branch),
        clip_mode: env_parsed(&env_key(ENV_CLIP_MODE))?.unwrap_or(default.clip_mode),
    };
    config.validate()?;
    log::debug!("graph config from env: {config:?}");
    Ok(config)
}
