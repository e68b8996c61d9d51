//! Graph-wide behavior switches.
//!
//! Load from the environment with [`from_env`] or start from [`GraphConfig::default`].

mod builder;
mod constants;

use core::{fmt, str::FromStr};

use constants::DEFAULT_CLIP;

pub use builder::{env_key, env_parsed, from_env};

use crate::ConfigError;

/// Result of `deriv` when neither operand depends on the variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZeroBranch {
    /// `Constant(0)`.
    #[default]
    Zero,
    /// `Constant(forward())`: the value of the subexpression itself, kept for
    /// compatibility with results produced by earlier versions of the engine.
    HeldValue,
}

/// How [`Expr::update`](crate::Expr::update) bounds a single step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipMode {
    /// `grad` if `grad < clip`, else `clip`. Negative steps are not bounded.
    #[default]
    Ceiling,
    /// `grad` clamped into `[-clip, clip]`.
    Symmetric,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphConfig {
    /// Clip given to variables created by [`Graph::variable`](crate::Graph::variable).
    pub default_clip: f64,
    pub zero_branch: ZeroBranch,
    pub clip_mode: ClipMode,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_clip: DEFAULT_CLIP,
            zero_branch: ZeroBranch::default(),
            clip_mode: ClipMode::default(),
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_clip.is_nan() || self.default_clip <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "default_clip must be positive, got {}",
                self.default_clip
            )));
        }
        Ok(())
    }
}

impl FromStr for ZeroBranch {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "held-value" | "held_value" => Ok(Self::HeldValue),
            other => Err(format!("expected `zero` or `held-value`, got `{other}`")),
        }
    }
}

impl FromStr for ClipMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ceiling" => Ok(Self::Ceiling),
            "symmetric" => Ok(Self::Symmetric),
            other => Err(format!("expected `ceiling` or `symmetric`, got `{other}`")),
        }
    }
}

impl fmt::Display for ZeroBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "zero"),
            Self::HeldValue => write!(f, "held-value"),
        }
    }
}

impl fmt::Display for ClipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ceiling => write!(f, "ceiling"),
            Self::Symmetric => write!(f, "symmetric"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::constants::{ENV_CLIP_MODE, ENV_DEFAULT_CLIP, ENV_ZERO_BRANCH};
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for suffix in [ENV_DEFAULT_CLIP, ENV_ZERO_BRANCH, ENV_CLIP_MODE] {
            std::env::remove_var(env_key(suffix));
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = GraphConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_clip, 10.0);
        assert_eq!(config.zero_branch, ZeroBranch::Zero);
        assert_eq!(config.clip_mode, ClipMode::Ceiling);
    }

    #[test]
    fn validate_rejects_non_positive_clip() {
        for clip in [0.0, -1.0, f64::NAN] {
            let config = GraphConfig {
                default_clip: clip,
                ..GraphConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        }
    }

    #[test]
    fn policies_parse_from_str() {
        assert_eq!("zero".parse::<ZeroBranch>(), Ok(ZeroBranch::Zero));
        assert_eq!("Held-Value".parse::<ZeroBranch>(), Ok(ZeroBranch::HeldValue));
        assert_eq!("symmetric".parse::<ClipMode>(), Ok(ClipMode::Symmetric));
        assert!("both".parse::<ClipMode>().is_err());
        assert_eq!(ClipMode::Ceiling.to_string().parse::<ClipMode>(), Ok(ClipMode::Ceiling));
    }

    #[test]
    #[serial]
    fn from_env_falls_back_to_defaults() {
        clear_env();
        assert_eq!(from_env().unwrap(), GraphConfig::default());
    }

    #[test]
    #[serial]
    fn from_env_overrides_with_env_vars() {
        clear_env();
        std::env::set_var(env_key(ENV_DEFAULT_CLIP), "2.5");
        std::env::set_var(env_key(ENV_ZERO_BRANCH), "held-value");
        std::env::set_var(env_key(ENV_CLIP_MODE), "symmetric");
        let config = from_env();
        clear_env();
        let config = config.unwrap();
        assert_eq!(config.default_clip, 2.5);
        assert_eq!(config.zero_branch, ZeroBranch::HeldValue);
        assert_eq!(config.clip_mode, ClipMode::Symmetric);
    }

    #[test]
    #[serial]
    fn from_env_reports_parse_errors() {
        clear_env();
        std::env::set_var(env_key(ENV_CLIP_MODE), "sideways");
        let res = from_env();
        clear_env();
        match res {
            Err(ConfigError::Parse { key, value, .. }) => {
                assert_eq!(key, "BLOCKGRAD_CLIP_MODE");
                assert_eq!(value, "sideways");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn from_env_validates() {
        clear_env();
        std::env::set_var(env_key(ENV_DEFAULT_CLIP), "-3");
        let res = from_env();
        clear_env();
        assert!(matches!(res, Err(ConfigError::Validation(_))));
    }
}
