//! Default values and environment variable names used by the config builder.

/// Environment variable prefix (e.g. `BLOCKGRAD_DEFAULT_CLIP`).
pub(crate) const ENV_PREFIX: &str = "BLOCKGRAD_";

pub(crate) const ENV_DEFAULT_CLIP: &str = "DEFAULT_CLIP";
pub(crate) const ENV_ZERO_BRANCH: &str = "ZERO_BRANCH";
pub(crate) const ENV_CLIP_MODE: &str = "CLIP_MODE";

/// Step bound given to variables created without an explicit clip.
pub(crate) const DEFAULT_CLIP: f64 = 10.0;
