//! Errors surfaced by graph construction, evaluation and configuration.
//!
//! Every failure is local and synchronous. Forward and backward passes are not
//! transactional: an error raised half way through a traversal leaves the
//! cached outputs and gradient accumulators of already visited nodes mutated.

use thiserror::Error;

use crate::expression::NodeId;

/// Shorthand for results carrying a [`GraphError`].
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// Errors produced while building, evaluating or differentiating a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// A forward pass reached a variable that was never bound.
    #[error("variable `{name}` is unset")]
    UnsetVariable { name: String },

    /// A variable name is not in the scope of the expression it was used with.
    #[error("variable `{name}` is undefined in this expression (known: [{known}])")]
    UnknownVariable { name: String, known: String },

    /// A value that is neither a finite scalar nor a node of this graph.
    #[error("invalid operand: {reason}")]
    InvalidOperand { reason: String },

    /// `backward` needs a cached output that was not computed in the current epoch.
    #[error("node {node} has no output for the current round, call `forward` before `backward`")]
    StaleCache { node: NodeId },
}

/// Errors produced when building or validating a [`GraphConfig`](crate::GraphConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration values are inconsistent or out of range.
    #[error("config validation: {0}")]
    Validation(String),

    /// An environment variable could not be read (e.g. invalid Unicode).
    #[error("env var {key}: {message}")]
    EnvVar { key: String, message: String },

    /// An environment variable was set but could not be parsed.
    #[error("env var {key}={value:?}: {message}")]
    Parse {
        key: String,
        value: String,
        message: String,
    },
}

impl ConfigError {
    /// Short message suitable for logging.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            ConfigError::Validation(m) => m,
            ConfigError::EnvVar { message, .. } | ConfigError::Parse { message, .. } => message,
        }
    }
}
