//! # blockgrad
//!
//! Scalar computation graphs over named variables and constants.
//!
//! Expressions are built by composing nodes inside a [`Graph`] arena. Any node
//! can then be evaluated ([`Expr::forward`], [`Expr::eval`]), differentiated in
//! reverse mode ([`Expr::backward`], [`Expr::eval_gradient`]) or turned into a
//! new expression for its symbolic derivative ([`Expr::deriv`]).
//!
//! ```
//! use blockgrad::Graph;
//!
//! let graph = Graph::new();
//! let x = graph.variable("x");
//! let y = graph.variable("y");
//! let z = graph.variable("z");
//! let f = x.pow(2.0) + y * z;
//! assert_eq!(f.eval([("x", 3.0), ("y", 4.0), ("z", 5.0)]).unwrap(), 29.0);
//!
//! let df_dx = f.deriv("x").unwrap();
//! assert_eq!(df_dx.eval([("x", 3.0)]).unwrap(), 6.0);
//! ```

pub mod config;
mod error;
mod expression;

pub use config::{ClipMode, GraphConfig, ZeroBranch};
pub use error::{ConfigError, GraphError, Result};
pub use expression::{BinaryOp, Expr, Graph, NodeId, NodeKind, Operand, UnaryOp};
