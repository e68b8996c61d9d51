use std::collections::HashMap;

use super::{autograd::GradId, op::Op, Expr, Node, NodeId};
use crate::{GraphError, Result};

/// Output of `id` cached during the current epoch.
pub(super) fn cached(nodes: &[Node], id: NodeId, epoch: u64) -> Result<f64> {
    match nodes[id.0].output {
        Some((v, stamp)) if stamp == epoch => Ok(v),
        _ => Err(GraphError::StaleCache { node: id }),
    }
}

impl<'g> Expr<'g> {
    /// Recompute and cache the output of every node reachable from this one.
    ///
    /// Fails with [`GraphError::UnsetVariable`] on the first unbound variable,
    /// leaving the outputs computed so far in place.
    pub fn forward(&self) -> Result<f64> {
        let epoch = self.graph.epoch();
        let sorted_nodes = self.graph.sorted_nodes(self.id);
        let mut nodes = self.graph.nodes.borrow_mut();
        for GradId(id) in sorted_nodes.into_iter().rev() {
            let value = match &nodes[id.0].op {
                Op::Const(v) => *v,
                Op::Var(var) => var.value.ok_or_else(|| GraphError::UnsetVariable {
                    name: var.name.to_string(),
                })?,
                Op::Unary(x, op) => op.fn_op()(cached(&nodes, *x, epoch)?),
                Op::Binary(lhs, rhs, op) => {
                    op.fn_op()(cached(&nodes, *lhs, epoch)?, cached(&nodes, *rhs, epoch)?)
                }
            };
            nodes[id.0].output = Some((value, epoch));
        }
        cached(&nodes, self.id, epoch)
    }

    /// Bind a variable node to `value`.
    pub fn set(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(GraphError::InvalidOperand {
                reason: format!("cannot bind {} to {value}", self.id),
            });
        }
        match &mut self.graph.nodes.borrow_mut()[self.id.0].op {
            Op::Var(var) => var.value = Some(value),
            _ => return Err(self.not_a_variable()),
        }
        self.graph.advance_epoch();
        Ok(())
    }

    /// Bind the given variables, then run [`Expr::forward`].
    ///
    /// Every binding is checked before any is applied: an unknown name fails
    /// with [`GraphError::UnknownVariable`], a non-finite value with
    /// [`GraphError::InvalidOperand`].
    pub fn eval<'a>(&self, bindings: impl IntoIterator<Item = (&'a str, f64)>) -> Result<f64> {
        let bindings = bindings
            .into_iter()
            .map(|(name, value)| {
                let id = self.scoped(name)?;
                if value.is_finite() {
                    Ok((id, value))
                } else {
                    Err(GraphError::InvalidOperand {
                        reason: format!("cannot bind `{name}` to {value}"),
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        if !bindings.is_empty() {
            let mut nodes = self.graph.nodes.borrow_mut();
            for (id, value) in &bindings {
                if let Op::Var(var) = &mut nodes[id.0].op {
                    log::trace!("bind {} = {value}", var.name);
                    var.value = Some(*value);
                }
            }
            drop(nodes);
            self.graph.advance_epoch();
        }
        let output = self.forward()?;
        log::debug!("eval {} with {} binding(s) = {output}", self.id, bindings.len());
        Ok(output)
    }

    /// A new expression equal to this one where every variable except `name`
    /// is replaced by a constant holding its bound value.
    ///
    /// The variable `name` stays symbolic and is the same node as in `self`.
    /// A subtree not depending on `name` collapses to a single constant.
    pub fn forward_partial(&self, name: &str) -> Result<Expr<'g>> {
        let mut memo = HashMap::new();
        let id = self.partial(self.id, name, &mut memo)?;
        Ok(Expr::new(self.graph, id))
    }

    pub(super) fn partial(
        &self,
        id: NodeId,
        name: &str,
        memo: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId> {
        if let Some(done) = memo.get(&id) {
            return Ok(*done);
        }
        let (op, depends) = {
            let nodes = self.graph.nodes.borrow();
            (nodes[id.0].op.clone(), nodes[id.0].scope.contains_key(name))
        };
        let res = match op {
            Op::Const(_) => id,
            _ if !depends => {
                let value = Expr::new(self.graph, id).forward()?;
                self.graph.push_const(value)
            }
            // a variable that depends on `name` is `name`
            Op::Var(_) => id,
            Op::Unary(x, op) => {
                let x = self.partial(x, name, memo)?;
                self.graph.push_unary(x, op)
            }
            Op::Binary(lhs, rhs, op) => {
                let lhs = self.partial(lhs, name, memo)?;
                let rhs = self.partial(rhs, name, memo)?;
                self.graph.push_binary(lhs, rhs, op)
            }
        };
        memo.insert(id, res);
        Ok(res)
    }
}
