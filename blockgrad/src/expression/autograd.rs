use std::collections::HashMap;

use core::cmp::Ordering;
use ordered_float::OrderedFloat;

use super::{op::Op, recompute::cached, Expr, NodeId};
use crate::{ClipMode, GraphError, Result};

/// Node id ordered parents first: ids grow from operands to results, so the
/// reversed order is a topological order of the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(super) struct GradId(pub(super) NodeId);

impl PartialOrd for GradId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for GradId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0).reverse()
    }
}

/// A store for gradients, associating a node id to the gradient flowing into it.
#[derive(Debug)]
struct GradStore(HashMap<NodeId, f64>);

impl GradStore {
    fn new() -> Self {
        GradStore(HashMap::new())
    }
    fn insert(&mut self, id: NodeId, grad: f64) -> Option<f64> {
        self.0.insert(id, grad)
    }
    fn remove_id(&mut self, id: &NodeId) -> Option<f64> {
        self.0.remove(id)
    }
    /// Get the gradient of `id`, inserting a zero if it does not exist yet.
    fn or_insert(&mut self, id: NodeId) -> &mut f64 {
        self.0.entry(id).or_insert(0.0)
    }
}

impl ClipMode {
    /// Step applied to a variable with accumulated gradient `grad`.
    pub(crate) fn step(&self, grad: f64, clip: f64) -> f64 {
        match self {
            Self::Ceiling => match OrderedFloat(grad).cmp(&OrderedFloat(clip)) {
                Ordering::Less => grad,
                Ordering::Equal | Ordering::Greater => clip,
            },
            Self::Symmetric => grad.clamp(-clip, clip),
        }
    }
}

impl<'g> Expr<'g> {
    /// [`Expr::backward_with`] a seed gradient of 1.
    pub fn backward(&self) -> Result<()> {
        self.backward_with(1.0)
    }

    /// Propagate `grad` from this node down to every variable it depends on.
    ///
    /// Each variable accumulates the sum of the gradients reaching all of its
    /// occurrences, on top of what it already holds: call
    /// [`Graph::reset_gradients`](super::Graph::reset_gradients) or
    /// [`Graph::begin_round`](super::Graph::begin_round) between passes.
    ///
    /// Needs the outputs of a [`Expr::forward`] run in the current epoch and
    /// fails with [`GraphError::StaleCache`] otherwise. Nothing is
    /// accumulated when it fails.
    pub fn backward_with(&self, grad: f64) -> Result<()> {
        if !grad.is_finite() {
            return Err(GraphError::InvalidOperand {
                reason: format!("seed gradient {grad} is not finite"),
            });
        }
        let epoch = self.graph.epoch();
        let sorted_nodes = self.graph.sorted_nodes(self.id);
        let mut grads = GradStore::new();
        {
            let nodes = self.graph.nodes.borrow();
            grads.insert(self.id, grad);
            for GradId(id) in sorted_nodes {
                let node = &nodes[id.0];
                if let Op::Var(_) = node.op {
                    continue;
                }
                let Some(grad) = grads.remove_id(&id) else {
                    continue;
                };
                log::trace!("backward {id} grad {grad}");
                match &node.op {
                    Op::Const(_) | Op::Var(_) => (),
                    Op::Unary(x, unary_op) => {
                        if nodes[x.0].scope.is_empty() {
                            continue;
                        }
                        let res = cached(&nodes, id, epoch)?;
                        let x_value = cached(&nodes, *x, epoch)?;
                        unary_op.fn_backward()(&x_value, &res, &grad, grads.or_insert(*x));
                    }
                    Op::Binary(lhs, rhs, binary_op) => {
                        let [fn_backward_lhs, fn_backward_rhs] = binary_op.fn_backward();
                        let res = cached(&nodes, id, epoch)?;
                        let lhs_value = cached(&nodes, *lhs, epoch)?;
                        let rhs_value = cached(&nodes, *rhs, epoch)?;
                        if !nodes[lhs.0].scope.is_empty() {
                            fn_backward_lhs(&lhs_value, &rhs_value, &res, &grad, grads.or_insert(*lhs));
                        }
                        if !nodes[rhs.0].scope.is_empty() {
                            fn_backward_rhs(&lhs_value, &rhs_value, &res, &grad, grads.or_insert(*rhs));
                        }
                    }
                }
            }
        }
        // only variables are left in the store
        let mut nodes = self.graph.nodes.borrow_mut();
        for (id, grad) in grads.0 {
            if let Op::Var(var) = &mut nodes[id.0].op {
                var.grad += grad;
            }
        }
        Ok(())
    }

    /// Run [`Expr::forward`] and [`Expr::backward`], then return the gradient
    /// accumulated by the variable `name`.
    ///
    /// The accumulator is not reset first, so the result includes whatever
    /// earlier passes left in it.
    pub fn eval_gradient(&self, name: &str) -> Result<f64> {
        let var = self.scoped(name)?;
        self.forward()?;
        self.backward()?;
        match &self.graph.nodes.borrow()[var.0].op {
            Op::Var(var) => Ok(var.grad),
            _ => Err(Expr::new(self.graph, var).not_a_variable()),
        }
    }

    /// Step every variable of this expression by its accumulated gradient,
    /// bounded by the variable's clip, then zero the accumulator.
    ///
    /// `learning_rate` is accepted for signature compatibility and ignored:
    /// the step is the clipped gradient itself. Every variable must be bound,
    /// otherwise nothing is updated.
    pub fn update(&self, learning_rate: f64) -> Result<()> {
        log::trace!("update {}: learning rate {learning_rate} ignored", self.id);
        let clip_mode = self.graph.config.clip_mode;
        let vars: Vec<NodeId> = self.graph.nodes.borrow()[self.id.0]
            .scope
            .values()
            .copied()
            .collect();
        let mut nodes = self.graph.nodes.borrow_mut();
        for id in &vars {
            if let Op::Var(var) = &nodes[id.0].op {
                if var.value.is_none() {
                    return Err(GraphError::UnsetVariable {
                        name: var.name.to_string(),
                    });
                }
            }
        }
        for id in &vars {
            if let Op::Var(var) = &mut nodes[id.0].op {
                let step = clip_mode.step(var.grad, var.clip);
                if let Some(value) = var.value.as_mut() {
                    *value += step;
                }
                log::debug!("update {} by {step}", var.name);
                var.grad = 0.0;
            }
        }
        drop(nodes);
        self.graph.advance_epoch();
        Ok(())
    }
}
