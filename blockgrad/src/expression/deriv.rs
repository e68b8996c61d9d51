use std::collections::HashMap;

use super::{
    op::{BinaryOp, Op, UnaryOp},
    Expr, NodeId,
};
use crate::{Result, ZeroBranch};

/// Memo tables of one `deriv` call.
#[derive(Default)]
struct Derivs {
    partial: HashMap<NodeId, NodeId>,
    deriv: HashMap<NodeId, NodeId>,
}

impl<'g> Expr<'g> {
    /// A new expression for the partial derivative of this one with respect
    /// to the variable `name`.
    ///
    /// Operands not depending on `name` are left out of the result. When
    /// nothing depends on it, the result is decided by
    /// [`GraphConfig::zero_branch`](crate::GraphConfig::zero_branch).
    ///
    /// Every other variable is replaced by its bound value, see
    /// [`Expr::forward_partial`], so they all have to be bound.
    pub fn deriv(&self, name: &str) -> Result<Expr<'g>> {
        let mut memo = Derivs::default();
        let id = self.deriv_node(self.id, name, &mut memo)?;
        log::debug!("deriv {} wrt `{name}` = {}", self.id, id);
        Ok(Expr::new(self.graph, id))
    }

    fn deriv_node(&self, id: NodeId, name: &str, memo: &mut Derivs) -> Result<NodeId> {
        if let Some(done) = memo.deriv.get(&id) {
            return Ok(*done);
        }
        let (op, depends) = {
            let nodes = self.graph.nodes.borrow();
            (nodes[id.0].op.clone(), nodes[id.0].scope.contains_key(name))
        };
        log::trace!("deriv {id} wrt `{name}`");
        let graph = self.graph;
        let res = match op {
            Op::Const(_) => graph.push_const(0.0),
            _ if !depends => match graph.config.zero_branch {
                ZeroBranch::Zero => graph.push_const(0.0),
                ZeroBranch::HeldValue => {
                    let value = Expr::new(graph, id).forward()?;
                    graph.push_const(value)
                }
            },
            Op::Var(_) => graph.push_const(1.0),
            Op::Unary(x, UnaryOp::Neg) => {
                let dx = self.deriv_node(x, name, memo)?;
                graph.push_unary(dx, UnaryOp::Neg)
            }
            Op::Unary(x, UnaryOp::Log) => {
                let dx = self.deriv_node(x, name, memo)?;
                let fx = self.partial(x, name, &mut memo.partial)?;
                graph.push_binary(dx, fx, BinaryOp::Div)
            }
            Op::Binary(lhs, rhs, op) => {
                let lhs_depends = self.depends(lhs, name);
                let rhs_depends = self.depends(rhs, name);
                self.deriv_binary(op, (lhs, lhs_depends), (rhs, rhs_depends), name, memo)?
            }
        };
        memo.deriv.insert(id, res);
        Ok(res)
    }

    /// At least one of the operands depends on `name`.
    fn deriv_binary(
        &self,
        op: BinaryOp,
        (x, x_depends): (NodeId, bool),
        (y, y_depends): (NodeId, bool),
        name: &str,
        memo: &mut Derivs,
    ) -> Result<NodeId> {
        let graph = self.graph;
        let dx = if x_depends {
            Some(self.deriv_node(x, name, memo)?)
        } else {
            None
        };
        let dy = if y_depends {
            Some(self.deriv_node(y, name, memo)?)
        } else {
            None
        };
        let (term_x, term_y) = match op {
            BinaryOp::Add => (dx, dy),
            BinaryOp::Sub => match (dx, dy) {
                (Some(dx), Some(dy)) => return Ok(graph.push_binary(dx, dy, BinaryOp::Sub)),
                (dx, dy) => (dx, dy.map(|dy| graph.push_unary(dy, UnaryOp::Neg))),
            },
            BinaryOp::Mul => {
                // fp(y) * d(x) + fp(x) * d(y)
                let term_x = match dx {
                    Some(dx) => {
                        let fy = self.partial(y, name, &mut memo.partial)?;
                        Some(graph.push_binary(fy, dx, BinaryOp::Mul))
                    }
                    None => None,
                };
                let term_y = match dy {
                    Some(dy) => {
                        let fx = self.partial(x, name, &mut memo.partial)?;
                        Some(graph.push_binary(fx, dy, BinaryOp::Mul))
                    }
                    None => None,
                };
                (term_x, term_y)
            }
            BinaryOp::Div => {
                let fy = self.partial(y, name, &mut memo.partial)?;
                // (1 / fp(y)) * d(x)
                let term_x = dx.map(|dx| {
                    let one = graph.push_const(1.0);
                    let inv = graph.push_binary(one, fy, BinaryOp::Div);
                    graph.push_binary(inv, dx, BinaryOp::Mul)
                });
                // (-fp(x) * fp(y) ^ -2) * d(y)
                let term_y = match dy {
                    Some(dy) => {
                        let fx = self.partial(x, name, &mut memo.partial)?;
                        let neg_fx = graph.push_unary(fx, UnaryOp::Neg);
                        let minus_two = graph.push_const(-2.0);
                        let sq_inv = graph.push_binary(fy, minus_two, BinaryOp::Pow);
                        let coef = graph.push_binary(neg_fx, sq_inv, BinaryOp::Mul);
                        Some(graph.push_binary(coef, dy, BinaryOp::Mul))
                    }
                    None => None,
                };
                (term_x, term_y)
            }
            BinaryOp::Pow => {
                let fx = self.partial(x, name, &mut memo.partial)?;
                let fy = self.partial(y, name, &mut memo.partial)?;
                // fp(y) * fp(x) ^ (fp(y) - 1) * d(x)
                let term_x = dx.map(|dx| {
                    let exponent = match self.constant_value(fy) {
                        Some(c) => graph.push_const(c - 1.0),
                        None => {
                            let one = graph.push_const(1.0);
                            graph.push_binary(fy, one, BinaryOp::Sub)
                        }
                    };
                    let power = graph.push_binary(fx, exponent, BinaryOp::Pow);
                    let coef = graph.push_binary(fy, power, BinaryOp::Mul);
                    graph.push_binary(coef, dx, BinaryOp::Mul)
                });
                // ln(fp(x)) * fp(x) ^ fp(y) * d(y)
                let term_y = dy.map(|dy| {
                    let ln_fx = graph.push_unary(fx, UnaryOp::Log);
                    let power = graph.push_binary(fx, fy, BinaryOp::Pow);
                    let coef = graph.push_binary(ln_fx, power, BinaryOp::Mul);
                    graph.push_binary(coef, dy, BinaryOp::Mul)
                });
                (term_x, term_y)
            }
        };
        match (term_x, term_y) {
            (Some(tx), Some(ty)) => Ok(graph.push_binary(tx, ty, BinaryOp::Add)),
            (Some(t), None) | (None, Some(t)) => Ok(t),
            (None, None) => unreachable!("deriv_binary called without a dependent operand"),
        }
    }

    fn depends(&self, id: NodeId, name: &str) -> bool {
        self.graph.nodes.borrow()[id.0].scope.contains_key(name)
    }
    fn constant_value(&self, id: NodeId) -> Option<f64> {
        match self.graph.nodes.borrow()[id.0].op {
            Op::Const(v) => Some(v),
            _ => None,
        }
    }
}
