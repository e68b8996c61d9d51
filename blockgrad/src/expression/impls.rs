use super::{
    op::{BinaryOp, Op, UnaryOp},
    Expr, Node, NodeId,
};
use core::fmt;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Debug for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Infix rendering with the fewest parentheses that keep the tree shape.
///
/// `+ -` bind loosest, then `* /`, then unary `-`, then `^` and `ln`.
/// `^` is right associative; a negation wraps any operand that is not a leaf.
impl fmt::Display for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.graph.nodes.borrow();
        write_node(&nodes, self.id, f)
    }
}

const ATOM: u8 = 5;

fn precedence(op: &Op) -> u8 {
    match op {
        Op::Const(v) if v.is_sign_negative() => 3,
        Op::Const(_) | Op::Var(_) => ATOM,
        Op::Unary(_, UnaryOp::Neg) => 3,
        Op::Unary(_, UnaryOp::Log) => 4,
        Op::Binary(_, _, BinaryOp::Add | BinaryOp::Sub) => 1,
        Op::Binary(_, _, BinaryOp::Mul | BinaryOp::Div) => 2,
        Op::Binary(_, _, BinaryOp::Pow) => 4,
    }
}

fn write_wrapped(nodes: &[Node], id: NodeId, wrap: bool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if wrap {
        f.write_str("(")?;
        write_node(nodes, id, f)?;
        f.write_str(")")
    } else {
        write_node(nodes, id, f)
    }
}

fn write_node(nodes: &[Node], id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &nodes[id.0].op {
        Op::Const(v) => write!(f, "{v}"),
        Op::Var(var) => f.write_str(&var.name),
        Op::Unary(x, UnaryOp::Neg) => {
            f.write_str("-")?;
            write_wrapped(nodes, *x, precedence(&nodes[x.0].op) < ATOM, f)
        }
        Op::Unary(x, UnaryOp::Log) => {
            f.write_str("ln")?;
            write_wrapped(nodes, *x, true, f)
        }
        Op::Binary(lhs, rhs, op) => {
            let prec = precedence(&nodes[id.0].op);
            let lhs_prec = precedence(&nodes[lhs.0].op);
            let rhs_prec = precedence(&nodes[rhs.0].op);
            let (wrap_lhs, wrap_rhs) = match op {
                BinaryOp::Pow => (
                    lhs_prec < prec || matches!(nodes[lhs.0].op, Op::Binary(_, _, BinaryOp::Pow)),
                    rhs_prec < prec,
                ),
                BinaryOp::Sub | BinaryOp::Div => (lhs_prec < prec, rhs_prec <= prec),
                BinaryOp::Add | BinaryOp::Mul => (lhs_prec < prec, rhs_prec < prec),
            };
            write_wrapped(nodes, *lhs, wrap_lhs, f)?;
            write!(f, " {op} ")?;
            write_wrapped(nodes, *rhs, wrap_rhs, f)
        }
    }
}
