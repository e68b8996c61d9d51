use super::{Expr, Graph, NodeId, Operand, Variable};
use crate::Result;

#[derive(Clone, Debug)]
pub(super) enum Op {
    Const(f64),
    Var(Variable),
    Unary(NodeId, UnaryOp),
    Binary(NodeId, NodeId, BinaryOp),
}

////////////////////////////////////////////////////////////////////////////////////////////
///////////////////////////////////   UnaryOp   ////////////////////////////////////////////
////////////////////////////////////////////////////////////////////////////////////////////
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Neg,
    /// Natural logarithm.
    Log,
}

trait UnaryOpT {
    const OP: UnaryOp;
    fn fn_op(x: f64) -> f64;
    fn fn_backward(x: &f64, res: &f64, grad: &f64, sum_grad: &mut f64);
}

struct Neg;
impl UnaryOpT for Neg {
    const OP: UnaryOp = UnaryOp::Neg;
    #[inline]
    fn fn_op(x: f64) -> f64 {
        -x
    }
    #[inline]
    fn fn_backward(_x: &f64, _res: &f64, grad: &f64, sum_grad: &mut f64) {
        *sum_grad -= grad;
    }
}

struct Log;
impl UnaryOpT for Log {
    const OP: UnaryOp = UnaryOp::Log;
    #[inline]
    fn fn_op(x: f64) -> f64 {
        x.ln()
    }
    #[inline]
    fn fn_backward(x: &f64, _res: &f64, grad: &f64, sum_grad: &mut f64) {
        *sum_grad += grad / x;
    }
}

impl UnaryOp {
    #[inline]
    pub(super) const fn fn_op(&self) -> fn(f64) -> f64 {
        match self {
            Self::Neg => Neg::fn_op,
            Self::Log => Log::fn_op,
        }
    }
    #[inline]
    pub(super) const fn fn_backward(&self) -> fn(&f64, &f64, &f64, &mut f64) {
        match self {
            Self::Neg => Neg::fn_backward,
            Self::Log => Log::fn_backward,
        }
    }
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Log => "ln",
        }
    }
}

impl<'g> core::ops::Neg for Expr<'g> {
    type Output = Expr<'g>;
    /// # Panics
    ///
    /// See [`Graph::neg`] for the checked version.
    #[inline]
    fn neg(self) -> Self::Output {
        self.graph
            .unary_op::<Neg>(self.into())
            .unwrap_or_else(|e| panic!("{e}"))
    }
}
impl<'g> core::ops::Neg for &Expr<'g> {
    type Output = Expr<'g>;
    #[inline]
    fn neg(self) -> Self::Output {
        -*self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////
///////////////////////////////////   BinaryOp   ///////////////////////////////////////////
////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

trait BinaryOpT {
    const OP: BinaryOp;
    fn fn_op(lhs: f64, rhs: f64) -> f64;
    fn fn_backward_lhs(lhs: &f64, rhs: &f64, res: &f64, grad: &f64, lhs_grad: &mut f64);
    fn fn_backward_rhs(lhs: &f64, rhs: &f64, res: &f64, grad: &f64, rhs_grad: &mut f64);
}

struct Add;
impl BinaryOpT for Add {
    const OP: BinaryOp = BinaryOp::Add;
    #[inline]
    fn fn_op(lhs: f64, rhs: f64) -> f64 {
        lhs + rhs
    }
    #[inline]
    fn fn_backward_lhs(_lhs: &f64, _rhs: &f64, _res: &f64, grad: &f64, lhs_grad: &mut f64) {
        *lhs_grad += grad;
    }
    #[inline]
    fn fn_backward_rhs(_lhs: &f64, _rhs: &f64, _res: &f64, grad: &f64, rhs_grad: &mut f64) {
        *rhs_grad += grad;
    }
}

struct Sub;
impl BinaryOpT for Sub {
    const OP: BinaryOp = BinaryOp::Sub;
    #[inline]
    fn fn_op(lhs: f64, rhs: f64) -> f64 {
        lhs - rhs
    }
    #[inline]
    fn fn_backward_lhs(_lhs: &f64, _rhs: &f64, _res: &f64, grad: &f64, lhs_grad: &mut f64) {
        *lhs_grad += grad;
    }
    #[inline]
    fn fn_backward_rhs(_lhs: &f64, _rhs: &f64, _res: &f64, grad: &f64, rhs_grad: &mut f64) {
        *rhs_grad -= grad;
    }
}

struct Mul;
impl BinaryOpT for Mul {
    const OP: BinaryOp = BinaryOp::Mul;
    #[inline]
    fn fn_op(lhs: f64, rhs: f64) -> f64 {
        lhs * rhs
    }
    #[inline]
    fn fn_backward_lhs(_lhs: &f64, rhs: &f64, _res: &f64, grad: &f64, lhs_grad: &mut f64) {
        *lhs_grad += grad * rhs;
    }
    #[inline]
    fn fn_backward_rhs(lhs: &f64, _rhs: &f64, _res: &f64, grad: &f64, rhs_grad: &mut f64) {
        *rhs_grad += grad * lhs;
    }
}

struct Div;
impl BinaryOpT for Div {
    const OP: BinaryOp = BinaryOp::Div;
    #[inline]
    fn fn_op(lhs: f64, rhs: f64) -> f64 {
        lhs / rhs
    }
    #[inline]
    fn fn_backward_lhs(_lhs: &f64, rhs: &f64, _res: &f64, grad: &f64, lhs_grad: &mut f64) {
        *lhs_grad += grad / rhs;
    }
    /// $\frac{\partial}{\partial b} \frac{a}{b} = -\frac{c}{b}$ with $c = a / b$
    #[inline]
    fn fn_backward_rhs(_lhs: &f64, rhs: &f64, res: &f64, grad: &f64, rhs_grad: &mut f64) {
        *rhs_grad -= grad * res / rhs;
    }
}

struct Pow;
impl BinaryOpT for Pow {
    const OP: BinaryOp = BinaryOp::Pow;
    #[inline]
    fn fn_op(lhs: f64, rhs: f64) -> f64 {
        lhs.powf(rhs)
    }
    /// $ c = a^b $
    ///
    /// $\frac{\partial f}{\partial a} = \frac{\partial f}{\partial c} \cdot b \cdot a^{b - 1}$
    ///
    /// `res / lhs` is not used in place of `a^{b - 1}` since `a` may be zero.
    #[inline]
    fn fn_backward_lhs(lhs: &f64, rhs: &f64, _res: &f64, grad: &f64, lhs_grad: &mut f64) {
        *lhs_grad += grad * rhs * lhs.powf(rhs - 1.0);
    }
    /// $\frac{\partial f}{\partial b} = \frac{\partial f}{\partial c} \cdot c \cdot \ln(a)$
    #[inline]
    fn fn_backward_rhs(lhs: &f64, _rhs: &f64, res: &f64, grad: &f64, rhs_grad: &mut f64) {
        *rhs_grad += grad * res * lhs.ln();
    }
}

impl BinaryOp {
    #[inline]
    pub(super) const fn fn_op(&self) -> fn(f64, f64) -> f64 {
        match self {
            Self::Add => Add::fn_op,
            Self::Sub => Sub::fn_op,
            Self::Mul => Mul::fn_op,
            Self::Div => Div::fn_op,
            Self::Pow => Pow::fn_op,
        }
    }
    #[inline]
    pub(super) const fn fn_backward(&self) -> [fn(&f64, &f64, &f64, &f64, &mut f64); 2] {
        match self {
            Self::Add => [Add::fn_backward_lhs, Add::fn_backward_rhs],
            Self::Sub => [Sub::fn_backward_lhs, Sub::fn_backward_rhs],
            Self::Mul => [Mul::fn_backward_lhs, Mul::fn_backward_rhs],
            Self::Div => [Div::fn_backward_lhs, Div::fn_backward_rhs],
            Self::Pow => [Pow::fn_backward_lhs, Pow::fn_backward_rhs],
        }
    }
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
        }
    }
}

macro_rules! binary_trait {
    ($trait:ident, $fn:ident, $op:ident) => {
        impl<'g, R: Into<Operand<'g>>> core::ops::$trait<R> for Expr<'g> {
            type Output = Expr<'g>;
            #[inline]
            fn $fn(self, rhs: R) -> Expr<'g> {
                self.graph
                    .binary_op::<$op>(self.into(), rhs.into())
                    .unwrap_or_else(|e| panic!("{e}"))
            }
        }
        impl<'g, R: Into<Operand<'g>>> core::ops::$trait<R> for &Expr<'g> {
            type Output = Expr<'g>;
            #[inline]
            fn $fn(self, rhs: R) -> Expr<'g> {
                core::ops::$trait::$fn(*self, rhs)
            }
        }
        impl<'g> core::ops::$trait<Expr<'g>> for f64 {
            type Output = Expr<'g>;
            #[inline]
            fn $fn(self, rhs: Expr<'g>) -> Expr<'g> {
                rhs.graph
                    .binary_op::<$op>(self.into(), rhs.into())
                    .unwrap_or_else(|e| panic!("{e}"))
            }
        }
        impl<'g> core::ops::$trait<&Expr<'g>> for f64 {
            type Output = Expr<'g>;
            #[inline]
            fn $fn(self, rhs: &Expr<'g>) -> Expr<'g> {
                core::ops::$trait::$fn(self, *rhs)
            }
        }
    };
}

binary_trait!(Add, add, Add);
binary_trait!(Sub, sub, Sub);
binary_trait!(Mul, mul, Mul);
binary_trait!(Div, div, Div);

/// The operator overloads panic where the matching [`Graph`] builder returns
/// an error: on an operand owned by another graph or a non-finite number.
impl<'g> Expr<'g> {
    /// `self ^ rhs`.
    ///
    /// # Panics
    ///
    /// See [`Graph::pow`] for the checked version.
    #[inline]
    pub fn pow(&self, rhs: impl Into<Operand<'g>>) -> Expr<'g> {
        self.graph
            .binary_op::<Pow>(self.into(), rhs.into())
            .unwrap_or_else(|e| panic!("{e}"))
    }
    /// Natural logarithm.
    #[inline]
    pub fn ln(&self) -> Expr<'g> {
        self.graph
            .unary_op::<Log>(self.into())
            .unwrap_or_else(|e| panic!("{e}"))
    }
}

/// Checked builders. Numbers are promoted to constant nodes.
///
/// Fails with [`GraphError::InvalidOperand`](crate::GraphError::InvalidOperand)
/// when a node belongs to another graph or a number is not finite.
impl Graph {
    #[inline]
    pub fn add<'g>(
        &'g self,
        lhs: impl Into<Operand<'g>>,
        rhs: impl Into<Operand<'g>>,
    ) -> Result<Expr<'g>> {
        self.binary_op::<Add>(lhs.into(), rhs.into())
    }
    #[inline]
    pub fn sub<'g>(
        &'g self,
        lhs: impl Into<Operand<'g>>,
        rhs: impl Into<Operand<'g>>,
    ) -> Result<Expr<'g>> {
        self.binary_op::<Sub>(lhs.into(), rhs.into())
    }
    #[inline]
    pub fn mul<'g>(
        &'g self,
        lhs: impl Into<Operand<'g>>,
        rhs: impl Into<Operand<'g>>,
    ) -> Result<Expr<'g>> {
        self.binary_op::<Mul>(lhs.into(), rhs.into())
    }
    #[inline]
    pub fn div<'g>(
        &'g self,
        lhs: impl Into<Operand<'g>>,
        rhs: impl Into<Operand<'g>>,
    ) -> Result<Expr<'g>> {
        self.binary_op::<Div>(lhs.into(), rhs.into())
    }
    #[inline]
    pub fn pow<'g>(
        &'g self,
        lhs: impl Into<Operand<'g>>,
        rhs: impl Into<Operand<'g>>,
    ) -> Result<Expr<'g>> {
        self.binary_op::<Pow>(lhs.into(), rhs.into())
    }
    #[inline]
    pub fn neg<'g>(&'g self, x: impl Into<Operand<'g>>) -> Result<Expr<'g>> {
        self.unary_op::<Neg>(x.into())
    }
    /// Natural logarithm.
    #[inline]
    pub fn log<'g>(&'g self, x: impl Into<Operand<'g>>) -> Result<Expr<'g>> {
        self.unary_op::<Log>(x.into())
    }

    fn unary_op<'g, T: UnaryOpT>(&'g self, x: Operand<'g>) -> Result<Expr<'g>> {
        self.check_operand(&x)?;
        let x = self.intern(x);
        Ok(Expr::new(self, self.push(Op::Unary(x, T::OP))))
    }
    fn binary_op<'g, T: BinaryOpT>(&'g self, lhs: Operand<'g>, rhs: Operand<'g>) -> Result<Expr<'g>> {
        self.check_operand(&lhs)?;
        self.check_operand(&rhs)?;
        let lhs = self.intern(lhs);
        let rhs = self.intern(rhs);
        Ok(Expr::new(self, self.push(Op::Binary(lhs, rhs, T::OP))))
    }

    // Unchecked constructors used when building derivatives.
    pub(super) fn push_const(&self, value: f64) -> NodeId {
        self.push(Op::Const(value))
    }
    pub(super) fn push_unary(&self, x: NodeId, op: UnaryOp) -> NodeId {
        self.push(Op::Unary(x, op))
    }
    pub(super) fn push_binary(&self, lhs: NodeId, rhs: NodeId, op: BinaryOp) -> NodeId {
        self.push(Op::Binary(lhs, rhs, op))
    }
}
