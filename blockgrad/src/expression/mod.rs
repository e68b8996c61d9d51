mod autograd;
mod deriv;
mod impls;
mod op;
mod recompute;

pub use op::{BinaryOp, UnaryOp};

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    ptr,
    rc::Rc,
};

use itertools::Itertools;

use crate::{ConfigError, GraphConfig, GraphError, Result};
use autograd::GradId;
use op::Op;

/// Index of a node inside its [`Graph`].
///
/// Operands are always pushed before the node using them, so a child id is
/// strictly smaller than its parent's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Variables a subtree depends on, by name.
type VarTable = BTreeMap<Rc<str>, NodeId>;

/// A named, mutable and gradient-accumulating leaf.
#[derive(Clone, Debug)]
struct Variable {
    name: Rc<str>,
    value: Option<f64>,
    grad: f64,
    clip: f64,
}

#[derive(Debug)]
struct Node {
    op: Op,
    /// Last forward result, stamped with the epoch it was computed in.
    output: Option<(f64, u64)>,
    scope: VarTable,
}

/// What a node is, without its operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Constant,
    Variable,
    Unary(UnaryOp),
    Binary(BinaryOp),
}

/// Arena owning every node of one or more expressions.
///
/// A graph is single threaded: it uses interior mutability so that handles
/// can be shared freely while variables are bound and gradients accumulated.
#[derive(Debug)]
pub struct Graph {
    nodes: RefCell<Vec<Node>>,
    names: RefCell<BTreeMap<Rc<str>, NodeId>>,
    epoch: Cell<u64>,
    config: GraphConfig,
}

/// Handle to a node of a [`Graph`].
#[derive(Clone, Copy)]
pub struct Expr<'g> {
    graph: &'g Graph,
    id: NodeId,
}

/// Operand accepted by the graph builders: an existing node or a number,
/// promoted to a constant node.
#[derive(Clone, Copy, Debug)]
pub enum Operand<'g> {
    Node(Expr<'g>),
    Scalar(f64),
}

impl<'g> From<Expr<'g>> for Operand<'g> {
    #[inline]
    fn from(expr: Expr<'g>) -> Self {
        Self::Node(expr)
    }
}
impl<'g> From<&Expr<'g>> for Operand<'g> {
    #[inline]
    fn from(expr: &Expr<'g>) -> Self {
        Self::Node(*expr)
    }
}
impl From<f64> for Operand<'_> {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::build(GraphConfig::default())
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_config(config: GraphConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }
    fn build(config: GraphConfig) -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
            names: RefCell::new(BTreeMap::new()),
            epoch: Cell::new(0),
            config,
        }
    }
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }
    /// Number of nodes, including the ones built by `deriv` and `forward_partial`.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }
    /// Sorted names of every variable created in this graph.
    pub fn variable_names(&self) -> Vec<String> {
        self.names.borrow().keys().map(|name| name.to_string()).collect()
    }
    pub fn lookup(&self, name: &str) -> Option<Expr<'_>> {
        let id = self.names.borrow().get(name).copied();
        id.map(|id| Expr::new(self, id))
    }

    pub fn constant(&self, value: f64) -> Result<Expr<'_>> {
        check_finite(value)?;
        Ok(Expr::new(self, self.push(Op::Const(value))))
    }
    /// The variable called `name`, created unbound if it does not exist yet.
    pub fn variable(&self, name: &str) -> Expr<'_> {
        if let Some(existing) = self.lookup(name) {
            return existing;
        }
        let name: Rc<str> = Rc::from(name);
        let id = self.push(Op::Var(Variable {
            name: name.clone(),
            value: None,
            grad: 0.0,
            clip: self.config.default_clip,
        }));
        self.names.borrow_mut().insert(name, id);
        Expr::new(self, id)
    }
    /// Like [`Graph::variable`], and sets the clip of the variable.
    pub fn variable_with_clip(&self, name: &str, clip: f64) -> Result<Expr<'_>> {
        let var = self.variable(name);
        var.set_clip(clip)?;
        Ok(var)
    }

    /// Zero the gradient accumulator of every variable.
    pub fn reset_gradients(&self) {
        let names = self.names.borrow();
        let mut nodes = self.nodes.borrow_mut();
        for id in names.values() {
            if let Op::Var(var) = &mut nodes[id.0].op {
                var.grad = 0.0;
            }
        }
    }
    /// Start a new round: every cached output becomes stale and every
    /// accumulator is zeroed.
    pub fn begin_round(&self) {
        self.reset_gradients();
        self.advance_epoch();
        log::debug!("begin round, epoch {}", self.epoch());
    }

    #[inline]
    fn epoch(&self) -> u64 {
        self.epoch.get()
    }
    #[inline]
    fn advance_epoch(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }
    fn push(&self, op: Op) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        let scope = match &op {
            Op::Const(_) => VarTable::new(),
            Op::Var(var) => VarTable::from([(var.name.clone(), id)]),
            Op::Unary(x, _) => nodes[x.0].scope.clone(),
            Op::Binary(lhs, rhs, _) => {
                let mut scope = nodes[lhs.0].scope.clone();
                scope.extend(nodes[rhs.0].scope.iter().map(|(k, v)| (k.clone(), *v)));
                scope
            }
        };
        nodes.push(Node {
            op,
            output: None,
            scope,
        });
        id
    }
    fn check_operand(&self, operand: &Operand<'_>) -> Result<()> {
        match operand {
            Operand::Node(expr) if !ptr::eq(expr.graph, self) => Err(GraphError::InvalidOperand {
                reason: format!("node {} belongs to a different graph", expr.id),
            }),
            Operand::Node(_) => Ok(()),
            Operand::Scalar(v) => check_finite(*v),
        }
    }
    /// Node id of an operand already accepted by [`Graph::check_operand`].
    fn intern(&self, operand: Operand<'_>) -> NodeId {
        match operand {
            Operand::Node(expr) => expr.id,
            Operand::Scalar(v) => self.push(Op::Const(v)),
        }
    }

    /// Return all the nodes that lead to `root`, ordered parents first.
    fn sorted_nodes(&self, root: NodeId) -> Vec<GradId> {
        let nodes = self.nodes.borrow();
        let mut seen = std::collections::BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if seen.insert(GradId(id)) {
                match &nodes[id.0].op {
                    Op::Const(_) | Op::Var(_) => (),
                    Op::Unary(x, _) => stack.push(*x),
                    Op::Binary(lhs, rhs, _) => {
                        stack.push(*lhs);
                        stack.push(*rhs);
                    }
                }
            }
        }
        seen.into_iter().collect()
    }
}

fn check_finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GraphError::InvalidOperand {
            reason: format!("{value} is not a finite number"),
        })
    }
}

impl<'g> Expr<'g> {
    #[inline]
    fn new(graph: &'g Graph, id: NodeId) -> Self {
        Self { graph, id }
    }
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }
    #[inline]
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }
    pub fn kind(&self) -> NodeKind {
        match &self.graph.nodes.borrow()[self.id.0].op {
            Op::Const(_) => NodeKind::Constant,
            Op::Var(_) => NodeKind::Variable,
            Op::Unary(_, op) => NodeKind::Unary(*op),
            Op::Binary(_, _, op) => NodeKind::Binary(*op),
        }
    }
    pub fn is_constant(&self) -> bool {
        self.kind() == NodeKind::Constant
    }
    pub fn is_variable(&self) -> bool {
        self.kind() == NodeKind::Variable
    }
    /// Name of a variable node.
    pub fn name(&self) -> Option<String> {
        self.with_variable(|var| var.name.to_string())
    }
    /// Stored value of a leaf: the constant, or the bound value of a variable.
    pub fn value(&self) -> Option<f64> {
        match &self.graph.nodes.borrow()[self.id.0].op {
            Op::Const(v) => Some(*v),
            Op::Var(var) => var.value,
            Op::Unary(..) | Op::Binary(..) => None,
        }
    }
    /// Output of the last forward pass, if it belongs to the current epoch.
    pub fn output(&self) -> Option<f64> {
        let epoch = self.graph.epoch();
        match self.graph.nodes.borrow()[self.id.0].output {
            Some((v, stamp)) if stamp == epoch => Some(v),
            _ => None,
        }
    }
    /// Gradient accumulated by a variable node.
    pub fn grad(&self) -> Option<f64> {
        self.with_variable(|var| var.grad)
    }
    pub fn clip(&self) -> Option<f64> {
        self.with_variable(|var| var.clip)
    }
    pub fn set_clip(&self, clip: f64) -> Result<()> {
        if clip.is_nan() || clip <= 0.0 {
            return Err(GraphError::InvalidOperand {
                reason: format!("clip must be positive, got {clip}"),
            });
        }
        match &mut self.graph.nodes.borrow_mut()[self.id.0].op {
            Op::Var(var) => {
                var.clip = clip;
                Ok(())
            }
            _ => Err(self.not_a_variable()),
        }
    }
    /// Sorted names of the variables this expression depends on.
    pub fn variables(&self) -> Vec<String> {
        self.graph.nodes.borrow()[self.id.0]
            .scope
            .keys()
            .map(|name| name.to_string())
            .collect()
    }
    pub fn depends_on(&self, name: &str) -> bool {
        self.graph.nodes.borrow()[self.id.0].scope.contains_key(name)
    }

    /// Id of the variable `name` in this expression's scope.
    fn scoped(&self, name: &str) -> Result<NodeId> {
        let nodes = self.graph.nodes.borrow();
        let scope = &nodes[self.id.0].scope;
        scope
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownVariable {
                name: name.to_string(),
                known: scope.keys().join(", "),
            })
    }
    fn not_a_variable(&self) -> GraphError {
        GraphError::InvalidOperand {
            reason: format!("node {} is not a variable", self.id),
        }
    }
    fn with_variable<T>(&self, f: impl FnOnce(&Variable) -> T) -> Option<T> {
        match &self.graph.nodes.borrow()[self.id.0].op {
            Op::Var(var) => Some(f(var)),
            _ => None,
        }
    }
}
