use crate::value::Value;

pub type Identifier = String;
pub type RelationName = Identifier;
pub type AttributeName = Identifier;

/// A parsed query: the relation the chain starts from and the operations to
/// apply to it, in application order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    /// `None` when the chain ends in a binary operation, which names its own
    /// operands.
    pub base: Option<RelationName>,
    pub operations: Vec<Operation>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Select(String),
    Project(Vec<AttributeName>),
    Join {
        left: RelationName,
        right: RelationName,
        left_attribute: AttributeName,
        right_attribute: AttributeName,
    },
    Union(RelationName, RelationName),
    Difference(RelationName, RelationName),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Select(_) => "select",
            Operation::Project(_) => "project",
            Operation::Join { .. } => "join",
            Operation::Union(..) => "union",
            Operation::Difference(..) => "difference",
        }
    }
}

/// Predicate expression tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Literal(Value),
    Attribute(AttributeName),
    Negate(Box<Expr>),
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `first op1 second op2 third ...`, which holds when every adjacent pair
    /// compares true.
    Comparison {
        first: Box<Expr>,
        rest: Vec<(ComparisonOp, Expr)>,
    },
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Every attribute name the expression refers to.
    pub fn attributes(&self) -> Vec<&AttributeName> {
        let mut names = vec![];
        self.collect_attributes(&mut names);
        names
    }

    fn collect_attributes<'a>(&'a self, names: &mut Vec<&'a AttributeName>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Attribute(name) => names.push(name),
            Expr::Negate(inner) | Expr::Not(inner) => inner.collect_attributes(names),
            Expr::Arithmetic { lhs, rhs, .. } => {
                lhs.collect_attributes(names);
                rhs.collect_attributes(names);
            }
            Expr::Comparison { first, rest } => {
                first.collect_attributes(names);
                for (_, operand) in rest {
                    operand.collect_attributes(names);
                }
            }
            Expr::And(operands) | Expr::Or(operands) => {
                for operand in operands {
                    operand.collect_attributes(names);
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
}
