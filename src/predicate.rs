//! Sandboxed predicates for `select` and theta joins.
//!
//! A predicate is parsed once into an [`Expr`] tree and then evaluated by
//! walking the tree against the attribute bindings of one tuple. The only
//! names an expression can see are the bound attributes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, Sign};

use crate::ast::{ArithmeticOp, AttributeName, ComparisonOp, Expr};
use crate::error::{Error, Result};
use crate::parser::parse_predicate;
use crate::value::Value;

/// Attribute-name to value lookup used while evaluating a predicate.
pub trait Bindings {
    fn lookup(&self, attribute: &str) -> Option<&Value>;
}

impl Bindings for HashMap<AttributeName, Value> {
    fn lookup(&self, attribute: &str) -> Option<&Value> {
        self.get(attribute)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.trim().to_owned(),
            expr: parse_predicate(source)?,
        })
    }

    /// Fails with [`Error::UnknownAttribute`] for the first attribute the
    /// predicate mentions that is not in `attributes`.
    pub fn check_attributes(&self, attributes: &[AttributeName]) -> Result<()> {
        match self
            .expr
            .attributes()
            .into_iter()
            .find(|name| !attributes.contains(name))
        {
            Some(name) => Err(Error::UnknownAttribute(name.clone())),
            None => Ok(()),
        }
    }

    pub fn evaluate<B: Bindings + ?Sized>(&self, bindings: &B) -> Result<bool> {
        match eval(&self.expr, bindings)? {
            Scalar::Boolean(b) => Ok(b),
            Scalar::Value(value) => Err(Error::TypeMismatch(format!(
                "predicate `{}` evaluated to {} {}, not a boolean",
                self.source,
                value.type_name(),
                value
            ))),
        }
    }
}

impl FromStr for Predicate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Intermediate result of evaluating a subexpression.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Scalar {
    Value(Value),
    Boolean(bool),
}

impl Scalar {
    fn type_name(&self) -> &'static str {
        match self {
            Scalar::Value(value) => value.type_name(),
            Scalar::Boolean(_) => "boolean",
        }
    }

    fn truth(self) -> Result<bool> {
        match self {
            Scalar::Boolean(b) => Ok(b),
            other => Err(Error::TypeMismatch(format!(
                "expected a boolean, found {} {}",
                other.type_name(),
                other
            ))),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Value(value) => write!(f, "{}", value),
            Scalar::Boolean(b) => write!(f, "{}", b),
        }
    }
}

fn eval<B: Bindings + ?Sized>(expr: &Expr, bindings: &B) -> Result<Scalar> {
    match expr {
        Expr::Literal(value) => Ok(Scalar::Value(value.clone())),

        Expr::Attribute(name) => bindings
            .lookup(name)
            .cloned()
            .map(Scalar::Value)
            .ok_or_else(|| Error::UnknownAttribute(name.clone())),

        Expr::Negate(operand) => match eval(operand, bindings)? {
            Scalar::Value(Value::Integer(n)) => Ok(Scalar::Value(Value::Integer(-n))),
            other => Err(Error::TypeMismatch(format!(
                "cannot negate {} {}",
                other.type_name(),
                other
            ))),
        },

        Expr::Arithmetic { op, lhs, rhs } => {
            let lhs = eval(lhs, bindings)?;
            let rhs = eval(rhs, bindings)?;
            arithmetic(*op, lhs, rhs).map(Scalar::Value)
        }

        Expr::Comparison { first, rest } => {
            let mut lhs = eval(first, bindings)?;
            for (op, operand) in rest {
                let rhs = eval(operand, bindings)?;
                if !compare(&lhs, *op, &rhs)? {
                    return Ok(Scalar::Boolean(false));
                }
                lhs = rhs;
            }
            Ok(Scalar::Boolean(true))
        }

        Expr::Not(operand) => Ok(Scalar::Boolean(!eval(operand, bindings)?.truth()?)),

        Expr::And(operands) => {
            for operand in operands {
                if !eval(operand, bindings)?.truth()? {
                    return Ok(Scalar::Boolean(false));
                }
            }
            Ok(Scalar::Boolean(true))
        }

        Expr::Or(operands) => {
            for operand in operands {
                if eval(operand, bindings)?.truth()? {
                    return Ok(Scalar::Boolean(true));
                }
            }
            Ok(Scalar::Boolean(false))
        }
    }
}

fn compare(lhs: &Scalar, op: ComparisonOp, rhs: &Scalar) -> Result<bool> {
    match (lhs, rhs) {
        (Scalar::Value(a), Scalar::Value(b)) => compare_values(a, op, b),
        (Scalar::Boolean(a), Scalar::Boolean(b)) if op == ComparisonOp::Eq => Ok(a == b),
        (Scalar::Boolean(a), Scalar::Boolean(b)) if op == ComparisonOp::Ne => Ok(a != b),
        _ => Err(mismatch(lhs, op, rhs)),
    }
}

/// Integers compare numerically and text lexicographically; comparing an
/// integer with text is an error.
pub(crate) fn compare_values(lhs: &Value, op: ComparisonOp, rhs: &Value) -> Result<bool> {
    let ordering = match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        _ => {
            return Err(mismatch(
                &Scalar::Value(lhs.clone()),
                op,
                &Scalar::Value(rhs.clone()),
            ))
        }
    };

    Ok(match op {
        ComparisonOp::Eq => ordering.is_eq(),
        ComparisonOp::Ne => ordering.is_ne(),
        ComparisonOp::Lt => ordering.is_lt(),
        ComparisonOp::Gt => ordering.is_gt(),
        ComparisonOp::Le => ordering.is_le(),
        ComparisonOp::Ge => ordering.is_ge(),
    })
}

fn mismatch(lhs: &Scalar, op: ComparisonOp, rhs: &Scalar) -> Error {
    Error::TypeMismatch(format!(
        "cannot compare {} {} {} {} {}",
        lhs.type_name(),
        lhs,
        op,
        rhs.type_name(),
        rhs
    ))
}

fn arithmetic(op: ArithmeticOp, lhs: Scalar, rhs: Scalar) -> Result<Value> {
    match (op, lhs, rhs) {
        (op, Scalar::Value(Value::Integer(a)), Scalar::Value(Value::Integer(b))) => {
            let n = match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Sub => a - b,
                ArithmeticOp::Mul => a * b,
                ArithmeticOp::FloorDiv => floor_div_mod(&a, &b)?.0,
                ArithmeticOp::Mod => floor_div_mod(&a, &b)?.1,
            };
            Ok(Value::Integer(n))
        }
        (ArithmeticOp::Add, Scalar::Value(Value::Text(a)), Scalar::Value(Value::Text(b))) => {
            Ok(Value::Text(a + &b))
        }
        (op, lhs, rhs) => Err(Error::TypeMismatch(format!(
            "unsupported operands for {}: {} {} and {} {}",
            op,
            lhs.type_name(),
            lhs,
            rhs.type_name(),
            rhs
        ))),
    }
}

/// Division rounding towards negative infinity, with the remainder taking
/// the sign of the divisor.
fn floor_div_mod(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt)> {
    if b.sign() == Sign::NoSign {
        return Err(Error::DivisionByZero);
    }

    let quotient = a / b;
    let remainder = a % b;
    if remainder.sign() != Sign::NoSign && remainder.sign() != b.sign() {
        Ok((quotient - BigInt::from(1), remainder + b))
    } else {
        Ok((quotient, remainder))
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
            ComparisonOp::Le => "<=",
            ComparisonOp::Ge => ">=",
        })
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::FloorDiv => "//",
            ArithmeticOp::Mod => "%",
        })
    }
}
