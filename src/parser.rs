use std::borrow::BorrowMut;

use log::trace;
use num_bigint::BigInt;
use pest::Parser as _;
use pest_derive::Parser;

use crate::ast::{ArithmeticOp, ComparisonOp, Expr, Identifier, Operation, Query};
use crate::error::{Error, Result};
use crate::relation::Relation;
use crate::value::{unescape, Tuple, Value};

#[derive(Parser)]
#[grammar = "raql.pest"]
struct Parser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

/// Parses a single relation literal such as
/// `Employees (EID, Name) = {E1, John\nE2, Alice}`.
pub fn parse_relation(code: &str) -> Result<Relation> {
    let literal = Parser::parse(Rule::relation_literal, code)
        .map_err(|e| Error::Format(e.to_string()))?
        .next()
        .expect("missing relation literal");

    convert_relation(expect_next_rule(literal.into_inner(), Rule::relation))
}

/// Parses any number of relation literals, optionally separated by blank
/// lines.
pub fn parse_relations(code: &str) -> Result<Vec<Relation>> {
    let file = Parser::parse(Rule::relation_file, code)
        .map_err(|e| Error::Format(e.to_string()))?
        .next()
        .expect("missing relation file");

    file.into_inner()
        .take_while(|pair| pair.as_rule() != Rule::EOI)
        .map(convert_relation)
        .collect()
}

/// Parses a query into its base relation and the operations to apply, in
/// the order they are written (outermost first).
pub fn parse_query(code: &str) -> Result<Query> {
    let query = Parser::parse(Rule::query, code)
        .map_err(|e| query_error(code, e))?
        .next()
        .expect("missing query");

    let mut operations = vec![];
    let mut pair = query.into_inner().next().expect("missing query chain");
    let base = loop {
        match pair.as_rule() {
            Rule::application => {
                let mut pairs = pair.into_inner();
                let operator = expect_next_rule(&mut pairs, Rule::operator);
                let argument = expect_next_rule(&mut pairs, Rule::argument);
                operations.push(convert_application(operator.as_str(), argument.as_str())?);
                pair = pairs.next().expect("missing inner chain");
            }

            Rule::join_op => {
                let mut pairs = pair.into_inner();
                operations.push(Operation::Join {
                    left: expect_name(&mut pairs, Rule::relation_name),
                    right: expect_name(&mut pairs, Rule::relation_name),
                    left_attribute: expect_name(&mut pairs, Rule::attribute),
                    right_attribute: expect_name(&mut pairs, Rule::attribute),
                });
                break None;
            }

            Rule::union_op => {
                let (left, right) = convert_operands(pair);
                operations.push(Operation::Union(left, right));
                break None;
            }

            Rule::difference_op => {
                let (left, right) = convert_operands(pair);
                operations.push(Operation::Difference(left, right));
                break None;
            }

            Rule::relation_name => break Some(pair.as_str().to_owned()),

            _ => unreachable!(),
        }
    };

    trace!("parsed query {:?}: base {:?}, {:?}", code, base, operations);
    Ok(Query { base, operations })
}

/// Parses a predicate expression such as `Age > 30 and DID == 'D1'`.
pub fn parse_predicate(code: &str) -> Result<Expr> {
    let predicate = Parser::parse(Rule::predicate, code)
        .map_err(|e| Error::PredicateSyntax(e.to_string()))?
        .next()
        .expect("missing predicate");

    Ok(convert_disjunction(expect_next_rule(
        predicate.into_inner(),
        Rule::disjunction,
    )))
}

fn query_error(code: &str, error: pest::error::Error<Rule>) -> Error {
    let code = code.trim_start();
    let keyword = ["join", "union", "difference"].iter().find(|keyword| {
        code.strip_prefix(**keyword)
            .map_or(false, |rest| rest.trim_start().starts_with('('))
    });

    match keyword {
        Some(keyword) => Error::QuerySyntax(format!(
            "Invalid {} operation format\n{}",
            keyword, error
        )),
        None => Error::QuerySyntax(error.to_string()),
    }
}

fn expect_next_rule<'a, P: BorrowMut<Pairs<'a>>>(mut pairs: P, rule: Rule) -> Pair<'a> {
    let pair = pairs.borrow_mut().next().expect("missing pair");
    assert_eq!(pair.as_rule(), rule);
    pair
}

fn expect_name<'a, P: BorrowMut<Pairs<'a>>>(pairs: P, rule: Rule) -> Identifier {
    expect_next_rule(pairs, rule).as_str().to_owned()
}

fn convert_relation(pair: Pair) -> Result<Relation> {
    assert_eq!(pair.as_rule(), Rule::relation);
    let mut pairs = pair.into_inner();

    let name = expect_name(&mut pairs, Rule::relation_name);
    let attributes = expect_next_rule(&mut pairs, Rule::attributes)
        .into_inner()
        .map(|pair| pair.as_str().trim().to_owned())
        .collect();
    let tuples = expect_next_rule(&mut pairs, Rule::rows)
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::row)
        .map(|row| {
            row.into_inner()
                .map(|field| Value::from_field(field.as_str()))
                .collect::<Vec<_>>()
        })
        .map(Tuple::from)
        .collect();

    Relation::new(name, attributes, tuples)
}

fn convert_application(operator: &str, argument: &str) -> Result<Operation> {
    match operator {
        "select" => Ok(Operation::Select(argument.trim().to_owned())),
        "project" => Ok(Operation::Project(
            argument.split(',').map(|a| a.trim().to_owned()).collect(),
        )),
        "join" | "union" | "difference" => Err(Error::QuerySyntax(format!(
            "Invalid {} operation format",
            operator
        ))),
        _ => Err(Error::QuerySyntax(format!(
            "Unknown operation {:?}",
            operator
        ))),
    }
}

fn convert_operands(pair: Pair) -> (Identifier, Identifier) {
    let mut pairs = pair.into_inner();
    let left = expect_name(&mut pairs, Rule::relation_name);
    let right = expect_name(&mut pairs, Rule::relation_name);
    (left, right)
}

/// Builds `Or`/`And` nodes only when there is more than one operand.
fn flatten(mut operands: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        combine(operands)
    }
}

fn convert_disjunction(pair: Pair) -> Expr {
    let operands = pair
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::conjunction)
        .map(convert_conjunction)
        .collect();
    flatten(operands, Expr::Or)
}

fn convert_conjunction(pair: Pair) -> Expr {
    let operands = pair
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::negation)
        .map(convert_negation)
        .collect();
    flatten(operands, Expr::And)
}

fn convert_negation(pair: Pair) -> Expr {
    let mut pairs = pair.into_inner();
    let first = pairs.next().expect("empty negation");
    match first.as_rule() {
        Rule::not_keyword => Expr::Not(Box::new(convert_negation(expect_next_rule(
            pairs,
            Rule::negation,
        )))),
        Rule::comparison => convert_comparison(first),
        _ => unreachable!(),
    }
}

fn convert_comparison(pair: Pair) -> Expr {
    let mut pairs = pair.into_inner();
    let first = convert_sum(expect_next_rule(&mut pairs, Rule::sum));

    let mut rest = vec![];
    while let Some(op) = pairs.next() {
        let op = match op.as_str() {
            "==" => ComparisonOp::Eq,
            "!=" => ComparisonOp::Ne,
            "<" => ComparisonOp::Lt,
            ">" => ComparisonOp::Gt,
            "<=" => ComparisonOp::Le,
            ">=" => ComparisonOp::Ge,
            _ => unreachable!(),
        };
        rest.push((op, convert_sum(expect_next_rule(&mut pairs, Rule::sum))));
    }

    if rest.is_empty() {
        first
    } else {
        Expr::Comparison {
            first: Box::new(first),
            rest,
        }
    }
}

/// Folds `operand (op operand)*` left-associatively.
fn fold_arithmetic(pair: Pair, convert: fn(Pair) -> Expr) -> Expr {
    let mut pairs = pair.into_inner();
    let mut lhs = convert(pairs.next().expect("missing operand"));

    while let Some(op) = pairs.next() {
        let op = match op.as_str() {
            "+" => ArithmeticOp::Add,
            "-" => ArithmeticOp::Sub,
            "*" => ArithmeticOp::Mul,
            "/" | "//" => ArithmeticOp::FloorDiv,
            "%" => ArithmeticOp::Mod,
            _ => unreachable!(),
        };
        let rhs = convert(pairs.next().expect("missing operand"));
        lhs = Expr::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }

    lhs
}

fn convert_sum(pair: Pair) -> Expr {
    fold_arithmetic(pair, convert_term)
}

fn convert_term(pair: Pair) -> Expr {
    fold_arithmetic(pair, convert_factor)
}

fn convert_factor(pair: Pair) -> Expr {
    let mut pairs = pair.into_inner();
    let first = pairs.next().expect("empty factor");
    match first.as_rule() {
        Rule::minus => Expr::Negate(Box::new(convert_factor(expect_next_rule(
            pairs,
            Rule::factor,
        )))),
        Rule::integer => Expr::Literal(Value::Integer(
            first
                .as_str()
                .parse::<BigInt>()
                .expect("integer literal is all digits"),
        )),
        Rule::string => {
            let interior = first.into_inner().next().expect("missing string interior");
            Expr::Literal(Value::Text(unescape(interior.as_str())))
        }
        Rule::identifier => Expr::Attribute(first.as_str().to_owned()),
        Rule::disjunction => convert_disjunction(first),
        _ => unreachable!(),
    }
}
