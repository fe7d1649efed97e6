use std::collections::HashMap;
use std::iter::FromIterator;

use log::debug;

use crate::ast::{Operation, Query, RelationName};
use crate::error::{Error, Result};
use crate::parser::{parse_query, parse_relation};
use crate::predicate::Predicate;
use crate::relation::Relation;

const SAMPLE_RELATIONS: [&str; 4] = [
    "Employees (EID, Name, Age, DID) = {E1, John, 32, D1\nE2, Alice, 28, D2\nE3, Bob, 29, D2}",
    "Departments (DID, Name) = {D1, Sales\nD2, Marketing\nD3, Engineering}",
    "Table1 (a1, a2) = {1, 2\n3, 4}",
    "Table2 (a1, a2) = {1, 2\n5, 6}",
];

/// Name lookup for the relations a query refers to.
pub trait Catalog {
    fn lookup(&self, name: &str) -> Option<&Relation>;

    fn resolve(&self, name: &str) -> Result<&Relation> {
        self.lookup(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_owned()))
    }
}

impl Catalog for HashMap<RelationName, Relation> {
    fn lookup(&self, name: &str) -> Option<&Relation> {
        self.get(name)
    }
}

/// Relations by name, kept in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Database {
    relations: Vec<Relation>,
    by_name: HashMap<RelationName, usize>,
}

impl From<Vec<Relation>> for Database {
    fn from(relations: Vec<Relation>) -> Self {
        relations.into_iter().collect()
    }
}

impl FromIterator<Relation> for Database {
    fn from_iter<I: IntoIterator<Item = Relation>>(relations: I) -> Self {
        let mut database = Database::default();
        for relation in relations {
            database.insert(relation);
        }
        database
    }
}

impl Catalog for Database {
    fn lookup(&self, name: &str) -> Option<&Relation> {
        self.get(name)
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// The employee, department and two-table relations used to demonstrate
    /// the query language.
    pub fn sample() -> Self {
        SAMPLE_RELATIONS
            .iter()
            .map(|code| parse_relation(code).expect("sample relations are well-formed"))
            .collect()
    }

    /// Adds a relation, replacing and returning any relation of the same
    /// name. A replaced relation keeps its position.
    pub fn insert(&mut self, relation: Relation) -> Option<Relation> {
        match self.by_name.get(relation.name()) {
            Some(&index) => Some(std::mem::replace(&mut self.relations[index], relation)),
            None => {
                self.by_name
                    .insert(relation.name().to_owned(), self.relations.len());
                self.relations.push(relation);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Relation> {
        self.by_name.get(name).map(|&index| &self.relations[index])
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn query(&self, code: &str) -> Result<Relation> {
        evaluate_query(self, code)
    }
}

/// Parses `code` and evaluates it against `catalog`.
pub fn evaluate_query<C: Catalog + ?Sized>(catalog: &C, code: &str) -> Result<Relation> {
    let query = parse_query(code)?;
    execute_query(catalog, &query)
}

/// Applies each operation in order, starting from the base relation. Unary
/// operations transform the running result; binary operations replace it
/// with a result computed from their named operands.
pub fn execute_query<C: Catalog + ?Sized>(catalog: &C, query: &Query) -> Result<Relation> {
    let mut current = match &query.base {
        Some(name) => Some(catalog.resolve(name)?.clone()),
        None => None,
    };

    for operation in &query.operations {
        debug!(
            "applying {} to {:?}",
            operation.name(),
            current.as_ref().map(Relation::name)
        );
        current = Some(execute_operation(catalog, current.as_ref(), operation)?);
    }

    current.ok_or_else(|| Error::QuerySyntax("Empty query".to_owned()))
}

fn execute_operation<C: Catalog + ?Sized>(
    catalog: &C,
    input: Option<&Relation>,
    operation: &Operation,
) -> Result<Relation> {
    match operation {
        Operation::Select(predicate) => {
            let predicate = predicate.parse::<Predicate>()?;
            unary_input(input, operation)?.select(&predicate)
        }

        Operation::Project(attributes) => unary_input(input, operation)?.project(attributes),

        Operation::Join {
            left,
            right,
            left_attribute,
            right_attribute,
        } => catalog
            .resolve(left)?
            .join(catalog.resolve(right)?, left_attribute, right_attribute),

        Operation::Union(left, right) => catalog.resolve(left)?.union(catalog.resolve(right)?),

        Operation::Difference(left, right) => {
            catalog.resolve(left)?.difference(catalog.resolve(right)?)
        }
    }
}

fn unary_input<'a>(input: Option<&'a Relation>, operation: &Operation) -> Result<&'a Relation> {
    input.ok_or_else(|| {
        Error::QuerySyntax(format!(
            "{} has no input relation: join, union and difference cannot be nested inside another operation",
            operation.name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Relation {
        parse_relation(&format!("{} (a) = {{1}}", name)).unwrap()
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut database = Database::new();
        assert!(database.insert(table("B")).is_none());
        assert!(database.insert(table("A")).is_none());

        let replacement = parse_relation("B (x, y) = {1, 2}").unwrap();
        let replaced = database.insert(replacement.clone()).unwrap();
        assert_eq!(replaced.attributes(), ["a"]);

        let names: Vec<_> = database.relations().map(Relation::name).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(database.get("B"), Some(&replacement));
        assert_eq!(database.len(), 2);
    }

    #[test]
    fn test_sample() {
        let database = Database::sample();
        let names: Vec<_> = database.relations().map(Relation::name).collect();
        assert_eq!(names, ["Employees", "Departments", "Table1", "Table2"]);
        assert_eq!(database.get("Employees").map(Relation::len), Some(3));
    }

    #[test]
    fn test_hash_map_catalog() {
        let catalog: HashMap<RelationName, Relation> = vec![("T".to_owned(), table("T"))]
            .into_iter()
            .collect();
        assert_eq!(evaluate_query(&catalog, "T").unwrap(), table("T"));
        assert_eq!(
            evaluate_query(&catalog, "U"),
            Err(Error::UnknownRelation("U".to_owned()))
        );
    }
}
