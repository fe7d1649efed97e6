use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;

use crate::ast::{AttributeName, ComparisonOp, RelationName};
use crate::error::{Error, Result};
use crate::predicate::{compare_values, Bindings, Predicate};
use crate::value::{Tuple, Value};

/// A named table of tuples.
///
/// Relations are values: every operator builds a new relation and leaves its
/// inputs untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    name: RelationName,
    attributes: Vec<AttributeName>,
    tuples: Vec<Tuple>,
}

impl Relation {
    /// Fails with [`Error::Format`] if a tuple's length differs from the
    /// number of attributes.
    pub fn new(
        name: impl Into<RelationName>,
        attributes: Vec<AttributeName>,
        tuples: Vec<Tuple>,
    ) -> Result<Self> {
        if let Some(tuple) = tuples.iter().find(|t| t.len() != attributes.len()) {
            return Err(Error::Format(format!(
                "Tuple {} does not have the same number of elements as there are attributes ({})",
                tuple,
                attributes.len()
            )));
        }

        Ok(Self {
            name: name.into(),
            attributes,
            tuples,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[AttributeName] {
        &self.attributes
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    fn position(&self, attribute: &str) -> Result<usize> {
        self.attributes
            .iter()
            .position(|a| a == attribute)
            .ok_or_else(|| Error::UnknownAttribute(attribute.to_owned()))
    }

    fn derive(&self, name: RelationName, tuples: Vec<Tuple>) -> Relation {
        Relation {
            name,
            attributes: self.attributes.clone(),
            tuples,
        }
    }

    /// Keeps the tuples for which `predicate` holds, in their original order.
    pub fn select(&self, predicate: &Predicate) -> Result<Relation> {
        predicate.check_attributes(&self.attributes)?;

        let mut tuples = vec![];
        for tuple in &self.tuples {
            let row = Row::new(&self.attributes, tuple);
            if predicate.evaluate(&row)? {
                tuples.push(tuple.clone());
            }
        }

        Ok(self.derive(self.name.clone(), tuples))
    }

    /// Reduces every tuple to the requested attributes, in the requested
    /// order. Duplicate tuples in the result are kept.
    pub fn project<S: AsRef<str>>(&self, attributes: &[S]) -> Result<Relation> {
        let indices = attributes
            .iter()
            .map(|attribute| self.position(attribute.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Relation {
            name: self.name.clone(),
            attributes: attributes.iter().map(|a| a.as_ref().to_owned()).collect(),
            tuples: self.tuples.iter().map(|t| t.pick(&indices)).collect(),
        })
    }

    fn qualified_attributes(&self, other: &Relation) -> Vec<AttributeName> {
        let left = self.attributes.iter().map(|a| format!("{}_{}", self.name, a));
        let right = other.attributes.iter().map(|a| format!("{}_{}", other.name, a));
        left.chain(right).collect()
    }

    fn join_name(&self, other: &Relation) -> RelationName {
        format!("{} JOIN {}", self.name, other.name)
    }

    /// Nested-loop equi-join on `left_attribute == right_attribute`.
    ///
    /// Result attributes are qualified with their relation's name, left
    /// relation first.
    pub fn join(
        &self,
        other: &Relation,
        left_attribute: &str,
        right_attribute: &str,
    ) -> Result<Relation> {
        let left_index = self.position(left_attribute)?;
        let right_index = other.position(right_attribute)?;

        let mut tuples = vec![];
        for left in &self.tuples {
            for right in &other.tuples {
                let (l, r) = (&left.values()[left_index], &right.values()[right_index]);
                if compare_values(l, ComparisonOp::Eq, r)? {
                    tuples.push(left.concat(right));
                }
            }
        }

        Ok(Relation {
            name: self.join_name(other),
            attributes: self.qualified_attributes(other),
            tuples,
        })
    }

    /// Nested-loop join on an arbitrary predicate over the qualified
    /// attribute names of both sides.
    pub fn theta_join(&self, other: &Relation, predicate: &Predicate) -> Result<Relation> {
        let attributes = self.qualified_attributes(other);
        predicate.check_attributes(&attributes)?;

        let mut tuples = vec![];
        for left in &self.tuples {
            for right in &other.tuples {
                let joined = left.concat(right);
                if predicate.evaluate(&Row::new(&attributes, &joined))? {
                    tuples.push(joined);
                }
            }
        }

        Ok(Relation {
            name: self.join_name(other),
            attributes,
            tuples,
        })
    }

    fn check_compatible(&self, other: &Relation, operation: &'static str) -> Result<()> {
        if self.attributes != other.attributes {
            return Err(Error::AttributeMismatch {
                operation,
                left: self.attributes.clone(),
                right: other.attributes.clone(),
            });
        }
        Ok(())
    }

    /// Set union: each distinct tuple of either side appears once, in order
    /// of first occurrence.
    pub fn union(&self, other: &Relation) -> Result<Relation> {
        self.check_compatible(other, "union")?;

        let tuples = self
            .tuples
            .iter()
            .chain(&other.tuples)
            .unique()
            .cloned()
            .collect();

        Ok(self.derive(format!("{} UNION {}", self.name, other.name), tuples))
    }

    /// Every tuple of `self` that does not occur in `other`. Duplicates on
    /// the left are kept.
    pub fn difference(&self, other: &Relation) -> Result<Relation> {
        self.check_compatible(other, "difference")?;

        let excluded: HashSet<&Tuple> = other.tuples.iter().collect();
        let tuples = self
            .tuples
            .iter()
            .filter(|t| !excluded.contains(t))
            .cloned()
            .collect();

        Ok(self.derive(format!("{} DIFFERENCE {}", self.name, other.name), tuples))
    }
}

/// Binds a relation's attribute names to one tuple's values.
struct Row<'a> {
    attributes: &'a [AttributeName],
    tuple: &'a Tuple,
}

impl<'a> Row<'a> {
    fn new(attributes: &'a [AttributeName], tuple: &'a Tuple) -> Self {
        Self { attributes, tuple }
    }
}

impl Bindings for Row<'_> {
    fn lookup(&self, attribute: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .position(|a| a == attribute)
            .and_then(|i| self.tuple.get(i))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}({}) = {{", self.name, self.attributes.iter().join(", "))?;
        for tuple in &self.tuples {
            writeln!(f, "{}", tuple)?;
        }
        write!(f, "}}")
    }
}
