pub mod ast;
pub mod database;
pub mod error;
pub mod parser;
pub mod predicate;
pub mod relation;
pub mod value;

#[cfg(test)]
mod tests;

pub use database::{evaluate_query, Catalog, Database};
pub use error::{Error, Result};
pub use parser::{parse_query, parse_relation, parse_relations};
pub use predicate::Predicate;
pub use relation::Relation;
pub use value::{Tuple, Value};
