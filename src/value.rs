use std::fmt::{self, Write};

use itertools::Itertools;
use num_bigint::BigInt;

/// A single scalar stored in a tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Integer(BigInt),
    Text(String),
}

impl Value {
    /// Coerces one field of a relation literal.
    ///
    /// Surrounding whitespace is dropped. A field wrapped in matching single
    /// or double quotes is text with the quotes removed and backslash escapes
    /// resolved; otherwise the field is an integer if the whole of it parses
    /// as a base-10 integer, and text if it doesn't.
    pub fn from_field(field: &str) -> Self {
        let field = field.trim();
        if let Some(quoted) = strip_quotes(field) {
            return Value::Text(unescape(quoted));
        }
        match field.parse::<BigInt>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(field.to_owned()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
        }
    }
}

fn strip_quotes(field: &str) -> Option<&str> {
    ['\'', '"'].iter().find_map(|&quote| {
        if field.len() >= 2 && field.starts_with(quote) && field.ends_with(quote) {
            Some(&field[1..field.len() - 1])
        } else {
            None
        }
    })
}

/// Resolves backslash escapes inside quoted text. `\n`, `\t` and `\r` are
/// control characters; any other escaped character stands for itself.
pub(crate) fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some('r') => unescaped.push('\r'),
            Some(other) => unescaped.push(other),
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

/// Writes text quoted so that `from_field` reads it back: single quotes
/// unless the text contains `'` and no `"`.
fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    f.write_char(quote)?;
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Text(s) => write_quoted(f, s),
        }
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Integer(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// One row of a relation. Positionally aligned with the relation's
/// attribute list and never modified after construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tuple(Vec<Value>);

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// The values at `indices`, in that order. Indices may repeat.
    pub(crate) fn pick(&self, indices: &[usize]) -> Tuple {
        Tuple(indices.iter().map(|&i| self.0[i].clone()).collect())
    }

    pub(crate) fn concat(&self, other: &Tuple) -> Tuple {
        Tuple(self.0.iter().chain(&other.0).cloned().collect())
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "({},)", single),
            values => write!(f, "({})", values.iter().join(", ")),
        }
    }
}
