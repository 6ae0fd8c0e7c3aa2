//! Field values, kinds, and query-by-example search operators.

use std::cmp::Ordering;
use std::fmt;

// ---------------------------------------------------------------------------
// FieldKind
// ---------------------------------------------------------------------------

/// The type of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Text,
    Boolean,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "an integer"),
            Self::Text => write!(f, "a text"),
            Self::Boolean => write!(f, "a boolean"),
        }
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A non-null field or column value. Null is modelled as `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Integer(i64),
    Text(String),
    Boolean(bool),
}

impl Value {
    /// The kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Integer(_) => FieldKind::Integer,
            Self::Text(_) => FieldKind::Text,
            Self::Boolean(_) => FieldKind::Boolean,
        }
    }

    /// The integer payload, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// The text payload, if this is a text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Compare two values of the same kind. Values of different kinds are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

// ---------------------------------------------------------------------------
// SearchOperator
// ---------------------------------------------------------------------------

/// Comparison used when a field takes part in query-by-example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchOperator {
    #[default]
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
}

impl SearchOperator {
    /// All operators, in the order they are offered to the user.
    pub const ALL: [SearchOperator; 6] = [
        Self::Eq,
        Self::Lt,
        Self::Gt,
        Self::Le,
        Self::Ge,
        Self::Ne,
    ];

    /// SQL-style symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Ne => "<>",
        }
    }

    /// Whether `candidate <op> pattern` holds. Text equality matches a
    /// trailing `*` as a prefix wildcard.
    pub fn matches(self, candidate: &Value, pattern: &Value) -> bool {
        if self == Self::Eq {
            if let (Value::Text(c), Value::Text(p)) = (candidate, pattern) {
                if let Some(prefix) = p.strip_suffix('*') {
                    return c.starts_with(prefix);
                }
            }
        }
        let Some(ord) = candidate.compare(pattern) else {
            return false;
        };
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Gt => ord == Ordering::Greater,
            Self::Le => ord != Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
            Self::Ne => ord != Ordering::Equal,
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
