//! Data access collaborator: rows, criteria, transactions, and their errors.
//!
//! Blocks never talk to a database directly. They receive a
//! `&mut dyn Transaction` from the transaction runner, which obtained it from
//! a [`DataSource`].

use std::collections::BTreeMap;
use std::fmt;

use crate::error::FailureClass;
use crate::form::value::{SearchOperator, Value};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Database id of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Column name to value. Absent columns are null.
pub type Columns = BTreeMap<String, Value>;

/// Column assignments for an update. `None` sets the column to null.
pub type Assignments = BTreeMap<String, Option<Value>>;

/// A row read from or written to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RecordId,
    pub columns: Columns,
}

impl Row {
    pub fn new(id: RecordId, columns: Columns) -> Self {
        Self { id, columns }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// One query-by-example condition: `column <operator> value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    pub column: String,
    pub operator: SearchOperator,
    pub value: Value,
}

/// A conjunction of conditions. Empty criteria match every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    conditions: Vec<Criterion>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition (builder).
    pub fn with(mut self, column: impl Into<String>, operator: SearchOperator, value: Value) -> Self {
        self.push(column, operator, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, operator: SearchOperator, value: Value) {
        self.conditions.push(Criterion {
            column: column.into(),
            operator,
            value,
        });
    }

    pub fn conditions(&self) -> &[Criterion] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `columns` satisfies every condition. A null column never matches.
    pub fn matches(&self, columns: &Columns) -> bool {
        self.conditions.iter().all(|c| {
            columns
                .get(&c.column)
                .is_some_and(|v| c.operator.matches(v, &c.value))
        })
    }
}

// ---------------------------------------------------------------------------
// Isolation
// ---------------------------------------------------------------------------

/// Transaction isolation level requested when beginning a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

// ---------------------------------------------------------------------------
// DbError
// ---------------------------------------------------------------------------

/// Failure reported by the data layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    #[error("deadlock detected: {0}")]
    Deadlock(String),
    #[error("serialization failure: {0}")]
    Serialization(String),
    #[error("connection interrupted: {0}")]
    Interrupted(String),
    #[error("sql error: {0}")]
    Sql(String),
    #[error("no row {id} in `{table}`")]
    NotFound { table: String, id: RecordId },
}

impl DbError {
    /// Deadlocks and serialization conflicts go away when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Deadlock(_) | Self::Serialization(_))
    }

    pub fn class(&self) -> FailureClass {
        if self.is_transient() {
            FailureClass::Retryable
        } else {
            FailureClass::Fatal
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Lazily produced query results.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row, DbError>> + 'a>;

/// An open transaction. Dropping it without `commit` must roll back.
pub trait Transaction {
    /// Read one row by id.
    fn fetch_by_id(&mut self, table: &str, id: RecordId) -> Result<Row, DbError>;

    /// Rows matching `criteria`, in id order.
    fn query(&mut self, table: &str, criteria: &Criteria) -> Result<RowIter<'_>, DbError>;

    /// Insert a row and return its new id.
    fn insert(&mut self, table: &str, columns: Columns) -> Result<RecordId, DbError>;

    /// Assign columns of an existing row. Columns not named keep their value.
    fn update(&mut self, table: &str, id: RecordId, changes: &Assignments) -> Result<(), DbError>;

    /// Delete a row.
    fn delete(&mut self, table: &str, id: RecordId) -> Result<(), DbError>;

    fn commit(self: Box<Self>) -> Result<(), DbError>;

    fn rollback(self: Box<Self>) -> Result<(), DbError>;
}

/// Something transactions can be started on.
pub trait DataSource: Send + Sync {
    fn begin(&self, isolation: IsolationLevel) -> Result<Box<dyn Transaction + '_>, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(pairs: &[(&str, Value)]) -> Columns {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_criteria_match_everything() {
        assert!(Criteria::new().matches(&Columns::new()));
    }

    #[test]
    fn criteria_are_a_conjunction() {
        let row = columns(&[("qty", Value::from(5)), ("name", Value::from("bolt"))]);
        let both = Criteria::new()
            .with("qty", SearchOperator::Gt, Value::from(3))
            .with("name", SearchOperator::Eq, Value::from("b*"));
        assert!(both.matches(&row));

        let one_fails = both.with("qty", SearchOperator::Lt, Value::from(5));
        assert!(!one_fails.matches(&row));
    }

    #[test]
    fn null_column_never_matches() {
        let criteria = Criteria::new().with("qty", SearchOperator::Ne, Value::from(1));
        assert!(!criteria.matches(&Columns::new()));
    }

    #[test]
    fn transient_errors() {
        assert!(DbError::Deadlock("x".into()).is_transient());
        assert!(DbError::Serialization("x".into()).is_transient());
        assert!(!DbError::Interrupted("x".into()).is_transient());
        assert!(!DbError::Sql("x".into()).is_transient());
        assert_eq!(DbError::Sql("x".into()).class(), FailureClass::Fatal);
    }

    #[test]
    fn record_id_display() {
        assert_eq!(RecordId(42).to_string(), "#42");
    }
}
