//! Field: a typed value holder bound to database columns.
//!
//! A [`Field`] keeps one value slot per record of its block. Slots are kept in
//! step with the block's records by the block itself; the `*_record` methods
//! here are crate-internal for that reason.

use std::fmt;

use crate::error::{ValidationError, ValidationFailure};

use super::value::{FieldKind, SearchOperator, Value};

/// A field-level check. Returns a user-facing reason on rejection.
pub type FieldCheck = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A typed, per-record value holder.
pub struct Field {
    name: String,
    kind: FieldKind,
    columns: Vec<String>,
    mandatory: bool,
    accessible: bool,
    default: Option<Value>,
    operator: SearchOperator,
    checks: Vec<FieldCheck>,
    values: Vec<Option<Value>>,
}

impl Field {
    /// Create an accessible, optional field of the given kind with no columns.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: Vec::new(),
            mandatory: false,
            accessible: true,
            default: None,
            operator: SearchOperator::default(),
            checks: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Shorthand for an integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Shorthand for a text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Bind a column (builder). The first bound column is the one written on
    /// save; later ones are read-only aliases from joined tables.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Mark the field mandatory (builder).
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    /// Set whether the field can receive focus (builder).
    pub fn accessible(mut self, accessible: bool) -> Self {
        self.accessible = accessible;
        self
    }

    /// Set the default value applied by `set_default` (builder).
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Add a field-level check (builder).
    pub fn with_check(
        mut self,
        check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// All bound columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The primary (written) column, if any.
    pub fn column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    pub(crate) fn set_accessible(&mut self, accessible: bool) {
        self.accessible = accessible;
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn search_operator(&self) -> SearchOperator {
        self.operator
    }

    pub fn set_search_operator(&mut self, operator: SearchOperator) {
        self.operator = operator;
    }

    // ── Values ───────────────────────────────────────────────────────

    /// The value in `record`, or `None` if null or out of range.
    pub fn value(&self, record: usize) -> Option<&Value> {
        self.values.get(record).and_then(Option::as_ref)
    }

    pub fn is_null(&self, record: usize) -> bool {
        self.value(record).is_none()
    }

    /// Store a value, rejecting values of the wrong kind.
    pub(crate) fn store(
        &mut self,
        record: usize,
        value: Option<Value>,
    ) -> Result<(), ValidationError> {
        if let Some(v) = &value {
            if v.kind() != self.kind {
                return Err(ValidationError::new(
                    &self.name,
                    record,
                    ValidationFailure::WrongKind { expected: self.kind },
                ));
            }
        }
        match self.values.get_mut(record) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ValidationError::new(
                &self.name,
                record,
                ValidationFailure::Rejected(format!("record {record} does not exist")),
            )),
        }
    }

    /// Check the value of `record` against the field's rules.
    ///
    /// `enforce_mandatory` is off in query mode, where empty fields simply do
    /// not take part in the search.
    pub fn validate(&self, record: usize, enforce_mandatory: bool) -> Result<(), ValidationError> {
        match self.value(record) {
            None if enforce_mandatory && self.mandatory => Err(ValidationError::new(
                &self.name,
                record,
                ValidationFailure::Missing,
            )),
            None => Ok(()),
            Some(value) => {
                for check in &self.checks {
                    check(value).map_err(|reason| {
                        ValidationError::new(&self.name, record, ValidationFailure::Rejected(reason))
                    })?;
                }
                Ok(())
            }
        }
    }

    /// Integer arithmetic on this field, if it is an integer field.
    pub fn arithmetic(&mut self) -> Option<IntegerArithmetic<'_>> {
        (self.kind == FieldKind::Integer).then_some(IntegerArithmetic { field: self })
    }

    // ── Record slots ─────────────────────────────────────────────────

    pub(crate) fn resize_records(&mut self, count: usize) {
        self.values.resize(count, None);
    }

    pub(crate) fn insert_record(&mut self, index: usize) {
        let index = index.min(self.values.len());
        self.values.insert(index, None);
    }

    pub(crate) fn remove_record(&mut self, index: usize) {
        if index < self.values.len() {
            self.values.remove(index);
        }
    }

    pub(crate) fn clear_record(&mut self, index: usize) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = None;
        }
    }

    /// Apply the default to a null slot. Returns whether a value was written.
    pub(crate) fn apply_default(&mut self, index: usize) -> bool {
        match (self.values.get_mut(index), &self.default) {
            (Some(slot @ None), Some(default)) => {
                *slot = Some(default.clone());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<Option<Value>> {
        self.values.clone()
    }

    pub(crate) fn restore(&mut self, values: Vec<Option<Value>>) {
        self.values = values;
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("columns", &self.columns)
            .field("mandatory", &self.mandatory)
            .field("accessible", &self.accessible)
            .field("operator", &self.operator)
            .field("checks", &self.checks.len())
            .field("values", &self.values)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// IntegerArithmetic
// ---------------------------------------------------------------------------

/// Integer capability of a field, handed out only for integer fields.
pub struct IntegerArithmetic<'a> {
    field: &'a mut Field,
}

impl IntegerArithmetic<'_> {
    /// The integer in `record`, or `None` if null.
    pub fn get(&self, record: usize) -> Option<i64> {
        self.field.value(record).and_then(Value::as_integer)
    }

    /// Store an integer in `record`.
    pub fn set(&mut self, record: usize, value: i64) -> Result<(), ValidationError> {
        self.field.store(record, Some(Value::Integer(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty() -> Field {
        let mut field = Field::integer("qty").with_column("qty").mandatory(true);
        field.resize_records(2);
        field
    }

    #[test]
    fn new_defaults() {
        let field = Field::text("name");
        assert_eq!(field.name(), "name");
        assert_eq!(field.kind(), FieldKind::Text);
        assert!(field.column().is_none());
        assert!(field.is_accessible());
        assert!(!field.is_mandatory());
        assert_eq!(field.search_operator(), SearchOperator::Eq);
    }

    #[test]
    fn first_column_is_primary() {
        let field = Field::text("name")
            .with_column("name")
            .with_column("customer_name");
        assert_eq!(field.column(), Some("name"));
        assert_eq!(field.columns().len(), 2);
    }

    #[test]
    fn store_rejects_wrong_kind() {
        let mut field = qty();
        let err = field.store(0, Some(Value::from("five"))).unwrap_err();
        assert_eq!(
            err.failure,
            ValidationFailure::WrongKind {
                expected: FieldKind::Integer
            }
        );
    }

    #[test]
    fn store_out_of_range_is_rejected() {
        let mut field = qty();
        assert!(field.store(5, Some(Value::from(1))).is_err());
    }

    #[test]
    fn mandatory_only_enforced_on_request() {
        let field = qty();
        assert!(field.validate(0, false).is_ok());
        let err = field.validate(0, true).unwrap_err();
        assert_eq!(err.failure, ValidationFailure::Missing);
    }

    #[test]
    fn checks_run_on_present_values() {
        let mut field = qty().with_check(|v| match v.as_integer() {
            Some(n) if n < 0 => Err("must not be negative".into()),
            _ => Ok(()),
        });
        field.store(0, Some(Value::from(-1))).unwrap();
        let err = field.validate(0, true).unwrap_err();
        assert_eq!(
            err.failure,
            ValidationFailure::Rejected("must not be negative".into())
        );
    }

    #[test]
    fn arithmetic_only_for_integers() {
        let mut name = Field::text("name");
        assert!(name.arithmetic().is_none());

        let mut field = qty();
        let mut arith = field.arithmetic().unwrap();
        assert_eq!(arith.get(0), None);
        arith.set(0, 7).unwrap();
        assert_eq!(arith.get(0), Some(7));
    }

    #[test]
    fn default_only_fills_nulls() {
        let mut field = qty().with_default(1);
        assert!(field.apply_default(0));
        assert_eq!(field.value(0), Some(&Value::from(1)));

        field.store(1, Some(Value::from(9))).unwrap();
        assert!(!field.apply_default(1));
        assert_eq!(field.value(1), Some(&Value::from(9)));
    }

    #[test]
    fn record_slots_follow_inserts_and_removes() {
        let mut field = qty();
        field.store(0, Some(Value::from(1))).unwrap();
        field.insert_record(0);
        assert!(field.is_null(0));
        assert_eq!(field.value(1), Some(&Value::from(1)));

        field.remove_record(0);
        assert_eq!(field.value(0), Some(&Value::from(1)));
    }
}
