//! Block: the mode state machine of a group of fields bound to one table.
//!
//! A block is either single-record (one record, plus a fetch cursor over the
//! ids of its last query) or multi-record (a buffer of up to `buffer_size`
//! records). Its mode decides what the record in front of the user means:
//!
//! ```text
//!   QUERY  --load/fetch_record--> UPDATE
//!   QUERY  --set_mode(Insert)---> INSERT
//!   UPDATE --set_mode(Insert)---> INSERT
//!   INSERT --save + clear-------> INSERT | QUERY
//!   UPDATE --save---------------> UPDATE (next record) | QUERY
//!   UPDATE --delete-------------> UPDATE (neighbour)   | QUERY
//! ```
//!
//! Database work goes through a `&mut dyn Transaction` handed in by the
//! transaction runner. Every operation that can fail mid-way is undone by the
//! runner through [`Rollback`].

use std::fmt;

use slotmap::{new_key_type, SlotMap};

use crate::db::source::{Assignments, Columns, Criteria, RecordId, Row, Transaction};
use crate::db::transaction::Rollback;
use crate::error::{BlockError, OverflowWarning, ValidationError};
use crate::navigation::FocusChain;

use super::field::Field;
use super::record::{FetchCursor, Record};
use super::value::Value;

new_key_type! {
    /// Stable handle to a field of a block.
    pub struct FieldId;
}

// ---------------------------------------------------------------------------
// Mode / BlockKind
// ---------------------------------------------------------------------------

/// What the records of a block currently represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Field values are search criteria.
    #[default]
    Query,
    /// The record is new and not yet stored.
    Insert,
    /// The record mirrors a fetched row.
    Update,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("QUERY"),
            Self::Insert => f.write_str("INSERT"),
            Self::Update => f.write_str("UPDATE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Exactly one record, navigated through the fetch cursor.
    Single,
    /// Up to `buffer_size` records shown at once.
    Multi { buffer_size: usize },
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Block {
    name: String,
    title: String,
    table: String,
    kind: BlockKind,
    mode: Mode,
    accessible: bool,
    fields: SlotMap<FieldId, Field>,
    order: Vec<FieldId>,
    records: Vec<Record>,
    active_record: Option<usize>,
    focus: FocusChain,
    cursor: FetchCursor,
}

impl Block {
    fn new(name: impl Into<String>, table: impl Into<String>, kind: BlockKind) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            table: table.into(),
            kind,
            mode: Mode::Query,
            accessible: true,
            fields: SlotMap::with_key(),
            order: Vec::new(),
            records: Vec::new(),
            active_record: None,
            focus: FocusChain::new(),
            cursor: FetchCursor::default(),
        }
    }

    /// A single-record block on `table`.
    pub fn single(name: impl Into<String>, table: impl Into<String>) -> Self {
        let mut block = Self::new(name, table, BlockKind::Single);
        block.records.push(Record::default());
        block.active_record = Some(0);
        block
    }

    /// A multi-record block holding at most `buffer_size` records. Starts empty.
    pub fn multi(name: impl Into<String>, table: impl Into<String>, buffer_size: usize) -> Self {
        Self::new(name, table, BlockKind::Multi { buffer_size })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Add a field (builder).
    pub fn with_field(mut self, field: Field) -> Self {
        self.add_field(field);
        self
    }

    /// Set whether the block can be entered (builder).
    pub fn accessible(mut self, accessible: bool) -> Self {
        self.accessible = accessible;
        self
    }

    /// Add a field at the end of the tab order.
    pub fn add_field(&mut self, mut field: Field) -> FieldId {
        field.resize_records(self.records.len());
        let id = self.fields.insert(field);
        self.order.push(id);
        self.rebuild_focus_chain();
        id
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn is_multi(&self) -> bool {
        matches!(self.kind, BlockKind::Multi { .. })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            tracing::debug!(block = %self.name, from = %self.mode, to = %mode, "mode change");
            self.mode = mode;
        }
    }

    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    pub fn set_accessible(&mut self, accessible: bool) {
        self.accessible = accessible;
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id)
    }

    pub fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.get_mut(id)
    }

    /// Look a field up by name.
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.order
            .iter()
            .copied()
            .find(|&id| self.fields[id].name() == name)
    }

    /// Fields in tab order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &Field)> + '_ {
        self.order.iter().map(move |&id| (id, &self.fields[id]))
    }

    /// Change a field's accessibility. Inaccessible fields leave the focus chain.
    pub fn set_field_accessible(&mut self, id: FieldId, accessible: bool) {
        if let Some(field) = self.fields.get_mut(id) {
            field.set_accessible(accessible);
            self.rebuild_focus_chain();
        }
    }

    pub fn focus_chain(&self) -> &FocusChain {
        &self.focus
    }

    pub fn focus_chain_mut(&mut self) -> &mut FocusChain {
        &mut self.focus
    }

    /// The field that has focus.
    pub fn active_field(&self) -> Option<FieldId> {
        self.focus.current_field()
    }

    pub fn fetch_cursor(&self) -> &FetchCursor {
        &self.cursor
    }

    fn rebuild_focus_chain(&mut self) {
        let accessible: Vec<FieldId> = self
            .order
            .iter()
            .copied()
            .filter(|&id| self.fields[id].is_accessible())
            .collect();
        self.focus.rebuild(accessible);
    }

    // ── Records ──────────────────────────────────────────────────────

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn active_record(&self) -> Option<usize> {
        self.active_record
    }

    /// Make `index` the active record. An out-of-range index leaves the block
    /// without an active record and returns `false`.
    pub fn goto_record(&mut self, index: usize) -> bool {
        self.active_record = (index < self.records.len()).then_some(index);
        self.active_record.is_some()
    }

    /// Validate the active record before the user leaves it.
    pub fn leave_record(&self) -> Result<(), ValidationError> {
        match self.active_record {
            Some(record) => self.validate_record(record),
            None => Ok(()),
        }
    }

    /// Whether any record was changed.
    pub fn is_changed(&self) -> bool {
        self.records.iter().any(|r| r.changed)
    }

    pub fn is_record_changed(&self, record: usize) -> bool {
        self.records.get(record).is_some_and(|r| r.changed)
    }

    pub fn set_record_changed(&mut self, record: usize, changed: bool) {
        if let Some(r) = self.records.get_mut(record) {
            r.changed = changed;
        }
    }

    pub fn is_record_fetched(&self, record: usize) -> bool {
        self.records.get(record).is_some_and(|r| r.fetched)
    }

    /// Set the fetched flag. Unfetching forgets the row id.
    pub fn set_record_fetched(&mut self, record: usize, fetched: bool) {
        if let Some(r) = self.records.get_mut(record) {
            r.fetched = fetched;
            if !fetched {
                r.id = None;
            }
        }
    }

    /// Insert an empty record at `position` (clamped to the end).
    ///
    /// # Errors
    ///
    /// [`BlockError::NoFreeLine`] when the buffer is full,
    /// [`BlockError::Internal`] on a single-record block.
    pub fn insert_empty_record(&mut self, position: usize) -> Result<usize, BlockError> {
        let BlockKind::Multi { buffer_size } = self.kind else {
            return Err(BlockError::Internal(format!(
                "cannot insert a line into single-record block `{}`",
                self.name
            )));
        };
        if self.records.len() >= buffer_size {
            return Err(BlockError::NoFreeLine {
                block: self.name.clone(),
            });
        }
        let position = position.min(self.records.len());
        self.records.insert(position, Record::default());
        for field in self.fields.values_mut() {
            field.insert_record(position);
        }
        self.active_record = Some(position);
        Ok(position)
    }

    fn remove_record(&mut self, index: usize) {
        if index >= self.records.len() {
            return;
        }
        self.records.remove(index);
        for field in self.fields.values_mut() {
            field.remove_record(index);
        }
        self.active_record = match self.records.len() {
            0 => None,
            len => Some(index.min(len - 1)),
        };
    }

    fn resize_records(&mut self, count: usize) {
        self.records.resize(count, Record::default());
        for field in self.fields.values_mut() {
            field.resize_records(count);
        }
    }

    fn clear_record(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.reset();
        }
        for field in self.fields.values_mut() {
            field.clear_record(index);
        }
    }

    /// The active record, creating the first line of an empty multi block.
    fn ensure_active_record(&mut self) -> Result<usize, BlockError> {
        if let Some(record) = self.active_record {
            return Ok(record);
        }
        if self.records.is_empty() {
            return self.insert_empty_record(0);
        }
        self.active_record = Some(0);
        Ok(0)
    }

    // ── Values ───────────────────────────────────────────────────────

    pub fn value(&self, field: FieldId, record: usize) -> Option<&Value> {
        self.fields.get(field).and_then(|f| f.value(record))
    }

    /// Store a value and mark the record changed.
    pub fn set_value(
        &mut self,
        field: FieldId,
        record: usize,
        value: Option<Value>,
    ) -> Result<(), BlockError> {
        let f = self
            .fields
            .get_mut(field)
            .ok_or_else(|| BlockError::Internal(format!("unknown field in block `{}`", self.name)))?;
        f.store(record, value)?;
        self.set_record_changed(record, true);
        Ok(())
    }

    /// Apply field defaults to null slots of the active record.
    pub fn set_default(&mut self) {
        let Some(record) = self.active_record else {
            return;
        };
        for field in self.fields.values_mut() {
            field.apply_default(record);
        }
    }

    /// Clear every record. Single blocks keep their one (now empty) record;
    /// multi blocks become empty. The mode is left alone.
    pub fn clear(&mut self) {
        match self.kind {
            BlockKind::Single => self.clear_record(0),
            BlockKind::Multi { .. } => {
                self.resize_records(0);
                self.active_record = None;
            }
        }
        self.cursor.clear();
    }

    /// First accessible field of the active record that holds no value.
    pub fn first_unfilled_field(&self) -> Option<FieldId> {
        let record = self.active_record?;
        self.order
            .iter()
            .copied()
            .find(|&id| self.fields[id].is_accessible() && self.fields[id].is_null(record))
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Check the records a save would write.
    ///
    /// Single blocks check their record; multi blocks check every changed
    /// record. Mandatory fields are only enforced outside query mode, and only
    /// for accessible fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.kind {
            BlockKind::Single => self.validate_record(0),
            BlockKind::Multi { .. } => (0..self.records.len())
                .filter(|&r| self.records[r].changed)
                .try_for_each(|r| self.validate_record(r)),
        }
    }

    fn validate_record(&self, record: usize) -> Result<(), ValidationError> {
        let enforce = self.mode != Mode::Query;
        self.fields()
            .try_for_each(|(_, field)| field.validate(record, enforce && field.is_accessible()))
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Query-by-example criteria from the active record's values.
    pub fn criteria(&self) -> Criteria {
        let mut criteria = Criteria::new();
        let Some(record) = self.active_record else {
            return criteria;
        };
        for (_, field) in self.fields() {
            if let (Some(column), Some(value)) = (field.column(), field.value(record)) {
                criteria.push(column, field.search_operator(), value.clone());
            }
        }
        criteria
    }

    /// Fetch row `id` into the active record and switch to UPDATE.
    ///
    /// On a single block the fetch cursor is reset to this one row.
    pub fn fetch_record(&mut self, tx: &mut dyn Transaction, id: RecordId) -> Result<(), BlockError> {
        let record = self.ensure_active_record()?;
        self.fetch_into(tx, record, id)?;
        if !self.is_multi() {
            self.cursor.reset([id]);
            self.cursor.seek(0);
        }
        self.set_mode(Mode::Update);
        Ok(())
    }

    /// Load the rows matching the current criteria.
    ///
    /// A single block keeps up to `cap` ids in its fetch cursor and shows the
    /// first; a multi block fills up to `min(cap, buffer_size)` records. When
    /// more rows match, the kept part is loaded and a warning returned.
    ///
    /// # Errors
    ///
    /// [`BlockError::NoData`] when nothing matches.
    pub fn load(
        &mut self,
        tx: &mut dyn Transaction,
        cap: usize,
    ) -> Result<Option<OverflowWarning>, BlockError> {
        let limit = match self.kind {
            BlockKind::Single => cap,
            BlockKind::Multi { buffer_size } => cap.min(buffer_size),
        };
        let (rows, overflow) = self.query_rows(tx, limit)?;
        let Some(first) = rows.first() else {
            return Err(BlockError::NoData);
        };

        match self.kind {
            BlockKind::Single => {
                self.fill_record(0, first)?;
                self.cursor.reset(rows.iter().map(|row| row.id));
                self.cursor.seek(0);
            }
            BlockKind::Multi { .. } => {
                self.clear();
                self.resize_records(rows.len());
                for (index, row) in rows.iter().enumerate() {
                    self.fill_record(index, row)?;
                }
                self.active_record = Some(0);
            }
        }
        self.set_mode(Mode::Update);

        let warning = overflow.then_some(OverflowWarning {
            cap: limit,
            kept: rows.len(),
        });
        if let Some(warning) = &warning {
            tracing::warn!(block = %self.name, %warning, "query overflow");
        }
        Ok(warning)
    }

    /// Candidates for a record picker: `(id, title)` of up to `cap` matching
    /// rows, the title joining the row's field values.
    pub fn lookup(
        &self,
        tx: &mut dyn Transaction,
        cap: usize,
    ) -> Result<Vec<(RecordId, String)>, BlockError> {
        let (rows, overflow) = self.query_rows(tx, cap)?;
        if overflow {
            tracing::warn!(block = %self.name, cap, "lookup overflow");
        }
        Ok(rows
            .iter()
            .map(|row| (row.id, self.row_title(row)))
            .collect())
    }

    fn row_title(&self, row: &Row) -> String {
        let parts: Vec<String> = self
            .fields()
            .filter_map(|(_, f)| f.columns().iter().find_map(|c| row.get(c)))
            .map(ToString::to_string)
            .collect();
        if parts.is_empty() {
            row.id.to_string()
        } else {
            parts.join(" | ")
        }
    }

    /// Up to `limit` matching rows, and whether more were available.
    fn query_rows(
        &self,
        tx: &mut dyn Transaction,
        limit: usize,
    ) -> Result<(Vec<Row>, bool), BlockError> {
        let criteria = self.criteria();
        let mut iter = tx.query(&self.table, &criteria)?;
        let mut rows = Vec::new();
        while rows.len() < limit {
            match iter.next() {
                Some(row) => rows.push(row?),
                None => return Ok((rows, false)),
            }
        }
        let overflow = iter.next().transpose()?.is_some();
        Ok((rows, overflow))
    }

    /// Move the fetch cursor `step` rows (negative goes back), skipping deleted
    /// rows, and fetch the row found.
    ///
    /// # Errors
    ///
    /// [`BlockError::NoMoreRecords`] when no row is left in that direction.
    pub fn fetch_next_record(&mut self, tx: &mut dyn Transaction, step: isize) -> Result<(), BlockError> {
        if self.is_multi() {
            return Err(BlockError::Internal(format!(
                "multi-record block `{}` has no fetch cursor",
                self.name
            )));
        }
        let (position, id) = self.cursor.find(step).ok_or(BlockError::NoMoreRecords)?;
        self.fetch_into(tx, 0, id)?;
        self.cursor.seek(position);
        self.set_mode(Mode::Update);
        Ok(())
    }

    fn fetch_into(
        &mut self,
        tx: &mut dyn Transaction,
        record: usize,
        id: RecordId,
    ) -> Result<(), BlockError> {
        let row = tx.fetch_by_id(&self.table, id)?;
        self.fill_record(record, &row)
    }

    fn fill_record(&mut self, record: usize, row: &Row) -> Result<(), BlockError> {
        for field in self.fields.values_mut() {
            let value = field.columns().iter().find_map(|c| row.get(c)).cloned();
            field.store(record, value).map_err(|err| {
                BlockError::Internal(format!("row {} does not fit block `{}`: {err}", row.id, self.name))
            })?;
        }
        let slot = self
            .records
            .get_mut(record)
            .ok_or_else(|| BlockError::Internal(format!("record {record} out of range")))?;
        *slot = Record {
            id: Some(row.id),
            fetched: true,
            changed: false,
        };
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Write the block to the database.
    ///
    /// INSERT mode inserts and keeps the new id; UPDATE mode updates the
    /// fetched row. A multi block writes each changed record, inserting those
    /// that were never fetched.
    pub fn save(&mut self, tx: &mut dyn Transaction) -> Result<(), BlockError> {
        if self.mode == Mode::Query {
            return Err(BlockError::InvalidMode {
                operation: "save",
                mode: self.mode,
            });
        }
        match self.kind {
            BlockKind::Single => match self.mode {
                Mode::Update => self.update_record(tx, 0),
                _ => self.insert_record(tx, 0),
            },
            BlockKind::Multi { .. } => {
                for record in 0..self.records.len() {
                    let Record { fetched, changed, .. } = self.records[record];
                    if !changed {
                        continue;
                    }
                    if fetched {
                        self.update_record(tx, record)?;
                    } else {
                        self.insert_record(tx, record)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn insert_record(&mut self, tx: &mut dyn Transaction, record: usize) -> Result<(), BlockError> {
        let columns: Columns = self
            .fields()
            .filter_map(|(_, f)| Some((f.column()?.to_owned(), f.value(record)?.clone())))
            .collect();
        let id = tx.insert(&self.table, columns)?;
        tracing::debug!(block = %self.name, %id, "record inserted");
        self.records[record] = Record {
            id: Some(id),
            fetched: true,
            changed: false,
        };
        Ok(())
    }

    fn update_record(&mut self, tx: &mut dyn Transaction, record: usize) -> Result<(), BlockError> {
        let id = self.fetched_id(record)?;
        let changes: Assignments = self
            .fields()
            .filter_map(|(_, f)| Some((f.column()?.to_owned(), f.value(record).cloned())))
            .collect();
        tx.update(&self.table, id, &changes)?;
        tracing::debug!(block = %self.name, %id, "record updated");
        self.records[record].changed = false;
        Ok(())
    }

    fn fetched_id(&self, record: usize) -> Result<RecordId, BlockError> {
        self.records
            .get(record)
            .filter(|r| r.fetched)
            .and_then(|r| r.id)
            .ok_or_else(|| BlockError::NoFetchedRecord {
                block: self.name.clone(),
            })
    }

    /// Delete the active record's row.
    ///
    /// A single block clears its record and marks the cursor slot deleted; a
    /// multi block drops the line. Lines that were never stored are dropped
    /// without touching the database.
    pub fn delete(&mut self, tx: &mut dyn Transaction) -> Result<(), BlockError> {
        match self.kind {
            BlockKind::Single => {
                if self.mode != Mode::Update {
                    return Err(BlockError::InvalidMode {
                        operation: "delete",
                        mode: self.mode,
                    });
                }
                let id = self.fetched_id(0)?;
                tx.delete(&self.table, id)?;
                tracing::debug!(block = %self.name, %id, "record deleted");
                self.cursor.mark_current_deleted();
                self.clear_record(0);
            }
            BlockKind::Multi { .. } => {
                let record = self.active_record.ok_or_else(|| BlockError::NoFetchedRecord {
                    block: self.name.clone(),
                })?;
                if self.is_record_fetched(record) {
                    let id = self.fetched_id(record)?;
                    tx.delete(&self.table, id)?;
                    tracing::debug!(block = %self.name, %id, "record deleted");
                }
                self.remove_record(record);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// In-memory state of a block captured before a protected transaction.
#[derive(Debug, Clone)]
pub struct BlockSavepoint {
    mode: Mode,
    records: Vec<Record>,
    active_record: Option<usize>,
    cursor: FetchCursor,
    values: Vec<(FieldId, Vec<Option<Value>>)>,
}

impl Rollback for Block {
    type Savepoint = BlockSavepoint;

    fn savepoint(&self) -> BlockSavepoint {
        BlockSavepoint {
            mode: self.mode,
            records: self.records.clone(),
            active_record: self.active_record,
            cursor: self.cursor.clone(),
            values: self
                .fields
                .iter()
                .map(|(id, f)| (id, f.snapshot()))
                .collect(),
        }
    }

    fn rollback_to(&mut self, savepoint: BlockSavepoint) {
        self.mode = savepoint.mode;
        self.records = savepoint.records;
        self.active_record = savepoint.active_record;
        self.cursor = savepoint.cursor;
        for (id, values) in savepoint.values {
            if let Some(field) = self.fields.get_mut(id) {
                field.restore(values);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
