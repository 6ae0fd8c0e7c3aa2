//! In-memory data source with transactional staging and scripted faults.
//!
//! Each transaction works on a private copy of the tables and publishes it on
//! commit (last commit wins). Faults can be scripted per [`Operation`] to
//! exercise the retry and escalation paths without a real database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::source::{
    Assignments, Columns, Criteria, DataSource, DbError, IsolationLevel, RecordId, Row, RowIter,
    Transaction,
};

// ---------------------------------------------------------------------------
// Operation / faults
// ---------------------------------------------------------------------------

/// Data-layer operations a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Begin,
    Fetch,
    Query,
    Insert,
    Update,
    Delete,
    Commit,
}

#[derive(Debug, Clone)]
struct Fault {
    operation: Operation,
    error: DbError,
    /// `None` fails forever.
    remaining: Option<u32>,
}

/// Counters for transactions started and finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub begun: u32,
    pub committed: u32,
    pub rolled_back: u32,
    pub last_isolation: Option<IsolationLevel>,
}

#[derive(Debug, Clone, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<RecordId, Columns>,
}

impl Table {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tables: BTreeMap<String, Table>,
    faults: Vec<Fault>,
    stats: StoreStats,
}

impl StoreState {
    fn take_fault(&mut self, operation: Operation) -> Result<(), DbError> {
        let Some(index) = self.faults.iter().position(|f| f.operation == operation) else {
            return Ok(());
        };
        let fault = &mut self.faults[index];
        let error = fault.error.clone();
        let exhausted = match &mut fault.remaining {
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            None => false,
        };
        if exhausted {
            self.faults.remove(index);
        }
        Err(error)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe in-memory database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table (builder).
    pub fn with_table(self, name: impl Into<String>) -> Self {
        self.lock().tables.entry(name.into()).or_default();
        self
    }

    /// Insert a row outside any transaction. Creates the table if needed.
    pub fn seed(&self, table: &str, columns: Columns) -> RecordId {
        let mut state = self.lock();
        let table = state.tables.entry(table.to_owned()).or_default();
        let id = table.allocate_id();
        table.rows.insert(id, columns);
        id
    }

    /// Delete a row outside any transaction. `false` if it did not exist.
    pub fn remove(&self, table: &str, id: RecordId) -> bool {
        self.lock()
            .tables
            .get_mut(table)
            .is_some_and(|t| t.rows.remove(&id).is_some())
    }

    /// Committed rows of `table`, in id order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|(id, cols)| Row::new(*id, cols.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// One committed row.
    pub fn row(&self, table: &str, id: RecordId) -> Option<Row> {
        self.lock()
            .tables
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .map(|cols| Row::new(id, cols.clone()))
    }

    /// Fail the next `times` calls of `operation` with `error`.
    pub fn fail(&self, operation: Operation, error: DbError, times: u32) {
        if times == 0 {
            return;
        }
        self.lock().faults.push(Fault {
            operation,
            error,
            remaining: Some(times),
        });
    }

    /// Fail every call of `operation` with `error`.
    pub fn fail_always(&self, operation: Operation, error: DbError) {
        self.lock().faults.push(Fault {
            operation,
            error,
            remaining: None,
        });
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DataSource for MemoryStore {
    fn begin(&self, isolation: IsolationLevel) -> Result<Box<dyn Transaction + '_>, DbError> {
        let mut state = self.lock();
        state.take_fault(Operation::Begin)?;
        state.stats.begun += 1;
        state.stats.last_isolation = Some(isolation);
        Ok(Box::new(MemoryTransaction {
            store: self,
            staged: state.tables.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// MemoryTransaction
// ---------------------------------------------------------------------------

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged: BTreeMap<String, Table>,
}

impl MemoryTransaction<'_> {
    fn check(&self, operation: Operation) -> Result<(), DbError> {
        self.store.lock().take_fault(operation)
    }

    fn table(&mut self, name: &str) -> Result<&mut Table, DbError> {
        self.staged
            .get_mut(name)
            .ok_or_else(|| DbError::Sql(format!("table `{name}` does not exist")))
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn fetch_by_id(&mut self, table: &str, id: RecordId) -> Result<Row, DbError> {
        self.check(Operation::Fetch)?;
        self.table(table)?
            .rows
            .get(&id)
            .map(|cols| Row::new(id, cols.clone()))
            .ok_or_else(|| DbError::NotFound {
                table: table.to_owned(),
                id,
            })
    }

    fn query(&mut self, table: &str, criteria: &Criteria) -> Result<RowIter<'_>, DbError> {
        self.check(Operation::Query)?;
        let rows: Vec<Row> = self
            .table(table)?
            .rows
            .iter()
            .filter(|(_, cols)| criteria.matches(cols))
            .map(|(id, cols)| Row::new(*id, cols.clone()))
            .collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn insert(&mut self, table: &str, columns: Columns) -> Result<RecordId, DbError> {
        self.check(Operation::Insert)?;
        let table = self.table(table)?;
        let id = table.allocate_id();
        table.rows.insert(id, columns);
        Ok(id)
    }

    fn update(&mut self, table: &str, id: RecordId, changes: &Assignments) -> Result<(), DbError> {
        self.check(Operation::Update)?;
        let Some(cols) = self.table(table)?.rows.get_mut(&id) else {
            return Err(DbError::NotFound {
                table: table.to_owned(),
                id,
            });
        };
        for (column, value) in changes {
            match value {
                Some(v) => cols.insert(column.clone(), v.clone()),
                None => cols.remove(column),
            };
        }
        Ok(())
    }

    fn delete(&mut self, table: &str, id: RecordId) -> Result<(), DbError> {
        self.check(Operation::Delete)?;
        match self.table(table)?.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DbError::NotFound {
                table: table.to_owned(),
                id,
            }),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), DbError> {
        let this = *self;
        let mut state = this.store.lock();
        if let Err(err) = state.take_fault(Operation::Commit) {
            state.stats.rolled_back += 1;
            return Err(err);
        }
        state.tables = this.staged;
        state.stats.committed += 1;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.store.lock().stats.rolled_back += 1;
        Ok(())
    }
}
