//! Data access: the data source traits, an in-memory store, and the
//! protected transaction runner.

pub mod memory;
pub mod source;
pub mod transaction;
pub mod wait;

pub use memory::{MemoryStore, Operation, StoreStats};
pub use source::{
    Assignments, Columns, Criteria, Criterion, DataSource, DbError, IsolationLevel, RecordId, Row,
    RowIter, Transaction,
};
pub use transaction::{Rollback, TransactionConfig, TransactionRunner};
pub use wait::{WaitGuard, WaitTimer};
