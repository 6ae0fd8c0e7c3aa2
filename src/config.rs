//! Form-level configuration.

use crate::db::transaction::TransactionConfig;

/// Configuration of a [`CommandDispatcher`](crate::commands::CommandDispatcher).
///
/// ```
/// use galite_forms::FormConfig;
///
/// let config = FormConfig::new(3).with_query_cap(50);
/// assert_eq!(config.transaction().max_attempts(), 3);
/// assert_eq!(config.query_cap(), 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormConfig {
    transaction: TransactionConfig,
    query_cap: usize,
}

impl FormConfig {
    /// Rows kept by a bulk load before it reports an overflow.
    pub const DEFAULT_QUERY_CAP: usize = 500;

    /// Config allowing `max_attempts` attempts per protected transaction.
    pub fn new(max_attempts: u32) -> Self {
        Self::from_transaction(TransactionConfig::new(max_attempts))
    }

    pub fn from_transaction(transaction: TransactionConfig) -> Self {
        Self {
            transaction,
            query_cap: Self::DEFAULT_QUERY_CAP,
        }
    }

    pub fn with_transaction(mut self, transaction: TransactionConfig) -> Self {
        self.transaction = transaction;
        self
    }

    /// Set the row cap (at least one).
    pub fn with_query_cap(mut self, cap: usize) -> Self {
        self.query_cap = cap.max(1);
        self
    }

    pub fn transaction(&self) -> &TransactionConfig {
        &self.transaction
    }

    pub fn query_cap(&self) -> usize {
        self.query_cap
    }
}
