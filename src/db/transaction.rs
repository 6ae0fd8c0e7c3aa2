//! Protected transactions: bounded retry, state rollback, waiting indicator.
//!
//! [`TransactionRunner::run_protected`] is the single place where units of
//! work meet the database. Each attempt snapshots the caller's state, begins
//! a transaction, runs the unit and commits. A failed attempt rolls the
//! transaction back and restores the snapshot, then the failure's
//! [`FailureClass`] decides between another attempt and escalation.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{
    BlockError, CommandError, FailureClass, FatalTransactionError, InternalConsistencyError,
};
use crate::ui::{FormUi, Localizer, MessageKey};

use super::source::{DataSource, IsolationLevel, Transaction};
use super::wait::WaitTimer;

// ---------------------------------------------------------------------------
// TransactionConfig
// ---------------------------------------------------------------------------

/// Retry bound, isolation level, and indicator delay of protected calls.
///
/// The attempt bound has no default: every runner states how often a
/// deadlocked unit may be tried.
///
/// ```
/// use galite_forms::{IsolationLevel, TransactionConfig};
///
/// let config = TransactionConfig::new(3).with_isolation(IsolationLevel::Serializable);
/// assert_eq!(config.max_attempts(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    max_attempts: u32,
    isolation: IsolationLevel,
    wait_delay: Duration,
}

impl TransactionConfig {
    /// Delay before the waiting indicator appears.
    pub const DEFAULT_WAIT_DELAY: Duration = Duration::from_millis(10);

    /// Allow up to `max_attempts` attempts per call (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            isolation: IsolationLevel::default(),
            wait_delay: Self::DEFAULT_WAIT_DELAY,
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn wait_delay(&self) -> Duration {
        self.wait_delay
    }
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// In-memory state that can be restored after a failed attempt.
pub trait Rollback {
    type Savepoint;

    fn savepoint(&self) -> Self::Savepoint;

    fn rollback_to(&mut self, savepoint: Self::Savepoint);
}

// ---------------------------------------------------------------------------
// TransactionRunner
// ---------------------------------------------------------------------------

/// Runs units of work inside protected transactions.
pub struct TransactionRunner {
    source: Arc<dyn DataSource>,
    messages: Arc<dyn Localizer>,
    config: TransactionConfig,
    timer: WaitTimer,
}

impl TransactionRunner {
    pub fn new(
        source: Arc<dyn DataSource>,
        ui: Arc<dyn FormUi>,
        messages: Arc<dyn Localizer>,
        config: TransactionConfig,
    ) -> Self {
        let timer = WaitTimer::new(ui, config.wait_delay());
        Self {
            source,
            messages,
            config,
            timer,
        }
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn messages(&self) -> &dyn Localizer {
        self.messages.as_ref()
    }

    /// Run `unit` in a transaction, retrying transient failures.
    ///
    /// `state` is snapshotted before every attempt and restored when the
    /// attempt fails, so a unit may mutate it freely. The waiting indicator
    /// shows `message` if the call outlasts the configured delay and is
    /// hidden exactly once before this returns.
    ///
    /// # Errors
    ///
    /// - [`CommandError::Validation`] if the unit rejected the data.
    /// - [`CommandError::Fatal`] for non-retryable failures and for retryable
    ///   ones once every attempt is used.
    /// - [`CommandError::Inconsistency`] for internal failures.
    pub fn run_protected<S, T, F>(
        &self,
        message: MessageKey,
        state: &mut S,
        mut unit: F,
    ) -> Result<T, CommandError>
    where
        S: Rollback + ?Sized,
        F: FnMut(&mut S, &mut dyn Transaction) -> Result<T, BlockError>,
    {
        let _wait = self.timer.arm(self.messages.message(message));
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let savepoint = state.savepoint();
            let err = match self.attempt(state, &mut unit) {
                Ok(value) => {
                    tracing::debug!(%message, attempt, "transaction committed");
                    return Ok(value);
                }
                Err(err) => err,
            };
            state.rollback_to(savepoint);
            if err.class() == FailureClass::Retryable && attempt < max_attempts {
                tracing::warn!(%message, attempt, max_attempts, error = %err, "retrying transaction");
                continue;
            }
            return Err(self.escalate(err, attempt));
        }
    }

    /// Run `work` with the waiting indicator only, outside any transaction.
    pub fn run_plain<T>(&self, message: MessageKey, work: impl FnOnce() -> T) -> T {
        let _wait = self.timer.arm(self.messages.message(message));
        work()
    }

    fn attempt<S, T, F>(&self, state: &mut S, unit: &mut F) -> Result<T, BlockError>
    where
        S: Rollback + ?Sized,
        F: FnMut(&mut S, &mut dyn Transaction) -> Result<T, BlockError>,
    {
        let mut tx = self.source.begin(self.config.isolation())?;
        match unit(state, tx.as_mut()) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn escalate(&self, err: BlockError, attempts: u32) -> CommandError {
        match err {
            BlockError::Validation(err) => err.into(),
            err if err.class() == FailureClass::Internal => {
                tracing::error!(attempts, error = %err, "internal consistency failure");
                InternalConsistencyError::caused_by(err).into()
            }
            err => {
                tracing::error!(attempts, error = %err, "transaction failed");
                FatalTransactionError {
                    message: self.messages.message(err.message_key()),
                    attempts,
                    source: err,
                }
                .into()
            }
        }
    }
}
