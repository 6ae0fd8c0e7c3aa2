//! Error taxonomy: validation, unit failures, and command escalations.
//!
//! Failures travel upward in three layers:
//!
//! - [`ValidationError`]: a field or record rejected its content. Raised before
//!   any transaction begins and never retried.
//! - [`BlockError`]: anything a unit of work running inside a protected
//!   transaction can fail with. [`BlockError::class`] decides what the
//!   transaction runner does with it.
//! - [`CommandError`]: what a command returns to its caller. Transaction
//!   failures arrive here wrapped in [`FatalTransactionError`] or
//!   [`InternalConsistencyError`], with the original cause kept as `source`.
//!
//! [`OverflowWarning`] is not an error: a bulk load that hit its row cap keeps
//! the partial result and reports the warning alongside it.

use std::fmt;

use crate::db::source::DbError;
use crate::form::block::Mode;
use crate::form::value::FieldKind;
use crate::ui::messages::MessageKey;

// ---------------------------------------------------------------------------
// FailureClass
// ---------------------------------------------------------------------------

/// How the transaction runner treats a failed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Local validation failure. Propagated unchanged.
    Validation,
    /// Deadlock or serialization conflict. Rolled back and retried.
    Retryable,
    /// Connection loss, SQL error, or a domain failure. Rolled back and escalated.
    Fatal,
    /// Programming error. Rolled back and escalated as an inconsistency.
    Internal,
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Why a field value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    /// A mandatory field has no value.
    #[error("value is mandatory")]
    Missing,
    /// The value does not match the field's kind.
    #[error("expected {expected} value")]
    WrongKind { expected: FieldKind },
    /// A field-level check rejected the value.
    #[error("{0}")]
    Rejected(String),
}

/// A field or record failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field `{field}` (record {record}): {failure}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: String,
    /// Record index the value belongs to.
    pub record: usize,
    /// What went wrong.
    pub failure: ValidationFailure,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, record: usize, failure: ValidationFailure) -> Self {
        Self {
            field: field.into(),
            record,
            failure,
        }
    }
}

// ---------------------------------------------------------------------------
// OverflowWarning
// ---------------------------------------------------------------------------

/// A bulk load produced more rows than its cap. The first `kept` rows were
/// loaded; the rest were not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowWarning {
    /// Configured row cap.
    pub cap: usize,
    /// Rows actually kept.
    pub kept: usize,
}

impl fmt::Display for OverflowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "query returned more than {} rows; only the first {} were loaded",
            self.cap, self.kept
        )
    }
}

// ---------------------------------------------------------------------------
// BlockError
// ---------------------------------------------------------------------------

/// Failure of a block operation, usually inside a protected transaction.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    /// A query matched no rows.
    #[error("no data found")]
    NoData,
    /// The fetch cursor has no record in the requested direction.
    #[error("no more records")]
    NoMoreRecords,
    /// A multi-record block has no free line left.
    #[error("block `{block}` has no free line")]
    NoFreeLine { block: String },
    /// The operation needs a fetched record and there is none.
    #[error("block `{block}` has no fetched record")]
    NoFetchedRecord { block: String },
    /// The operation is not allowed in the block's current mode.
    #[error("`{operation}` is not allowed in {mode} mode")]
    InvalidMode { operation: &'static str, mode: Mode },
    /// Broken internal invariant.
    #[error("{0}")]
    Internal(String),
}

impl BlockError {
    /// Classify the failure for the retry loop.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Validation(_) => FailureClass::Validation,
            Self::Db(err) => err.class(),
            Self::Internal(_) => FailureClass::Internal,
            Self::NoData
            | Self::NoMoreRecords
            | Self::NoFreeLine { .. }
            | Self::NoFetchedRecord { .. }
            | Self::InvalidMode { .. } => FailureClass::Fatal,
        }
    }

    /// Message shown to the user when this failure escalates.
    pub fn message_key(&self) -> MessageKey {
        match self {
            Self::Validation(_) | Self::InvalidMode { .. } => MessageKey::OperationRejected,
            Self::Db(_) => MessageKey::TransactionFailed,
            Self::NoData => MessageKey::NoDataFound,
            Self::NoMoreRecords => MessageKey::NoMoreRecords,
            Self::NoFreeLine { .. } => MessageKey::NoFreeLine,
            Self::NoFetchedRecord { .. } => MessageKey::NoRecordSelected,
            Self::Internal(_) => MessageKey::Inconsistency,
        }
    }
}

// ---------------------------------------------------------------------------
// Escalations
// ---------------------------------------------------------------------------

/// A protected transaction failed for good: the failure was not retryable or
/// every attempt was used up.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct FatalTransactionError {
    /// Stable, user-displayable message.
    pub message: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// The failure of the last attempt.
    #[source]
    pub source: BlockError,
}

/// An unexpected fault: a broken invariant or a programming error.
#[derive(Debug, thiserror::Error)]
#[error("internal consistency failure: {detail}")]
pub struct InternalConsistencyError {
    pub detail: String,
    #[source]
    pub source: Option<BlockError>,
}

impl InternalConsistencyError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            source: None,
        }
    }

    pub fn caused_by(source: BlockError) -> Self {
        Self {
            detail: source.to_string(),
            source: Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandError
// ---------------------------------------------------------------------------

/// Error returned by a block command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fatal(#[from] FatalTransactionError),
    #[error(transparent)]
    Inconsistency(#[from] InternalConsistencyError),
    /// A local (non-transactional) operation failed.
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: BlockError,
    },
    /// The command's preconditions do not hold.
    #[error("{command} is not applicable: {reason}")]
    NotApplicable {
        command: &'static str,
        reason: String,
    },
    /// Increment/decrement on a field without integer arithmetic.
    #[error("field `{field}` does not support integer arithmetic")]
    NotNumeric { field: String },
}

impl CommandError {
    pub(crate) fn not_applicable(command: &'static str, reason: impl Into<String>) -> Self {
        Self::NotApplicable {
            command,
            reason: reason.into(),
        }
    }

    /// The underlying unit failure, if the error wraps one.
    pub fn block_error(&self) -> Option<&BlockError> {
        match self {
            Self::Fatal(err) => Some(&err.source),
            Self::Inconsistency(err) => err.source.as_ref(),
            Self::Failed { source, .. } => Some(source),
            _ => None,
        }
    }
}
