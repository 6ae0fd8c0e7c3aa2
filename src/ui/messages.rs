//! Message keys and their lookup.

use std::fmt;

/// Keys of every user-facing string the command engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    // Status messages shown while a protected transaction runs.
    LoadingRecord,
    SearchingDatabase,
    SavingRecord,
    DeletingRecord,
    // Confirmation prompts.
    ConfirmBreak,
    ConfirmQuit,
    ConfirmInsertMode,
    ConfirmSaveUnchanged,
    ConfirmDelete,
    // Choice dialog titles.
    PickInList,
    PickRecord,
    SearchOperator,
    // Failures and warnings.
    TransactionFailed,
    OperationRejected,
    NoDataFound,
    NoMoreRecords,
    NoFreeLine,
    NoRecordSelected,
    Inconsistency,
    QueryOverflow,
}

impl MessageKey {
    /// Stable identifier, suitable as a catalogue key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadingRecord => "loading_record",
            Self::SearchingDatabase => "searching_database",
            Self::SavingRecord => "saving_record",
            Self::DeletingRecord => "deleting_record",
            Self::ConfirmBreak => "confirm_break",
            Self::ConfirmQuit => "confirm_quit",
            Self::ConfirmInsertMode => "confirm_insert_mode",
            Self::ConfirmSaveUnchanged => "confirm_save_unchanged",
            Self::ConfirmDelete => "confirm_delete",
            Self::PickInList => "pick_in_list",
            Self::PickRecord => "pick_record",
            Self::SearchOperator => "search_operator",
            Self::TransactionFailed => "transaction_failed",
            Self::OperationRejected => "operation_rejected",
            Self::NoDataFound => "no_data_found",
            Self::NoMoreRecords => "no_more_records",
            Self::NoFreeLine => "no_free_line",
            Self::NoRecordSelected => "no_record_selected",
            Self::Inconsistency => "inconsistency",
            Self::QueryOverflow => "query_overflow",
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves message keys to display text.
pub trait Localizer: Send + Sync {
    fn message(&self, key: MessageKey) -> String;
}

/// Built-in English catalogue.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessages;

impl Localizer for DefaultMessages {
    fn message(&self, key: MessageKey) -> String {
        let text = match key {
            MessageKey::LoadingRecord => "Loading record...",
            MessageKey::SearchingDatabase => "Searching database...",
            MessageKey::SavingRecord => "Saving record...",
            MessageKey::DeletingRecord => "Deleting record...",
            MessageKey::ConfirmBreak => "Discard your changes?",
            MessageKey::ConfirmQuit => "Quit and discard your changes?",
            MessageKey::ConfirmInsertMode => "Discard your changes and switch to insert mode?",
            MessageKey::ConfirmSaveUnchanged => "Nothing was changed. Save anyway?",
            MessageKey::ConfirmDelete => "Delete this record?",
            MessageKey::PickInList => "Pick a block",
            MessageKey::PickRecord => "Pick a record",
            MessageKey::SearchOperator => "Search operator",
            MessageKey::TransactionFailed => {
                "The operation could not be completed. Please try again later."
            }
            MessageKey::OperationRejected => "The operation is not possible here.",
            MessageKey::NoDataFound => "No data found.",
            MessageKey::NoMoreRecords => "No more records.",
            MessageKey::NoFreeLine => "No free line left in this block.",
            MessageKey::NoRecordSelected => "No record is selected.",
            MessageKey::Inconsistency => "An internal error occurred.",
            MessageKey::QueryOverflow => "Too many rows; only the first ones were loaded.",
        };
        text.to_owned()
    }
}
