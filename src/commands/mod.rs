//! Block commands: the user-triggered operations of a form.
//!
//! Every command follows the same shape: validate the block (fail fast,
//! before any transaction), run the database work through
//! [`TransactionRunner::run_protected`], apply the post-command policy, and
//! settle focus through the [`FormNavigator`].
//!
//! # Submodules
//!
//! - [`query`]: menu, recursive, serial queries and query-move
//! - [`edit`]: insert mode, save, delete, insert line, resets
//! - [`field`]: increment, decrement, search operator
//! - [`navigate`]: block changes

pub mod edit;
pub mod field;
pub mod navigate;
pub mod query;

use std::fmt;
use std::sync::Arc;

use crate::config::FormConfig;
use crate::db::source::DataSource;
use crate::db::transaction::TransactionRunner;
use crate::error::{CommandError, OverflowWarning};
use crate::form::block::{Block, FieldId};
use crate::form::model::{BlockId, CloseCode, Form};
use crate::navigation::FormNavigator;
use crate::ui::{DefaultMessages, FormUi, Localizer};

// ---------------------------------------------------------------------------
// Command / CommandOutcome
// ---------------------------------------------------------------------------

/// A block or form command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MenuQuery(BlockId),
    RecursiveQuery(BlockId),
    QueryMove(BlockId),
    SerialQuery(BlockId),
    InsertMode(BlockId),
    SaveBlock(BlockId),
    SaveDone(BlockId),
    DeleteBlock(BlockId),
    InsertLine(BlockId),
    ChangeBlock(BlockId),
    ResetBlock(BlockId),
    SetSearchOperator(BlockId),
    Increment(BlockId, FieldId),
    Decrement(BlockId, FieldId),
    ResetForm,
    QuitForm,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MenuQuery(_) => "menu_query",
            Self::RecursiveQuery(_) => "recursive_query",
            Self::QueryMove(_) => "query_move",
            Self::SerialQuery(_) => "serial_query",
            Self::InsertMode(_) => "insert_mode",
            Self::SaveBlock(_) => "save_block",
            Self::SaveDone(_) => "save_done",
            Self::DeleteBlock(_) => "delete_block",
            Self::InsertLine(_) => "insert_line",
            Self::ChangeBlock(_) => "change_block",
            Self::ResetBlock(_) => "reset_block",
            Self::SetSearchOperator(_) => "set_search_operator",
            Self::Increment(..) => "increment",
            Self::Decrement(..) => "decrement",
            Self::ResetForm => "reset_form",
            Self::QuitForm => "quit_form",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command ran to completion.
    Done,
    /// The user declined a confirmation or cancelled a choice.
    Cancelled,
    /// A serial query loaded rows, possibly truncated at the row cap.
    Loaded { overflow: Option<OverflowWarning> },
    /// The form was closed.
    Closed(CloseCode),
}

// ---------------------------------------------------------------------------
// CommandDispatcher
// ---------------------------------------------------------------------------

/// Executes commands against a form.
pub struct CommandDispatcher {
    runner: TransactionRunner,
    ui: Arc<dyn FormUi>,
    config: FormConfig,
}

impl CommandDispatcher {
    /// A dispatcher using the built-in English messages.
    pub fn new(source: Arc<dyn DataSource>, ui: Arc<dyn FormUi>, config: FormConfig) -> Self {
        Self::with_messages(source, ui, Arc::new(DefaultMessages), config)
    }

    pub fn with_messages(
        source: Arc<dyn DataSource>,
        ui: Arc<dyn FormUi>,
        messages: Arc<dyn Localizer>,
        config: FormConfig,
    ) -> Self {
        let runner = TransactionRunner::new(
            source,
            Arc::clone(&ui),
            messages,
            config.transaction().clone(),
        );
        Self { runner, ui, config }
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn runner(&self) -> &TransactionRunner {
        &self.runner
    }

    /// Run `command` on `form`.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotApplicable`] on a closed form or unknown block, and
    /// whatever the command itself fails with.
    pub fn execute(&self, form: &mut Form, command: Command) -> Result<CommandOutcome, CommandError> {
        let span = tracing::debug_span!("command", form = form.name(), command = command.name());
        let _enter = span.enter();
        if form.is_closed() {
            return Err(CommandError::not_applicable(command.name(), "the form is closed"));
        }
        tracing::debug!("start");
        let result = match command {
            Command::MenuQuery(b) => self.menu_query(form, b),
            Command::RecursiveQuery(b) => self.recursive_query(form, b),
            Command::QueryMove(b) => self.query_move(form, b),
            Command::SerialQuery(b) => self.serial_query(form, b),
            Command::InsertMode(b) => self.insert_mode(form, b),
            Command::SaveBlock(b) => self.save_block(form, b),
            Command::SaveDone(b) => self.save_done(form, b),
            Command::DeleteBlock(b) => self.delete_block(form, b),
            Command::InsertLine(b) => self.insert_line(form, b),
            Command::ChangeBlock(b) => self.change_block(form, b),
            Command::ResetBlock(b) => self.reset_block(form, b),
            Command::SetSearchOperator(b) => self.set_search_operator(form, b),
            Command::Increment(b, f) => self.increment(form, b, f),
            Command::Decrement(b, f) => self.decrement(form, b, f),
            Command::ResetForm => self.reset_form(form),
            Command::QuitForm => self.quit_form(form),
        };
        match &result {
            Ok(outcome) => tracing::debug!(?outcome, "done"),
            Err(err) => tracing::debug!(error = %err, "failed"),
        }
        result
    }

    fn navigator(&self) -> FormNavigator<'_> {
        FormNavigator::new(self.ui.as_ref())
    }

    fn ui(&self) -> &dyn FormUi {
        self.ui.as_ref()
    }
}

/// The block `id` of `form`, or `NotApplicable` for `command`.
fn block_mut<'f>(
    form: &'f mut Form,
    id: BlockId,
    command: &'static str,
) -> Result<&'f mut Block, CommandError> {
    form.block_mut(id)
        .ok_or_else(|| CommandError::not_applicable(command, "unknown block"))
}

fn block_ref<'f>(form: &'f Form, id: BlockId, command: &'static str) -> Result<&'f Block, CommandError> {
    form.block(id)
        .ok_or_else(|| CommandError::not_applicable(command, "unknown block"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Pilot;

    #[test]
    fn command_names() {
        let pilot = Pilot::orders();
        let head = pilot.block_id("head");
        assert_eq!(Command::SaveBlock(head).to_string(), "save_block");
        assert_eq!(Command::ResetForm.name(), "reset_form");
    }

    #[test]
    fn closed_form_rejects_commands() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        pilot.form_mut().close(CloseCode::Quit);

        let err = pilot.run(Command::SerialQuery(head)).unwrap_err();
        assert!(matches!(
            err,
            CommandError::NotApplicable { command: "serial_query", .. }
        ));
        assert_eq!(pilot.store().stats().begun, 0);
    }

    #[test]
    fn unknown_block_is_not_applicable() {
        let mut pilot = Pilot::orders();
        // The pilot's form has two blocks; the fifth key of another arena does
        // not resolve in it.
        let mut big = Form::new("big");
        let foreign: Vec<BlockId> = (0..5)
            .map(|i| big.add_block(Block::single(format!("b{i}"), "t")))
            .collect();
        let err = pilot.run(Command::ResetBlock(foreign[4])).unwrap_err();
        assert!(matches!(err, CommandError::NotApplicable { .. }));
    }
}
