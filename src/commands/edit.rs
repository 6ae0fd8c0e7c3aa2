//! Editing commands: insert mode, save, delete, insert line, and resets.

use crate::error::{BlockError, CommandError};
use crate::form::block::{Block, Mode};
use crate::form::model::{BlockId, CloseCode, Form};
use crate::ui::MessageKey;

use super::{block_mut, block_ref, CommandDispatcher, CommandOutcome};

impl CommandDispatcher {
    /// Switch a single-record block to INSERT mode.
    ///
    /// Values already in the record are kept and defaults fill the rest. The
    /// record is no longer tied to a row but keeps its changed flag.
    pub fn insert_mode(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        let b = block_mut(form, block, "insert_mode")?;
        if b.is_multi() {
            return Err(CommandError::not_applicable(
                "insert_mode",
                "only single-record blocks have an insert mode",
            ));
        }
        if b.mode() == Mode::Insert {
            return Err(CommandError::not_applicable(
                "insert_mode",
                format!("block `{}` is already in INSERT mode", b.name()),
            ));
        }
        if b.mode() == Mode::Update && b.is_changed() && !self.ui().confirm(MessageKey::ConfirmInsertMode) {
            return Ok(CommandOutcome::Cancelled);
        }

        let changed = b.is_record_changed(0);
        b.set_mode(Mode::Insert);
        b.set_default();
        b.set_record_fetched(0, false);
        b.set_record_changed(0, changed);

        if form.active_block() == Some(block) {
            self.navigator().goto_first_unfilled_field(form, block);
        }
        Ok(CommandOutcome::Done)
    }

    /// Validate and store a single-record block, then apply the post-save
    /// policy of [`save_done`](Self::save_done).
    ///
    /// Saving an unchanged record asks for confirmation first.
    pub fn save_block(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        let b = block_mut(form, block, "save_block")?;
        if b.is_multi() {
            return Err(CommandError::not_applicable(
                "save_block",
                "only single-record blocks can be saved this way",
            ));
        }
        b.validate()?;
        if !b.is_changed() && !self.ui().confirm(MessageKey::ConfirmSaveUnchanged) {
            return Ok(CommandOutcome::Cancelled);
        }
        self.runner
            .run_protected(MessageKey::SavingRecord, b, |b, tx| b.save(tx))?;
        self.after_save(form, block, true)
    }

    /// Post-save policy, for callers that stored the block themselves.
    ///
    /// - Dictionary form opened for a new record: closed with
    ///   [`CloseCode::Validate`].
    /// - Dictionary form in a menu or recursive query: reset.
    /// - INSERT mode: the form is reset.
    /// - UPDATE mode: a single-record block shows the next fetched record,
    ///   or is cleared back to QUERY mode when there is none. A multi-record
    ///   block is cleared back to QUERY mode.
    pub fn save_done(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        self.after_save(form, block, false)
    }

    fn after_save(
        &self,
        form: &mut Form,
        block: BlockId,
        single: bool,
    ) -> Result<CommandOutcome, CommandError> {
        if let Some(flags) = form.dictionary_flags() {
            if flags.new_record {
                form.close(CloseCode::Validate);
                return Ok(CommandOutcome::Closed(CloseCode::Validate));
            }
            if flags.recursive_query || flags.menu_query {
                form.reset();
                return Ok(CommandOutcome::Done);
            }
        }

        let b = block_mut(form, block, "save_done")?;
        match b.mode() {
            Mode::Insert if single => {
                b.clear();
                b.set_default();
                self.navigator().goto_first_unfilled_field(form, block);
            }
            Mode::Insert => form.reset(),
            Mode::Update => {
                if b.is_multi() || !self.fetch_neighbour(b, 1) {
                    b.clear();
                    b.set_mode(Mode::Query);
                }
            }
            Mode::Query => {
                b.clear();
                b.set_mode(Mode::Query);
            }
        }
        Ok(CommandOutcome::Done)
    }

    /// Delete the active record after confirmation.
    ///
    /// A single-record block then shows the next fetched record, else the
    /// previous one, else it is cleared back to QUERY mode. During a
    /// recursive dictionary query the form is reset instead.
    pub fn delete_block(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        block_ref(form, block, "delete_block")?.validate()?;
        if !self.ui().confirm(MessageKey::ConfirmDelete) {
            return Ok(CommandOutcome::Cancelled);
        }
        let b = block_mut(form, block, "delete_block")?;
        self.runner
            .run_protected(MessageKey::DeletingRecord, b, |b, tx| b.delete(tx))?;

        if form.dictionary_flags().is_some_and(|f| f.recursive_query) {
            form.reset();
            return Ok(CommandOutcome::Done);
        }

        let b = block_mut(form, block, "delete_block")?;
        if b.is_multi() {
            let mode = if b.record_count() > 0 { Mode::Update } else { Mode::Query };
            b.set_mode(mode);
            return Ok(CommandOutcome::Done);
        }
        b.set_mode(Mode::Query);
        if !self.fetch_neighbour(b, 1) && !self.fetch_neighbour(b, -1) {
            b.set_mode(Mode::Query);
            b.clear();
        }
        Ok(CommandOutcome::Done)
    }

    /// Insert an empty line before the active record of the active
    /// multi-record block.
    ///
    /// The active record is validated first. Whatever happens, the block
    /// returns to the original record index.
    pub fn insert_line(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        if form.active_block() != Some(block) {
            return Err(CommandError::not_applicable(
                "insert_line",
                "the block is not the active block",
            ));
        }
        let b = block_mut(form, block, "insert_line")?;
        if !b.is_multi() {
            return Err(CommandError::not_applicable(
                "insert_line",
                "only multi-record blocks have lines",
            ));
        }
        let recno = b.active_record().unwrap_or(0);
        b.leave_record()?;
        let inserted = b.insert_empty_record(recno);
        b.goto_record(recno);

        match inserted {
            Ok(_) => {
                self.navigator().refocus(form, block);
                Ok(CommandOutcome::Done)
            }
            Err(source) => {
                tracing::warn!(block = b.name(), error = %source, "insert line failed");
                Err(CommandError::Failed {
                    message: self.runner.messages().message(MessageKey::NoFreeLine),
                    source,
                })
            }
        }
    }

    /// Clear a block, asking first when it holds changes.
    ///
    /// The block returns to QUERY mode, except on a dictionary form opened
    /// for a new record. A recursive dictionary query resets the whole form.
    pub fn reset_block(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        let b = block_ref(form, block, "reset_block")?;
        if b.is_changed() && !self.ui().confirm(MessageKey::ConfirmBreak) {
            return Ok(CommandOutcome::Cancelled);
        }
        let flags = form.dictionary_flags();
        let b = block_mut(form, block, "reset_block")?;
        b.clear();
        match flags {
            Some(f) if f.recursive_query => form.reset(),
            Some(f) if f.new_record => {}
            _ => b.set_mode(Mode::Query),
        }
        Ok(CommandOutcome::Done)
    }

    /// Reset the whole form, asking first when it holds changes.
    pub fn reset_form(&self, form: &mut Form) -> Result<CommandOutcome, CommandError> {
        if form.is_changed() && !self.ui().confirm(MessageKey::ConfirmBreak) {
            return Ok(CommandOutcome::Cancelled);
        }
        form.reset();
        self.navigator().goto_first_block(form);
        Ok(CommandOutcome::Done)
    }

    /// Close the form, asking first when it holds changes.
    pub fn quit_form(&self, form: &mut Form) -> Result<CommandOutcome, CommandError> {
        if form.is_changed() && !self.ui().confirm(MessageKey::ConfirmQuit) {
            return Ok(CommandOutcome::Cancelled);
        }
        form.close(CloseCode::Quit);
        Ok(CommandOutcome::Closed(CloseCode::Quit))
    }

    /// Show the fetched record `step` away. `false` when there is none.
    ///
    /// Runs after a committed save or delete, so a failed fetch (a row
    /// deleted meanwhile, a lost connection) only means there is no record
    /// to show in that direction.
    fn fetch_neighbour(&self, block: &mut Block, step: isize) -> bool {
        let fetched = self
            .runner
            .run_protected(MessageKey::LoadingRecord, block, |b, tx| {
                match b.fetch_next_record(tx, step) {
                    Ok(()) => Ok(true),
                    Err(BlockError::NoMoreRecords) => Ok(false),
                    Err(err) => Err(err),
                }
            });
        match fetched {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(block = block.name(), step, error = %err, "neighbour fetch failed");
                false
            }
        }
    }
}
