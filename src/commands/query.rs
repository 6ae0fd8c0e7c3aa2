//! Query commands: menu query, recursive query, query-move, serial query.

use crate::db::source::RecordId;
use crate::error::{BlockError, CommandError, InternalConsistencyError};
use crate::form::model::{BlockId, Form};
use crate::ui::{MessageKey, Notice};

use super::{block_mut, block_ref, CommandDispatcher, CommandOutcome};

impl CommandDispatcher {
    /// Let the user pick one of the rows matching the block's criteria and
    /// fetch it.
    ///
    /// A single match is picked without asking. On a dictionary form the
    /// menu-query flag is set, so that a later save resets the form.
    pub fn menu_query(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        block_ref(form, block, "menu_query")?.validate()?;
        if let Some(flags) = form.dictionary_flags_mut() {
            flags.menu_query = true;
        }
        let Some(id) = self.pick_record(form, block, "menu_query")? else {
            return Ok(CommandOutcome::Cancelled);
        };
        self.fetch_picked(form, block, id, "menu_query")?;
        self.navigator().goto_field_if_no_active(form, block);
        Ok(CommandOutcome::Done)
    }

    /// Menu query on a dictionary form. Cancelling the choice abandons the
    /// recursive query and resets the form.
    pub fn recursive_query(
        &self,
        form: &mut Form,
        block: BlockId,
    ) -> Result<CommandOutcome, CommandError> {
        if !form.is_dictionary() {
            return Err(CommandError::not_applicable(
                "recursive_query",
                "only dictionary forms support recursive queries",
            ));
        }
        block_ref(form, block, "recursive_query")?.validate()?;
        if let Some(flags) = form.dictionary_flags_mut() {
            flags.recursive_query = true;
        }
        let Some(id) = self.pick_record(form, block, "recursive_query")? else {
            form.interrupt_recursive_query();
            return Ok(CommandOutcome::Cancelled);
        };
        self.fetch_picked(form, block, id, "recursive_query")?;
        self.navigator().goto_field_if_no_active(form, block);
        Ok(CommandOutcome::Done)
    }

    /// Menu query, then move on to the next accessible block.
    ///
    /// Blocks following `block` that are not accessible are skipped.
    ///
    /// # Errors
    ///
    /// [`CommandError::Inconsistency`] when no block follows.
    pub fn query_move(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        block_ref(form, block, "query_move")?.validate()?;
        let Some(id) = self.pick_record(form, block, "query_move")? else {
            return Ok(CommandOutcome::Cancelled);
        };
        self.fetch_picked(form, block, id, "query_move")?;
        let next = form.next_accessible_block(block).ok_or_else(|| {
            InternalConsistencyError::new(format!("no accessible block after `{}`", block_name(form, block)))
        })?;
        self.navigator().goto_block(form, next);
        Ok(CommandOutcome::Done)
    }

    /// Load every row matching the block's criteria.
    ///
    /// Focus is settled whether or not the load succeeded. A load truncated
    /// at the row cap is a success; the warning is logged, passed to
    /// [`FormUi::notify`](crate::ui::FormUi::notify), and returned.
    pub fn serial_query(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        let cap = self.config.query_cap();
        let b = block_mut(form, block, "serial_query")?;
        b.validate()?;
        let loaded = self
            .runner
            .run_protected(MessageKey::SearchingDatabase, b, |b, tx| b.load(tx, cap));
        self.navigator().goto_field_if_no_active(form, block);

        let overflow = loaded?;
        if let Some(warning) = overflow {
            self.ui()
                .notify(Notice::overflow(warning, self.runner.messages()));
        }
        Ok(CommandOutcome::Loaded { overflow })
    }

    /// Look up candidates and let the user pick one. `None` if cancelled.
    fn pick_record(
        &self,
        form: &mut Form,
        block: BlockId,
        command: &'static str,
    ) -> Result<Option<RecordId>, CommandError> {
        let cap = self.config.query_cap();
        let b = block_mut(form, block, command)?;
        let candidates = self
            .runner
            .run_protected(MessageKey::SearchingDatabase, b, |b, tx| {
                let candidates = b.lookup(tx, cap)?;
                if candidates.is_empty() {
                    return Err(BlockError::NoData);
                }
                Ok(candidates)
            })?;

        if let [(id, _)] = candidates.as_slice() {
            return Ok(Some(*id));
        }
        let titles: Vec<String> = candidates.iter().map(|(_, title)| title.clone()).collect();
        let picked = self
            .ui()
            .present_choice(MessageKey::PickRecord, &titles)
            .and_then(|index| candidates.get(index))
            .map(|(id, _)| *id);
        if picked.is_none() {
            tracing::debug!(command, "record choice cancelled");
        }
        Ok(picked)
    }

    fn fetch_picked(
        &self,
        form: &mut Form,
        block: BlockId,
        id: RecordId,
        command: &'static str,
    ) -> Result<(), CommandError> {
        let b = block_mut(form, block, command)?;
        self.runner
            .run_protected(MessageKey::LoadingRecord, b, |b, tx| b.fetch_record(tx, id))
    }
}

fn block_name(form: &Form, block: BlockId) -> String {
    form.block(block)
        .map(|b| b.name().to_owned())
        .unwrap_or_default()
}
