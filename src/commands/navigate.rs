//! Block navigation commands.

use crate::error::CommandError;
use crate::form::block::Block;
use crate::form::model::{BlockId, Form};
use crate::ui::MessageKey;

use super::{block_ref, CommandDispatcher, CommandOutcome};

impl CommandDispatcher {
    /// Move to another accessible block.
    ///
    /// With one other block it is entered directly; with several the user
    /// picks one by title. Without a target (no other block, or the choice
    /// was cancelled) focus returns to `block`.
    pub fn change_block(&self, form: &mut Form, block: BlockId) -> Result<CommandOutcome, CommandError> {
        block_ref(form, block, "change_block")?.validate()?;

        let others: Vec<BlockId> = form
            .block_ids()
            .iter()
            .copied()
            .filter(|&id| id != block && form.block(id).is_some_and(Block::is_accessible))
            .collect();
        let target = match others.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => {
                let titles: Vec<String> = others
                    .iter()
                    .filter_map(|&id| form.block(id))
                    .map(|b| b.title().to_owned())
                    .collect();
                self.ui()
                    .present_choice(MessageKey::PickInList, &titles)
                    .and_then(|index| others.get(index).copied())
            }
        };

        let navigator = self.navigator();
        match target {
            Some(target) => {
                navigator.goto_block(form, target);
                Ok(CommandOutcome::Done)
            }
            None => {
                navigator.goto_block(form, block);
                if others.len() > 1 {
                    Ok(CommandOutcome::Cancelled)
                } else {
                    Ok(CommandOutcome::Done)
                }
            }
        }
    }
}
