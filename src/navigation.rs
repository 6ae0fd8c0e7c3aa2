//! Focus chain and post-command focus placement.
//!
//! [`FocusChain`] keeps the tab order of a block's accessible fields and the
//! field that currently has focus. [`FormNavigator`] moves focus between
//! blocks and fields after a command finished, so that every successful
//! command leaves the form with a deterministic focus target.

use crate::form::block::{Block, FieldId};
use crate::form::model::{BlockId, Form};
use crate::ui::{FocusTarget, FormUi};

// ---------------------------------------------------------------------------
// FocusChain
// ---------------------------------------------------------------------------

/// Ordered list of focusable fields for tab navigation.
///
/// The chain is rebuilt whenever the block's fields or their accessibility
/// change. Focus cycles through the chain in forward or backward order.
#[derive(Debug, Clone, Default)]
pub struct FocusChain {
    /// Accessible fields in tab order.
    fields: Vec<FieldId>,
    /// Index of the focused field, or `None` if no focus.
    current: Option<usize>,
}

impl FocusChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the given accessible fields, in order.
    ///
    /// If the previously focused field is still in the chain focus is kept,
    /// otherwise it is cleared.
    pub fn rebuild(&mut self, fields: impl IntoIterator<Item = FieldId>) {
        let old = self.current_field();
        self.fields = fields.into_iter().collect();
        self.current = old.and_then(|id| self.fields.iter().position(|&f| f == id));
    }

    /// The focused field, if any.
    pub fn current_field(&self) -> Option<FieldId> {
        self.current.and_then(|idx| self.fields.get(idx).copied())
    }

    /// First field in tab order.
    pub fn first(&self) -> Option<FieldId> {
        self.fields.first().copied()
    }

    /// Move focus to the next field. Wraps around.
    pub fn focus_next(&mut self) -> Option<FieldId> {
        if self.fields.is_empty() {
            return None;
        }
        let next = match self.current {
            Some(idx) => (idx + 1) % self.fields.len(),
            None => 0,
        };
        self.current = Some(next);
        self.fields.get(next).copied()
    }

    /// Move focus to the previous field. Wraps around.
    pub fn focus_previous(&mut self) -> Option<FieldId> {
        if self.fields.is_empty() {
            return None;
        }
        let prev = match self.current {
            Some(0) | None => self.fields.len() - 1,
            Some(idx) => idx - 1,
        };
        self.current = Some(prev);
        self.fields.get(prev).copied()
    }

    /// Focus a specific field. Returns `false` if it is not in the chain.
    pub fn focus_field(&mut self, id: FieldId) -> bool {
        match self.fields.iter().position(|&f| f == id) {
            Some(pos) => {
                self.current = Some(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FormNavigator
// ---------------------------------------------------------------------------

/// Moves focus inside a form and reports every move to the UI.
pub struct FormNavigator<'a> {
    ui: &'a dyn FormUi,
}

impl<'a> FormNavigator<'a> {
    pub fn new(ui: &'a dyn FormUi) -> Self {
        Self { ui }
    }

    /// Settle focus after a command on `block`.
    ///
    /// With no active block, `block` becomes active. Otherwise, if the active
    /// block (which a trigger may have changed) has no active field, focus
    /// goes to its first field.
    pub fn goto_field_if_no_active(&self, form: &mut Form, block: BlockId) {
        match form.active_block() {
            None => self.goto_block(form, block),
            Some(active) => {
                let has_field = form
                    .block(active)
                    .is_some_and(|b| b.active_field().is_some());
                if !has_field {
                    self.goto_first_field(form, active);
                }
            }
        }
    }

    /// Activate `block` and focus its first accessible field.
    pub fn goto_block(&self, form: &mut Form, block: BlockId) {
        if form.set_active_block(block) {
            self.goto_first_field(form, block);
        }
    }

    /// Activate the first accessible block of the form, if any.
    pub fn goto_first_block(&self, form: &mut Form) {
        if let Some(first) = form.first_accessible_block() {
            self.goto_block(form, first);
        }
    }

    /// Focus the first accessible field of `block`.
    pub fn goto_first_field(&self, form: &mut Form, block: BlockId) {
        let Some(b) = form.block_mut(block) else {
            return;
        };
        if let Some(field) = b.focus_chain().first() {
            self.focus(b, field);
        }
    }

    /// Focus the first accessible field of `block` whose value is null in the
    /// active record, or the first field if all are filled.
    pub fn goto_first_unfilled_field(&self, form: &mut Form, block: BlockId) {
        let Some(b) = form.block_mut(block) else {
            return;
        };
        if let Some(field) = b.first_unfilled_field().or_else(|| b.focus_chain().first()) {
            self.focus(b, field);
        }
    }

    /// Focus a specific field of `block`. Returns `false` if the field is not
    /// focusable.
    pub fn goto_field(&self, form: &mut Form, block: BlockId, field: FieldId) -> bool {
        match form.block_mut(block) {
            Some(b) => self.focus(b, field),
            None => false,
        }
    }

    /// Report focus again after the active record of `block` moved: on its
    /// active field, or its first field.
    pub fn refocus(&self, form: &mut Form, block: BlockId) {
        let Some(b) = form.block_mut(block) else {
            return;
        };
        if let Some(field) = b.active_field().or_else(|| b.focus_chain().first()) {
            self.focus(b, field);
        }
    }

    /// Move to the next field of the active block.
    pub fn goto_next_field(&self, form: &mut Form) -> Option<FieldId> {
        let b = form.active_block().and_then(|id| form.block_mut(id))?;
        let next = b.focus_chain_mut().focus_next()?;
        self.report(b, next);
        Some(next)
    }

    /// Move to the previous field of the active block.
    pub fn goto_previous_field(&self, form: &mut Form) -> Option<FieldId> {
        let b = form.active_block().and_then(|id| form.block_mut(id))?;
        let prev = b.focus_chain_mut().focus_previous()?;
        self.report(b, prev);
        Some(prev)
    }

    fn focus(&self, block: &mut Block, field: FieldId) -> bool {
        if !block.focus_chain_mut().focus_field(field) {
            return false;
        }
        self.report(block, field);
        true
    }

    fn report(&self, block: &Block, field: FieldId) {
        let Some(f) = block.field(field) else {
            return;
        };
        tracing::trace!(block = block.name(), field = f.name(), "focus");
        self.ui.request_focus(FocusTarget {
            block: block.name().to_owned(),
            field: f.name().to_owned(),
            record: block.active_record(),
        });
    }
}

// ===========================================================================
// Tests
// ===========================================================================
