//! Form: the ordered set of blocks a command engine works on.

use slotmap::{new_key_type, SlotMap};

use super::block::{Block, Mode};

new_key_type! {
    /// Stable handle to a block of a form.
    pub struct BlockId;
}

/// Flags of a dictionary form, a form opened to pick or edit one record for
/// its caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DictionaryFlags {
    /// The form was opened to create a new record.
    pub new_record: bool,
    /// A recursive query is in progress.
    pub recursive_query: bool,
    /// The current record was picked through a menu query.
    pub menu_query: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormKind {
    #[default]
    Normal,
    Dictionary(DictionaryFlags),
}

/// How a form was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Closed without handing a record back.
    Quit,
    /// Closed with the current record accepted.
    Validate,
}

#[derive(Debug)]
pub struct Form {
    name: String,
    kind: FormKind,
    blocks: SlotMap<BlockId, Block>,
    order: Vec<BlockId>,
    active_block: Option<BlockId>,
    closed: Option<CloseCode>,
}

impl Form {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FormKind::Normal,
            blocks: SlotMap::with_key(),
            order: Vec::new(),
            active_block: None,
            closed: None,
        }
    }

    /// A dictionary form with all flags cleared.
    pub fn dictionary(name: impl Into<String>) -> Self {
        let mut form = Self::new(name);
        form.kind = FormKind::Dictionary(DictionaryFlags::default());
        form
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self.kind, FormKind::Dictionary(_))
    }

    pub fn dictionary_flags(&self) -> Option<DictionaryFlags> {
        match self.kind {
            FormKind::Dictionary(flags) => Some(flags),
            FormKind::Normal => None,
        }
    }

    pub fn dictionary_flags_mut(&mut self) -> Option<&mut DictionaryFlags> {
        match &mut self.kind {
            FormKind::Dictionary(flags) => Some(flags),
            FormKind::Normal => None,
        }
    }

    // ── Blocks ───────────────────────────────────────────────────────

    /// Append a block.
    pub fn add_block(&mut self, block: Block) -> BlockId {
        let id = self.blocks.insert(block);
        self.order.push(id);
        id
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    /// Look a block up by name.
    pub fn block_id(&self, name: &str) -> Option<BlockId> {
        self.order
            .iter()
            .copied()
            .find(|&id| self.blocks[id].name() == name)
    }

    /// Block ids in form order.
    pub fn block_ids(&self) -> &[BlockId] {
        &self.order
    }

    pub fn block_count(&self) -> usize {
        self.order.len()
    }

    /// Position of `id` in form order.
    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.order.iter().position(|&b| b == id)
    }

    /// The next accessible block after `id`, in form order.
    pub fn next_accessible_block(&self, id: BlockId) -> Option<BlockId> {
        let start = self.position(id)? + 1;
        self.order[start..]
            .iter()
            .copied()
            .find(|&b| self.blocks[b].is_accessible())
    }

    pub fn first_accessible_block(&self) -> Option<BlockId> {
        self.order
            .iter()
            .copied()
            .find(|&b| self.blocks[b].is_accessible())
    }

    pub fn active_block(&self) -> Option<BlockId> {
        self.active_block
    }

    /// Activate a block. Returns `false` for unknown blocks.
    pub fn set_active_block(&mut self, id: BlockId) -> bool {
        if !self.blocks.contains_key(id) {
            return false;
        }
        if self.active_block != Some(id) {
            tracing::trace!(form = %self.name, block = self.blocks[id].name(), "enter block");
        }
        self.active_block = Some(id);
        true
    }

    /// Whether any block holds unsaved changes.
    pub fn is_changed(&self) -> bool {
        self.blocks.values().any(Block::is_changed)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Clear every block back to QUERY mode and leave all blocks.
    pub fn reset(&mut self) {
        tracing::debug!(form = %self.name, "form reset");
        for block in self.blocks.values_mut() {
            block.clear();
            block.set_mode(Mode::Query);
            block.focus_chain_mut().clear();
        }
        if let Some(flags) = self.dictionary_flags_mut() {
            flags.menu_query = false;
            flags.recursive_query = false;
        }
        self.active_block = None;
    }

    /// Abandon a recursive query, resetting the form.
    pub fn interrupt_recursive_query(&mut self) {
        tracing::debug!(form = %self.name, "recursive query interrupted");
        self.reset();
    }

    pub fn close(&mut self, code: CloseCode) {
        tracing::debug!(form = %self.name, ?code, "form closed");
        self.closed = Some(code);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn close_code(&self) -> Option<CloseCode> {
        self.closed
    }
}
