//! Pilot: drive a form headlessly through the command dispatcher.
//!
//! The `Pilot` owns a [`Form`], a [`CommandDispatcher`] wired to an in-memory
//! [`MemoryStore`], and a [`ScriptedUi`]. Tests run commands, script the
//! user's answers, and inspect blocks, rows, and recorded UI calls.

use std::sync::Arc;

use crate::commands::{Command, CommandDispatcher, CommandOutcome};
use crate::config::FormConfig;
use crate::db::memory::MemoryStore;
use crate::db::source::{Columns, RecordId};
use crate::error::CommandError;
use crate::form::block::{Block, FieldId};
use crate::form::model::{BlockId, Form};
use crate::form::value::Value;
use crate::navigation::FormNavigator;

use super::ui::ScriptedUi;

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless form driver for testing.
///
/// The store gets one empty table per block of the form.
///
/// # Examples
///
/// ```
/// use galite_forms::commands::Command;
/// use galite_forms::form::{Block, Field, Form, Mode, Value};
/// use galite_forms::testing::Pilot;
///
/// let mut form = Form::new("customers");
/// form.add_block(Block::single("customer", "customers").with_field(Field::text("name").with_column("name")));
/// let mut pilot = Pilot::new(form);
/// pilot.seed("customers", [("name", Value::from("ACME"))]);
///
/// let customer = pilot.block_id("customer");
/// pilot.run(Command::SerialQuery(customer)).unwrap();
/// assert_eq!(pilot.block("customer").mode(), Mode::Update);
/// ```
pub struct Pilot {
    form: Form,
    dispatcher: CommandDispatcher,
    ui: Arc<ScriptedUi>,
    store: Arc<MemoryStore>,
}

impl Pilot {
    /// Attempts per protected transaction used by [`new`](Self::new).
    pub const DEFAULT_ATTEMPTS: u32 = 3;

    /// Drive `form` with default configuration.
    pub fn new(form: Form) -> Self {
        Self::with_config(form, FormConfig::new(Self::DEFAULT_ATTEMPTS))
    }

    pub fn with_config(form: Form, config: FormConfig) -> Self {
        let store = form
            .block_ids()
            .iter()
            .filter_map(|&id| form.block(id))
            .fold(MemoryStore::new(), |store, block| store.with_table(block.table()));
        let store = Arc::new(store);
        let ui = Arc::new(ScriptedUi::new());
        let dispatcher = CommandDispatcher::new(store.clone(), ui.clone(), config);
        Self {
            form,
            dispatcher,
            ui,
            store,
        }
    }

    // ── Data ─────────────────────────────────────────────────────────

    /// Insert a row directly into the store, outside any transaction.
    pub fn seed<'c>(
        &self,
        table: &str,
        columns: impl IntoIterator<Item = (&'c str, Value)>,
    ) -> RecordId {
        let columns: Columns = columns
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect();
        self.store.seed(table, columns)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Execute a command on the pilot's form.
    pub fn run(&mut self, command: Command) -> Result<CommandOutcome, CommandError> {
        self.dispatcher.execute(&mut self.form, command)
    }

    /// Type a value into a field, as a user would.
    ///
    /// # Panics
    ///
    /// Panics if the block, field, or record does not exist, or the value
    /// has the wrong kind.
    pub fn set_value(&mut self, block: &str, field: &str, record: usize, value: Option<Value>) {
        let field = self.field_id(block, field);
        if let Err(err) = self.block_mut(block).set_value(field, record, value) {
            panic!("cannot set `{block}`: {err}");
        }
    }

    /// Focus a field of a block, activating the block.
    pub fn focus(&mut self, block: &str, field: &str) {
        let block_id = self.block_id(block);
        let field_id = self.field_id(block, field);
        let navigator = FormNavigator::new(self.ui.as_ref());
        navigator.goto_block(&mut self.form, block_id);
        navigator.goto_field(&mut self.form, block_id, field_id);
    }

    // ── Query ────────────────────────────────────────────────────────

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut Form {
        &mut self.form
    }

    pub fn ui(&self) -> &ScriptedUi {
        &self.ui
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// # Panics
    ///
    /// Panics if the form has no block called `name`.
    pub fn block_id(&self, name: &str) -> BlockId {
        match self.form.block_id(name) {
            Some(id) => id,
            None => panic!("no block `{name}`"),
        }
    }

    /// # Panics
    ///
    /// Panics if the block or field does not exist.
    pub fn field_id(&self, block: &str, field: &str) -> FieldId {
        match self.block(block).field_id(field) {
            Some(id) => id,
            None => panic!("no field `{block}.{field}`"),
        }
    }

    /// # Panics
    ///
    /// Panics if the form has no block called `name`.
    pub fn block(&self, name: &str) -> &Block {
        let id = self.block_id(name);
        match self.form.block(id) {
            Some(block) => block,
            None => panic!("no block `{name}`"),
        }
    }

    /// # Panics
    ///
    /// Panics if the form has no block called `name`.
    pub fn block_mut(&mut self, name: &str) -> &mut Block {
        let id = self.block_id(name);
        match self.form.block_mut(id) {
            Some(block) => block,
            None => panic!("no block `{name}`"),
        }
    }

    /// Value of `block.field` in `record`.
    pub fn value(&self, block: &str, field: &str, record: usize) -> Option<Value> {
        let field = self.field_id(block, field);
        self.block(block).value(field, record).cloned()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::block::Mode;

    // ── Construction ─────────────────────────────────────────────────

    #[test]
    fn store_has_a_table_per_block() {
        let pilot = Pilot::orders();
        assert_eq!(pilot.form().block_count(), 2);
        assert!(pilot.store().rows("orders").is_empty());
        assert_eq!(pilot.seed("lines", [("item", Value::from("bolt"))]), RecordId(1));
        assert_eq!(pilot.dispatcher().config().transaction().max_attempts(), 3);
    }

    #[test]
    fn custom_config_is_used() {
        let pilot = Pilot::with_config(Form::new("empty"), FormConfig::new(1).with_query_cap(7));
        assert_eq!(pilot.dispatcher().config().query_cap(), 7);
        assert_eq!(pilot.dispatcher().config().transaction().max_attempts(), 1);
    }

    // ── Data ─────────────────────────────────────────────────────────

    #[test]
    fn seeding_goes_to_the_store() {
        let pilot = Pilot::orders();
        let id = pilot.seed("orders", [("customer", Value::from("a")), ("qty", Value::from(2))]);
        assert_eq!(id, RecordId(1));
        let row = pilot.store().row("orders", id).unwrap();
        assert_eq!(row.get("customer"), Some(&Value::from("a")));
        assert_eq!(row.get("qty"), Some(&Value::from(2)));
    }

    #[test]
    fn set_value_marks_changed() {
        let mut pilot = Pilot::orders();
        pilot.set_value("head", "customer", 0, Some(Value::from("x")));
        assert!(pilot.form().is_changed());
        assert_eq!(pilot.value("head", "customer", 0), Some(Value::from("x")));
    }

    #[test]
    #[should_panic(expected = "no block `nope`")]
    fn unknown_block_panics() {
        Pilot::orders().block_id("nope");
    }

    // ── Focus ────────────────────────────────────────────────────────

    #[test]
    fn focus_activates_block_and_field() {
        let mut pilot = Pilot::orders();
        pilot.focus("lines", "qty");
        assert_eq!(pilot.form().active_block(), Some(pilot.block_id("lines")));
        assert_eq!(
            pilot.block("lines").active_field(),
            Some(pilot.field_id("lines", "qty"))
        );
    }

    #[test]
    fn run_reaches_the_dispatcher() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        pilot.run(Command::InsertMode(head)).unwrap();
        assert_eq!(pilot.block("head").mode(), Mode::Insert);
    }
}
