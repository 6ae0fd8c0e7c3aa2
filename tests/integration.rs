//! Integration tests for galite-forms.
//!
//! These tests drive forms through the public API only: a `Pilot` wired to
//! an in-memory store and a scripted UI, plus the transaction runner on its
//! own for the waiting indicator.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use galite_forms::db::{MemoryStore, Operation, RecordId, Rollback, Transaction};
use galite_forms::error::BlockError;
use galite_forms::testing::{Pilot, ScriptedUi, UiEvent};
use galite_forms::ui::{DefaultMessages, Notice};
use common::{orders, orders_form, orders_with_config, seed_line, seed_order};
use galite_forms::{
    Command, CommandError, CommandOutcome, DbError, Form, FormConfig, MessageKey, Mode,
    TransactionConfig, TransactionRunner,
};
use pretty_assertions::assert_eq;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A pilot with `head` loaded from the given orders.
fn loaded_orders(rows: &[(&str, i64)]) -> Pilot {
    let mut pilot = orders();
    for (customer, qty) in rows {
        seed_order(&pilot, customer, *qty);
    }
    let head = pilot.block_id("head");
    pilot.run(Command::SerialQuery(head)).unwrap();
    pilot
}

#[derive(Default)]
struct Attempts(u32);

impl Rollback for Attempts {
    type Savepoint = ();

    fn savepoint(&self) {}

    fn rollback_to(&mut self, _savepoint: ()) {}
}

fn runner(ui: Arc<ScriptedUi>, delay: Duration) -> TransactionRunner {
    TransactionRunner::new(
        Arc::new(MemoryStore::new()),
        ui,
        Arc::new(DefaultMessages),
        TransactionConfig::new(2).with_wait_delay(delay),
    )
}

fn slow(_: &mut Attempts, _: &mut dyn Transaction) {
    thread::sleep(Duration::from_millis(80));
}

// ---------------------------------------------------------------------------
// Waiting indicator
// ---------------------------------------------------------------------------

#[test]
fn indicator_hidden_once_for_fast_success() {
    let ui = Arc::new(ScriptedUi::new());
    let runner = runner(ui.clone(), Duration::from_secs(5));
    let value = runner
        .run_protected(MessageKey::SavingRecord, &mut Attempts::default(), |_, _| Ok(7))
        .unwrap();

    assert_eq!(value, 7);
    assert_eq!(ui.show_count(), 0);
    assert_eq!(ui.hide_count(), 1);
}

#[test]
fn indicator_hidden_once_for_slow_success() {
    let ui = Arc::new(ScriptedUi::new());
    let runner = runner(ui.clone(), Duration::from_millis(1));
    runner
        .run_protected(MessageKey::LoadingRecord, &mut Attempts::default(), |s, tx| {
            slow(s, tx);
            Ok(())
        })
        .unwrap();

    assert_eq!(ui.show_count(), 1);
    assert_eq!(ui.hide_count(), 1);
    assert_eq!(ui.events().last(), Some(&UiEvent::HideWait));
}

#[test]
fn indicator_hidden_once_for_slow_failure() {
    let ui = Arc::new(ScriptedUi::new());
    let runner = runner(ui.clone(), Duration::from_millis(1));
    let err = runner
        .run_protected(MessageKey::DeletingRecord, &mut Attempts::default(), |s, tx| {
            slow(s, tx);
            s.0 += 1;
            Err::<(), _>(BlockError::Db(DbError::Deadlock("row lock".into())))
        })
        .unwrap_err();

    assert!(matches!(err, CommandError::Fatal(ref f) if f.attempts == 2));
    assert_eq!(ui.show_count(), 1);
    assert_eq!(ui.hide_count(), 1);
}

// ---------------------------------------------------------------------------
// Mode transitions
// ---------------------------------------------------------------------------

#[test]
fn insert_mode_is_guarded_against_reentry() {
    let mut pilot = orders();
    let head = pilot.block_id("head");
    pilot.run(Command::InsertMode(head)).unwrap();

    let err = pilot.run(Command::InsertMode(head)).unwrap_err();
    assert!(matches!(err, CommandError::NotApplicable { .. }));
    assert_eq!(pilot.block("head").mode(), Mode::Insert);
}

#[test]
fn save_advances_to_next_record_then_clears() {
    let mut pilot = loaded_orders(&[("A", 5), ("B", 3)]);
    let head = pilot.block_id("head");
    assert_eq!(pilot.block("head").mode(), Mode::Update);
    assert_eq!(pilot.value("head", "customer", 0), Some("A".into()));

    pilot.run(Command::SaveBlock(head)).unwrap();
    assert_eq!(pilot.block("head").mode(), Mode::Update);
    assert_eq!(pilot.value("head", "customer", 0), Some("B".into()));
    assert_eq!(pilot.value("head", "qty", 0), Some(3.into()));

    pilot.run(Command::SaveBlock(head)).unwrap();
    assert_eq!(pilot.block("head").mode(), Mode::Query);
    assert_eq!(pilot.value("head", "customer", 0), None);
}

#[test]
fn deleting_the_only_record_falls_back_to_empty_query() {
    let mut pilot = loaded_orders(&[("A", 5)]);
    let head = pilot.block_id("head");
    pilot.run(Command::DeleteBlock(head)).unwrap();

    let block = pilot.block("head");
    assert_eq!(block.mode(), Mode::Query);
    assert!(!block.is_changed());
    assert_eq!(pilot.value("head", "customer", 0), None);
    assert!(pilot.store().rows("orders").is_empty());
    assert_eq!(pilot.ui().confirms(), vec![MessageKey::ConfirmDelete]);
}

#[test]
fn delete_when_the_next_row_vanished_falls_back_to_query() {
    let mut pilot = loaded_orders(&[("A", 1), ("B", 2)]);
    let head = pilot.block_id("head");
    assert!(pilot.store().remove("orders", RecordId(2)));

    assert_eq!(pilot.run(Command::DeleteBlock(head)).unwrap(), CommandOutcome::Done);
    assert_eq!(pilot.block("head").mode(), Mode::Query);
    assert_eq!(pilot.value("head", "customer", 0), None);
}

#[test]
fn save_done_on_loaded_lines_returns_to_query() {
    let mut pilot = orders();
    seed_line(&pilot, "bolt", 1);
    seed_line(&pilot, "nut", 2);
    let lines = pilot.block_id("lines");
    pilot.run(Command::SerialQuery(lines)).unwrap();
    pilot.run(Command::SaveDone(lines)).unwrap();

    let block = pilot.block("lines");
    assert_eq!(block.mode(), Mode::Query);
    assert_eq!(block.record_count(), 0);
}

#[test]
fn reset_block_returns_to_query() {
    let mut pilot = loaded_orders(&[("A", 5)]);
    let head = pilot.block_id("head");
    pilot.set_value("head", "qty", 0, Some(6.into()));
    pilot.run(Command::ResetBlock(head)).unwrap();

    assert_eq!(pilot.block("head").mode(), Mode::Query);
    assert_eq!(pilot.ui().confirms(), vec![MessageKey::ConfirmBreak]);
}

// ---------------------------------------------------------------------------
// Retry bound
// ---------------------------------------------------------------------------

#[test]
fn deadlock_on_every_attempt_escalates() {
    let mut pilot = loaded_orders(&[("A", 5)]);
    let head = pilot.block_id("head");
    pilot.set_value("head", "qty", 0, Some(6.into()));
    let before = pilot.store().stats().begun;
    pilot
        .store()
        .fail_always(Operation::Update, DbError::Deadlock("row lock".into()));

    let err = pilot.run(Command::SaveBlock(head)).unwrap_err();
    let CommandError::Fatal(fatal) = err else {
        panic!("expected a fatal error, got {err:?}");
    };
    assert_eq!(fatal.attempts, Pilot::DEFAULT_ATTEMPTS);
    assert_eq!(
        fatal.message,
        "The operation could not be completed. Please try again later."
    );
    assert_eq!(pilot.store().stats().begun - before, Pilot::DEFAULT_ATTEMPTS);
    assert_eq!(pilot.value("head", "qty", 0), Some(6.into()));
    assert_eq!(pilot.block("head").mode(), Mode::Update);
}

#[test]
fn deadlock_that_clears_is_retried_transparently() {
    let mut pilot = loaded_orders(&[("A", 5)]);
    let head = pilot.block_id("head");
    pilot.set_value("head", "qty", 0, Some(6.into()));
    pilot
        .store()
        .fail(Operation::Update, DbError::Serialization("conflict".into()), 2);

    pilot.run(Command::SaveBlock(head)).unwrap();
    assert_eq!(pilot.store().rows("orders")[0].get("qty"), Some(&6.into()));
}

#[test]
fn single_attempt_config_never_retries() {
    let form = orders_form(Form::new("orders"));
    let mut pilot = Pilot::with_config(form, FormConfig::new(1));
    seed_order(&pilot, "A", 1);
    pilot
        .store()
        .fail_always(Operation::Query, DbError::Deadlock("row lock".into()));

    let head = pilot.block_id("head");
    let err = pilot.run(Command::SerialQuery(head)).unwrap_err();
    assert!(matches!(err, CommandError::Fatal(ref f) if f.attempts == 1));
    assert_eq!(pilot.store().stats().begun, 1);
}

// ---------------------------------------------------------------------------
// Field arithmetic
// ---------------------------------------------------------------------------

#[test]
fn increment_and_decrement_of_null_both_give_one() {
    let mut pilot = orders();
    let head = pilot.block_id("head");
    let qty = pilot.field_id("head", "qty");

    pilot.run(Command::Increment(head, qty)).unwrap();
    assert_eq!(pilot.value("head", "qty", 0), Some(1.into()));

    pilot.set_value("head", "qty", 0, None);
    pilot.run(Command::Decrement(head, qty)).unwrap();
    assert_eq!(pilot.value("head", "qty", 0), Some(1.into()));
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

#[test]
fn insert_line_into_empty_block_focuses_new_record() {
    let mut pilot = orders();
    let lines = pilot.block_id("lines");
    pilot.focus("lines", "item");
    pilot.run(Command::InsertLine(lines)).unwrap();

    let block = pilot.block("lines");
    assert_eq!(block.record_count(), 1);
    assert_eq!(block.active_record(), Some(0));
    let focus = pilot.ui().last_focus().unwrap();
    assert_eq!(focus.block, "lines");
    assert_eq!(focus.record, Some(0));
}

#[test]
fn failed_insert_line_restores_position() {
    let mut pilot = orders();
    for item in ["bolt", "nut", "washer"] {
        seed_line(&pilot, item, 1);
    }
    let lines = pilot.block_id("lines");
    pilot.run(Command::SerialQuery(lines)).unwrap();
    pilot.focus("lines", "item");
    pilot.block_mut("lines").goto_record(1);

    let err = pilot.run(Command::InsertLine(lines)).unwrap_err();
    assert!(matches!(
        err.block_error(),
        Some(BlockError::NoFreeLine { .. })
    ));
    let block = pilot.block("lines");
    assert_eq!(block.record_count(), 3);
    assert_eq!(block.active_record(), Some(1));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn overflow_keeps_partial_result_and_warns() {
    let mut pilot = orders_with_config(FormConfig::new(Pilot::DEFAULT_ATTEMPTS).with_query_cap(2));
    for item in ["bolt", "nut", "washer", "screw"] {
        seed_line(&pilot, item, 1);
    }
    let lines = pilot.block_id("lines");
    let outcome = pilot.run(Command::SerialQuery(lines)).unwrap();

    let CommandOutcome::Loaded {
        overflow: Some(warning),
    } = outcome
    else {
        panic!("expected an overflow, got {outcome:?}");
    };
    assert_eq!(pilot.block("lines").record_count(), 2);
    let notice = Notice::overflow(warning, &DefaultMessages);
    assert_eq!(notice.to_string(), "Too many rows; only the first ones were loaded.");
    assert!(pilot.ui().events().contains(&UiEvent::Notice(notice)));
}

#[test]
fn query_without_rows_reports_no_data() {
    let mut pilot = orders();
    let head = pilot.block_id("head");
    let err = pilot.run(Command::SerialQuery(head)).unwrap_err();

    assert_eq!(err.to_string(), "No data found.");
    assert_eq!(pilot.block("head").mode(), Mode::Query);
    assert_eq!(pilot.form().active_block(), Some(head));
}

#[test]
fn menu_query_lets_the_user_pick() {
    let mut pilot = orders();
    seed_order(&pilot, "A", 1);
    seed_order(&pilot, "B", 2);
    let head = pilot.block_id("head");
    pilot.ui().push_choice(Some(1));
    pilot.run(Command::MenuQuery(head)).unwrap();

    assert_eq!(pilot.value("head", "customer", 0), Some("B".into()));
    assert_eq!(pilot.block("head").mode(), Mode::Update);
    assert_eq!(pilot.ui().choices()[0].0, MessageKey::PickRecord);
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

#[test]
fn quit_closes_the_form_for_good() {
    let mut pilot = orders();
    let head = pilot.block_id("head");
    let outcome = pilot.run(Command::QuitForm).unwrap();
    assert!(matches!(outcome, CommandOutcome::Closed(_)));

    assert!(pilot.run(Command::InsertMode(head)).is_err());
}
