//! Headless testing harness: [`Pilot`] and [`ScriptedUi`].
//!
//! Use the [`Pilot`] to run commands against a form backed by an in-memory
//! store, answering confirmations and choices from a script instead of a
//! real user.

#[cfg(test)]
mod fixtures;
pub mod pilot;
pub mod ui;

pub use pilot::Pilot;
pub use ui::{ScriptedUi, UiEvent};
