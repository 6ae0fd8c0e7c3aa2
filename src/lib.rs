//! # galite-forms
//!
//! The block command engine of a data-entry form framework.
//!
//! A form is a set of blocks bound to database tables. Users drive blocks
//! through commands (query, insert, save, delete, navigate), and every
//! command that touches the database runs as a protected transaction:
//! retried on transient failures, rolled back to a savepoint of the block
//! state on each failed attempt, and shown behind a delayed busy indicator.
//!
//! ## Core Systems
//!
//! - **[`form`]**: values, fields, records, blocks, and the form arena
//! - **[`db`]**: data source traits, in-memory store, [`TransactionRunner`]
//! - **[`commands`]**: the [`CommandDispatcher`] and every block command
//! - **[`navigation`]**: focus chains and the [`FormNavigator`]
//! - **[`ui`]**: the [`FormUi`] collaborator and message keys
//! - **[`config`]**: [`FormConfig`] and its builder
//! - **[`error`]**: failure classification and command errors
//! - **[`logging`]**: `tracing` subscriber setup
//! - **[`testing`]**: headless [`Pilot`](testing::Pilot) and scripted UI
//!
//! ## Example
//!
//! ```
//! use galite_forms::{Command, CommandOutcome, FormConfig, IsolationLevel, TransactionConfig};
//! use galite_forms::form::{Block, Field, Form, Value};
//! use galite_forms::testing::Pilot;
//!
//! let config = FormConfig::from_transaction(
//!     TransactionConfig::new(2).with_isolation(IsolationLevel::Serializable),
//! );
//! let mut form = Form::new("orders");
//! form.add_block(
//!     Block::single("head", "orders")
//!         .with_field(Field::text("customer").with_column("customer"))
//!         .with_field(Field::integer("qty").with_column("qty")),
//! );
//! let mut pilot = Pilot::with_config(form, config);
//! pilot.seed("orders", [("customer", Value::from("ACME")), ("qty", Value::from(3))]);
//!
//! let head = pilot.block_id("head");
//! let outcome = pilot.run(Command::SerialQuery(head)).unwrap();
//! assert_eq!(outcome, CommandOutcome::Loaded { overflow: None });
//! ```

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod logging;
pub mod navigation;
pub mod testing;
pub mod ui;

pub use commands::{Command, CommandDispatcher, CommandOutcome};
pub use config::FormConfig;
pub use db::{DataSource, DbError, IsolationLevel, MemoryStore, TransactionConfig, TransactionRunner};
pub use error::{CommandError, FailureClass, FatalTransactionError, InternalConsistencyError};
pub use form::{Block, BlockId, FieldId, Form, Mode};
pub use navigation::{FocusChain, FormNavigator};
pub use ui::{FocusTarget, FormUi, MessageKey};
