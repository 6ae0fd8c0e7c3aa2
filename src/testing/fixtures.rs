//! Order entry fixture for unit tests.

use crate::config::FormConfig;
use crate::db::source::RecordId;
use crate::form::block::Block;
use crate::form::field::Field;
use crate::form::model::Form;
use crate::form::value::Value;

use super::pilot::Pilot;

impl Pilot {
    /// A single-record `head` block on `orders` (mandatory `customer`,
    /// `qty` defaulting to 1) followed by a three-line `lines` block
    /// (`item`, `qty`).
    pub(crate) fn orders() -> Self {
        Self::new(Self::orders_form(Form::new("orders")))
    }

    pub(crate) fn orders_with_cap(cap: usize) -> Self {
        let config = FormConfig::new(Self::DEFAULT_ATTEMPTS).with_query_cap(cap);
        Self::with_config(Self::orders_form(Form::new("orders")), config)
    }

    /// Add the order entry blocks to `form`.
    pub(crate) fn orders_form(mut form: Form) -> Form {
        form.add_block(
            Block::single("head", "orders")
                .with_title("Order")
                .with_field(Field::text("customer").with_column("customer").mandatory(true))
                .with_field(Field::integer("qty").with_column("qty").with_default(1)),
        );
        form.add_block(
            Block::multi("lines", "lines", 3)
                .with_title("Order lines")
                .with_field(Field::text("item").with_column("item"))
                .with_field(Field::integer("qty").with_column("qty")),
        );
        form
    }

    pub(crate) fn seed_order(&self, customer: &str, qty: i64) -> RecordId {
        self.seed("orders", [("customer", Value::from(customer)), ("qty", Value::from(qty))])
    }

    pub(crate) fn seed_line(&self, item: &str, qty: i64) -> RecordId {
        self.seed("lines", [("item", Value::from(item)), ("qty", Value::from(qty))])
    }
}
