//! Order entry fixture shared by the integration tests.

use galite_forms::db::RecordId;
use galite_forms::form::{Block, Field, Form, Value};
use galite_forms::testing::Pilot;
use galite_forms::FormConfig;

/// A single-record `head` block on `orders` (mandatory `customer`, `qty`
/// defaulting to 1) followed by a three-line `lines` block (`item`, `qty`).
pub fn orders_form(mut form: Form) -> Form {
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

pub fn orders() -> Pilot {
    Pilot::new(orders_form(Form::new("orders")))
}

pub fn orders_with_config(config: FormConfig) -> Pilot {
    Pilot::with_config(orders_form(Form::new("orders")), config)
}

pub fn seed_order(pilot: &Pilot, customer: &str, qty: i64) -> RecordId {
    pilot.seed("orders", [("customer", Value::from(customer)), ("qty", Value::from(qty))])
}

pub fn seed_line(pilot: &Pilot, item: &str, qty: i64) -> RecordId {
    pilot.seed("lines", [("item", Value::from(item)), ("qty", Value::from(qty))])
}
