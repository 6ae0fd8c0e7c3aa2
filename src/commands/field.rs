//! Field commands: increment, decrement, search operator.

use crate::error::CommandError;
use crate::form::block::FieldId;
use crate::form::field::Field;
use crate::form::model::{BlockId, Form};
use crate::form::value::SearchOperator;
use crate::ui::MessageKey;

use super::{block_mut, CommandDispatcher, CommandOutcome};

impl CommandDispatcher {
    /// Add one to an integer field of the active record.
    ///
    /// A null field becomes 1.
    pub fn increment(
        &self,
        form: &mut Form,
        block: BlockId,
        field: FieldId,
    ) -> Result<CommandOutcome, CommandError> {
        self.step_field(form, block, field, 1, "increment")
    }

    /// Subtract one from an integer field of the active record.
    ///
    /// A null field becomes 1, like [`increment`](Self::increment).
    pub fn decrement(
        &self,
        form: &mut Form,
        block: BlockId,
        field: FieldId,
    ) -> Result<CommandOutcome, CommandError> {
        self.step_field(form, block, field, -1, "decrement")
    }

    fn step_field(
        &self,
        form: &mut Form,
        block: BlockId,
        field: FieldId,
        delta: i64,
        command: &'static str,
    ) -> Result<CommandOutcome, CommandError> {
        self.navigator().goto_field(form, block, field);
        let b = block_mut(form, block, command)?;
        let record = b
            .active_record()
            .ok_or_else(|| CommandError::not_applicable(command, "the block has no active record"))?;
        let f = b
            .field(field)
            .ok_or_else(|| CommandError::not_applicable(command, "unknown field"))?;
        f.validate(record, false)?;
        let name = f.name().to_owned();

        let mut arithmetic = b
            .field_mut(field)
            .and_then(Field::arithmetic)
            .ok_or(CommandError::NotNumeric { field: name })?;
        let next = match arithmetic.get(record) {
            None => 1,
            Some(value) => value.saturating_add(delta),
        };
        arithmetic.set(record, next)?;
        b.set_record_changed(record, true);
        Ok(CommandOutcome::Done)
    }

    /// Let the user pick the search operator of the block's active field.
    pub fn set_search_operator(
        &self,
        form: &mut Form,
        block: BlockId,
    ) -> Result<CommandOutcome, CommandError> {
        let b = block_mut(form, block, "set_search_operator")?;
        let field = b.active_field().ok_or_else(|| {
            CommandError::not_applicable("set_search_operator", "the block has no active field")
        })?;
        let options: Vec<String> = SearchOperator::ALL
            .iter()
            .map(|op| op.symbol().to_owned())
            .collect();
        let Some(operator) = self
            .ui()
            .present_choice(MessageKey::SearchOperator, &options)
            .and_then(|index| SearchOperator::ALL.get(index).copied())
        else {
            return Ok(CommandOutcome::Cancelled);
        };
        if let Some(f) = b.field_mut(field) {
            tracing::debug!(field = f.name(), %operator, "search operator");
            f.set_search_operator(operator);
        }
        Ok(CommandOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{Command, CommandOutcome};
    use crate::error::CommandError;
    use crate::form::value::{SearchOperator, Value};
    use crate::testing::Pilot;
    use pretty_assertions::assert_eq;

    #[test]
    fn increment_and_decrement_from_null_give_one() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        let qty = pilot.field_id("head", "qty");

        pilot.run(Command::Increment(head, qty)).unwrap();
        assert_eq!(pilot.value("head", "qty", 0), Some(Value::from(1)));

        pilot.set_value("head", "qty", 0, None);
        pilot.run(Command::Decrement(head, qty)).unwrap();
        assert_eq!(pilot.value("head", "qty", 0), Some(Value::from(1)));
    }

    #[test]
    fn increment_and_decrement_step_by_one() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        let qty = pilot.field_id("head", "qty");
        pilot.set_value("head", "qty", 0, Some(Value::from(5)));

        pilot.run(Command::Increment(head, qty)).unwrap();
        pilot.run(Command::Increment(head, qty)).unwrap();
        pilot.run(Command::Decrement(head, qty)).unwrap();
        assert_eq!(pilot.value("head", "qty", 0), Some(Value::from(6)));
        assert!(pilot.block("head").is_record_changed(0));
        assert_eq!(pilot.ui().last_focus().unwrap().field, "qty");
    }

    #[test]
    fn increment_saturates() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        let qty = pilot.field_id("head", "qty");
        pilot.set_value("head", "qty", 0, Some(Value::from(i64::MAX)));
        pilot.run(Command::Increment(head, qty)).unwrap();
        assert_eq!(pilot.value("head", "qty", 0), Some(Value::from(i64::MAX)));
    }

    #[test]
    fn text_field_is_not_numeric() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        let customer = pilot.field_id("head", "customer");
        let err = pilot.run(Command::Increment(head, customer)).unwrap_err();
        assert!(matches!(err, CommandError::NotNumeric { ref field } if field == "customer"));
    }

    #[test]
    fn empty_multi_block_has_no_active_record() {
        let mut pilot = Pilot::orders();
        let lines = pilot.block_id("lines");
        let qty = pilot.field_id("lines", "qty");
        let err = pilot.run(Command::Increment(lines, qty)).unwrap_err();
        assert!(matches!(err, CommandError::NotApplicable { command: "increment", .. }));
    }

    #[test]
    fn search_operator_from_choice() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        let qty = pilot.field_id("head", "qty");
        pilot.focus("head", "qty");
        pilot.ui().push_choice(Some(4));

        pilot.run(Command::SetSearchOperator(head)).unwrap();
        let field = pilot.block("head").field(qty).unwrap();
        assert_eq!(field.search_operator(), SearchOperator::Ge);

        let choices = pilot.ui().choices();
        assert_eq!(choices[0].1, vec!["=", "<", ">", "<=", ">=", "<>"]);
    }

    #[test]
    fn search_operator_cancelled_or_without_field() {
        let mut pilot = Pilot::orders();
        let head = pilot.block_id("head");
        assert!(pilot.run(Command::SetSearchOperator(head)).is_err());

        pilot.focus("head", "qty");
        assert_eq!(
            pilot.run(Command::SetSearchOperator(head)).unwrap(),
            CommandOutcome::Cancelled
        );
    }
}
