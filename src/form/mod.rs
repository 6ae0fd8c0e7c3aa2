//! Form data model: values, fields, records, blocks, and forms.

pub mod block;
pub mod field;
pub mod model;
pub mod record;
pub mod value;

pub use block::{Block, BlockKind, BlockSavepoint, FieldId, Mode};
pub use field::{Field, FieldCheck, IntegerArithmetic};
pub use model::{BlockId, CloseCode, DictionaryFlags, Form, FormKind};
pub use record::{FetchCursor, Record};
pub use value::{FieldKind, SearchOperator, Value};
