//! Frame processing pipeline
//!
//! Raw frame -> `parse` -> `ReadingBuilder::build` (which calls `validate`
//! for every mapped field) -> `Reading`. Everything here is pure and
//! synchronous.

pub mod fields;
pub mod parser;
pub mod reading;
pub mod validator;

pub use fields::{FieldSpec, FieldTable};
pub use parser::{parse, ParsedFrame, ID_KEY};
pub use reading::{Reading, ReadingBuilder, ReadingSummary, LOG_TIMESTAMP_FORMAT};
pub use validator::validate;
