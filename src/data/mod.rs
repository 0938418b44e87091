pub mod message;
pub mod value;

pub use message::{Message, MessageError, MessageSummary, MESSAGE_FIELD};
pub use value::{flatten_json, Value};
