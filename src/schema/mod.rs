pub mod hashcode;
pub mod types;
pub mod validate;

pub use types::{Field, FieldType, Schema};
pub use validate::SchemaError;
