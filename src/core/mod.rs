pub mod attribute;
pub mod error;
pub mod identity;
pub mod types;
pub mod value;

pub use attribute::reset_default_for_zero_values;
pub use error::{ManipError, Result};
pub use identity::{AttributeSpec, ContentIdentifiable, Identifiable, Identity, Model, decode, encode};
pub use types::{Document, ID_FIELD, lookup_path};
pub use value::{Value, is_zero_json, json_compare, json_equals};
