//! Structured field values.
//!
//! Context and call-site fields are JSON-shaped: strings, numbers, booleans,
//! null, and nested sequences or mappings of the same. [`Fields`] keeps keys
//! in insertion order, and re-inserting an existing key updates its value in
//! place.

use serde::Serialize;
use std::fmt::Debug;

pub use serde_json::Value;

/// Ordered mapping of field name to value.
pub type Fields = serde_json::Map<String, Value>;

/// Convert any serializable value into a field [`Value`].
///
/// Values serde cannot represent (maps with non-string keys, failing
/// `Serialize` impls) fall back to their `Debug` string instead of failing
/// the log call.
pub fn to_value<T>(value: &T) -> Value
where
    T: Serialize + Debug + ?Sized,
{
    serde_json::to_value(value).unwrap_or_else(|_| Value::String(format!("{:?}", value)))
}

/// Merge `overlay` over `base`: new keys are appended, existing keys keep
/// their position and take the overlay's value.
pub fn merge(base: &mut Fields, overlay: &Fields) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}

/// Build a [`Fields`] map from `key => value` pairs.
///
/// ```
/// use rag_observability::fields;
///
/// let fields = fields! { "request_id" => "r1", "attempt" => 2 };
/// assert_eq!(fields["attempt"], 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::value::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::value::Fields::new();
        $(
            fields.insert(::std::string::String::from($key), $crate::value::to_value(&$value));
        )+
        fields
    }};
}
