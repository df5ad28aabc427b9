//! Comparison predicates for change detection
//!
//! A predicate answers "are these two values of setting `name` equal?".
//! Stores look predicates up by name at evaluation time, so a store
//! configured with a name nobody registered fails only when it compares.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the default predicate (plain `==`)
pub const STRICT: &str = "strict";

/// Name of the predicate that ignores array order
pub const UNORDERED_ARRAYS: &str = "unordered_arrays";

/// Per-setting equality predicate: `(name, current, saved) -> equal`
pub type Comparator = Arc<dyn Fn(&str, &Value, &Value) -> bool + Send + Sync>;

/// Built-in predicates keyed by name
pub fn builtins() -> HashMap<String, Comparator> {
    let mut comparators: HashMap<String, Comparator> = HashMap::new();
    comparators.insert(STRICT.to_string(), Arc::new(|_: &str, a: &Value, b: &Value| a == b));
    comparators.insert(
        UNORDERED_ARRAYS.to_string(),
        Arc::new(|_: &str, a: &Value, b: &Value| unordered_eq(a, b)),
    );
    comparators
}

/// Deep equality where arrays are compared as multisets
pub fn unordered_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut unmatched: Vec<&Value> = b.iter().collect();
            a.iter().all(|item| {
                match unmatched.iter().position(|other| unordered_eq(item, other)) {
                    Some(index) => {
                        unmatched.swap_remove(index);
                        true
                    }
                    None => false,
                }
            })
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| unordered_eq(value, other)))
        }
        _ => a == b,
    }
}
