//! Store key layout.
//!
//! | structure           | key          | contents                  |
//! |---------------------|--------------|---------------------------|
//! | record              | `T:id`       | hash: attribute -> value  |
//! | id counter          | `T:id_counter` | integer                 |
//! | unique index        | `u:T:f`      | hash: value -> id         |
//! | multi-value index   | `i:T:f:v`    | set of ids                |
//! | score-ordered index | `z:T:f`      | sorted set: id -> score   |
//! | list-ordered index  | `l:T:f:v`    | list of ids               |
//! | container field     | `T:id:f`     | list, set or sorted set   |

use crate::types::ObjectId;

pub fn record_key(type_name: &str, id: ObjectId) -> String {
    format!("{}:{}", type_name, id)
}

pub fn counter_key(type_name: &str) -> String {
    format!("{}:id_counter", type_name)
}

pub fn unique_key(type_name: &str, field: &str) -> String {
    format!("u:{}:{}", type_name, field)
}

/// Prefix of every multi-value index key of one field.
pub fn multi_base(type_name: &str, field: &str) -> String {
    format!("i:{}:{}", type_name, field)
}

pub fn multi_key(type_name: &str, field: &str, value: &str) -> String {
    format!("i:{}:{}:{}", type_name, field, value)
}

pub fn score_key(type_name: &str, field: &str) -> String {
    format!("z:{}:{}", type_name, field)
}

pub fn list_key(type_name: &str, field: &str, value: &str) -> String {
    format!("l:{}:{}:{}", type_name, field, value)
}

pub fn container_key(record_key: &str, field: &str) -> String {
    format!("{}:{}", record_key, field)
}
