// ABOUTME: Minimal JSON codec: builders from primitives, key-based extractors.
// ABOUTME: Not a grammar; extractors return neutral values on malformed input.

mod scan;

pub mod build;
pub mod extract;
pub mod sanitize;

pub use build::{array, boolean, escape, number, object, string};
pub use extract::{
    array_items, first_object, get_array, get_bool, get_number, get_object, get_string,
    get_string_array, has_key, unescape,
};
pub use sanitize::sanitize_schema;
