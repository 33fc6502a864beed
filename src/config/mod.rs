//! Generic tree-structured configuration format.
//!
//! A [`Config`] owns two arenas of linked-list nodes (object members and
//! array elements) addressed by compact `u32` handles, so building and
//! walking a tree never chases heap pointers per node. Values are a closed
//! sum ([`ConfigValue`]); nested objects and arrays are handles into the
//! arenas.
//!
//! The text format is line-oriented `key = value` pairs with `{}` objects,
//! `[]` arrays, `//` and `/* */` comments:
//!
//! ```text
//! position = { x = 1.5  y = -2.0 }
//! tags = ["a" "b"]
//! ```

mod tokenizer;
mod translator;
mod tree;
mod value;

pub use tokenizer::ParseError;
pub use translator::DataTranslator;
pub use tree::{Config, ConfigFormat, GenericValue};
pub use value::{ArrayNodeHandle, ConfigArray, ConfigObject, ConfigValue, ObjectNodeHandle};
