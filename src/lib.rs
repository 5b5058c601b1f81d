//! goschema turns an annotated Go package into a language-neutral
//! webrpc interface schema.
//!
//! Point [`parse`] at a directory containing interfaces annotated with
//! `//go:webrpc` directives; it loads the package, walks every method
//! signature and every transitively referenced type, and returns one
//! [`Target`] per directive with the synthesized [`schema::Schema`].

pub mod error;
pub mod r#gen;
pub mod go;
pub mod load;
pub mod parser;
pub mod schema;

pub use error::Error;
pub use parser::{Target, parse};
