//! Schema-driven object graphs over the NRBF record stream.
//!
//! A [`Schema`] names the classes a document may hold. Decoding runs the
//! record codec and then [`GraphBuilder`] turns class records into shared
//! [`Object`]s; encoding runs [`Linearizer`] to flatten a root object back into
//! records. [`read_document`] and [`write_document`] add the file preamble.
//!
//! # Architecture
//!
//! - **schema**: static class tables, field aliases, write priorities, version gates
//! - **value**: [`Value`] / [`Object`], the native graph
//! - **builder**: records to objects, with identity memoization
//! - **linearizer**: objects to records, breadth-first with metadata reuse
//! - **document**: preamble plus stream

pub mod builder;
pub mod document;
pub mod error;
pub mod linearizer;
pub mod schema;
pub mod value;
pub mod version;

pub use builder::GraphBuilder;
pub use document::{read_document, read_records, write_document, Document, Preamble};
pub use error::{GraphError, GraphResult};
pub use linearizer::Linearizer;
pub use schema::{
    ClassRole, ClassSpec, FieldKind, FieldSpec, Schema, StaticSchema, TypeArg, CORE_LIBRARY,
};
pub use value::{Object, Value};
pub use version::FormatVersion;
