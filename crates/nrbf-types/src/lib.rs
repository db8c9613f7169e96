//! Foundation types for the NRBF object-graph codec.
//!
//! Every other crate in the workspace depends on `nrbf-types`. It carries no
//! I/O: only the wire enumerations and the scalar values they describe.
//!
//! # Key Types
//!
//! - [`RecordType`], [`PrimitiveType`], [`BinaryType`], [`BinaryArrayType`]: one-byte wire tags
//! - [`PrimitiveValue`]: a scalar tagged with its wire type
//! - [`NetDateTime`] / [`TimeSpan`]: 100ns tick-based time values
//! - [`Decimal`]: decimal numbers kept in textual form

pub mod decimal;
pub mod error;
pub mod primitive;
pub mod tags;
pub mod temporal;

pub use decimal::Decimal;
pub use error::TypeError;
pub use primitive::PrimitiveValue;
pub use tags::{BinaryArrayType, BinaryType, MessageFlags, PrimitiveType, RecordType};
pub use temporal::{DateTimeKind, NetDateTime, TimeSpan, TICKS_PER_SECOND};
