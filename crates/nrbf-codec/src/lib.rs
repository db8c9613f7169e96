//! Record-stream codec for the NRBF binary object-graph format.
//!
//! Decoding is two-phase: [`parse_stream`] walks the tagged records and
//! registers each one in a [`Session`]; [`resolve_references`] then fills every
//! reference cell. Encoding is the plain inverse, [`build_stream`].
//!
//! # Layers
//!
//! - [`wire`]: scalar values, varint-prefixed strings, UTF-8 code points
//! - [`record`]: the record model ([`Record`], [`ClassRecord`], [`BinaryArray`], ...)
//! - [`stream`]: record grammar, parse and build
//! - [`session`]: per-stream class / object / library / reference registries
//! - [`array`]: capacity padding and null-run compaction
//! - [`resolve`]: the reference fixup pass

pub mod array;
pub mod error;
pub mod record;
pub mod resolve;
pub mod session;
pub mod stream;
pub mod wire;

pub use array::{null_run, padded_length};
pub use error::{CodecError, CodecResult};
pub use record::{
    split_generic, ArraySingle, ArraySinglePrimitive, BinaryArray, BinaryLibrary, BinaryTypeInfo,
    ClassDefinition, ClassLayout, ClassRecord, MemberReference, MemberValue, MethodCall,
    MethodReturn, Node, Record, StreamHeader, StringRecord,
};
pub use resolve::resolve_references;
pub use session::Session;
pub use stream::{build_stream, parse_stream, parse_stream_with, write_record, ParseOptions};
pub use wire::{WireReader, WireWriter};

/// Parse a stream and resolve its references in one step.
pub fn decode_stream(bytes: &[u8], options: &ParseOptions) -> CodecResult<(Vec<Node>, Session)> {
    let mut session = Session::new();
    let records = parse_stream_with(bytes, &mut session, options)?;
    resolve_references(&mut session)?;
    Ok((records, session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrbf_types::PrimitiveValue;
    use std::sync::Arc;

    #[test]
    fn decode_stream_resolves() {
        let records = vec![
            Arc::new(Record::Header(StreamHeader::standard())),
            Arc::new(Record::String(StringRecord {
                object_id: 1,
                value: "root".into(),
            })),
            Arc::new(Record::Reference(MemberReference { id_ref: 1 })),
            Arc::new(Record::MemberPrimitive {
                value: PrimitiveValue::Int32(1),
            }),
            Arc::new(Record::MessageEnd),
        ];
        let bytes = build_stream(&records).unwrap();
        let (parsed, session) = decode_stream(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.len(), 5);
        assert!(session.resolve(1).is_ok());
    }

    #[test]
    fn decode_stream_reports_dangling() {
        let records = vec![
            Arc::new(Record::Reference(MemberReference { id_ref: 42 })),
            Arc::new(Record::MessageEnd),
        ];
        let bytes = build_stream(&records).unwrap();
        let err = decode_stream(&bytes, &ParseOptions::default()).unwrap_err();
        assert_eq!(err, CodecError::UnresolvedReference { id: 42 });
    }
}
