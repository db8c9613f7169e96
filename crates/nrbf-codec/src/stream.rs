//! Record stream parsing and building.

use std::sync::Arc;

use nrbf_types::{BinaryArrayType, BinaryType, MessageFlags, PrimitiveType, PrimitiveValue, RecordType};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{CodecError, CodecResult};
use crate::record::{
    ArraySingle, ArraySinglePrimitive, BinaryArray, BinaryLibrary, BinaryTypeInfo,
    ClassDefinition, ClassLayout, ClassRecord, MemberReference, MemberValue, MethodCall,
    MethodReturn, Node, Record, StreamHeader, StringRecord,
};
use crate::session::Session;
use crate::wire::{WireReader, WireWriter};

/// Default bound on record nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Deepest permitted record nesting; deeper input is rejected.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Parse records until `MessageEnd` with default options.
///
/// Every record registers itself in `session`; references are left
/// unresolved.
pub fn parse_stream(bytes: &[u8], session: &mut Session) -> CodecResult<Vec<Node>> {
    parse_stream_with(bytes, session, &ParseOptions::default())
}

pub fn parse_stream_with(
    bytes: &[u8],
    session: &mut Session,
    options: &ParseOptions,
) -> CodecResult<Vec<Node>> {
    let mut parser = Parser {
        reader: WireReader::new(bytes),
        session,
        options,
        depth: 0,
    };
    let mut records = Vec::new();
    loop {
        let node = parser.read_record()?;
        let end = matches!(*node, Record::MessageEnd);
        records.push(node);
        if end {
            break;
        }
    }
    if !parser.reader.is_empty() {
        warn!(
            offset = parser.reader.offset(),
            trailing = parser.reader.remaining(),
            "ignoring bytes after message end"
        );
    }
    debug!(
        records = records.len(),
        classes = parser.session.class_count(),
        objects = parser.session.object_count(),
        "record stream parsed"
    );
    Ok(records)
}

struct Parser<'a, 's, 'o> {
    reader: WireReader<'a>,
    session: &'s mut Session,
    options: &'o ParseOptions,
    depth: usize,
}

impl Parser<'_, '_, '_> {
    fn read_record(&mut self) -> CodecResult<Node> {
        if self.depth >= self.options.max_depth {
            return Err(CodecError::NestingTooDeep {
                offset: self.reader.offset(),
                max_depth: self.options.max_depth,
            });
        }
        self.depth += 1;
        let result = self.read_record_body();
        self.depth -= 1;
        let node = Arc::new(result?);
        self.session.register(&node);
        Ok(node)
    }

    fn read_record_body(&mut self) -> CodecResult<Record> {
        let offset = self.reader.offset();
        let tag = RecordType::from_byte(self.reader.read_u8()?)
            .map_err(|source| CodecError::InvalidTag { offset, source })?;
        trace!(offset, %tag, "record");
        let record = match tag {
            RecordType::SerializedStreamHeader => Record::Header(StreamHeader {
                root_id: self.reader.read_i32()?,
                header_id: self.reader.read_i32()?,
                major_version: self.reader.read_i32()?,
                minor_version: self.reader.read_i32()?,
            }),
            RecordType::ClassWithId => {
                let object_id = self.reader.read_i32()?;
                let metadata_id = self.reader.read_i32()?;
                let definition = self.session.definition(metadata_id)?;
                let members = self.read_members(&definition)?;
                Record::Class(ClassRecord {
                    object_id,
                    layout: ClassLayout::Reuse { metadata_id },
                    definition,
                    members,
                })
            }
            RecordType::SystemClassWithMembers
            | RecordType::ClassWithMembers
            | RecordType::SystemClassWithMembersAndTypes
            | RecordType::ClassWithMembersAndTypes => self.read_class(tag)?,
            RecordType::BinaryObjectString => Record::String(StringRecord {
                object_id: self.reader.read_i32()?,
                value: self.reader.read_string()?,
            }),
            RecordType::BinaryArray => Record::BinaryArray(self.read_binary_array()?),
            RecordType::MemberPrimitiveTyped => {
                let ty = self.reader.read_primitive_type()?;
                Record::MemberPrimitive {
                    value: self.reader.read_primitive(ty)?,
                }
            }
            RecordType::MemberReference => Record::Reference(MemberReference {
                id_ref: self.reader.read_i32()?,
            }),
            RecordType::ObjectNull => Record::ObjectNull,
            RecordType::MessageEnd => Record::MessageEnd,
            RecordType::BinaryLibrary => Record::Library(BinaryLibrary {
                library_id: self.reader.read_i32()?,
                name: self.reader.read_string()?,
            }),
            RecordType::ObjectNullMultiple256 => Record::NullMultiple256 {
                null_count: self.reader.read_u8()?,
            },
            RecordType::ObjectNullMultiple => {
                let null_count = self.reader.read_count("null count")?;
                Record::NullMultiple {
                    null_count: null_count as i32,
                }
            }
            RecordType::ArraySinglePrimitive => {
                let object_id = self.reader.read_i32()?;
                let length = self.reader.read_count("array length")?;
                let element = self.reader.read_primitive_type()?;
                let mut values = Vec::with_capacity(length.min(self.reader.remaining()));
                for _ in 0..length {
                    values.push(self.reader.read_primitive(element)?);
                }
                Record::ArraySinglePrimitive(ArraySinglePrimitive {
                    object_id,
                    element,
                    values,
                })
            }
            RecordType::ArraySingleObject | RecordType::ArraySingleString => {
                let object_id = self.reader.read_i32()?;
                let length = self.reader.read_count("array length")?;
                let members = self.read_spanned_records(length)?;
                let array = ArraySingle {
                    object_id,
                    length: length as i32,
                    members,
                };
                if tag == RecordType::ArraySingleObject {
                    Record::ArraySingleObject(array)
                } else {
                    Record::ArraySingleString(array)
                }
            }
            RecordType::MethodCall => Record::MethodCall(self.read_method_call()?),
            RecordType::MethodReturn => Record::MethodReturn(self.read_method_return()?),
        };
        Ok(record)
    }

    fn read_class(&mut self, tag: RecordType) -> CodecResult<Record> {
        let object_id = self.reader.read_i32()?;
        let name = self.reader.read_string()?;
        let count = self.reader.read_count("member count")?;
        let mut member_names = Vec::with_capacity(count.min(self.reader.remaining()));
        for _ in 0..count {
            member_names.push(self.reader.read_string()?);
        }
        let typed = matches!(
            tag,
            RecordType::SystemClassWithMembersAndTypes | RecordType::ClassWithMembersAndTypes
        );
        let member_types = if typed {
            Some(self.read_member_types(count)?)
        } else {
            None
        };
        let library_id = match tag {
            RecordType::ClassWithMembers | RecordType::ClassWithMembersAndTypes => {
                Some(self.reader.read_i32()?)
            }
            _ => None,
        };
        let definition = Arc::new(ClassDefinition {
            name,
            member_names,
            member_types,
            library_id,
        });
        let members = self.read_members(&definition)?;
        Ok(Record::Class(ClassRecord {
            object_id,
            layout: ClassLayout::Inline,
            definition,
            members,
        }))
    }

    fn read_member_types(&mut self, count: usize) -> CodecResult<Vec<BinaryTypeInfo>> {
        let mut kinds = Vec::with_capacity(count.min(self.reader.remaining()));
        for _ in 0..count {
            kinds.push(self.read_binary_type()?);
        }
        kinds
            .into_iter()
            .map(|kind| self.read_additional_info(kind))
            .collect()
    }

    fn read_binary_type(&mut self) -> CodecResult<BinaryType> {
        let offset = self.reader.offset();
        BinaryType::from_byte(self.reader.read_u8()?)
            .map_err(|source| CodecError::InvalidTag { offset, source })
    }

    fn read_additional_info(&mut self, kind: BinaryType) -> CodecResult<BinaryTypeInfo> {
        Ok(match kind {
            BinaryType::Primitive => BinaryTypeInfo::Primitive(self.reader.read_primitive_type()?),
            BinaryType::String => BinaryTypeInfo::String,
            BinaryType::Object => BinaryTypeInfo::Object,
            BinaryType::SystemClass => BinaryTypeInfo::SystemClass(self.reader.read_string()?),
            BinaryType::Class => BinaryTypeInfo::Class {
                type_name: self.reader.read_string()?,
                library_id: self.reader.read_i32()?,
            },
            BinaryType::ObjectArray => BinaryTypeInfo::ObjectArray,
            BinaryType::StringArray => BinaryTypeInfo::StringArray,
            BinaryType::PrimitiveArray => {
                BinaryTypeInfo::PrimitiveArray(self.reader.read_primitive_type()?)
            }
        })
    }

    fn read_members(&mut self, definition: &ClassDefinition) -> CodecResult<Vec<MemberValue>> {
        let count = definition.member_count();
        let mut members = Vec::with_capacity(count);
        for i in 0..count {
            let inline = definition
                .member_types
                .as_ref()
                .and_then(|types| types.get(i))
                .and_then(BinaryTypeInfo::inline_primitive);
            let member = match inline {
                Some(ty) => MemberValue::Primitive(self.reader.read_primitive(ty)?),
                None => MemberValue::Record(self.read_member_record()?),
            };
            members.push(member);
        }
        Ok(members)
    }

    /// A record in member position. Library records found there are
    /// registered and skipped.
    fn read_member_record(&mut self) -> CodecResult<Node> {
        loop {
            let offset = self.reader.offset();
            let node = self.read_record()?;
            match node.as_ref() {
                Record::Library(lib) => {
                    warn!(offset, library_id = lib.library_id, "library record in member position");
                }
                _ => return Ok(node),
            }
        }
    }

    /// Read records until their spans cover `total` slots.
    fn read_spanned_records(&mut self, total: usize) -> CodecResult<Vec<Node>> {
        let mut members = Vec::new();
        let mut filled = 0usize;
        while filled < total {
            let node = self.read_member_record()?;
            filled += node.span();
            members.push(node);
        }
        if filled > total {
            warn!(filled, total, "null run overshoots declared array length");
        }
        Ok(members)
    }

    fn read_binary_array(&mut self) -> CodecResult<BinaryArray> {
        let object_id = self.reader.read_i32()?;
        let offset = self.reader.offset();
        let array_type = BinaryArrayType::from_byte(self.reader.read_u8()?)
            .map_err(|source| CodecError::InvalidTag { offset, source })?;
        let rank = self.reader.read_count("array rank")?;
        let mut lengths = Vec::with_capacity(rank.min(self.reader.remaining()));
        for _ in 0..rank {
            let len = self.reader.read_count("array length")?;
            lengths.push(len as i32);
        }
        let lower_bounds = if array_type.has_lower_bounds() {
            let mut bounds = Vec::with_capacity(lengths.len());
            for _ in 0..rank {
                bounds.push(self.reader.read_i32()?);
            }
            Some(bounds)
        } else {
            None
        };
        let kind = self.read_binary_type()?;
        let element_type = self.read_additional_info(kind)?;
        let total = lengths
            .iter()
            .try_fold(1usize, |acc, &l| acc.checked_mul(l as usize))
            .ok_or_else(|| CodecError::Malformed {
                offset,
                reason: "array dimensions overflow".into(),
            })?;
        let members = match element_type.inline_primitive() {
            Some(ty) => {
                let mut values = Vec::with_capacity(total.min(self.reader.remaining()));
                for _ in 0..total {
                    values.push(MemberValue::Primitive(self.reader.read_primitive(ty)?));
                }
                values
            }
            None => self
                .read_spanned_records(total)?
                .into_iter()
                .map(MemberValue::Record)
                .collect(),
        };
        Ok(BinaryArray {
            object_id,
            array_type,
            lengths,
            lower_bounds,
            element_type,
            members,
        })
    }

    fn read_string_value_with_code(&mut self) -> CodecResult<String> {
        let ty = self.reader.read_primitive_type()?;
        if ty != PrimitiveType::String {
            return Err(CodecError::Malformed {
                offset: self.reader.offset() - 1,
                reason: format!("expected string value, found {ty}"),
            });
        }
        self.reader.read_string()
    }

    fn read_value_with_code(&mut self) -> CodecResult<PrimitiveValue> {
        let ty = self.reader.read_primitive_type()?;
        self.reader.read_primitive(ty)
    }

    fn read_args(&mut self) -> CodecResult<Vec<PrimitiveValue>> {
        let count = self.reader.read_count("argument count")?;
        let mut args = Vec::with_capacity(count.min(self.reader.remaining()));
        for _ in 0..count {
            args.push(self.read_value_with_code()?);
        }
        Ok(args)
    }

    fn read_method_call(&mut self) -> CodecResult<MethodCall> {
        let flags = MessageFlags(self.reader.read_u32()?);
        let method_name = self.read_string_value_with_code()?;
        let type_name = self.read_string_value_with_code()?;
        let call_context = if flags.contains(MessageFlags::CONTEXT_INLINE) {
            Some(self.read_string_value_with_code()?)
        } else {
            None
        };
        let args = if flags.contains(MessageFlags::ARGS_INLINE) {
            Some(self.read_args()?)
        } else {
            None
        };
        Ok(MethodCall {
            flags,
            method_name,
            type_name,
            call_context,
            args,
        })
    }

    fn read_method_return(&mut self) -> CodecResult<MethodReturn> {
        let flags = MessageFlags(self.reader.read_u32()?);
        let return_value = if flags.contains(MessageFlags::RETURN_VALUE_INLINE) {
            Some(self.read_value_with_code()?)
        } else {
            None
        };
        let call_context = if flags.contains(MessageFlags::CONTEXT_INLINE) {
            Some(self.read_string_value_with_code()?)
        } else {
            None
        };
        let args = if flags.contains(MessageFlags::ARGS_INLINE) {
            Some(self.read_args()?)
        } else {
            None
        };
        Ok(MethodReturn {
            flags,
            return_value,
            call_context,
            args,
        })
    }
}

/// Serialize records in order. No registry is involved.
pub fn build_stream(records: &[Node]) -> CodecResult<Vec<u8>> {
    let mut writer = WireWriter::new();
    for record in records {
        write_record(&mut writer, record)?;
    }
    debug!(records = records.len(), bytes = writer.len(), "record stream built");
    Ok(writer.into_bytes())
}

/// Serialize one record, including any nested member records.
pub fn write_record(w: &mut WireWriter, record: &Record) -> CodecResult<()> {
    w.write_u8(record.record_type().as_byte());
    match record {
        Record::Header(h) => {
            w.write_i32(h.root_id);
            w.write_i32(h.header_id);
            w.write_i32(h.major_version);
            w.write_i32(h.minor_version);
        }
        Record::Class(class) => write_class(w, class)?,
        Record::String(s) => {
            w.write_i32(s.object_id);
            w.write_string(&s.value)?;
        }
        Record::BinaryArray(array) => write_binary_array(w, array)?,
        Record::MemberPrimitive { value } => w.write_value_with_code(value)?,
        Record::Reference(r) => w.write_i32(r.id_ref),
        Record::ObjectNull | Record::MessageEnd => {}
        Record::Library(lib) => {
            w.write_i32(lib.library_id);
            w.write_string(&lib.name)?;
        }
        Record::NullMultiple256 { null_count } => w.write_u8(*null_count),
        Record::NullMultiple { null_count } => w.write_i32(*null_count),
        Record::ArraySinglePrimitive(array) => {
            w.write_i32(array.object_id);
            w.write_count(array.values.len())?;
            w.write_u8(array.element.as_byte());
            for value in &array.values {
                check_primitive(array.element, value)?;
                w.write_primitive(value)?;
            }
        }
        Record::ArraySingleObject(array) | Record::ArraySingleString(array) => {
            w.write_i32(array.object_id);
            w.write_i32(array.length);
            for member in &array.members {
                write_record(w, member)?;
            }
        }
        Record::MethodCall(call) => {
            w.write_u32(call.flags.bits());
            write_string_value_with_code(w, &call.method_name)?;
            write_string_value_with_code(w, &call.type_name)?;
            write_message_tail(w, call.flags, call.call_context.as_deref(), call.args.as_deref())?;
        }
        Record::MethodReturn(ret) => {
            w.write_u32(ret.flags.bits());
            if ret.flags.contains(MessageFlags::RETURN_VALUE_INLINE) {
                let value = ret.return_value.as_ref().ok_or_else(|| {
                    CodecError::Encode("ReturnValueInline set without a return value".into())
                })?;
                w.write_value_with_code(value)?;
            }
            write_message_tail(w, ret.flags, ret.call_context.as_deref(), ret.args.as_deref())?;
        }
    }
    Ok(())
}

fn write_class(w: &mut WireWriter, class: &ClassRecord) -> CodecResult<()> {
    let def = &class.definition;
    if class.members.len() != def.member_count() {
        return Err(CodecError::Encode(format!(
            "class {} has {} members but {} member names",
            def.name,
            class.members.len(),
            def.member_count()
        )));
    }
    match class.layout {
        ClassLayout::Reuse { metadata_id } => {
            w.write_i32(class.object_id);
            w.write_i32(metadata_id);
        }
        ClassLayout::Inline => {
            w.write_i32(class.object_id);
            w.write_string(&def.name)?;
            w.write_count(def.member_count())?;
            for name in &def.member_names {
                w.write_string(name)?;
            }
            if let Some(types) = &def.member_types {
                if types.len() != def.member_count() {
                    return Err(CodecError::Encode(format!(
                        "class {} has {} member types for {} members",
                        def.name,
                        types.len(),
                        def.member_count()
                    )));
                }
                for ty in types {
                    w.write_u8(ty.binary_type().as_byte());
                }
                for ty in types {
                    write_additional_info(w, ty)?;
                }
            }
            if let Some(library_id) = def.library_id {
                w.write_i32(library_id);
            }
        }
    }
    for (i, member) in class.members.iter().enumerate() {
        let inline = def
            .member_types
            .as_ref()
            .and_then(|types| types.get(i))
            .and_then(BinaryTypeInfo::inline_primitive);
        write_member(w, inline, member, &def.member_names[i])?;
    }
    Ok(())
}

fn write_member(
    w: &mut WireWriter,
    inline: Option<PrimitiveType>,
    member: &MemberValue,
    name: &str,
) -> CodecResult<()> {
    match (inline, member) {
        (Some(ty), MemberValue::Primitive(value)) => {
            check_primitive(ty, value)?;
            w.write_primitive(value)
        }
        (None, MemberValue::Record(node)) => write_record(w, node),
        (Some(ty), MemberValue::Record(_)) => Err(CodecError::Encode(format!(
            "member {name} is typed {ty} but holds a record"
        ))),
        (None, MemberValue::Primitive(_)) => Err(CodecError::Encode(format!(
            "member {name} needs a record but holds a raw value"
        ))),
    }
}

fn check_primitive(expected: PrimitiveType, value: &PrimitiveValue) -> CodecResult<()> {
    if value.primitive_type() != expected {
        return Err(CodecError::Encode(format!(
            "expected {expected} value, found {}",
            value.primitive_type()
        )));
    }
    Ok(())
}

fn write_additional_info(w: &mut WireWriter, info: &BinaryTypeInfo) -> CodecResult<()> {
    match info {
        BinaryTypeInfo::Primitive(t) | BinaryTypeInfo::PrimitiveArray(t) => w.write_u8(t.as_byte()),
        BinaryTypeInfo::SystemClass(name) => w.write_string(name)?,
        BinaryTypeInfo::Class {
            type_name,
            library_id,
        } => {
            w.write_string(type_name)?;
            w.write_i32(*library_id);
        }
        BinaryTypeInfo::String
        | BinaryTypeInfo::Object
        | BinaryTypeInfo::ObjectArray
        | BinaryTypeInfo::StringArray => {}
    }
    Ok(())
}

fn write_binary_array(w: &mut WireWriter, array: &BinaryArray) -> CodecResult<()> {
    w.write_i32(array.object_id);
    w.write_u8(array.array_type.as_byte());
    w.write_count(array.rank())?;
    for &len in &array.lengths {
        w.write_i32(len);
    }
    if array.array_type.has_lower_bounds() {
        let bounds = array.lower_bounds.as_ref().ok_or_else(|| {
            CodecError::Encode(format!("{} array without lower bounds", array.array_type))
        })?;
        if bounds.len() != array.rank() {
            return Err(CodecError::Encode("lower bounds do not match rank".into()));
        }
        for &bound in bounds {
            w.write_i32(bound);
        }
    }
    w.write_u8(array.element_type.binary_type().as_byte());
    write_additional_info(w, &array.element_type)?;
    let inline = array.element_type.inline_primitive();
    for member in &array.members {
        write_member(w, inline, member, "array element")?;
    }
    Ok(())
}

fn write_string_value_with_code(w: &mut WireWriter, value: &str) -> CodecResult<()> {
    w.write_u8(PrimitiveType::String.as_byte());
    w.write_string(value)
}

fn write_message_tail(
    w: &mut WireWriter,
    flags: MessageFlags,
    call_context: Option<&str>,
    args: Option<&[PrimitiveValue]>,
) -> CodecResult<()> {
    if flags.contains(MessageFlags::CONTEXT_INLINE) {
        let context = call_context
            .ok_or_else(|| CodecError::Encode("ContextInline set without a context".into()))?;
        write_string_value_with_code(w, context)?;
    }
    if flags.contains(MessageFlags::ARGS_INLINE) {
        let args =
            args.ok_or_else(|| CodecError::Encode("ArgsInline set without arguments".into()))?;
        w.write_count(args.len())?;
        for arg in args {
            w.write_value_with_code(arg)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve_references;

    fn node(record: Record) -> Node {
        Arc::new(record)
    }

    fn point_definition() -> Arc<ClassDefinition> {
        Arc::new(ClassDefinition {
            name: "Geometry.Point".into(),
            member_names: vec!["x".into(), "y".into(), "label".into()],
            member_types: Some(vec![
                BinaryTypeInfo::Primitive(PrimitiveType::Int32),
                BinaryTypeInfo::Primitive(PrimitiveType::Double),
                BinaryTypeInfo::String,
            ]),
            library_id: Some(2),
        })
    }

    fn sample_stream() -> Vec<Node> {
        let def = point_definition();
        vec![
            node(Record::Header(StreamHeader::standard())),
            node(Record::Library(BinaryLibrary {
                library_id: 2,
                name: "Geometry, Version=1.0.0.0".into(),
            })),
            node(Record::Class(ClassRecord {
                object_id: 1,
                layout: ClassLayout::Inline,
                definition: Arc::clone(&def),
                members: vec![
                    PrimitiveValue::Int32(3).into(),
                    PrimitiveValue::Double(0.5).into(),
                    Record::String(StringRecord {
                        object_id: 3,
                        value: "origin".into(),
                    })
                    .into(),
                ],
            })),
            node(Record::Class(ClassRecord {
                object_id: 4,
                layout: ClassLayout::Reuse { metadata_id: 1 },
                definition: def,
                members: vec![
                    PrimitiveValue::Int32(-1).into(),
                    PrimitiveValue::Double(2.0).into(),
                    Record::Reference(MemberReference { id_ref: 3 }).into(),
                ],
            })),
            node(Record::MessageEnd),
        ]
    }

    #[test]
    fn stream_roundtrip() {
        let records = sample_stream();
        let bytes = build_stream(&records).unwrap();
        assert_eq!(bytes[0], 0);

        let mut session = Session::new();
        let parsed = parse_stream(&bytes, &mut session).unwrap();
        assert_eq!(parsed, records);
        assert_eq!(session.class_count(), 1);
        assert_eq!(session.library(2), Some("Geometry, Version=1.0.0.0"));

        resolve_references(&mut session).unwrap();
        match session.resolve(3).unwrap().as_ref() {
            Record::String(s) => assert_eq!(s.value, "origin"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn class_with_id_shares_definition() {
        let bytes = build_stream(&sample_stream()).unwrap();
        let mut session = Session::new();
        let parsed = parse_stream(&bytes, &mut session).unwrap();
        let first = parsed[2].as_class().unwrap();
        let second = parsed[3].as_class().unwrap();
        assert!(Arc::ptr_eq(&first.definition, &second.definition));
    }

    #[test]
    fn truncation_is_structural() {
        let bytes = build_stream(&sample_stream()).unwrap();
        for cut in 1..bytes.len() {
            let mut session = Session::new();
            let err = parse_stream(&bytes[..cut], &mut session).unwrap_err();
            assert!(err.is_structural(), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn unknown_metadata_id() {
        let mut w = WireWriter::new();
        w.write_u8(RecordType::ClassWithId.as_byte());
        w.write_i32(5);
        w.write_i32(77);
        let bytes = w.into_bytes();
        let err = parse_stream(&bytes, &mut Session::new()).unwrap_err();
        assert_eq!(err, CodecError::UnknownMetadata { metadata_id: 77 });
    }

    #[test]
    fn unknown_tag() {
        let err = parse_stream(&[19], &mut Session::new()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidTag { offset: 0, .. }));
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut bytes = build_stream(&sample_stream()).unwrap();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        let parsed = parse_stream(&bytes, &mut Session::new()).unwrap();
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn nesting_limit() {
        // Header-less stream of nested untyped system classes with one member each.
        let mut w = WireWriter::new();
        for i in 0..10 {
            w.write_u8(RecordType::SystemClassWithMembers.as_byte());
            w.write_i32(i + 1);
            w.write_string("N").unwrap();
            w.write_i32(1);
            w.write_string("inner").unwrap();
        }
        w.write_u8(RecordType::ObjectNull.as_byte());
        w.write_u8(RecordType::MessageEnd.as_byte());
        let bytes = w.into_bytes();

        let shallow = ParseOptions { max_depth: 5 };
        let err = parse_stream_with(&bytes, &mut Session::new(), &shallow).unwrap_err();
        assert!(matches!(err, CodecError::NestingTooDeep { max_depth: 5, .. }));

        let parsed = parse_stream(&bytes, &mut Session::new()).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn binary_array_null_runs_count_full_span() {
        let array = BinaryArray::single(
            10,
            BinaryTypeInfo::Class {
                type_name: "Geometry.Point[]".into(),
                library_id: 2,
            },
            vec![
                Some(Record::Reference(MemberReference { id_ref: 1 }).into()),
                None,
                None,
                Some(Record::Reference(MemberReference { id_ref: 1 }).into()),
                Some(Record::Reference(MemberReference { id_ref: 1 }).into()),
            ],
        );
        let records = vec![node(Record::BinaryArray(array.clone())), node(Record::MessageEnd)];
        let bytes = build_stream(&records).unwrap();
        let parsed = parse_stream(&bytes, &mut Session::new()).unwrap();
        match parsed[0].as_ref() {
            Record::BinaryArray(decoded) => {
                assert_eq!(decoded, &array);
                assert_eq!(decoded.slots().len(), 8);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn primitive_element_binary_array() {
        let array = BinaryArray {
            object_id: 2,
            array_type: BinaryArrayType::SingleOffset,
            lengths: vec![3],
            lower_bounds: Some(vec![1]),
            element_type: BinaryTypeInfo::Primitive(PrimitiveType::Int16),
            members: vec![
                PrimitiveValue::Int16(1).into(),
                PrimitiveValue::Int16(2).into(),
                PrimitiveValue::Int16(3).into(),
            ],
        };
        let records = vec![node(Record::BinaryArray(array.clone())), node(Record::MessageEnd)];
        let parsed = parse_stream(&build_stream(&records).unwrap(), &mut Session::new()).unwrap();
        assert_eq!(*parsed[0], Record::BinaryArray(array));
    }

    #[test]
    fn rectangular_array_reads_every_slot() {
        let array = BinaryArray {
            object_id: 2,
            array_type: BinaryArrayType::Rectangular,
            lengths: vec![2, 2],
            lower_bounds: None,
            element_type: BinaryTypeInfo::Object,
            members: vec![
                Record::ObjectNull.into(),
                Record::Reference(MemberReference { id_ref: 9 }).into(),
                Record::NullMultiple256 { null_count: 2 }.into(),
            ],
        };
        let records = vec![node(Record::BinaryArray(array.clone())), node(Record::MessageEnd)];
        let parsed = parse_stream(&build_stream(&records).unwrap(), &mut Session::new()).unwrap();
        assert_eq!(*parsed[0], Record::BinaryArray(array));
    }

    #[test]
    fn single_object_and_string_arrays() {
        let records = vec![
            node(Record::ArraySingleString(ArraySingle {
                object_id: 1,
                length: 4,
                members: vec![
                    node(Record::String(StringRecord {
                        object_id: 2,
                        value: "a".into(),
                    })),
                    node(Record::NullMultiple256 { null_count: 3 }),
                ],
            })),
            node(Record::ArraySinglePrimitive(ArraySinglePrimitive {
                object_id: 3,
                element: PrimitiveType::Byte,
                values: vec![PrimitiveValue::Byte(1), PrimitiveValue::Byte(255)],
            })),
            node(Record::MessageEnd),
        ];
        let mut session = Session::new();
        let parsed = parse_stream(&build_stream(&records).unwrap(), &mut session).unwrap();
        assert_eq!(parsed, records);
        assert!(session.lookup(1).is_some());
        assert!(session.lookup(2).is_some());
        assert!(session.lookup(3).is_some());
    }

    #[test]
    fn library_in_member_position_is_skipped() {
        let def = Arc::new(ClassDefinition {
            name: "Holder".into(),
            member_names: vec!["inner".into()],
            member_types: None,
            library_id: Some(2),
        });
        let mut w = WireWriter::new();
        w.write_u8(RecordType::ClassWithMembers.as_byte());
        w.write_i32(1);
        w.write_string(&def.name).unwrap();
        w.write_i32(1);
        w.write_string("inner").unwrap();
        w.write_i32(2);
        write_record(
            &mut w,
            &Record::Library(BinaryLibrary {
                library_id: 2,
                name: "Lib".into(),
            }),
        )
        .unwrap();
        write_record(&mut w, &Record::ObjectNull).unwrap();
        w.write_u8(RecordType::MessageEnd.as_byte());
        let bytes = w.into_bytes();

        let mut session = Session::new();
        let parsed = parse_stream(&bytes, &mut session).unwrap();
        let class = parsed[0].as_class().unwrap();
        assert_eq!(class.members, vec![MemberValue::from(Record::ObjectNull)]);
        assert_eq!(session.library(2), Some("Lib"));
    }

    #[test]
    fn method_messages_roundtrip() {
        let records = vec![
            node(Record::MethodCall(MethodCall {
                flags: MessageFlags::ARGS_INLINE | MessageFlags::CONTEXT_INLINE,
                method_name: "Save".into(),
                type_name: "Project".into(),
                call_context: Some("ctx".into()),
                args: Some(vec![PrimitiveValue::Int32(7), PrimitiveValue::String("x".into())]),
            })),
            node(Record::MethodReturn(MethodReturn {
                flags: MessageFlags::RETURN_VALUE_INLINE | MessageFlags::NO_CONTEXT,
                return_value: Some(PrimitiveValue::Boolean(true)),
                call_context: None,
                args: None,
            })),
            node(Record::MemberPrimitive {
                value: PrimitiveValue::Single(1.5),
            }),
            node(Record::MessageEnd),
        ];
        let parsed = parse_stream(&build_stream(&records).unwrap(), &mut Session::new()).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn member_type_mismatch_rejected_on_build() {
        let mut records = sample_stream();
        let def = point_definition();
        records[2] = node(Record::Class(ClassRecord {
            object_id: 1,
            layout: ClassLayout::Inline,
            definition: def,
            members: vec![
                PrimitiveValue::Int64(3).into(),
                PrimitiveValue::Double(0.5).into(),
                Record::ObjectNull.into(),
            ],
        }));
        assert!(matches!(build_stream(&records), Err(CodecError::Encode(_))));
    }
}
