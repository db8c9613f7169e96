//! Record model for the tagged-record grammar.

use std::sync::Arc;

use nrbf_types::{
    BinaryArrayType, BinaryType, MessageFlags, PrimitiveType, PrimitiveValue, RecordType,
};
use serde::Serialize;

/// Shared handle to a parsed or constructed record.
pub type Node = Arc<Record>;

/// One record of a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record")]
pub enum Record {
    Header(StreamHeader),
    Class(ClassRecord),
    String(StringRecord),
    BinaryArray(BinaryArray),
    MemberPrimitive { value: PrimitiveValue },
    Reference(MemberReference),
    ObjectNull,
    MessageEnd,
    Library(BinaryLibrary),
    NullMultiple256 { null_count: u8 },
    NullMultiple { null_count: i32 },
    ArraySinglePrimitive(ArraySinglePrimitive),
    ArraySingleObject(ArraySingle),
    ArraySingleString(ArraySingle),
    MethodCall(MethodCall),
    MethodReturn(MethodReturn),
}

impl Record {
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Header(_) => RecordType::SerializedStreamHeader,
            Self::Class(c) => c.record_type(),
            Self::String(_) => RecordType::BinaryObjectString,
            Self::BinaryArray(_) => RecordType::BinaryArray,
            Self::MemberPrimitive { .. } => RecordType::MemberPrimitiveTyped,
            Self::Reference(_) => RecordType::MemberReference,
            Self::ObjectNull => RecordType::ObjectNull,
            Self::MessageEnd => RecordType::MessageEnd,
            Self::Library(_) => RecordType::BinaryLibrary,
            Self::NullMultiple256 { .. } => RecordType::ObjectNullMultiple256,
            Self::NullMultiple { .. } => RecordType::ObjectNullMultiple,
            Self::ArraySinglePrimitive(_) => RecordType::ArraySinglePrimitive,
            Self::ArraySingleObject(_) => RecordType::ArraySingleObject,
            Self::ArraySingleString(_) => RecordType::ArraySingleString,
            Self::MethodCall(_) => RecordType::MethodCall,
            Self::MethodReturn(_) => RecordType::MethodReturn,
        }
    }

    /// The id this record registers under, if it declares one.
    pub fn object_id(&self) -> Option<i32> {
        match self {
            Self::Class(c) => Some(c.object_id),
            Self::String(s) => Some(s.object_id),
            Self::BinaryArray(a) => Some(a.object_id),
            Self::ArraySinglePrimitive(a) => Some(a.object_id),
            Self::ArraySingleObject(a) | Self::ArraySingleString(a) => Some(a.object_id),
            _ => None,
        }
    }

    /// Number of null slots this record stands for, if it is a null record.
    pub fn null_count(&self) -> Option<usize> {
        match self {
            Self::ObjectNull => Some(1),
            Self::NullMultiple256 { null_count } => Some(usize::from(*null_count)),
            Self::NullMultiple { null_count } => Some(usize::try_from(*null_count).unwrap_or(0)),
            _ => None,
        }
    }

    /// Slots occupied inside an array: the run length for null runs, else 1.
    pub fn span(&self) -> usize {
        self.null_count().unwrap_or(1)
    }

    pub fn as_class(&self) -> Option<&ClassRecord> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }
}

/// Opening record: names the root object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamHeader {
    pub root_id: i32,
    pub header_id: i32,
    pub major_version: i32,
    pub minor_version: i32,
}

impl StreamHeader {
    /// Header used for every written stream: root 1, header -1, version 1.0.
    pub const fn standard() -> Self {
        Self {
            root_id: 1,
            header_id: -1,
            major_version: 1,
            minor_version: 0,
        }
    }
}

/// Member and array-element type, with its additional info folded in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "info")]
pub enum BinaryTypeInfo {
    Primitive(PrimitiveType),
    String,
    Object,
    SystemClass(String),
    Class { type_name: String, library_id: i32 },
    ObjectArray,
    StringArray,
    PrimitiveArray(PrimitiveType),
}

impl BinaryTypeInfo {
    pub fn binary_type(&self) -> BinaryType {
        match self {
            Self::Primitive(_) => BinaryType::Primitive,
            Self::String => BinaryType::String,
            Self::Object => BinaryType::Object,
            Self::SystemClass(_) => BinaryType::SystemClass,
            Self::Class { .. } => BinaryType::Class,
            Self::ObjectArray => BinaryType::ObjectArray,
            Self::StringArray => BinaryType::StringArray,
            Self::PrimitiveArray(_) => BinaryType::PrimitiveArray,
        }
    }

    /// Raw-value type, when members of this type are written without a record.
    pub fn inline_primitive(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive(t) => Some(*t),
            _ => None,
        }
    }
}

/// Class metadata: name, member layout and owning library.
///
/// `member_types` is absent for the untyped shapes and `library_id` for
/// system classes; together they select the record tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDefinition {
    pub name: String,
    pub member_names: Vec<String>,
    pub member_types: Option<Vec<BinaryTypeInfo>>,
    pub library_id: Option<i32>,
}

impl ClassDefinition {
    pub fn member_count(&self) -> usize {
        self.member_names.len()
    }

    /// Tag of the full-metadata record carrying this definition.
    pub fn record_type(&self) -> RecordType {
        match (self.library_id.is_some(), self.member_types.is_some()) {
            (false, false) => RecordType::SystemClassWithMembers,
            (true, false) => RecordType::ClassWithMembers,
            (false, true) => RecordType::SystemClassWithMembersAndTypes,
            (true, true) => RecordType::ClassWithMembersAndTypes,
        }
    }

    /// Index of a member by wire name.
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.member_names.iter().position(|n| n == name)
    }

    /// Type name without any generic-arity suffix (``Name`1[[...]]`` becomes `Name`).
    pub fn base_name(&self) -> &str {
        split_generic(&self.name).0
    }
}

/// Split ``Name`1[[Arg, Assembly]]`` into `("Name", Some("Arg"))`.
pub fn split_generic(name: &str) -> (&str, Option<&str>) {
    match name.split_once('`') {
        Some((base, rest)) => {
            let arg = rest
                .split_once("[[")
                .map(|(_, inner)| inner.split(',').next().unwrap_or(inner).trim_end_matches("]]"))
                .map(str::trim);
            (base, arg)
        }
        None => (name, None),
    }
}

/// Whether a class record carries its metadata or points at an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "layout")]
pub enum ClassLayout {
    Inline,
    Reuse { metadata_id: i32 },
}

/// A class instance. The definition is shared with every instance of the class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRecord {
    pub object_id: i32,
    pub layout: ClassLayout,
    pub definition: Arc<ClassDefinition>,
    pub members: Vec<MemberValue>,
}

impl ClassRecord {
    pub fn record_type(&self) -> RecordType {
        match self.layout {
            ClassLayout::Inline => self.definition.record_type(),
            ClassLayout::Reuse { .. } => RecordType::ClassWithId,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Member paired with its wire name.
    pub fn named_members(&self) -> impl Iterator<Item = (&str, &MemberValue)> {
        self.definition
            .member_names
            .iter()
            .map(String::as_str)
            .zip(self.members.iter())
    }

    pub fn member(&self, name: &str) -> Option<&MemberValue> {
        self.definition
            .member_index(name)
            .and_then(|i| self.members.get(i))
    }
}

/// A member slot: raw primitive for primitive-typed members, else a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MemberValue {
    Primitive(PrimitiveValue),
    Record(Node),
}

impl MemberValue {
    pub fn as_record(&self) -> Option<&Node> {
        match self {
            Self::Record(node) => Some(node),
            Self::Primitive(_) => None,
        }
    }

    /// Array slots covered by this member.
    pub fn span(&self) -> usize {
        match self {
            Self::Record(node) => node.span(),
            Self::Primitive(_) => 1,
        }
    }
}

impl From<PrimitiveValue> for MemberValue {
    fn from(v: PrimitiveValue) -> Self {
        Self::Primitive(v)
    }
}

impl From<Record> for MemberValue {
    fn from(r: Record) -> Self {
        Self::Record(Arc::new(r))
    }
}

impl From<Node> for MemberValue {
    fn from(node: Node) -> Self {
        Self::Record(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringRecord {
    pub object_id: i32,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemberReference {
    pub id_ref: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryLibrary {
    pub library_id: i32,
    pub name: String,
}

/// General array record (tag 7).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryArray {
    pub object_id: i32,
    pub array_type: BinaryArrayType,
    pub lengths: Vec<i32>,
    pub lower_bounds: Option<Vec<i32>>,
    pub element_type: BinaryTypeInfo,
    pub members: Vec<MemberValue>,
}

impl BinaryArray {
    pub fn rank(&self) -> usize {
        self.lengths.len()
    }

    /// Declared slot count: the product of all dimension lengths.
    pub fn total_slots(&self) -> usize {
        self.lengths
            .iter()
            .map(|&l| usize::try_from(l).unwrap_or(0))
            .product()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArraySinglePrimitive {
    pub object_id: i32,
    pub element: PrimitiveType,
    pub values: Vec<PrimitiveValue>,
}

/// Single-dimension object or string array (tags 16 and 17).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArraySingle {
    pub object_id: i32,
    pub length: i32,
    pub members: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCall {
    pub flags: MessageFlags,
    pub method_name: String,
    pub type_name: String,
    pub call_context: Option<String>,
    pub args: Option<Vec<PrimitiveValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodReturn {
    pub flags: MessageFlags,
    pub return_value: Option<PrimitiveValue>,
    pub call_context: Option<String>,
    pub args: Option<Vec<PrimitiveValue>>,
}
