//! Decode side: turn a resolved record stream into schema objects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nrbf_codec::{
    split_generic, BinaryArray, ClassRecord, MemberValue, Node, Record, Session,
};
use tracing::{debug, trace};

use crate::error::{GraphError, GraphResult};
use crate::schema::{ClassRole, ClassSpec, FieldKind, FieldSpec, Schema};
use crate::value::{Object, Value};

/// Builds objects out of one decoded stream.
///
/// Class records are memoized by object id, so every reference to the same
/// id yields the same `Arc<Object>`.
pub struct GraphBuilder<'a, S: Schema + ?Sized> {
    schema: &'a S,
    session: &'a Session,
    memo: HashMap<i32, Arc<Object>>,
    in_progress: HashSet<i32>,
}

impl<'a, S: Schema + ?Sized> GraphBuilder<'a, S> {
    pub fn new(schema: &'a S, session: &'a Session) -> Self {
        Self {
            schema,
            session,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Build the object the stream header names as root.
    pub fn build_root(&mut self, records: &[Node]) -> GraphResult<Arc<Object>> {
        let root_id = match records.first().map(AsRef::as_ref) {
            Some(Record::Header(header)) => header.root_id,
            _ => return Err(GraphError::MissingHeader),
        };
        let root = records
            .iter()
            .filter_map(|node| node.as_class())
            .find(|class| class.object_id == root_id)
            .ok_or(GraphError::RootNotFound(root_id))?;
        debug!(root_id, class = root.name(), "building root object");
        self.build_class(root)
    }

    /// Build any record into a value, following references.
    pub fn build_object(&mut self, node: &Node) -> GraphResult<Value> {
        let node = self.follow(node)?;
        match node.as_ref() {
            Record::Class(class) => self.build_class(class).map(Value::Object),
            Record::String(s) => Ok(Value::String(s.value.clone())),
            Record::MemberPrimitive { value } => Ok(Value::Primitive(value.clone())),
            Record::ArraySinglePrimitive(array) => Ok(Value::PrimitiveArray {
                element: array.element,
                values: array.values.clone(),
            }),
            Record::BinaryArray(array) => self.build_binary_array(array).map(Value::List),
            Record::ArraySingleObject(array) | Record::ArraySingleString(array) => {
                let mut items = Vec::with_capacity(array.members.len());
                for member in &array.members {
                    self.push_slot(&mut items, member)?;
                }
                Ok(Value::List(items))
            }
            Record::ObjectNull => Ok(Value::Null),
            Record::NullMultiple256 { .. } | Record::NullMultiple { .. } => {
                let count = node.null_count().unwrap_or(0);
                Ok(Value::List(vec![Value::Null; count]))
            }
            other => Err(GraphError::SchemaMismatch {
                context: format!("{} record", other.record_type()),
                reason: "record kind carries no value".into(),
            }),
        }
    }

    /// Elements of an array, null runs expanded.
    pub fn build_binary_array(&mut self, array: &BinaryArray) -> GraphResult<Vec<Value>> {
        let mut items = Vec::with_capacity(array.total_slots());
        for slot in array.slots() {
            match slot {
                None => items.push(Value::Null),
                Some(member) => items.push(self.member_value(member)?),
            }
        }
        Ok(items)
    }

    fn push_slot(&mut self, items: &mut Vec<Value>, node: &Node) -> GraphResult<()> {
        match node.null_count() {
            Some(n) => items.extend(std::iter::repeat(Value::Null).take(n)),
            None => items.push(self.build_object(node)?),
        }
        Ok(())
    }

    fn member_value(&mut self, member: &MemberValue) -> GraphResult<Value> {
        match member {
            MemberValue::Primitive(p) => Ok(Value::Primitive(p.clone())),
            MemberValue::Record(node) => self.build_object(node),
        }
    }

    fn follow(&self, node: &Node) -> GraphResult<Node> {
        match node.as_ref() {
            Record::Reference(r) => Ok(Arc::clone(self.session.resolve(r.id_ref)?)),
            _ => Ok(Arc::clone(node)),
        }
    }

    fn build_class(&mut self, record: &ClassRecord) -> GraphResult<Arc<Object>> {
        let id = record.object_id;
        if let Some(done) = self.memo.get(&id) {
            return Ok(Arc::clone(done));
        }
        if !self.in_progress.insert(id) {
            return Err(GraphError::CyclicReference(id));
        }
        let built = self.build_fields(record);
        self.in_progress.remove(&id);
        let object = built?.into_shared();
        self.memo.insert(id, Arc::clone(&object));
        Ok(object)
    }

    fn build_fields(&mut self, record: &ClassRecord) -> GraphResult<Object> {
        let (base, arg) = split_generic(record.name());
        let class = self.class(base)?;
        let type_arg = arg.map(|name| self.class(name)).transpose()?;
        trace!(object_id = record.object_id, class = class.name, "building class");

        let mut fields: Vec<Value> = class
            .fields
            .iter()
            .map(|f| Value::default_for(&f.kind))
            .collect();
        for (wire_name, member) in record.named_members() {
            let (index, spec) =
                class
                    .field_by_alias(wire_name)
                    .ok_or_else(|| GraphError::UnknownField {
                        class: class.name.to_owned(),
                        field: wire_name.to_owned(),
                    })?;
            let value = self.member_value(member)?;
            fields[index] = check_field(class, spec, value)?;
        }

        if let ClassRole::Collection { items, size } = class.role {
            truncate_collection(class, &mut fields, items, size);
        }
        Object::from_fields(class, type_arg, fields)
    }

    fn class(&self, name: &str) -> GraphResult<&'static ClassSpec> {
        self.schema
            .class_by_name(name)
            .ok_or_else(|| GraphError::UnknownClass(name.to_owned()))
    }
}

/// Cut a collection's padded backing list down to its logical size.
fn truncate_collection(class: &ClassSpec, fields: &mut [Value], items: &str, size: &str) {
    let size = class
        .field_index(size)
        .and_then(|i| fields[i].as_i32())
        .map_or(0, |n| usize::try_from(n).unwrap_or(0));
    if let Some(Value::List(list)) = class.field_index(items).map(|i| &mut fields[i]) {
        list.truncate(size);
    }
}

/// Check a built value against the field's declared kind.
fn check_field(class: &ClassSpec, spec: &FieldSpec, value: Value) -> GraphResult<Value> {
    let fits = match (&spec.kind, &value) {
        (FieldKind::Primitive(ty), Value::Primitive(p)) => p.primitive_type() == *ty,
        (FieldKind::Primitive(_), _) => false,
        (_, Value::Null) => true,
        (FieldKind::String, Value::String(_)) => true,
        (FieldKind::PrimitiveArray(ty), Value::PrimitiveArray { element, .. }) => element == ty,
        (FieldKind::List { .. }, Value::List(_)) => true,
        (FieldKind::Object { class: expected, .. }, Value::Object(o)) => o.class() == *expected,
        _ => false,
    };
    if fits {
        Ok(value)
    } else {
        Err(GraphError::SchemaMismatch {
            context: format!("{}.{}", class.name, spec.name),
            reason: format!("expected {}, found {}", spec.kind.describe(), value.describe()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;
    use nrbf_codec::{
        BinaryTypeInfo, ClassDefinition, ClassLayout, MemberReference, StreamHeader, StringRecord,
    };
    use nrbf_types::{PrimitiveType, PrimitiveValue};

    fn point_definition() -> Arc<ClassDefinition> {
        Arc::new(ClassDefinition {
            name: POINT.name.into(),
            member_names: vec!["_x".into(), "_y".into()],
            member_types: Some(vec![
                BinaryTypeInfo::Primitive(PrimitiveType::Int32),
                BinaryTypeInfo::Primitive(PrimitiveType::Int32),
            ]),
            library_id: Some(2),
        })
    }

    fn point(object_id: i32, x: PrimitiveValue) -> Node {
        Arc::new(Record::Class(ClassRecord {
            object_id,
            layout: ClassLayout::Inline,
            definition: point_definition(),
            members: vec![x.into(), PrimitiveValue::Int32(0).into()],
        }))
    }

    fn header(root_id: i32) -> Node {
        Arc::new(Record::Header(StreamHeader {
            root_id,
            ..StreamHeader::standard()
        }))
    }

    #[test]
    fn root_is_found_by_header_id() {
        let session = Session::new();
        let records = vec![header(7), point(3, 1.into()), point(7, 9.into())];
        let root = GraphBuilder::new(&SCHEMA, &session).build_root(&records).unwrap();
        assert_eq!(root.get("x").and_then(Value::as_i32), Some(9));
    }

    #[test]
    fn missing_header_and_root() {
        let session = Session::new();
        let mut builder = GraphBuilder::new(&SCHEMA, &session);
        assert_eq!(
            builder.build_root(&[point(1, 1.into())]).unwrap_err(),
            GraphError::MissingHeader
        );
        assert_eq!(
            builder.build_root(&[header(5), point(1, 1.into())]).unwrap_err(),
            GraphError::RootNotFound(5)
        );
    }

    #[test]
    fn primitive_type_mismatch_is_rejected() {
        let session = Session::new();
        let records = vec![header(1), point(1, PrimitiveValue::Int64(1))];
        let err = GraphBuilder::new(&SCHEMA, &session).build_root(&records).unwrap_err();
        assert!(err.is_schema_mismatch(), "{err:?}");
    }

    #[test]
    fn unknown_class_is_rejected() {
        let session = Session::new();
        let node = Arc::new(Record::Class(ClassRecord {
            object_id: 1,
            layout: ClassLayout::Inline,
            definition: Arc::new(ClassDefinition {
                name: "Geometry.Circle".into(),
                member_names: vec![],
                member_types: Some(vec![]),
                library_id: Some(2),
            }),
            members: vec![],
        }));
        let err = GraphBuilder::new(&SCHEMA, &session)
            .build_object(&node)
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownClass("Geometry.Circle".into()));
    }

    #[test]
    fn unknown_member_is_rejected() {
        let session = Session::new();
        let node = Arc::new(Record::Class(ClassRecord {
            object_id: 1,
            layout: ClassLayout::Inline,
            definition: Arc::new(ClassDefinition {
                name: POINT.name.into(),
                member_names: vec!["_z".into()],
                member_types: Some(vec![BinaryTypeInfo::Primitive(PrimitiveType::Int32)]),
                library_id: Some(2),
            }),
            members: vec![PrimitiveValue::Int32(1).into()],
        }));
        let err = GraphBuilder::new(&SCHEMA, &session)
            .build_object(&node)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownField { ref field, .. } if field == "_z"));
    }

    #[test]
    fn null_runs_expand() {
        let session = Session::new();
        let mut builder = GraphBuilder::new(&SCHEMA, &session);
        let run = Arc::new(Record::NullMultiple256 { null_count: 3 });
        assert_eq!(builder.build_object(&run).unwrap(), Value::List(vec![Value::Null; 3]));
        let array = BinaryArray::single(
            4,
            BinaryTypeInfo::String,
            vec![
                Some(Record::String(StringRecord { object_id: 5, value: "a".into() }).into()),
                None,
            ],
        );
        let items = builder.build_binary_array(&array).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], Value::String("a".into()));
        assert!(items[1..].iter().all(Value::is_null));
    }

    #[test]
    fn shared_references_build_one_object() {
        let mut session = Session::new();
        let target = point(9, 4.into());
        session.register(&target);
        let a = Arc::new(Record::Reference(MemberReference { id_ref: 9 }));
        session.register(&a);
        nrbf_codec::resolve_references(&mut session).unwrap();

        let mut builder = GraphBuilder::new(&SCHEMA, &session);
        let first = builder.build_object(&a).unwrap();
        let second = builder.build_object(&a).unwrap();
        let (Value::Object(first), Value::Object(second)) = (first, second) else {
            panic!("expected objects");
        };
        assert!(Arc::ptr_eq(&first, &second));
    }
}
