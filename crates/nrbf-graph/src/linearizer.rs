//! Encode side: flatten an object graph into a record list.
//!
//! Reference objects are written breadth-first from a FIFO queue: a field
//! that holds one gets a fresh id and a `MemberReference`, and the full record
//! follows once everything queued before it has been written. Value classes
//! are written inline under a negative id. Each class name carries its full
//! metadata once; later instances point back at it with `ClassWithId`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use nrbf_codec::{
    ArraySinglePrimitive, BinaryArray, BinaryLibrary, BinaryTypeInfo, ClassDefinition,
    ClassLayout, ClassRecord, MemberReference, MemberValue, Node, Record, StreamHeader,
    StringRecord,
};
use nrbf_types::{PrimitiveType, PrimitiveValue};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::schema::{ClassRole, ClassSpec, FieldKind, FieldSpec, Schema};
use crate::value::{Object, Value};
use crate::version::FormatVersion;

enum Pending {
    Object(Arc<Object>),
    Record(Node),
}

type Deferred = Vec<(i32, Pending)>;

pub struct Linearizer<'a, S: Schema + ?Sized> {
    schema: &'a S,
    version: FormatVersion,
    last_id: i32,
    library_ids: HashMap<&'static str, i32>,
    class_defs: HashMap<String, (i32, Arc<ClassDefinition>)>,
    /// Objects already given an id, keyed by `Arc` address. The `Arc` is held
    /// so the address cannot be reused while encoding.
    assigned: HashMap<usize, (i32, Arc<Object>)>,
    queue: VecDeque<(i32, Pending)>,
}

impl<'a, S: Schema + ?Sized> Linearizer<'a, S> {
    pub fn new(schema: &'a S, version: FormatVersion) -> Self {
        Self {
            schema,
            version,
            last_id: 0,
            library_ids: HashMap::new(),
            class_defs: HashMap::new(),
            assigned: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Records for `root`, from the header through `MessageEnd`.
    pub fn write(mut self, root: &Arc<Object>) -> GraphResult<Vec<Node>> {
        let root_id = self.alloc();
        let mut records: Vec<Node> = vec![Arc::new(Record::Header(StreamHeader {
            root_id,
            ..StreamHeader::standard()
        }))];
        for &name in self.schema.libraries() {
            let library_id = self.alloc();
            self.library_ids.insert(name, library_id);
            records.push(Arc::new(Record::Library(BinaryLibrary {
                library_id,
                name: name.to_owned(),
            })));
        }

        self.assign(root, root_id);
        self.queue.push_back((root_id, Pending::Object(Arc::clone(root))));
        while let Some((id, pending)) = self.queue.pop_front() {
            match pending {
                Pending::Object(object) => {
                    let mut deferred = Deferred::new();
                    let record = self.class_record(id, &object, &mut deferred)?;
                    records.push(Arc::new(Record::Class(record)));
                    self.queue.extend(deferred);
                }
                Pending::Record(node) => records.push(node),
            }
        }
        records.push(Arc::new(Record::MessageEnd));

        debug!(
            records = records.len(),
            classes = self.class_defs.len(),
            objects = self.assigned.len(),
            "linearized object graph"
        );
        Ok(records)
    }

    fn alloc(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn assign(&mut self, object: &Arc<Object>, id: i32) {
        self.assigned
            .insert(Arc::as_ptr(object) as usize, (id, Arc::clone(object)));
    }

    fn assigned_id(&self, object: &Arc<Object>) -> Option<i32> {
        self.assigned
            .get(&(Arc::as_ptr(object) as usize))
            .map(|(id, _)| *id)
    }

    fn class_record(
        &mut self,
        object_id: i32,
        object: &Object,
        deferred: &mut Deferred,
    ) -> GraphResult<ClassRecord> {
        let class = object.class();
        let fields = class.write_order(&self.version);
        let mut members = Vec::with_capacity(fields.len());
        for &(index, spec) in &fields {
            let value = object.value_at(index).unwrap_or(&Value::Null);
            members.push(self.member(object, spec, value, deferred)?);
        }

        let name = object.wire_name();
        let (layout, definition) = match self.class_defs.get(&name).cloned() {
            Some((metadata_id, definition)) => (ClassLayout::Reuse { metadata_id }, definition),
            None => {
                let member_types = fields
                    .iter()
                    .map(|(_, spec)| self.wire_type(object, spec))
                    .collect::<GraphResult<Vec<_>>>()?;
                let library_id = class.library.map(|lib| self.library_id(class, lib)).transpose()?;
                let definition = Arc::new(ClassDefinition {
                    name: name.clone(),
                    member_names: fields.iter().map(|(_, spec)| spec.alias.to_owned()).collect(),
                    member_types: Some(member_types),
                    library_id,
                });
                self.class_defs
                    .insert(name, (object_id, Arc::clone(&definition)));
                (ClassLayout::Inline, definition)
            }
        };
        Ok(ClassRecord {
            object_id,
            layout,
            definition,
            members,
        })
    }

    fn member(
        &mut self,
        owner: &Object,
        spec: &FieldSpec,
        value: &Value,
        deferred: &mut Deferred,
    ) -> GraphResult<MemberValue> {
        if !matches!(spec.kind, FieldKind::Primitive(_)) && spec.writes_null(value) {
            return Ok(Record::ObjectNull.into());
        }
        let member = match (&spec.kind, value) {
            (FieldKind::Primitive(ty), Value::Primitive(p)) => match coerce(p, *ty) {
                Some(p) => MemberValue::Primitive(p),
                None => return Err(unmapped(owner, spec, value)),
            },
            (FieldKind::Primitive(_), _) => return Err(unmapped(owner, spec, value)),
            (_, Value::Null) => Record::ObjectNull.into(),
            (FieldKind::String, Value::String(s)) => self.string(s).into(),
            (FieldKind::PrimitiveArray(ty), Value::PrimitiveArray { element, values })
                if element == ty =>
            {
                let object_id = self.alloc();
                let array = Record::ArraySinglePrimitive(ArraySinglePrimitive {
                    object_id,
                    element: *element,
                    values: values.clone(),
                });
                deferred.push((object_id, Pending::Record(Arc::new(array))));
                reference(object_id)
            }
            (FieldKind::List { element }, Value::List(items)) => {
                let element = element.resolve(owner.type_arg());
                self.list(owner, spec, element, items, deferred)?
            }
            (FieldKind::Object { class, .. }, Value::Object(o)) if o.class() == *class => {
                self.object(o, deferred)?
            }
            _ => return Err(unmapped(owner, spec, value)),
        };
        Ok(member)
    }

    fn string(&mut self, value: &str) -> Record {
        Record::String(StringRecord {
            object_id: self.alloc(),
            value: value.to_owned(),
        })
    }

    /// Inline record for a value class, a reference for anything else.
    fn object(&mut self, object: &Arc<Object>, deferred: &mut Deferred) -> GraphResult<MemberValue> {
        if object.class().role == ClassRole::Value {
            let id = self.alloc();
            let record = self.class_record(-id, object, deferred)?;
            return Ok(Record::Class(record).into());
        }
        if let Some(id) = self.assigned_id(object) {
            return Ok(reference(id));
        }
        let id = self.alloc();
        self.assign(object, id);
        deferred.push((id, Pending::Object(Arc::clone(object))));
        Ok(reference(id))
    }

    /// The array is queued ahead of the elements it references.
    fn list(
        &mut self,
        owner: &Object,
        spec: &FieldSpec,
        element: Option<&'static ClassSpec>,
        items: &[Value],
        deferred: &mut Deferred,
    ) -> GraphResult<MemberValue> {
        let array_id = self.alloc();
        let mut queued = Deferred::new();
        let mut slots = Vec::with_capacity(items.len());
        for item in items {
            let slot = match item {
                Value::Null => None,
                Value::Object(o) => Some(self.object(o, &mut queued)?),
                Value::String(s) => Some(self.string(s).into()),
                Value::Primitive(p) if element.is_none() => {
                    Some(Record::MemberPrimitive { value: p.clone() }.into())
                }
                other => return Err(unmapped(owner, spec, other)),
            };
            slots.push(slot);
        }
        let element_type = match element {
            Some(class) => self.class_type(owner, spec, class, class.name.to_owned())?,
            None => BinaryTypeInfo::Object,
        };
        let array = BinaryArray::single(array_id, element_type, slots);
        deferred.push((array_id, Pending::Record(Arc::new(Record::BinaryArray(array)))));
        deferred.extend(queued);
        Ok(reference(array_id))
    }

    fn wire_type(&self, owner: &Object, spec: &FieldSpec) -> GraphResult<BinaryTypeInfo> {
        Ok(match spec.kind {
            FieldKind::Primitive(ty) => BinaryTypeInfo::Primitive(ty),
            FieldKind::String => BinaryTypeInfo::String,
            FieldKind::PrimitiveArray(ty) => BinaryTypeInfo::PrimitiveArray(ty),
            FieldKind::List { element } => match element.resolve(owner.type_arg()) {
                Some(class) => self.class_type(owner, spec, class, format!("{}[]", class.name))?,
                None => BinaryTypeInfo::ObjectArray,
            },
            FieldKind::Object { class, type_arg } => {
                let name = class.wire_name(type_arg.resolve(owner.type_arg()));
                self.class_type(owner, spec, class, name)?
            }
        })
    }

    fn class_type(
        &self,
        owner: &Object,
        spec: &FieldSpec,
        class: &ClassSpec,
        type_name: String,
    ) -> GraphResult<BinaryTypeInfo> {
        match class.library {
            None => Ok(BinaryTypeInfo::SystemClass(type_name)),
            Some(lib) => {
                let library_id = self.library_id(class, lib).map_err(|_| GraphError::UnmappedField {
                    class: owner.class().name.to_owned(),
                    field: spec.name.to_owned(),
                    reason: format!("library of {} is not declared", class.name),
                })?;
                Ok(BinaryTypeInfo::Class {
                    type_name,
                    library_id,
                })
            }
        }
    }

    fn library_id(&self, class: &ClassSpec, library: &str) -> GraphResult<i32> {
        self.library_ids
            .get(library)
            .copied()
            .ok_or_else(|| GraphError::SchemaMismatch {
                context: class.name.to_owned(),
                reason: format!("library {library:?} is not declared by the schema"),
            })
    }
}

fn reference(id_ref: i32) -> MemberValue {
    Record::Reference(MemberReference { id_ref }).into()
}

fn unmapped(owner: &Object, spec: &FieldSpec, value: &Value) -> GraphError {
    GraphError::UnmappedField {
        class: owner.class().name.to_owned(),
        field: spec.name.to_owned(),
        reason: format!("expected {}, found {}", spec.kind.describe(), value.describe()),
    }
}

/// Convert a primitive to the field's wire type when the value fits.
fn coerce(value: &PrimitiveValue, ty: PrimitiveType) -> Option<PrimitiveValue> {
    if value.primitive_type() == ty {
        return Some(value.clone());
    }
    match ty {
        PrimitiveType::Double => value.as_f64().map(PrimitiveValue::Double),
        PrimitiveType::Single => value.as_f64().map(|v| PrimitiveValue::Single(v as f32)),
        PrimitiveType::Int32 => value.as_i32().map(PrimitiveValue::Int32),
        _ => None,
    }
}
