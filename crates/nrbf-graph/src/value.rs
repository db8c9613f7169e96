//! Native value model of a decoded object graph.

use std::fmt;
use std::sync::Arc;

use nrbf_types::{PrimitiveType, PrimitiveValue};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::{GraphError, GraphResult};
use crate::schema::{ClassRole, ClassSpec, FieldKind, FieldSpec};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Primitive(PrimitiveValue),
    String(String),
    PrimitiveArray {
        element: PrimitiveType,
        values: Vec<PrimitiveValue>,
    },
    List(Vec<Value>),
    Object(Arc<Object>),
}

impl Value {
    /// Placeholder for a field that is absent from the stream.
    pub fn default_for(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Primitive(ty) => zero_of(*ty).map_or(Value::Null, Value::Primitive),
            FieldKind::String => Value::String(String::new()),
            FieldKind::PrimitiveArray(ty) => Value::PrimitiveArray {
                element: *ty,
                values: Vec::new(),
            },
            FieldKind::List { .. } => Value::List(Vec::new()),
            FieldKind::Object { .. } => Value::Null,
        }
    }

    /// Byte array convenience constructor.
    pub fn bytes(data: &[u8]) -> Self {
        Value::PrimitiveArray {
            element: PrimitiveType::Byte,
            values: data.iter().copied().map(PrimitiveValue::Byte).collect(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_primitive().and_then(PrimitiveValue::as_i32)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_primitive().and_then(PrimitiveValue::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_primitive().and_then(PrimitiveValue::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Byte payload of a `Byte` primitive array.
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::PrimitiveArray {
                element: PrimitiveType::Byte,
                values,
            } => values
                .iter()
                .map(|v| match v {
                    PrimitiveValue::Byte(b) => Some(*b),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Primitive(p) => format!("{} value", p.primitive_type()),
            Value::String(_) => "string".into(),
            Value::PrimitiveArray { element, .. } => format!("{element} array"),
            Value::List(items) => format!("list of {}", items.len()),
            Value::Object(o) => format!("{} object", o.class.name),
        }
    }
}

fn zero_of(ty: PrimitiveType) -> Option<PrimitiveValue> {
    Some(match ty {
        PrimitiveType::Boolean => PrimitiveValue::Boolean(false),
        PrimitiveType::Byte => PrimitiveValue::Byte(0),
        PrimitiveType::Char => PrimitiveValue::Char('\0'),
        PrimitiveType::Decimal => PrimitiveValue::Decimal(0i64.into()),
        PrimitiveType::Double => PrimitiveValue::Double(0.0),
        PrimitiveType::Int16 => PrimitiveValue::Int16(0),
        PrimitiveType::Int32 => PrimitiveValue::Int32(0),
        PrimitiveType::Int64 => PrimitiveValue::Int64(0),
        PrimitiveType::SByte => PrimitiveValue::SByte(0),
        PrimitiveType::Single => PrimitiveValue::Single(0.0),
        PrimitiveType::TimeSpan => PrimitiveValue::TimeSpan(Default::default()),
        PrimitiveType::UInt16 => PrimitiveValue::UInt16(0),
        PrimitiveType::UInt32 => PrimitiveValue::UInt32(0),
        PrimitiveType::UInt64 => PrimitiveValue::UInt64(0),
        PrimitiveType::String => PrimitiveValue::String(String::new()),
        PrimitiveType::DateTime | PrimitiveType::Null => return None,
    })
}

impl From<PrimitiveValue> for Value {
    fn from(v: PrimitiveValue) -> Self {
        Value::Primitive(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Primitive(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Primitive(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Primitive(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Primitive(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Arc<Object>> for Value {
    fn from(v: Arc<Object>) -> Self {
        Value::Object(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(Arc::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// An instance of a schema class. Fields follow the class's declaration order.
#[derive(Clone)]
pub struct Object {
    class: &'static ClassSpec,
    type_arg: Option<&'static ClassSpec>,
    fields: Vec<Value>,
}

impl Object {
    /// Instance with every field at its kind's default.
    pub fn new(class: &'static ClassSpec) -> Self {
        Self {
            class,
            type_arg: None,
            fields: class.fields.iter().map(|f| Value::default_for(&f.kind)).collect(),
        }
    }

    pub fn from_fields(
        class: &'static ClassSpec,
        type_arg: Option<&'static ClassSpec>,
        fields: Vec<Value>,
    ) -> GraphResult<Self> {
        if fields.len() != class.fields.len() {
            return Err(GraphError::SchemaMismatch {
                context: class.name.to_owned(),
                reason: format!("expected {} fields, got {}", class.fields.len(), fields.len()),
            });
        }
        Ok(Self {
            class,
            type_arg,
            fields,
        })
    }

    pub fn with_type_arg(mut self, type_arg: &'static ClassSpec) -> Self {
        self.type_arg = Some(type_arg);
        self
    }

    pub fn class(&self) -> &'static ClassSpec {
        self.class
    }

    pub fn type_arg(&self) -> Option<&'static ClassSpec> {
        self.type_arg
    }

    /// Full wire name, including the generic argument.
    pub fn wire_name(&self) -> String {
        self.class.wire_name(self.type_arg)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.class.field_index(name).map(|i| &self.fields[i])
    }

    pub fn field(&self, name: &str) -> GraphResult<&Value> {
        self.get(name).ok_or_else(|| self.unknown_field(name))
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> GraphResult<()> {
        let index = self
            .class
            .field_index(name)
            .ok_or_else(|| self.unknown_field(name))?;
        self.fields[index] = value.into();
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> GraphResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Field specs paired with their values.
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, &Value)> {
        self.class.fields.iter().zip(self.fields.iter())
    }

    /// Logical elements of a collection object.
    pub fn collection_items(&self) -> Option<&[Value]> {
        match self.class.role {
            ClassRole::Collection { items, .. } => self.get(items).and_then(Value::as_list),
            _ => None,
        }
    }

    pub fn into_shared(self) -> Arc<Object> {
        Arc::new(self)
    }

    fn unknown_field(&self, name: &str) -> GraphError {
        GraphError::UnknownField {
            class: self.class.name.to_owned(),
            field: name.to_owned(),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
            && self.type_arg.map(|c| c.name) == other.type_arg.map(|c| c.name)
            && self.fields == other.fields
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.name);
        if let Some(arg) = self.type_arg {
            s.field("<T>", &arg.name);
        }
        for (spec, value) in self.fields() {
            s.field(spec.name, value);
        }
        s.finish()
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("$class", &self.wire_name())?;
        for (spec, value) in self.fields() {
            map.serialize_entry(spec.name, value)?;
        }
        map.end()
    }
}
