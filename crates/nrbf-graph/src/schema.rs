//! Static description of the classes a document may contain.
//!
//! A schema maps wire class names to [`ClassSpec`]s. Each spec lists its
//! fields in declaration order with the wire alias, the write priority and
//! the field kind that decides how the value is encoded.

use std::fmt;

use nrbf_types::PrimitiveType;

use crate::value::Value;
use crate::version::FormatVersion;

/// Lookup table from wire names to class specs.
pub trait Schema {
    /// Library names, in the order their records are written.
    fn libraries(&self) -> &[&'static str];

    /// Class spec for a type name without any generic suffix.
    fn class_by_name(&self, name: &str) -> Option<&'static ClassSpec>;
}

/// Schema over a fixed list of classes.
#[derive(Debug, Clone, Copy)]
pub struct StaticSchema {
    pub libraries: &'static [&'static str],
    pub classes: &'static [&'static ClassSpec],
}

impl Schema for StaticSchema {
    fn libraries(&self) -> &[&'static str] {
        self.libraries
    }

    fn class_by_name(&self, name: &str) -> Option<&'static ClassSpec> {
        self.classes.iter().copied().find(|c| c.name == name)
    }
}

/// How instances of a class are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRole {
    /// Written once in the deferred queue and referenced by id.
    Reference,
    /// Written inline where it is used, under a negative id.
    Value,
    /// A growable list: `items` holds a padded array, `size` its logical length.
    Collection {
        items: &'static str,
        size: &'static str,
    },
}

#[derive(Debug)]
pub struct ClassSpec {
    /// Full type name, without generic arity.
    pub name: &'static str,
    /// Owning library; `None` for `System.*` classes.
    pub library: Option<&'static str>,
    pub role: ClassRole,
    pub fields: &'static [FieldSpec],
}

impl ClassSpec {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Field whose wire alias is `alias`.
    pub fn field_by_alias(&self, alias: &str) -> Option<(usize, &'static FieldSpec)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.alias == alias)
    }

    /// Fields written for `version`, stable-sorted by priority.
    pub fn write_order(&self, version: &FormatVersion) -> Vec<(usize, &'static FieldSpec)> {
        let mut fields: Vec<_> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_present(version))
            .collect();
        fields.sort_by_key(|(_, f)| f.order);
        fields
    }

    /// Wire name, with the generic suffix when a type argument is given.
    pub fn wire_name(&self, type_arg: Option<&ClassSpec>) -> String {
        match type_arg {
            Some(arg) => format!(
                "{}`1[[{}, {}]]",
                self.name,
                arg.name,
                arg.library.unwrap_or(CORE_LIBRARY)
            ),
            None => self.name.to_owned(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.library.is_none()
    }
}

impl PartialEq for ClassSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Assembly named in generic arguments that belong to no declared library.
pub const CORE_LIBRARY: &str = "mscorlib";

/// Which class a generic slot is filled with.
#[derive(Debug, Clone, Copy)]
pub enum TypeArg {
    None,
    Fixed(&'static ClassSpec),
    /// The enclosing object's own type argument.
    Inherit,
}

impl TypeArg {
    /// Resolve against the type argument of the owning object.
    pub fn resolve(self, owner: Option<&'static ClassSpec>) -> Option<&'static ClassSpec> {
        match self {
            Self::None => None,
            Self::Fixed(class) => Some(class),
            Self::Inherit => owner,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Primitive(PrimitiveType),
    String,
    PrimitiveArray(PrimitiveType),
    /// Class-typed array; the element class comes from the type argument.
    List { element: TypeArg },
    Object {
        class: &'static ClassSpec,
        type_arg: TypeArg,
    },
}

impl FieldKind {
    pub fn describe(&self) -> String {
        match self {
            Self::Primitive(ty) => format!("{ty} value"),
            Self::String => "string".into(),
            Self::PrimitiveArray(ty) => format!("{ty} array"),
            Self::List { .. } => "list".into(),
            Self::Object { class, .. } => format!("{} object", class.name),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Native field name.
    pub name: &'static str,
    /// Member name on the wire.
    pub alias: &'static str,
    /// Write priority; ties keep declaration order.
    pub order: i32,
    pub kind: FieldKind,
    /// When set, the field exists only for versions the predicate accepts.
    pub present_if: Option<fn(&FormatVersion) -> bool>,
    /// When set, values the predicate accepts are written as `ObjectNull`.
    pub null_if: Option<fn(&Value) -> bool>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, alias: &'static str, order: i32, kind: FieldKind) -> Self {
        Self {
            name,
            alias,
            order,
            kind,
            present_if: None,
            null_if: None,
        }
    }

    pub const fn present_if(mut self, predicate: fn(&FormatVersion) -> bool) -> Self {
        self.present_if = Some(predicate);
        self
    }

    pub const fn null_if(mut self, predicate: fn(&Value) -> bool) -> Self {
        self.null_if = Some(predicate);
        self
    }

    pub fn is_present(&self, version: &FormatVersion) -> bool {
        self.present_if.map_or(true, |p| p(version))
    }

    /// Whether `value` goes on the wire as a null reference.
    pub fn writes_null(&self, value: &Value) -> bool {
        value.is_null() || self.null_if.is_some_and(|p| p(value))
    }
}
