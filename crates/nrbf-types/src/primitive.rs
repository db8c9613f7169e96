use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;
use crate::tags::PrimitiveType;
use crate::temporal::{NetDateTime, TimeSpan};

/// A scalar value tagged with its wire type.
///
/// `Null` and `String` exist because the primitive-type table carries them;
/// they appear in `MemberPrimitiveTyped` records and method-call arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PrimitiveValue {
    Boolean(bool),
    Byte(u8),
    Char(char),
    Decimal(Decimal),
    Double(f64),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    SByte(i8),
    Single(f32),
    TimeSpan(TimeSpan),
    DateTime(NetDateTime),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Null,
    String(String),
}

impl PrimitiveValue {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            Self::Boolean(_) => PrimitiveType::Boolean,
            Self::Byte(_) => PrimitiveType::Byte,
            Self::Char(_) => PrimitiveType::Char,
            Self::Decimal(_) => PrimitiveType::Decimal,
            Self::Double(_) => PrimitiveType::Double,
            Self::Int16(_) => PrimitiveType::Int16,
            Self::Int32(_) => PrimitiveType::Int32,
            Self::Int64(_) => PrimitiveType::Int64,
            Self::SByte(_) => PrimitiveType::SByte,
            Self::Single(_) => PrimitiveType::Single,
            Self::TimeSpan(_) => PrimitiveType::TimeSpan,
            Self::DateTime(_) => PrimitiveType::DateTime,
            Self::UInt16(_) => PrimitiveType::UInt16,
            Self::UInt32(_) => PrimitiveType::UInt32,
            Self::UInt64(_) => PrimitiveType::UInt64,
            Self::Null => PrimitiveType::Null,
            Self::String(_) => PrimitiveType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Widen any floating-point or integer value to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Single(v) => Some(f64::from(*v)),
            Self::Byte(v) => Some(f64::from(*v)),
            Self::SByte(v) => Some(f64::from(*v)),
            Self::Int16(v) => Some(f64::from(*v)),
            Self::UInt16(v) => Some(f64::from(*v)),
            Self::Int32(v) => Some(f64::from(*v)),
            Self::UInt32(v) => Some(f64::from(*v)),
            Self::Int64(v) => Some(*v as f64),
            Self::UInt64(v) => Some(*v as f64),
            Self::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v:?}"),
            Self::Decimal(v) => write!(f, "{v}m"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Single(v) => write!(f, "{v}f"),
            Self::TimeSpan(v) => write!(f, "{}t", v.ticks()),
            Self::DateTime(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Null => f.write_str("null"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for PrimitiveValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )+
    };
}

impl_from! {
    bool => Boolean,
    u8 => Byte,
    char => Char,
    Decimal => Decimal,
    f64 => Double,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i8 => SByte,
    f32 => Single,
    TimeSpan => TimeSpan,
    NetDateTime => DateTime,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    String => String,
}

impl From<&str> for PrimitiveValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::DateTimeKind;

    #[test]
    fn every_primitive_type_has_a_variant() {
        let samples: Vec<PrimitiveValue> = vec![
            true.into(),
            7u8.into(),
            'x'.into(),
            "1.5".parse::<Decimal>().unwrap().into(),
            2.5f64.into(),
            (-3i16).into(),
            42i32.into(),
            (-9i64).into(),
            (-1i8).into(),
            0.25f32.into(),
            TimeSpan(10).into(),
            NetDateTime::new(5, DateTimeKind::Utc).unwrap().into(),
            1u16.into(),
            2u32.into(),
            3u64.into(),
            PrimitiveValue::Null,
            "s".into(),
        ];
        let types: Vec<PrimitiveType> = samples.iter().map(|v| v.primitive_type()).collect();
        assert_eq!(types, PrimitiveType::ALL);
    }

    #[test]
    fn numeric_widening() {
        assert_eq!(PrimitiveValue::Single(0.5).as_f64(), Some(0.5));
        assert_eq!(PrimitiveValue::Int32(-4).as_f64(), Some(-4.0));
        assert_eq!(PrimitiveValue::Boolean(true).as_f64(), None);
        assert_eq!(PrimitiveValue::Int32(8).as_i32(), Some(8));
        assert_eq!(PrimitiveValue::Int16(8).as_i32(), None);
    }

    #[test]
    fn json_shape_is_tagged() {
        let json = serde_json::to_string(&PrimitiveValue::Int32(5)).unwrap();
        assert_eq!(json, r#"{"type":"Int32","value":5}"#);
        let back: PrimitiveValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PrimitiveValue::Int32(5));
    }
}
