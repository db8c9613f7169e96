use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Declares a one-byte wire enum with `from_byte` / `as_byte` conversions.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Every variant, in tag order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Parse from the wire byte.
            pub fn from_byte(byte: u8) -> Result<Self, TypeError> {
                match byte {
                    $( $value => Ok(Self::$variant), )+
                    tag => Err(TypeError::UnknownTag { kind: $kind, tag }),
                }
            }

            /// The wire byte.
            pub fn as_byte(self) -> u8 {
                self as u8
            }

            /// Variant name as used in the wire-format documentation.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

wire_enum! {
    /// Leading tag byte of every record in a stream.
    RecordType, "record" {
        SerializedStreamHeader = 0,
        ClassWithId = 1,
        SystemClassWithMembers = 2,
        ClassWithMembers = 3,
        SystemClassWithMembersAndTypes = 4,
        ClassWithMembersAndTypes = 5,
        BinaryObjectString = 6,
        BinaryArray = 7,
        MemberPrimitiveTyped = 8,
        MemberReference = 9,
        ObjectNull = 10,
        MessageEnd = 11,
        BinaryLibrary = 12,
        ObjectNullMultiple256 = 13,
        ObjectNullMultiple = 14,
        ArraySinglePrimitive = 15,
        ArraySingleObject = 16,
        ArraySingleString = 17,
        MethodCall = 21,
        MethodReturn = 22,
    }
}

wire_enum! {
    /// Scalar wire types. Tag 4 is unused.
    PrimitiveType, "primitive type" {
        Boolean = 1,
        Byte = 2,
        Char = 3,
        Decimal = 5,
        Double = 6,
        Int16 = 7,
        Int32 = 8,
        Int64 = 9,
        SByte = 10,
        Single = 11,
        TimeSpan = 12,
        DateTime = 13,
        UInt16 = 14,
        UInt32 = 15,
        UInt64 = 16,
        Null = 17,
        String = 18,
    }
}

wire_enum! {
    /// Member and array-element type categories.
    BinaryType, "binary type" {
        Primitive = 0,
        String = 1,
        Object = 2,
        SystemClass = 3,
        Class = 4,
        ObjectArray = 5,
        StringArray = 6,
        PrimitiveArray = 7,
    }
}

wire_enum! {
    /// Shape of a `BinaryArray` record.
    BinaryArrayType, "binary array type" {
        Single = 0,
        Jagged = 1,
        Rectangular = 2,
        SingleOffset = 3,
        JaggedOffset = 4,
        RectangularOffset = 5,
    }
}

impl BinaryArrayType {
    /// Whether the record carries a lower bound per dimension.
    pub fn has_lower_bounds(self) -> bool {
        matches!(
            self,
            Self::SingleOffset | Self::JaggedOffset | Self::RectangularOffset
        )
    }
}

/// Bit set carried by `MethodCall` / `MethodReturn` records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageFlags(pub u32);

impl MessageFlags {
    pub const NO_ARGS: Self = Self(0x0000_0001);
    pub const ARGS_INLINE: Self = Self(0x0000_0002);
    pub const ARGS_IS_ARRAY: Self = Self(0x0000_0004);
    pub const ARGS_IN_ARRAY: Self = Self(0x0000_0008);
    pub const NO_CONTEXT: Self = Self(0x0000_0010);
    pub const CONTEXT_INLINE: Self = Self(0x0000_0020);
    pub const CONTEXT_IN_ARRAY: Self = Self(0x0000_0040);
    pub const METHOD_SIGNATURE_IN_ARRAY: Self = Self(0x0000_0080);
    pub const PROPERTIES_IN_ARRAY: Self = Self(0x0000_0100);
    pub const NO_RETURN_VALUE: Self = Self(0x0000_0200);
    pub const RETURN_VALUE_VOID: Self = Self(0x0000_0400);
    pub const RETURN_VALUE_INLINE: Self = Self(0x0000_0800);
    pub const RETURN_VALUE_IN_ARRAY: Self = Self(0x0000_1000);
    pub const EXCEPTION_IN_ARRAY: Self = Self(0x0000_2000);
    pub const GENERIC_METHOD: Self = Self(0x0000_8000);

    /// Returns `true` if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tags_match_wire_values() {
        assert_eq!(RecordType::SerializedStreamHeader.as_byte(), 0);
        assert_eq!(RecordType::ClassWithMembersAndTypes.as_byte(), 5);
        assert_eq!(RecordType::BinaryLibrary.as_byte(), 12);
        assert_eq!(RecordType::MethodReturn.as_byte(), 22);
        for &ty in RecordType::ALL {
            assert_eq!(RecordType::from_byte(ty.as_byte()), Ok(ty));
        }
    }

    #[test]
    fn record_tag_gap_rejected() {
        for tag in [18u8, 19, 20, 23, 255] {
            assert_eq!(
                RecordType::from_byte(tag),
                Err(TypeError::UnknownTag { kind: "record", tag })
            );
        }
    }

    #[test]
    fn primitive_tag_four_is_unused() {
        assert!(PrimitiveType::from_byte(4).is_err());
        assert!(PrimitiveType::from_byte(0).is_err());
        assert_eq!(PrimitiveType::from_byte(18), Ok(PrimitiveType::String));
        assert_eq!(PrimitiveType::ALL.len(), 17);
    }

    #[test]
    fn binary_type_range() {
        assert_eq!(BinaryType::from_byte(4), Ok(BinaryType::Class));
        assert!(BinaryType::from_byte(8).is_err());
    }

    #[test]
    fn lower_bounds_only_for_offset_arrays() {
        assert!(!BinaryArrayType::Single.has_lower_bounds());
        assert!(!BinaryArrayType::Rectangular.has_lower_bounds());
        assert!(BinaryArrayType::SingleOffset.has_lower_bounds());
        assert!(BinaryArrayType::RectangularOffset.has_lower_bounds());
    }

    #[test]
    fn display_uses_variant_name() {
        assert_eq!(format!("{}", RecordType::ObjectNullMultiple256), "ObjectNullMultiple256");
        assert_eq!(format!("{}", PrimitiveType::TimeSpan), "TimeSpan");
    }

    #[test]
    fn message_flags_contains() {
        let flags = MessageFlags::ARGS_INLINE | MessageFlags::CONTEXT_INLINE;
        assert!(flags.contains(MessageFlags::ARGS_INLINE));
        assert!(flags.contains(MessageFlags::CONTEXT_INLINE));
        assert!(!flags.contains(MessageFlags::RETURN_VALUE_INLINE));
        assert_eq!(flags.bits(), 0x22);
    }
}
