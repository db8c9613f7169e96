//! Primitive wire codec: little-endian scalars, length-prefixed strings,
//! UTF-8 code points and the tick-based time values.

use bytes::{Buf, BufMut};
use nrbf_types::{Decimal, NetDateTime, PrimitiveType, PrimitiveValue, TimeSpan};

use crate::error::{CodecError, CodecResult};

/// Longest permitted length prefix, in bytes.
pub const MAX_VARINT_LEN: usize = 5;

/// Cursor over an in-memory stream that tracks its absolute offset.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    /// Absolute position of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, needed: usize) -> CodecResult<()> {
        if self.buf.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                offset: self.offset(),
                needed: needed - self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self) -> CodecResult<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    /// Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16(&mut self) -> CodecResult<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i64(&mut self) -> CodecResult<i64> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn read_u64(&mut self) -> CodecResult<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_f64(&mut self) -> CodecResult<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_le())
    }

    /// Read an `i32` that must not be negative (lengths, counts, ranks).
    pub fn read_count(&mut self, what: &str) -> CodecResult<usize> {
        let offset = self.offset();
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| CodecError::Malformed {
            offset,
            reason: format!("negative {what}: {value}"),
        })
    }

    /// Base-128 length prefix: 7 data bits per byte, high bit continues.
    pub fn read_varint(&mut self) -> CodecResult<usize> {
        let offset = self.offset();
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                if value > i32::MAX as u64 {
                    return Err(CodecError::MalformedVarint { offset });
                }
                return Ok(value as usize);
            }
        }
        Err(CodecError::MalformedVarint { offset })
    }

    /// Length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_varint()?;
        let offset = self.offset();
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    /// A single UTF-8 code point; its width comes from the leading byte.
    pub fn read_char(&mut self) -> CodecResult<char> {
        let offset = self.offset();
        self.ensure(1)?;
        let lead = self.buf[0];
        let width = match lead {
            b if b & 0x80 == 0 => 1,
            b if b & 0xE0 == 0xC0 => 2,
            b if b & 0xF0 == 0xE0 => 3,
            b if b & 0xF8 == 0xF0 => 4,
            _ => return Err(CodecError::InvalidUtf8 { offset }),
        };
        let bytes = self.read_bytes(width)?;
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(CodecError::InvalidUtf8 { offset })
    }

    pub fn read_datetime(&mut self) -> CodecResult<NetDateTime> {
        let offset = self.offset();
        let bits = self.read_u64()?;
        NetDateTime::from_bits(bits).map_err(|source| CodecError::InvalidValue { offset, source })
    }

    pub fn read_timespan(&mut self) -> CodecResult<TimeSpan> {
        Ok(TimeSpan(self.read_i64()?))
    }

    pub fn read_decimal(&mut self) -> CodecResult<Decimal> {
        let offset = self.offset();
        let text = self.read_string()?;
        Decimal::try_from(text).map_err(|source| CodecError::InvalidValue { offset, source })
    }

    /// Read one raw value of the given primitive type.
    pub fn read_primitive(&mut self, ty: PrimitiveType) -> CodecResult<PrimitiveValue> {
        Ok(match ty {
            PrimitiveType::Boolean => PrimitiveValue::Boolean(self.read_bool()?),
            PrimitiveType::Byte => PrimitiveValue::Byte(self.read_u8()?),
            PrimitiveType::Char => PrimitiveValue::Char(self.read_char()?),
            PrimitiveType::Decimal => PrimitiveValue::Decimal(self.read_decimal()?),
            PrimitiveType::Double => PrimitiveValue::Double(self.read_f64()?),
            PrimitiveType::Int16 => PrimitiveValue::Int16(self.read_i16()?),
            PrimitiveType::Int32 => PrimitiveValue::Int32(self.read_i32()?),
            PrimitiveType::Int64 => PrimitiveValue::Int64(self.read_i64()?),
            PrimitiveType::SByte => PrimitiveValue::SByte(self.read_i8()?),
            PrimitiveType::Single => PrimitiveValue::Single(self.read_f32()?),
            PrimitiveType::TimeSpan => PrimitiveValue::TimeSpan(self.read_timespan()?),
            PrimitiveType::DateTime => PrimitiveValue::DateTime(self.read_datetime()?),
            PrimitiveType::UInt16 => PrimitiveValue::UInt16(self.read_u16()?),
            PrimitiveType::UInt32 => PrimitiveValue::UInt32(self.read_u32()?),
            PrimitiveType::UInt64 => PrimitiveValue::UInt64(self.read_u64()?),
            PrimitiveType::Null => PrimitiveValue::Null,
            PrimitiveType::String => PrimitiveValue::String(self.read_string()?),
        })
    }

    /// Read a primitive-type tag byte.
    pub fn read_primitive_type(&mut self) -> CodecResult<PrimitiveType> {
        let offset = self.offset();
        PrimitiveType::from_byte(self.read_u8()?)
            .map_err(|source| CodecError::InvalidTag { offset, source })
    }
}

/// Growable output buffer for the record stream.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.put_i16_le(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    /// Write a length or count as `i32`.
    pub fn write_count(&mut self, count: usize) -> CodecResult<()> {
        let v = i32::try_from(count)
            .map_err(|_| CodecError::Encode(format!("count {count} exceeds i32")))?;
        self.write_i32(v);
        Ok(())
    }

    pub fn write_varint(&mut self, mut value: u32) {
        while value > 0x7F {
            self.buf.put_u8((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn write_string(&mut self, s: &str) -> CodecResult<()> {
        let len = u32::try_from(s.len())
            .ok()
            .filter(|&len| len <= i32::MAX as u32)
            .ok_or_else(|| CodecError::Encode(format!("string of {} bytes too long", s.len())))?;
        self.write_varint(len);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.buf.put_slice(c.encode_utf8(&mut tmp).as_bytes());
    }

    /// Write one raw value; the type tag is not written.
    pub fn write_primitive(&mut self, value: &PrimitiveValue) -> CodecResult<()> {
        match value {
            PrimitiveValue::Boolean(v) => self.write_bool(*v),
            PrimitiveValue::Byte(v) => self.write_u8(*v),
            PrimitiveValue::Char(v) => self.write_char(*v),
            PrimitiveValue::Decimal(v) => self.write_string(v.as_str())?,
            PrimitiveValue::Double(v) => self.write_f64(*v),
            PrimitiveValue::Int16(v) => self.write_i16(*v),
            PrimitiveValue::Int32(v) => self.write_i32(*v),
            PrimitiveValue::Int64(v) => self.write_i64(*v),
            PrimitiveValue::SByte(v) => self.write_i8(*v),
            PrimitiveValue::Single(v) => self.write_f32(*v),
            PrimitiveValue::TimeSpan(v) => self.write_i64(v.ticks()),
            PrimitiveValue::DateTime(v) => self.write_u64(v.to_bits()),
            PrimitiveValue::UInt16(v) => self.write_u16(*v),
            PrimitiveValue::UInt32(v) => self.write_u32(*v),
            PrimitiveValue::UInt64(v) => self.write_u64(*v),
            PrimitiveValue::Null => {}
            PrimitiveValue::String(v) => self.write_string(v)?,
        }
        Ok(())
    }

    /// Tag byte followed by the raw value.
    pub fn write_value_with_code(&mut self, value: &PrimitiveValue) -> CodecResult<()> {
        self.write_u8(value.primitive_type().as_byte());
        self.write_primitive(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrbf_types::DateTimeKind;
    use proptest::prelude::*;

    fn roundtrip(value: &PrimitiveValue) -> PrimitiveValue {
        let mut w = WireWriter::new();
        w.write_primitive(value).unwrap();
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        let out = r.read_primitive(value.primitive_type()).unwrap();
        assert!(r.is_empty(), "trailing bytes after {value:?}");
        out
    }

    #[test]
    fn varint_layout() {
        let mut w = WireWriter::new();
        w.write_varint(0x7F);
        w.write_varint(0x80);
        w.write_varint(300);
        assert_eq!(w.into_bytes(), vec![0x7F, 0x80, 0x01, 0xAC, 0x02]);
    }

    #[test]
    fn varint_five_bytes_max() {
        let mut r = WireReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
        assert_eq!(r.read_varint().unwrap(), i32::MAX as usize);

        let mut r = WireReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert_eq!(r.read_varint(), Err(CodecError::MalformedVarint { offset: 0 }));

        let mut r = WireReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(r.read_varint(), Err(CodecError::MalformedVarint { offset: 0 }));
    }

    #[test]
    fn string_utf8() {
        let mut w = WireWriter::new();
        w.write_string("Vocal 歌声").unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes[0] as usize, "Vocal 歌声".len());
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string().unwrap(), "Vocal 歌声");
    }

    #[test]
    fn invalid_utf8_reports_offset() {
        let mut r = WireReader::new(&[2, 0xC3, 0x28]);
        assert_eq!(r.read_string(), Err(CodecError::InvalidUtf8 { offset: 1 }));
    }

    #[test]
    fn truncated_string_is_eof() {
        let mut r = WireReader::new(&[5, b'a', b'b']);
        assert_eq!(
            r.read_string(),
            Err(CodecError::UnexpectedEof { offset: 1, needed: 3 })
        );
    }

    #[test]
    fn char_widths() {
        for c in ['a', 'é', '音', '🎵'] {
            assert_eq!(roundtrip(&PrimitiveValue::Char(c)), PrimitiveValue::Char(c));
        }
        let mut r = WireReader::new(&[0xFF]);
        assert!(matches!(r.read_char(), Err(CodecError::InvalidUtf8 { .. })));
    }

    #[test]
    fn datetime_kind_three_rejected() {
        let bytes = (3u64 << 62).to_le_bytes();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(r.read_datetime(), Err(CodecError::InvalidValue { offset: 0, .. })));
    }

    #[test]
    fn datetime_all_kinds() {
        for kind in [DateTimeKind::Unspecified, DateTimeKind::Utc, DateTimeKind::Local] {
            let v = PrimitiveValue::DateTime(NetDateTime::new(638_000_000_000_000_000, kind).unwrap());
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn decimal_text_preserved() {
        let v = PrimitiveValue::Decimal("10.250".parse().unwrap());
        assert_eq!(roundtrip(&v), v);

        let mut w = WireWriter::new();
        w.write_string("1e3").unwrap();
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(r.read_decimal(), Err(CodecError::InvalidValue { .. })));
    }

    #[test]
    fn null_consumes_nothing() {
        let mut r = WireReader::new(&[]);
        assert_eq!(r.read_primitive(PrimitiveType::Null).unwrap(), PrimitiveValue::Null);
    }

    #[test]
    fn negative_count_is_malformed() {
        let bytes = (-1i32).to_le_bytes();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(r.read_count("length"), Err(CodecError::Malformed { offset: 0, .. })));
    }

    fn arb_primitive() -> impl Strategy<Value = PrimitiveValue> {
        prop_oneof![
            any::<bool>().prop_map(PrimitiveValue::Boolean),
            any::<u8>().prop_map(PrimitiveValue::Byte),
            any::<char>().prop_map(PrimitiveValue::Char),
            any::<i64>().prop_map(|v| PrimitiveValue::Decimal(v.into())),
            any::<f64>()
                .prop_filter("NaN", |v| !v.is_nan())
                .prop_map(PrimitiveValue::Double),
            any::<i16>().prop_map(PrimitiveValue::Int16),
            any::<i32>().prop_map(PrimitiveValue::Int32),
            any::<i64>().prop_map(PrimitiveValue::Int64),
            any::<i8>().prop_map(PrimitiveValue::SByte),
            any::<f32>()
                .prop_filter("NaN", |v| !v.is_nan())
                .prop_map(PrimitiveValue::Single),
            any::<i64>().prop_map(|t| PrimitiveValue::TimeSpan(TimeSpan(t))),
            (0u64..(1 << 62), 0u8..3).prop_map(|(t, k)| {
                let kind = DateTimeKind::from_bits(k).unwrap();
                PrimitiveValue::DateTime(NetDateTime::new(t, kind).unwrap())
            }),
            any::<u16>().prop_map(PrimitiveValue::UInt16),
            any::<u32>().prop_map(PrimitiveValue::UInt32),
            any::<u64>().prop_map(PrimitiveValue::UInt64),
            Just(PrimitiveValue::Null),
            ".*".prop_map(PrimitiveValue::String),
        ]
    }

    proptest! {
        #[test]
        fn primitive_roundtrip(v in arb_primitive()) {
            prop_assert_eq!(roundtrip(&v), v);
        }

        #[test]
        fn varint_roundtrip(n in 0u32..=i32::MAX as u32) {
            let mut w = WireWriter::new();
            w.write_varint(n);
            let bytes = w.into_bytes();
            prop_assert!(bytes.len() <= MAX_VARINT_LEN);
            let mut r = WireReader::new(&bytes);
            prop_assert_eq!(r.read_varint().unwrap(), n as usize);
        }
    }
}
