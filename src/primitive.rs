use std::fmt::{Debug, Formatter};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use smartstring::alias::String as SmartString;
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PrimitiveType {
    Boolean = 0,
    Float32 = 1,
    Int32 = 2,
    String = 3,
    Bytes = 4,
}

/// The value held by a primitive field.
///
/// Equality on floats is bitwise. A write of `NaN` over `NaN` is a no-op, and `0.0` vs `-0.0` is a
/// real change, which is what replaying a log bit-for-bit needs.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveValue {
    Boolean(bool),
    Float32(f32),
    Int32(i32),
    String(SmartString),
    Bytes(Vec<u8>),
}

impl PrimitiveValue {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            PrimitiveValue::Boolean(_) => PrimitiveType::Boolean,
            PrimitiveValue::Float32(_) => PrimitiveType::Float32,
            PrimitiveValue::Int32(_) => PrimitiveType::Int32,
            PrimitiveValue::String(_) => PrimitiveType::String,
            PrimitiveValue::Bytes(_) => PrimitiveType::Bytes,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let PrimitiveValue::Boolean(v) = self { Some(*v) } else { None }
    }

    pub fn as_f32(&self) -> Option<f32> {
        if let PrimitiveValue::Float32(v) = self { Some(*v) } else { None }
    }

    pub fn as_i32(&self) -> Option<i32> {
        if let PrimitiveValue::Int32(v) = self { Some(*v) } else { None }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let PrimitiveValue::String(v) = self { Some(v.as_str()) } else { None }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let PrimitiveValue::Bytes(v) = self { Some(v.as_slice()) } else { None }
    }

    /// Writes the value without a type tag. The reader must know the type from the field layout.
    pub(crate) fn write(&self, into: &mut Vec<u8>) {
        match self {
            PrimitiveValue::Boolean(v) => push_bool(into, *v),
            PrimitiveValue::Float32(v) => push_f32(into, *v),
            PrimitiveValue::Int32(v) => push_i32(into, *v),
            PrimitiveValue::String(v) => push_str(into, v),
            PrimitiveValue::Bytes(v) => push_len_prefixed(into, v),
        }
    }

    pub(crate) fn read(ty: PrimitiveType, parser: &mut BufParser) -> Result<Self, ParseError> {
        Ok(match ty {
            PrimitiveType::Boolean => PrimitiveValue::Boolean(parser.next_bool()?),
            PrimitiveType::Float32 => PrimitiveValue::Float32(parser.next_f32_le()?),
            PrimitiveType::Int32 => PrimitiveValue::Int32(parser.next_i32_le()?),
            PrimitiveType::String => PrimitiveValue::String(parser.next_str()?.into()),
            PrimitiveType::Bytes => PrimitiveValue::Bytes(parser.next_len_prefixed()?.to_vec()),
        })
    }

    pub(crate) fn write_tagged(&self, into: &mut Vec<u8>) {
        push_u8(into, self.primitive_type().into());
        self.write(into);
    }

    pub(crate) fn read_tagged(parser: &mut BufParser) -> Result<Self, ParseError> {
        let ty = PrimitiveType::try_from(parser.next_u8()?)
            .map_err(|_| ParseError::UnknownPrimitiveType)?;
        Self::read(ty, parser)
    }
}

impl PartialEq for PrimitiveValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PrimitiveValue::Boolean(a), PrimitiveValue::Boolean(b)) => a == b,
            (PrimitiveValue::Float32(a), PrimitiveValue::Float32(b)) => a.to_bits() == b.to_bits(),
            (PrimitiveValue::Int32(a), PrimitiveValue::Int32(b)) => a == b,
            (PrimitiveValue::String(a), PrimitiveValue::String(b)) => a == b,
            (PrimitiveValue::Bytes(a), PrimitiveValue::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PrimitiveValue {}

impl Debug for PrimitiveValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveValue::Boolean(v) => write!(f, "{}", v),
            PrimitiveValue::Float32(v) => write!(f, "{}f", v),
            PrimitiveValue::Int32(v) => write!(f, "{}i", v),
            PrimitiveValue::String(v) => write!(f, "{:?}", v.as_str()),
            PrimitiveValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for PrimitiveValue {
    fn from(v: bool) -> Self { PrimitiveValue::Boolean(v) }
}

impl From<f32> for PrimitiveValue {
    fn from(v: f32) -> Self { PrimitiveValue::Float32(v) }
}

impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self { PrimitiveValue::Int32(v) }
}

impl From<&str> for PrimitiveValue {
    fn from(v: &str) -> Self { PrimitiveValue::String(v.into()) }
}

impl From<String> for PrimitiveValue {
    fn from(v: String) -> Self { PrimitiveValue::String(v.into()) }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(v: Vec<u8>) -> Self { PrimitiveValue::Bytes(v) }
}

/// Initial value of a primitive field, as written in a box layout. This exists because
/// [`PrimitiveValue`] can't be built in a const context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveDefault {
    Boolean(bool),
    Float32(f32),
    Int32(i32),
    String(&'static str),
    Bytes,
}

impl PrimitiveDefault {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            PrimitiveDefault::Boolean(_) => PrimitiveType::Boolean,
            PrimitiveDefault::Float32(_) => PrimitiveType::Float32,
            PrimitiveDefault::Int32(_) => PrimitiveType::Int32,
            PrimitiveDefault::String(_) => PrimitiveType::String,
            PrimitiveDefault::Bytes => PrimitiveType::Bytes,
        }
    }

    pub fn to_value(&self) -> PrimitiveValue {
        match *self {
            PrimitiveDefault::Boolean(v) => PrimitiveValue::Boolean(v),
            PrimitiveDefault::Float32(v) => PrimitiveValue::Float32(v),
            PrimitiveDefault::Int32(v) => PrimitiveValue::Int32(v),
            PrimitiveDefault::String(v) => PrimitiveValue::String(v.into()),
            PrimitiveDefault::Bytes => PrimitiveValue::Bytes(Vec::new()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(PrimitiveValue::from(f32::NAN), PrimitiveValue::from(f32::NAN));
        assert_ne!(PrimitiveValue::from(0.0f32), PrimitiveValue::from(-0.0f32));
        assert_ne!(PrimitiveValue::from(1i32), PrimitiveValue::from(1.0f32));
    }

    #[test]
    fn tagged_values_read_back() {
        let values = [
            PrimitiveValue::from(true),
            PrimitiveValue::from(-0.5f32),
            PrimitiveValue::from(i32::MIN),
            PrimitiveValue::from("\u{fc}ber"),
            PrimitiveValue::from(vec![1u8, 2, 3]),
        ];
        let mut out = vec![];
        for v in values.iter() { v.write_tagged(&mut out); }
        let mut p = BufParser(&out);
        for v in values.iter() {
            assert_eq!(&PrimitiveValue::read_tagged(&mut p).unwrap(), v);
        }
        p.expect_empty().unwrap();
    }

    #[test]
    fn unknown_tag() {
        let mut p = BufParser(&[9, 0, 0, 0, 0]);
        assert_eq!(PrimitiveValue::read_tagged(&mut p), Err(ParseError::UnknownPrimitiveType));
    }
}
