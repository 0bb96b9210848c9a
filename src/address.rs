use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use smallvec::SmallVec;
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::{push_i16, push_u8};
use crate::Identifier;

pub type FieldKey = i16;

/// Field paths are almost always 0 or 1 keys long. 2 covers nested object fields without
/// allocating.
pub type FieldKeys = SmallVec<[FieldKey; 2]>;

/// Names a box (empty field path) or a field inside a box.
///
/// Addresses order by identifier, then key by key, with a path sorting before any path it is a
/// prefix of. So all the addresses inside one box form a contiguous range starting at the box
/// address itself, which the edge index relies on.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    id: Identifier,
    keys: FieldKeys,
}

impl Address {
    pub fn new(id: Identifier, keys: &[FieldKey]) -> Self {
        Address { id, keys: keys.into() }
    }

    pub fn compose(id: Identifier, keys: FieldKeys) -> Self {
        Address { id, keys }
    }

    pub fn box_of(id: Identifier) -> Self {
        Address { id, keys: FieldKeys::new() }
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    pub fn field_keys(&self) -> &[FieldKey] {
        &self.keys
    }

    pub fn is_box(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_content(&self) -> bool {
        !self.is_box()
    }

    pub fn append(&self, key: FieldKey) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key);
        Address { id: self.id, keys }
    }

    /// Is `other` this address, or one of its ancestors?
    pub fn starts_with(&self, other: &Address) -> bool {
        self.id == other.id && self.keys.starts_with(&other.keys)
    }

    /// Same field path, different box.
    pub fn move_to(&self, id: Identifier) -> Self {
        Address { id, keys: self.keys.clone() }
    }

    pub(crate) fn write(&self, into: &mut Vec<u8>) {
        self.id.write(into);
        debug_assert!(self.keys.len() <= u8::MAX as usize);
        push_u8(into, self.keys.len() as u8);
        for &key in self.keys.iter() {
            push_i16(into, key);
        }
    }

    pub(crate) fn read(parser: &mut BufParser) -> Result<Self, ParseError> {
        let id = Identifier::read(parser)?;
        let len = parser.next_u8()? as usize;
        let mut keys = FieldKeys::with_capacity(len);
        for _ in 0..len {
            keys.push(parser.next_i16_le()?);
        }
        Ok(Address { id, keys })
    }
}

impl From<Identifier> for Address {
    fn from(id: Identifier) -> Self {
        Address::box_of(id)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)?;
        for key in self.keys.iter() {
            write!(f, "/{}", key)?;
        }
        Ok(())
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let id = parts.next().ok_or(ParseError::InvalidAddress)?.parse::<Identifier>()?;
        let keys = parts
            .map(|p| p.parse::<FieldKey>().map_err(|_| ParseError::InvalidAddress))
            .collect::<Result<FieldKeys, _>>()?;
        Ok(Address { id, keys })
    }
}
