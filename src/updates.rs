use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::{Address, BoxGraph, BoxKind, Identifier};
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::*;
use crate::graph::GraphError;
use crate::primitive::PrimitiveValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum UpdateType {
    New = 0,
    Set = 1,
    Pointer = 2,
    Delete = 3,
}

/// One recorded change to the graph. A transaction is a list of these.
///
/// `New` and `Delete` carry the whole box (its creation index and field settings), so either can
/// be inverted into the other without looking at the graph. Replaying them reproduces the graph
/// bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    New {
        id: Identifier,
        kind: BoxKind,
        creation_index: i32,
        settings: Vec<u8>,
    },
    Primitive {
        address: Address,
        old: PrimitiveValue,
        new: PrimitiveValue,
    },
    Pointer {
        address: Address,
        old: Option<Address>,
        new: Option<Address>,
    },
    Delete {
        id: Identifier,
        kind: BoxKind,
        creation_index: i32,
        settings: Vec<u8>,
    },
}

impl Update {
    /// The box (for `New` / `Delete`) or field this update touched.
    pub fn address(&self) -> Address {
        match self {
            Update::New { id, .. } | Update::Delete { id, .. } => Address::box_of(*id),
            Update::Primitive { address, .. } | Update::Pointer { address, .. } => address.clone(),
        }
    }

    pub fn inverse(&self) -> Update {
        match self.clone() {
            Update::New { id, kind, creation_index, settings } =>
                Update::Delete { id, kind, creation_index, settings },
            Update::Delete { id, kind, creation_index, settings } =>
                Update::New { id, kind, creation_index, settings },
            Update::Primitive { address, old, new } =>
                Update::Primitive { address, old: new, new: old },
            Update::Pointer { address, old, new } =>
                Update::Pointer { address, old: new, new: old },
        }
    }

    /// Apply this update to the graph inside the graph's open transaction. The graph records it
    /// again, so replayed updates reach subscribers and transaction listeners like any other write.
    pub fn forward(&self, graph: &mut BoxGraph) -> Result<(), GraphError> {
        match self {
            Update::New { id, kind, creation_index, settings } =>
                graph.restore_box(*kind, *id, *creation_index, settings),
            Update::Primitive { address, new, .. } =>
                graph.set_primitive(address, new.clone()),
            Update::Pointer { address, new, .. } =>
                graph.set_pointer(address, new.clone()),
            Update::Delete { id, .. } => graph.unstage_box(*id),
        }
    }

    pub(crate) fn write(&self, into: &mut Vec<u8>) {
        match self {
            Update::New { id, kind, creation_index, settings } => {
                push_u8(into, UpdateType::New.into());
                write_box(into, *id, *kind, *creation_index, settings);
            }
            Update::Primitive { address, old, new } => {
                push_u8(into, UpdateType::Set.into());
                address.write(into);
                old.write_tagged(into);
                new.write_tagged(into);
            }
            Update::Pointer { address, old, new } => {
                push_u8(into, UpdateType::Pointer.into());
                address.write(into);
                write_opt_address(into, old.as_ref());
                write_opt_address(into, new.as_ref());
            }
            Update::Delete { id, kind, creation_index, settings } => {
                push_u8(into, UpdateType::Delete.into());
                write_box(into, *id, *kind, *creation_index, settings);
            }
        }
    }

    pub(crate) fn read(parser: &mut BufParser) -> Result<Update, ParseError> {
        let ty = UpdateType::try_from(parser.next_u8()?)
            .map_err(|_| ParseError::UnknownUpdateType)?;
        Ok(match ty {
            UpdateType::New => {
                let (id, kind, creation_index, settings) = read_box(parser)?;
                Update::New { id, kind, creation_index, settings }
            }
            UpdateType::Delete => {
                let (id, kind, creation_index, settings) = read_box(parser)?;
                Update::Delete { id, kind, creation_index, settings }
            }
            UpdateType::Set => {
                let address = Address::read(parser)?;
                let old = PrimitiveValue::read_tagged(parser)?;
                let new = PrimitiveValue::read_tagged(parser)?;
                if old.primitive_type() != new.primitive_type() {
                    return Err(ParseError::InvalidContent);
                }
                Update::Primitive { address, old, new }
            }
            UpdateType::Pointer => {
                let address = Address::read(parser)?;
                let old = read_opt_address(parser)?;
                let new = read_opt_address(parser)?;
                Update::Pointer { address, old, new }
            }
        })
    }
}

fn write_box(into: &mut Vec<u8>, id: Identifier, kind: BoxKind, creation_index: i32, settings: &[u8]) {
    id.write(into);
    push_str(into, kind.name());
    push_i32(into, creation_index);
    push_len_prefixed(into, settings);
}

fn read_box(parser: &mut BufParser) -> Result<(Identifier, BoxKind, i32, Vec<u8>), ParseError> {
    let id = Identifier::read(parser)?;
    let kind = BoxKind::from_name(parser.next_str()?).ok_or(ParseError::UnknownTypeTag)?;
    let creation_index = parser.next_i32_le()?;
    let settings = parser.next_len_prefixed()?.to_vec();
    Ok((id, kind, creation_index, settings))
}

fn write_opt_address(into: &mut Vec<u8>, address: Option<&Address>) {
    push_bool(into, address.is_some());
    if let Some(address) = address {
        address.write(into);
    }
}

fn read_opt_address(parser: &mut BufParser) -> Result<Option<Address>, ParseError> {
    Ok(if parser.next_bool()? { Some(Address::read(parser)?) } else { None })
}

/// `int32 count` followed by each tagged update.
pub fn encode_updates(updates: &[Update]) -> Vec<u8> {
    let mut out = Vec::new();
    push_len(&mut out, updates.len());
    for update in updates {
        update.write(&mut out);
    }
    out
}

pub fn decode_updates(bytes: &[u8]) -> Result<Vec<Update>, ParseError> {
    let mut parser = BufParser(bytes);
    let count = parser.next_count()?;
    let mut updates = Vec::with_capacity(count);
    for _ in 0..count {
        updates.push(Update::read(&mut parser)?);
    }
    parser.expect_empty()?;
    Ok(updates)
}
