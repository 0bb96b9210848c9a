use std::collections::BTreeMap;
use smallvec::SmallVec;
use crate::{Address, Identifier};
use crate::graph::IntegrityError;
use crate::pointer::PointerType;

pub(crate) type IncomingList = SmallVec<[Address; 2]>;

/// The two symmetric edge indices. Every non-empty pointer field has exactly one entry in
/// `outgoing`, and appears exactly once in the `incoming` list of its target.
///
/// Both maps are keyed by [`Address`], so all the entries belonging to one box are a contiguous
/// range starting at the box's own address.
#[derive(Debug, Default, Clone)]
pub(crate) struct GraphEdges {
    outgoing: BTreeMap<Address, (PointerType, Address)>,
    // Each list is kept sorted.
    incoming: BTreeMap<Address, IncomingList>,
}

fn box_range<V>(map: &BTreeMap<Address, V>, id: Identifier) -> impl Iterator<Item=(&Address, &V)> {
    map.range(Address::box_of(id)..).take_while(move |(addr, _)| addr.id() == id)
}

impl GraphEdges {
    pub(crate) fn connect(&mut self, pointer: Address, pointer_type: PointerType, target: Address) {
        let list = self.incoming.entry(target.clone()).or_default();
        match list.binary_search(&pointer) {
            Ok(_) => debug_assert!(false, "pointer {} already connected", pointer),
            Err(idx) => list.insert(idx, pointer.clone()),
        }
        let old = self.outgoing.insert(pointer, (pointer_type, target));
        debug_assert!(old.is_none());
    }

    pub(crate) fn disconnect(&mut self, pointer: &Address) -> Option<Address> {
        let (_, target) = self.outgoing.remove(pointer)?;
        if let Some(list) = self.incoming.get_mut(&target) {
            if let Ok(idx) = list.binary_search(pointer) {
                list.remove(idx);
            }
            if list.is_empty() {
                self.incoming.remove(&target);
            }
        }
        Some(target)
    }

    pub(crate) fn incoming(&self, target: &Address) -> &[Address] {
        self.incoming.get(target).map(|list| list.as_slice()).unwrap_or(&[])
    }

    pub(crate) fn outgoing(&self, pointer: &Address) -> Option<&(PointerType, Address)> {
        self.outgoing.get(pointer)
    }

    pub(crate) fn outgoing_in_box(&self, id: Identifier) -> impl Iterator<Item=(&Address, &(PointerType, Address))> {
        box_range(&self.outgoing, id)
    }

    /// Incoming lists for the box address and every field address inside the box.
    pub(crate) fn incoming_in_box(&self, id: Identifier) -> impl Iterator<Item=(&Address, &IncomingList)> {
        box_range(&self.incoming, id)
    }

    pub(crate) fn has_incoming_in_box(&self, id: Identifier) -> bool {
        self.incoming_in_box(id).next().is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub(crate) fn pointers(&self) -> impl Iterator<Item=&Address> {
        self.outgoing.keys()
    }

    /// Check the two maps agree with each other.
    pub(crate) fn check(&self) -> Result<(), IntegrityError> {
        let mut incoming_count = 0;
        for (target, list) in self.incoming.iter() {
            if list.is_empty() || list.windows(2).any(|w| w[0] >= w[1]) {
                return Err(IntegrityError::EdgeIndex(target.clone()));
            }
            for pointer in list.iter() {
                match self.outgoing.get(pointer) {
                    Some((_, t)) if t == target => {}
                    _ => return Err(IntegrityError::EdgeIndex(pointer.clone())),
                }
            }
            incoming_count += list.len();
        }
        if incoming_count != self.outgoing.len() {
            // Some outgoing edge has no matching incoming entry. Find it for the error.
            for (pointer, (_, target)) in self.outgoing.iter() {
                if !self.incoming(target).contains(pointer) {
                    return Err(IntegrityError::EdgeIndex(pointer.clone()));
                }
            }
        }
        Ok(())
    }
}
