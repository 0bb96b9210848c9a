use std::collections::BTreeSet;
use tracing::debug;
use crate::{Address, BoxGraph, Identifier};
use crate::graph::GraphError;
use crate::pointer::DeletePolicy;

/// The boxes which belong to some root box, and every pointer touching them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// In discovery order. Doesn't include the root.
    pub boxes: Vec<Identifier>,
    pub pointers: Vec<Address>,
}

impl BoxGraph {
    fn is_mandatory_pointer(&self, pointer: &Address) -> bool {
        self.find_box(pointer.id())
            .and_then(|v| v.field(pointer.field_keys()))
            .and_then(|f| f.as_pointer())
            .map_or(false, |p| p.is_mandatory())
    }

    fn is_mandatory_target(&self, target: &Address) -> bool {
        self.find_vertex(target).map_or(false, |r| r.rules().mandatory)
    }

    /// Everything that can't exist without `id`:
    ///
    /// - Boxes with a mandatory pointer into `id` (a device hosted by a unit, a region on a track).
    /// - Mandatory targets of `id` that nothing outside the set points at (a region's private event
    ///   collection).
    ///
    /// applied transitively. Reference cycles are fine, each box is visited once.
    pub fn dependencies_of(&self, id: Identifier) -> Dependencies {
        let mut visited = BTreeSet::new();
        let mut boxes = Vec::new();
        let mut owned_candidates = Vec::new();
        let mut stack = vec![id];

        loop {
            while let Some(next) = stack.pop() {
                if !visited.insert(next) { continue; }
                boxes.push(next);

                for (_, (_, target)) in self.edges.outgoing_in_box(next) {
                    if self.is_mandatory_target(target) {
                        owned_candidates.push(target.clone());
                    }
                }
                for (_, list) in self.edges.incoming_in_box(next) {
                    for pointer in list.iter() {
                        if self.is_mandatory_pointer(pointer) {
                            stack.push(pointer.id());
                        }
                    }
                }
            }

            // A shared target is only owned once all its users are in.
            for target in owned_candidates.iter() {
                if !visited.contains(&target.id())
                    && self.edges.incoming(target).iter().all(|p| visited.contains(&p.id())) {
                    stack.push(target.id());
                }
            }
            if stack.is_empty() { break; }
        }

        let mut seen_pointers = BTreeSet::new();
        let mut pointers = Vec::new();
        for b in boxes.iter() {
            let outgoing = self.edges.outgoing_in_box(*b).map(|(pointer, _)| pointer);
            let incoming = self.edges.incoming_in_box(*b).flat_map(|(_, list)| list.iter());
            for pointer in outgoing.chain(incoming) {
                if seen_pointers.insert(pointer.clone()) {
                    pointers.push(pointer.clone());
                }
            }
        }

        boxes.retain(|b| *b != id);
        Dependencies { boxes, pointers }
    }

    /// Work out which boxes go when `id` is deleted, and which outside pointers get emptied.
    ///
    /// Incoming pointers follow their type's [`DeletePolicy`]. On top of that, mandatory targets
    /// only referenced from inside the deleted set go too.
    fn plan_deletion(&self, id: Identifier) -> Result<(Vec<Identifier>, Vec<Address>), GraphError> {
        let mut doomed = BTreeSet::new();
        let mut order = Vec::new();
        let mut owned_candidates = Vec::new();
        let mut stack = vec![id];

        loop {
            while let Some(next) = stack.pop() {
                if !doomed.insert(next) { continue; }
                order.push(next);

                for (_, list) in self.edges.incoming_in_box(next) {
                    for pointer in list.iter() {
                        let cascade = self.pointer_type_of(pointer)
                            .map_or(false, |ty| ty.delete_policy() == DeletePolicy::Cascade);
                        if cascade { stack.push(pointer.id()); }
                    }
                }
                for (_, (_, target)) in self.edges.outgoing_in_box(next) {
                    if self.is_mandatory_target(target) {
                        owned_candidates.push(target.clone());
                    }
                }
            }

            // Ownership can only be decided once the cascade settles, since a target shared by two
            // doomed boxes is only owned after both are in.
            for target in owned_candidates.iter() {
                if !doomed.contains(&target.id())
                    && self.edges.incoming(target).iter().all(|p| doomed.contains(&p.id())) {
                    stack.push(target.id());
                }
            }
            if stack.is_empty() { break; }
        }

        let mut clear = Vec::new();
        for doomed_id in order.iter() {
            for (target, list) in self.edges.incoming_in_box(*doomed_id) {
                for pointer in list.iter().filter(|p| !doomed.contains(&p.id())) {
                    match self.pointer_type_of(pointer).map(|ty| ty.delete_policy()) {
                        Some(DeletePolicy::Clear) => clear.push(pointer.clone()),
                        _ => return Err(GraphError::DeleteRejected {
                            target: target.clone(),
                            pointer: pointer.clone(),
                        }),
                    }
                }
            }
        }
        Ok((order, clear))
    }

    /// Delete a box along with everything its delete policies pull in. Returns the deleted
    /// identifiers, `id` first. Nothing is written if any incoming pointer rejects the deletion.
    pub fn delete_box(&mut self, id: Identifier) -> Result<Vec<Identifier>, GraphError> {
        self.require_transaction()?;
        if self.find_box(id).is_none() { return Err(GraphError::UnknownBox(id)); }

        let (doomed, clear) = self.plan_deletion(id)?;
        debug!(root = %id, boxes = doomed.len(), cleared = clear.len(), "delete");

        for pointer in clear.iter() {
            self.defer(pointer)?;
        }
        // Disconnect the doomed boxes from each other (and from whatever they point at) first, so
        // each one can be unstaged regardless of order.
        for doomed_id in doomed.iter() {
            for (pointer, _) in self.outgoing_of_box(*doomed_id) {
                self.defer(&pointer)?;
            }
        }
        for doomed_id in doomed.iter() {
            self.unstage_box(*doomed_id)?;
        }
        Ok(doomed)
    }
}
