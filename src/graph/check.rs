use std::fmt::{Display, Formatter};
use humansize::{format_size, DECIMAL};
use tracing::debug;
use crate::{BoxGraph, Identifier};
use crate::graph::IntegrityError;

/// Size summary of a graph, mostly for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub boxes: usize,
    pub pointers: usize,
    pub bytes: usize,
}

impl Display for GraphStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} boxes, {} pointers, {}", self.boxes, self.pointers, format_size(self.bytes, DECIMAL))
    }
}

impl BoxGraph {
    /// Walk every pointer field and check its target resolves and accepts the pointer type, and
    /// that the edge index agrees with the fields. Returns the number of non-empty pointers.
    pub fn verify_pointers(&self) -> Result<usize, IntegrityError> {
        let mut count = 0;
        for vertex in self.boxes.values() {
            for (pointer, field) in vertex.pointers() {
                match (field.target(), self.edges.outgoing(&pointer)) {
                    (None, None) => {}
                    (Some(target), Some((ty, indexed))) if target == indexed && *ty == field.pointer_type() => {
                        self.check_target(&pointer, field.pointer_type(), target)?;
                        count += 1;
                    }
                    _ => return Err(IntegrityError::EdgeIndex(pointer)),
                }
            }
        }
        if count != self.edges.len() {
            // An indexed edge with no pointer field behind it.
            for pointer in self.edges.pointers() {
                let connected = self.find_box(pointer.id())
                    .and_then(|v| v.pointer_target(pointer.field_keys()))
                    .is_some();
                if !connected { return Err(IntegrityError::EdgeIndex(pointer.clone())); }
            }
        }
        self.edges.check()?;
        Ok(count)
    }

    /// Mandatory pointers are set and mandatory targets have at least one incoming pointer, for
    /// every box in the graph.
    pub fn validate_requirements(&self) -> Result<(), IntegrityError> {
        for id in self.boxes.keys() {
            self.validate_box(*id)?;
        }
        Ok(())
    }

    pub(super) fn validate_box(&self, id: Identifier) -> Result<(), IntegrityError> {
        let Some(vertex) = self.find_box(id) else { return Ok(()) };
        for (pointer, field) in vertex.pointers() {
            if field.is_mandatory() && field.is_empty() {
                return Err(IntegrityError::MissingMandatoryPointer(pointer));
            }
        }
        for (target, rules) in vertex.targets() {
            if rules.mandatory && self.edges.incoming(&target).is_empty() {
                return Err(IntegrityError::MissingMandatoryTarget(target));
            }
        }
        Ok(())
    }

    /// Expensive consistency check for tests and fuzzers. Panics on any inconsistency.
    #[allow(unused)]
    pub(crate) fn dbg_check(&self, deep: bool) {
        assert!(self.transaction.is_none(), "dbg_check inside a transaction");
        self.edges.check().unwrap();
        if deep {
            self.verify_pointers().unwrap();
            let copy = BoxGraph::from_bytes(&self.to_bytes()).unwrap();
            assert!(copy == *self);
        }
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            boxes: self.boxes.len(),
            pointers: self.edges.len(),
            bytes: self.boxes.values().map(|v| v.settings().len()).sum(),
        }
    }

    /// Log every box with its edge counts at debug level.
    pub fn debug_boxes(&self) {
        for vertex in self.boxes.values() {
            let incoming = self.edges.incoming_in_box(vertex.id()).map(|(_, l)| l.len()).sum::<usize>();
            let outgoing = self.edges.outgoing_in_box(vertex.id()).count();
            debug!(
                id = %vertex.id(),
                kind = vertex.kind().name(),
                creation_index = vertex.creation_index(),
                incoming,
                outgoing,
                size = %format_size(vertex.settings().len(), DECIMAL),
                "box"
            );
        }
        debug!(stats = %self.stats(), "graph");
    }
}
