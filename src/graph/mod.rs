//! The box graph owns every [`Vertex`] of a document, resolves [`Address`]es, and keeps the edge
//! index in sync with the pointer fields.
//!
//! All writes happen inside a transaction:
//!
//! ```
//! use box_graph::{Address, BoxGraph, BoxKind, Identifier};
//! use box_graph::schema::{audio_file, tape_device};
//!
//! let mut graph = BoxGraph::new();
//! graph.begin_transaction().unwrap();
//! let file = graph.create_box(BoxKind::AudioFile, Identifier::from_content(b"kick"), |b| {
//!     b.set_primitive(&[audio_file::FILE_NAME], "kick.wav".into())?;
//!     Ok(())
//! }).unwrap();
//! // The file box wants at least one user, and the tape wants a host. Neither is satisfied here,
//! // so we skip the requirement check by calling end_transaction rather than the checked variant.
//! let tape = graph.create_box(BoxKind::TapeDevice, Identifier::random(), |_| Ok(())).unwrap();
//! graph.refer(&Address::new(tape, &[tape_device::SAMPLE]), Address::box_of(file)).unwrap();
//! let updates = graph.end_transaction().unwrap();
//! assert_eq!(updates.len(), 3);
//! assert_eq!(graph.incoming(&Address::box_of(file)).len(), 1);
//! ```
//!
//! If anything goes wrong before the transaction ends, [`BoxGraph::abort_transaction`] undoes every
//! write made since [`BoxGraph::begin_transaction`]. Subscribers are only told about transactions
//! which commit.

mod edges;
mod error;
mod check;
mod dependencies;
mod serialize;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use tracing::{debug, error};
use crate::{Address, BoxKind, Identifier, Update};
use crate::dispatchers::*;
use crate::pointer::PointerType;
use crate::primitive::PrimitiveValue;
use crate::vertex::{Resolved, Vertex};
use edges::GraphEdges;

pub use check::GraphStats;
pub use dependencies::Dependencies;
pub use error::{GraphError, IntegrityError};

struct Transaction {
    updates: Vec<Update>,
    /// The creation index counter when the transaction began. Restored on rollback.
    creation_index: i32,
    /// Every pointer written during the transaction, with its type and its target at the moment it
    /// was first touched. New boxes start out with every pointer empty.
    touched: BTreeMap<Address, (PointerType, Option<Address>)>,
}

pub struct BoxGraph {
    boxes: BTreeMap<Identifier, Vertex>,
    edges: GraphEdges,
    next_creation_index: i32,
    transaction: Option<Transaction>,

    dispatchers: Dispatchers,
    hubs: PointerHubs,
    transaction_listeners: TransactionListeners,
    next_subscription: u64,
}

impl Default for BoxGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for BoxGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxGraph")
            .field("boxes", &self.boxes.len())
            .field("edges", &self.edges.len())
            .field("in_transaction", &self.in_transaction())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// Structural equality: same boxes with the same field values. The edge index follows from the
/// pointer fields, and subscriptions aren't part of the document.
impl PartialEq for BoxGraph {
    fn eq(&self, other: &Self) -> bool {
        self.boxes == other.boxes
    }
}

impl BoxGraph {
    pub fn new() -> Self {
        BoxGraph {
            boxes: BTreeMap::new(),
            edges: GraphEdges::default(),
            next_creation_index: 0,
            transaction: None,
            dispatchers: Dispatchers::default(),
            hubs: PointerHubs::default(),
            transaction_listeners: TransactionListeners::default(),
            next_subscription: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// All boxes in identifier order.
    pub fn boxes(&self) -> impl Iterator<Item=&Vertex> {
        self.boxes.values()
    }

    pub fn find_box(&self, id: Identifier) -> Option<&Vertex> {
        self.boxes.get(&id)
    }

    pub fn find_vertex(&self, address: &Address) -> Option<Resolved<'_>> {
        let vertex = self.boxes.get(&address.id())?;
        if address.is_box() {
            Some(Resolved::Box(vertex))
        } else {
            vertex.field(address.field_keys()).map(|field| Resolved::Field(vertex, field))
        }
    }

    /// Pointers targeting exactly this address, in address order.
    pub fn incoming(&self, target: &Address) -> &[Address] {
        self.edges.incoming(target)
    }

    /// Like [`incoming`](Self::incoming), keeping only pointers of the given types.
    pub fn incoming_of_type(&self, target: &Address, types: &[PointerType]) -> Vec<Address> {
        self.edges.incoming(target).iter()
            .filter(|p| self.pointer_type_of(p).map_or(false, |ty| types.contains(&ty)))
            .cloned()
            .collect()
    }

    /// Pointers targeting the box or any field inside it.
    pub fn incoming_of_box(&self, id: Identifier) -> Vec<Address> {
        self.edges.incoming_in_box(id)
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }

    /// `(pointer, target)` for every non-empty pointer in the box.
    pub fn outgoing_of_box(&self, id: Identifier) -> Vec<(Address, Address)> {
        self.edges.outgoing_in_box(id)
            .map(|(pointer, (_, target))| (pointer.clone(), target.clone()))
            .collect()
    }

    /// The type of a connected pointer.
    pub fn pointer_type_of(&self, pointer: &Address) -> Option<PointerType> {
        self.edges.outgoing(pointer).map(|(ty, _)| *ty)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // *** Transactions

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn begin_transaction(&mut self) -> Result<(), GraphError> {
        if self.transaction.is_some() { return Err(GraphError::AlreadyInTransaction); }
        self.transaction = Some(Transaction {
            updates: Vec::new(),
            creation_index: self.next_creation_index,
            touched: BTreeMap::new(),
        });
        Ok(())
    }

    /// Commit the open transaction. Every pointer written in the transaction must resolve to a
    /// target accepting its type. If not, the transaction is rolled back and the error returned.
    ///
    /// On success subscribers are notified and the recorded updates are returned.
    pub fn end_transaction(&mut self) -> Result<Vec<Update>, GraphError> {
        self.finish(false)
    }

    /// Like [`end_transaction`](Self::end_transaction), but also checks that boxes touched by the
    /// transaction have their mandatory pointers set and their mandatory targets pointed at.
    pub fn end_transaction_checked(&mut self) -> Result<Vec<Update>, GraphError> {
        self.finish(true)
    }

    /// Roll back everything written since the transaction began. Nobody is notified.
    pub fn abort_transaction(&mut self) -> Result<(), GraphError> {
        let txn = self.transaction.take().ok_or(GraphError::NotInTransaction)?;
        debug!(updates = txn.updates.len(), "abort transaction");
        self.rollback(txn);
        Ok(())
    }

    fn finish(&mut self, check_requirements: bool) -> Result<Vec<Update>, GraphError> {
        let txn = self.transaction.take().ok_or(GraphError::NotInTransaction)?;

        if let Err(err) = self.validate_transaction(&txn, check_requirements) {
            debug!(%err, updates = txn.updates.len(), "transaction invalid, rolling back");
            self.rollback(txn);
            return Err(err.into());
        }

        let changes: Vec<PointerChange> = txn.touched.iter()
            .filter_map(|(pointer, (pointer_type, before))| {
                let after = self.edges.outgoing(pointer).map(|(_, t)| t.clone());
                (before != &after).then(|| PointerChange {
                    pointer: pointer.clone(),
                    pointer_type: *pointer_type,
                    before: before.clone(),
                    after,
                })
            })
            .collect();

        debug!(updates = txn.updates.len(), pointer_changes = changes.len(), "commit transaction");
        self.notify(&txn.updates, &changes);
        Ok(txn.updates)
    }

    fn validate_transaction(&self, txn: &Transaction, check_requirements: bool) -> Result<(), IntegrityError> {
        for (pointer, (pointer_type, _)) in txn.touched.iter() {
            if let Some((_, target)) = self.edges.outgoing(pointer) {
                self.check_target(pointer, *pointer_type, target)?;
            }
        }

        if check_requirements {
            let mut affected = BTreeSet::new();
            for update in txn.updates.iter() {
                match update {
                    Update::New { id, .. } => { affected.insert(*id); }
                    Update::Pointer { address, .. } => { affected.insert(address.id()); }
                    Update::Primitive { .. } | Update::Delete { .. } => {}
                }
            }
            // Targets which may have lost their last incoming pointer.
            for (_, initial) in txn.touched.values() {
                if let Some(target) = initial {
                    affected.insert(target.id());
                }
            }
            for id in affected {
                self.validate_box(id)?;
            }
        }
        Ok(())
    }

    fn rollback(&mut self, txn: Transaction) {
        for update in txn.updates.iter().rev() {
            let result = match update {
                Update::New { id, .. } => {
                    self.raw_remove(*id);
                    Ok(())
                }
                Update::Delete { id, kind, creation_index, settings } => {
                    let mut vertex = Vertex::new(*kind, *id, *creation_index);
                    vertex.read_settings(settings)
                        .map(|()| self.raw_insert(vertex))
                        .map_err(GraphError::from)
                }
                Update::Primitive { address, old, .. } =>
                    self.raw_set_primitive(address, old.clone()).map(|_| ()),
                Update::Pointer { address, old, .. } =>
                    self.raw_set_pointer(address, old.clone()).map(|_| ()),
            };
            if let Err(err) = result {
                // The journal only holds writes which succeeded, so undoing them can't fail.
                error!(%err, ?update, "failed to roll back update");
                debug_assert!(false, "rollback failed: {}", err);
            }
        }
        self.next_creation_index = txn.creation_index;
    }

    fn notify(&mut self, updates: &[Update], changes: &[PointerChange]) {
        // Listeners get a shared reference to the graph, so they're moved out while they run.
        let mut dispatchers = std::mem::take(&mut self.dispatchers);
        if dispatchers.len() > 0 {
            for update in updates {
                dispatchers.dispatch(self, update);
            }
        }
        self.dispatchers = dispatchers;

        if !changes.is_empty() && !self.hubs.is_empty() {
            let mut hubs = std::mem::take(&mut self.hubs);
            hubs.dispatch(self, changes);
            self.hubs = hubs;
        }

        self.transaction_listeners.dispatch(updates);
    }

    fn record<I>(&mut self, update: Update, touched: I) -> Result<(), GraphError>
        where I: IntoIterator<Item=(Address, PointerType, Option<Address>)>
    {
        let txn = self.transaction.as_mut().ok_or(GraphError::NotInTransaction)?;
        for (pointer, pointer_type, initial) in touched {
            txn.touched.entry(pointer).or_insert((pointer_type, initial));
        }
        txn.updates.push(update);
        Ok(())
    }

    fn require_transaction(&self) -> Result<(), GraphError> {
        if self.in_transaction() { Ok(()) } else { Err(GraphError::NotInTransaction) }
    }

    // *** Raw edits. These don't record anything.

    fn raw_insert(&mut self, vertex: Vertex) {
        for (pointer, p) in vertex.pointers() {
            if let Some(target) = p.target() {
                self.edges.connect(pointer, p.pointer_type(), target.clone());
            }
        }
        self.next_creation_index = self.next_creation_index.max(vertex.creation_index().saturating_add(1));
        self.boxes.insert(vertex.id(), vertex);
    }

    fn raw_remove(&mut self, id: Identifier) -> Option<Vertex> {
        let vertex = self.boxes.remove(&id)?;
        for (pointer, p) in vertex.pointers() {
            if p.target().is_some() {
                self.edges.disconnect(&pointer);
            }
        }
        Some(vertex)
    }

    fn raw_set_primitive(&mut self, address: &Address, value: PrimitiveValue) -> Result<PrimitiveValue, GraphError> {
        let vertex = self.boxes.get_mut(&address.id()).ok_or(GraphError::UnknownBox(address.id()))?;
        vertex.set_primitive(address.field_keys(), value)
    }

    fn raw_set_pointer(&mut self, pointer: &Address, target: Option<Address>) -> Result<(PointerType, Option<Address>), GraphError> {
        let vertex = self.boxes.get_mut(&pointer.id()).ok_or(GraphError::UnknownBox(pointer.id()))?;
        let pointer_type = vertex.pointer_type(pointer.field_keys())?;
        let old = vertex.set_pointer(pointer.field_keys(), target.clone())?;
        if old != target {
            if old.is_some() {
                self.edges.disconnect(pointer);
            }
            if let Some(target) = target {
                self.edges.connect(pointer.clone(), pointer_type, target);
            }
        }
        Ok((pointer_type, old))
    }

    // *** Recorded edits

    /// Create a box. `init` sets up the initial field values, including pointers. The whole
    /// initial state is recorded as a single `New` update.
    pub fn create_box<F>(&mut self, kind: BoxKind, id: Identifier, init: F) -> Result<Identifier, GraphError>
        where F: FnOnce(&mut Vertex) -> Result<(), GraphError>
    {
        self.require_transaction()?;
        if self.boxes.contains_key(&id) { return Err(GraphError::DuplicateIdentifier(id)); }
        let mut vertex = Vertex::new(kind, id, self.next_creation_index);
        init(&mut vertex)?;
        self.stage(vertex)?;
        Ok(id)
    }

    /// Recreate a box from recorded settings, keeping its original creation index.
    pub(crate) fn restore_box(&mut self, kind: BoxKind, id: Identifier, creation_index: i32, settings: &[u8]) -> Result<(), GraphError> {
        self.require_transaction()?;
        if self.boxes.contains_key(&id) { return Err(GraphError::DuplicateIdentifier(id)); }
        let mut vertex = Vertex::new(kind, id, creation_index);
        vertex.read_settings(settings)?;
        self.stage(vertex)
    }

    fn stage(&mut self, vertex: Vertex) -> Result<(), GraphError> {
        let mut touched = Vec::new();
        for (pointer, p) in vertex.pointers() {
            if let Some(target) = p.target() {
                if target == &pointer { return Err(GraphError::SelfReference(pointer)); }
                // Targets which don't exist yet are checked when the transaction ends.
                self.check_target_if_present(&pointer, p.pointer_type(), target)?;
                touched.push((pointer, p.pointer_type(), None));
            }
        }
        let update = Update::New {
            id: vertex.id(),
            kind: vertex.kind(),
            creation_index: vertex.creation_index(),
            settings: vertex.settings(),
        };
        self.raw_insert(vertex);
        self.record(update, touched)
    }

    pub fn set_primitive(&mut self, address: &Address, value: PrimitiveValue) -> Result<(), GraphError> {
        self.require_transaction()?;
        let old = self.raw_set_primitive(address, value.clone())?;
        if old != value {
            self.record(Update::Primitive { address: address.clone(), old, new: value }, std::iter::empty())?;
        }
        Ok(())
    }

    /// Set a primitive field back to the value it was created with.
    pub fn reset(&mut self, address: &Address) -> Result<(), GraphError> {
        let initial = match self.find_vertex(address) {
            Some(Resolved::Field(_, field)) => field.as_primitive()
                .ok_or_else(|| GraphError::FieldTypeMismatch(address.clone()))?
                .initial(),
            Some(Resolved::Box(_)) => return Err(GraphError::FieldTypeMismatch(address.clone())),
            None => return Err(GraphError::UnknownField(address.clone())),
        };
        self.set_primitive(address, initial)
    }

    /// Point `pointer` at `target`, or empty it. If the target already exists it must accept the
    /// pointer's type. Targets created later in the same transaction are checked at commit.
    pub fn set_pointer(&mut self, pointer: &Address, target: Option<Address>) -> Result<(), GraphError> {
        self.require_transaction()?;
        if let Some(target) = &target {
            if target == pointer { return Err(GraphError::SelfReference(pointer.clone())); }
            let pointer_type = self.find_box(pointer.id())
                .ok_or(GraphError::UnknownBox(pointer.id()))?
                .pointer_type(pointer.field_keys())?;
            self.check_target_if_present(pointer, pointer_type, target)?;
        }
        let (pointer_type, old) = self.raw_set_pointer(pointer, target.clone())?;
        if old != target {
            let touched = Some((pointer.clone(), pointer_type, old.clone()));
            self.record(Update::Pointer { address: pointer.clone(), old, new: target }, touched)?;
        }
        Ok(())
    }

    pub fn refer(&mut self, pointer: &Address, target: Address) -> Result<(), GraphError> {
        self.set_pointer(pointer, Some(target))
    }

    pub fn defer(&mut self, pointer: &Address) -> Result<(), GraphError> {
        self.set_pointer(pointer, None)
    }

    /// Remove a single box. Fails if anything still points into it. The box's own pointers are
    /// disconnected and kept in the recorded `Delete`, so undo restores them.
    ///
    /// Most callers want [`delete_box`](Self::delete_box), which applies the delete policies.
    pub fn unstage_box(&mut self, id: Identifier) -> Result<(), GraphError> {
        self.require_transaction()?;
        let vertex = self.boxes.get(&id).ok_or(GraphError::UnknownBox(id))?;
        if self.edges.has_incoming_in_box(id) { return Err(GraphError::HasIncomingEdges(id)); }

        let touched: Vec<_> = vertex.pointers().into_iter()
            .filter_map(|(pointer, p)| p.target().map(|t| (pointer, p.pointer_type(), Some(t.clone()))))
            .collect();
        let update = Update::Delete {
            id,
            kind: vertex.kind(),
            creation_index: vertex.creation_index(),
            settings: vertex.settings(),
        };
        self.raw_remove(id);
        self.record(update, touched)
    }

    fn check_target_if_present(&self, pointer: &Address, pointer_type: PointerType, target: &Address) -> Result<(), IntegrityError> {
        match self.find_vertex(target) {
            Some(resolved) if !resolved.rules().accepts(pointer_type) => Err(IntegrityError::TypeMismatch {
                pointer: pointer.clone(),
                target: target.clone(),
                pointer_type,
            }),
            _ => Ok(()),
        }
    }

    fn check_target(&self, pointer: &Address, pointer_type: PointerType, target: &Address) -> Result<(), IntegrityError> {
        if self.find_vertex(target).is_none() {
            return Err(IntegrityError::DanglingPointer { pointer: pointer.clone(), target: target.clone() });
        }
        self.check_target_if_present(pointer, pointer_type, target)
    }

    // *** Subscriptions

    fn next_subscription(&mut self) -> Subscription {
        self.next_subscription += 1;
        Subscription(self.next_subscription)
    }

    /// Get told about every committed update matching `address` under `propagation`.
    pub fn subscribe<F>(&mut self, propagation: Propagation, address: Address, listener: F) -> Subscription
        where F: FnMut(&BoxGraph, &Update) + 'static
    {
        let id = self.next_subscription();
        self.dispatchers.subscribe(id, propagation, address, Box::new(listener));
        id
    }

    /// Watch the set of pointers targeting `target`. Changes are coalesced: a pointer which is
    /// connected and disconnected in the same transaction produces no event. An empty `filter`
    /// accepts every pointer type.
    pub fn subscribe_pointer_hub<F>(&mut self, target: Address, filter: &[PointerType], listener: F) -> Subscription
        where F: FnMut(&BoxGraph, HubEvent) + 'static
    {
        let id = self.next_subscription();
        self.hubs.subscribe(id, target, filter.to_vec(), Box::new(listener));
        id
    }

    /// Like [`subscribe_pointer_hub`](Self::subscribe_pointer_hub), but first reports every
    /// matching pointer already connected as `Added`.
    pub fn catchup_and_subscribe_pointer_hub<F>(&mut self, target: Address, filter: &[PointerType], mut listener: F) -> Subscription
        where F: FnMut(&BoxGraph, HubEvent) + 'static
    {
        for pointer in self.edges.incoming(&target).to_vec() {
            if let Some(pointer_type) = self.pointer_type_of(&pointer) {
                if filter.is_empty() || filter.contains(&pointer_type) {
                    listener(self, HubEvent::Added { pointer, pointer_type });
                }
            }
        }
        self.subscribe_pointer_hub(target, filter, listener)
    }

    /// Get every committed transaction as one slice, after the other subscribers have run.
    pub fn subscribe_transaction<F>(&mut self, listener: F) -> Subscription
        where F: FnMut(&[Update]) + 'static
    {
        let id = self.next_subscription();
        self.transaction_listeners.subscribe(id, Box::new(listener));
        id
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.dispatchers.unsubscribe(subscription)
            || self.hubs.unsubscribe(subscription)
            || self.transaction_listeners.unsubscribe(subscription)
    }

    pub fn subscription_count(&self) -> usize {
        self.dispatchers.len() + self.hubs.len() + self.transaction_listeners.len()
    }
}
