//! Change notification. Subscribers register against an [`Address`] and get called synchronously
//! when a transaction commits, once per matching update, in the order the updates were recorded.

use tracing::trace;
use crate::{Address, BoxGraph, Update};
use crate::pointer::PointerType;

/// Which updates reach a subscriber registered at some address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Only updates to exactly this address.
    This,
    /// Updates to this address or any of its ancestors (eg the whole box being created).
    Parent,
    /// Updates to this address or anything inside it.
    Children,
}

/// Handle returned by every subscribe call. Pass it to
/// [`BoxGraph::unsubscribe`](crate::BoxGraph::unsubscribe) to stop receiving notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(pub(crate) u64);

pub type UpdateListener = Box<dyn FnMut(&BoxGraph, &Update)>;
pub type HubListener = Box<dyn FnMut(&BoxGraph, HubEvent)>;
pub type TransactionListener = Box<dyn FnMut(&[Update])>;

/// A net change to the set of pointers targeting a watched address, reported once per
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    Added { pointer: Address, pointer_type: PointerType },
    Removed { pointer: Address, pointer_type: PointerType },
}

struct Monitor {
    id: Subscription,
    address: Address,
    propagation: Propagation,
    listener: UpdateListener,
}

impl Monitor {
    fn matches(&self, target: &Address) -> bool {
        match self.propagation {
            Propagation::This => &self.address == target,
            Propagation::Parent => self.address.starts_with(target),
            Propagation::Children => target.starts_with(&self.address),
        }
    }
}

#[derive(Default)]
pub(crate) struct Dispatchers {
    // Always in subscription order, since ids only grow and we only ever push.
    monitors: Vec<Monitor>,
}

impl Dispatchers {
    pub(crate) fn subscribe(&mut self, id: Subscription, propagation: Propagation, address: Address, listener: UpdateListener) {
        self.monitors.push(Monitor { id, address, propagation, listener });
    }

    pub(crate) fn unsubscribe(&mut self, id: Subscription) -> bool {
        let len = self.monitors.len();
        self.monitors.retain(|m| m.id != id);
        self.monitors.len() != len
    }

    pub(crate) fn dispatch(&mut self, graph: &BoxGraph, update: &Update) {
        let address = update.address();
        for monitor in self.monitors.iter_mut().filter(|m| m.matches(&address)) {
            trace!(%address, subscription = monitor.id.0, "dispatch");
            (monitor.listener)(graph, update);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.monitors.len()
    }
}

struct HubMonitor {
    id: Subscription,
    target: Address,
    filter: Vec<PointerType>,
    listener: HubListener,
}

/// One pointer whose target differed between the start and the end of a transaction.
pub(crate) struct PointerChange {
    pub(crate) pointer: Address,
    pub(crate) pointer_type: PointerType,
    pub(crate) before: Option<Address>,
    pub(crate) after: Option<Address>,
}

#[derive(Default)]
pub(crate) struct PointerHubs {
    monitors: Vec<HubMonitor>,
}

impl PointerHubs {
    pub(crate) fn subscribe(&mut self, id: Subscription, target: Address, filter: Vec<PointerType>, listener: HubListener) {
        self.monitors.push(HubMonitor { id, target, filter, listener });
    }

    pub(crate) fn unsubscribe(&mut self, id: Subscription) -> bool {
        let len = self.monitors.len();
        self.monitors.retain(|m| m.id != id);
        self.monitors.len() != len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Removals are reported before additions, so a pointer moving between two watched targets
    /// leaves the first before it joins the second.
    pub(crate) fn dispatch(&mut self, graph: &BoxGraph, changes: &[PointerChange]) {
        for change in changes {
            if let Some(before) = &change.before {
                self.fire(graph, before, change.pointer_type,
                    || HubEvent::Removed { pointer: change.pointer.clone(), pointer_type: change.pointer_type });
            }
        }
        for change in changes {
            if let Some(after) = &change.after {
                self.fire(graph, after, change.pointer_type,
                    || HubEvent::Added { pointer: change.pointer.clone(), pointer_type: change.pointer_type });
            }
        }
    }

    fn fire<F: Fn() -> HubEvent>(&mut self, graph: &BoxGraph, target: &Address, ty: PointerType, event: F) {
        for monitor in self.monitors.iter_mut() {
            if &monitor.target == target && (monitor.filter.is_empty() || monitor.filter.contains(&ty)) {
                (monitor.listener)(graph, event());
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct TransactionListeners {
    listeners: Vec<(Subscription, TransactionListener)>,
}

impl TransactionListeners {
    pub(crate) fn subscribe(&mut self, id: Subscription, listener: TransactionListener) {
        self.listeners.push((id, listener));
    }

    pub(crate) fn unsubscribe(&mut self, id: Subscription) -> bool {
        let len = self.listeners.len();
        self.listeners.retain(|(i, _)| *i != id);
        self.listeners.len() != len
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn dispatch(&mut self, updates: &[Update]) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(updates);
        }
    }
}
