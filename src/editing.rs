//! Undoable editing on top of a [`BoxGraph`].
//!
//! Every call to [`Editing::modify`] runs its body in a graph transaction. Committed updates
//! collect in a pending list, and [`Editing::mark`] turns the pending list into one undo step.
//! `modify` marks by default, so each call is usually its own step.

use tracing::debug;
use crate::{BoxGraph, Update};
use crate::graph::GraphError;

#[derive(Debug)]
pub struct Editing {
    graph: BoxGraph,
    /// Committed updates which aren't part of an undo step yet.
    pending: Vec<Update>,
    history: Vec<Vec<Update>>,
    /// Steps before this index are done, steps at or after it have been undone.
    history_index: usize,
    /// Set while a gesture started by `begin_modification` is running.
    modifying: bool,
}

impl Default for Editing {
    fn default() -> Self {
        Self::new(BoxGraph::new())
    }
}

impl Editing {
    pub fn new(graph: BoxGraph) -> Self {
        Editing {
            graph,
            pending: Vec::new(),
            history: Vec::new(),
            history_index: 0,
            modifying: false,
        }
    }

    pub fn graph(&self) -> &BoxGraph {
        &self.graph
    }

    /// Direct access for writes inside an open transaction (a `modify` body or a gesture), and for
    /// subscribing.
    pub fn graph_mut(&mut self) -> &mut BoxGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> BoxGraph {
        self.graph
    }

    /// Run `body` as one transaction and make it its own undo step. See
    /// [`modify_with`](Self::modify_with).
    pub fn modify<R, E, F>(&mut self, body: F) -> Result<R, E>
        where F: FnOnce(&mut Editing) -> Result<R, E>, E: From<GraphError>
    {
        self.modify_with(true, body)
    }

    /// Run `body` inside a transaction.
    ///
    /// If `body` returns an error, every write it made is rolled back, nobody is notified and the
    /// error is returned as is. If the transaction leaves a dangling pointer or an unmet mandatory
    /// requirement it's rolled back too, and that error returned instead.
    ///
    /// Calling this from inside another `modify` body (or during a gesture) joins the transaction
    /// which is already open.
    pub fn modify_with<R, E, F>(&mut self, mark: bool, body: F) -> Result<R, E>
        where F: FnOnce(&mut Editing) -> Result<R, E>, E: From<GraphError>
    {
        if self.graph.in_transaction() {
            return body(self);
        }

        if mark && !self.pending.is_empty() { self.mark(); }
        self.graph.begin_transaction()?;
        let result = body(self);
        let result = match result {
            Ok(value) => value,
            Err(err) => {
                // The body might have closed the transaction itself.
                if self.graph.in_transaction() {
                    self.graph.abort_transaction()?;
                }
                return Err(err);
            }
        };

        // The body may have ended the transaction on its own. Then there's nothing left to commit.
        if self.graph.in_transaction() {
            let updates = self.graph.end_transaction_checked()?;
            self.pending.extend(updates);
        }
        if mark { self.mark(); }
        Ok(result)
    }

    /// Close the pending updates into an undo step. Any undone steps are discarded.
    pub fn mark(&mut self) {
        if self.pending.is_empty() { return; }
        self.history.truncate(self.history_index);
        self.history.push(std::mem::take(&mut self.pending));
        self.history_index = self.history.len();
    }

    pub fn can_modify(&self) -> bool {
        !self.graph.in_transaction()
    }

    pub fn can_undo(&self) -> bool {
        self.history_index > 0 || !self.pending.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.pending.is_empty() && self.history_index < self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.pending.is_empty()
    }

    /// Forget the whole history. The graph is left as it is.
    pub fn clear(&mut self) {
        debug_assert!(!self.modifying);
        self.pending.clear();
        self.history.clear();
        self.history_index = 0;
    }

    /// Undo the most recent step, in a transaction of its own. Returns false if there was nothing
    /// to undo.
    pub fn undo(&mut self) -> Result<bool, GraphError> {
        if self.graph.in_transaction() { return Err(GraphError::AlreadyInTransaction); }
        if !self.pending.is_empty() { self.mark(); }
        if self.history_index == 0 { return Ok(false); }

        let step = &self.history[self.history_index - 1];
        debug!(updates = step.len(), index = self.history_index - 1, "undo");
        let inverse: Vec<Update> = step.iter().rev().map(Update::inverse).collect();
        self.apply(&inverse)?;
        self.history_index -= 1;
        Ok(true)
    }

    /// Apply the most recently undone step again. Returns false if there's nothing to redo, or if
    /// there are pending updates (which would have discarded the redo history when marked).
    pub fn redo(&mut self) -> Result<bool, GraphError> {
        if self.graph.in_transaction() { return Err(GraphError::AlreadyInTransaction); }
        if self.history_index == self.history.len() { return Ok(false); }
        if !self.pending.is_empty() { return Ok(false); }

        let step = self.history[self.history_index].clone();
        debug!(updates = step.len(), index = self.history_index, "redo");
        self.apply(&step)?;
        self.history_index += 1;
        Ok(true)
    }

    fn apply(&mut self, updates: &[Update]) -> Result<(), GraphError> {
        self.graph.begin_transaction()?;
        for update in updates {
            if let Err(err) = update.forward(&mut self.graph) {
                self.graph.abort_transaction()?;
                return Err(err);
            }
        }
        self.graph.end_transaction_checked()?;
        Ok(())
    }

    /// Revert every pending update, without touching the history.
    pub fn clear_pending(&mut self) -> Result<(), GraphError> {
        if self.pending.is_empty() { return Ok(()); }
        let inverse: Vec<Update> = self.pending.iter().rev().map(Update::inverse).collect();
        self.apply(&inverse)?;
        self.pending.clear();
        Ok(())
    }

    /// Start a gesture: a transaction which stays open across calls (eg while dragging a knob).
    /// Write through [`graph_mut`](Self::graph_mut) or nested [`modify`](Self::modify) calls, then
    /// finish with [`approve`](Self::approve) or [`revert`](Self::revert).
    pub fn begin_modification(&mut self) -> Result<(), GraphError> {
        self.graph.begin_transaction()?;
        self.modifying = true;
        Ok(())
    }

    pub fn is_modifying(&self) -> bool {
        self.modifying
    }

    /// Commit the gesture. Its updates join the pending list, so the next `mark` (or `modify`)
    /// makes them an undo step.
    pub fn approve(&mut self) -> Result<(), GraphError> {
        if !self.modifying { return Err(GraphError::NotInTransaction); }
        self.modifying = false;
        let updates = self.graph.end_transaction_checked()?;
        self.pending.extend(updates);
        Ok(())
    }

    /// Throw the gesture away. Nobody is notified of anything it wrote.
    pub fn revert(&mut self) -> Result<(), GraphError> {
        if !self.modifying { return Err(GraphError::NotInTransaction); }
        self.modifying = false;
        self.graph.abort_transaction()
    }
}
