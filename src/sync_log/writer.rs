use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use crate::graph::GraphError;
use crate::dispatchers::Subscription;
use crate::project::Project;
use crate::sync_log::{BlockSink, Commit, SyncLogError};
use crate::sync_log::commit::now;
use crate::sync_log::file::frame_block;
use crate::sync_log::queue::AppendQueue;

struct WriterState {
    queue: AppendQueue,
    last_commit: Commit,
    commit_count: usize,
}

impl WriterState {
    fn append(&mut self, commit: Commit) -> Result<(), SyncLogError> {
        self.queue.push(frame_block(&commit.to_bytes()))?;
        self.last_commit = commit;
        self.commit_count += 1;
        Ok(())
    }
}

/// Appends every transaction committed on a project's graph to a log.
///
/// The graph's transaction listener encodes the commit on the editing thread. The write itself
/// happens on a background thread; call [`flush`](Self::flush) to wait for it and find out whether
/// it worked.
///
/// Logging stops when the writer is dropped. Use [`detach`](Self::detach) to also unregister the
/// listener and learn whether the last writes made it.
pub struct SyncLogWriter {
    state: Arc<Mutex<WriterState>>,
    subscription: Subscription,
    detached: bool,
}

/// Snapshots must only contain committed state. A transaction still open (or a gesture) might be
/// reverted, and the revert is never logged.
fn check_at_rest(project: &Project) -> Result<(), SyncLogError> {
    if project.graph().in_transaction() || project.editing().is_modifying() {
        return Err(GraphError::AlreadyInTransaction.into());
    }
    Ok(())
}

impl SyncLogWriter {
    /// Start logging `project` into `sink`.
    ///
    /// For a new log pass `None`, and the full project is written as an `Init` commit. To continue
    /// an existing log pass its last commit and commit count (from
    /// [`SyncLogReader::unwrap`](crate::sync_log::SyncLogReader::unwrap)). Then only an `Open`
    /// commit chained to it is written.
    ///
    /// Fails with [`GraphError::AlreadyInTransaction`] if the project has a transaction open.
    pub fn attach<S: BlockSink>(project: &mut Project, sink: S, resume: Option<(Commit, usize)>) -> Result<Self, SyncLogError> {
        check_at_rest(project)?;
        let queue = AppendQueue::spawn(sink)?;
        let (first, commit_count) = match resume {
            None => {
                info!(root = %project.boxes().root, "starting new sync log");
                (Commit::create_first(project, now()), 0)
            }
            Some((last, count)) => {
                info!(root = %project.boxes().root, commits = count, "resuming sync log");
                (Commit::create_open(last.this_hash, now()), count)
            }
        };

        let mut state = WriterState { queue, last_commit: first.clone(), commit_count };
        state.append(first)?;
        let state = Arc::new(Mutex::new(state));

        let listener_state: Weak<Mutex<WriterState>> = Arc::downgrade(&state);
        let subscription = project.editing_mut().graph_mut().subscribe_transaction(move |updates| {
            if updates.is_empty() { return; }
            // Gone once the writer is dropped.
            let Some(state) = listener_state.upgrade() else { return };
            let mut state = state.lock();
            let commit = Commit::create_updates(state.last_commit.this_hash, updates, now());
            debug!(updates = updates.len(), commit = %commit, "log transaction");
            // A failure here is remembered by the queue and reported by the next flush.
            let _ = state.append(commit);
        });

        Ok(SyncLogWriter { state, subscription, detached: false })
    }

    /// Append a full snapshot of `project`. Readers replace whatever they had with it.
    ///
    /// Like [`attach`](Self::attach), this needs the project at rest.
    pub fn checkpoint(&self, project: &Project) -> Result<(), SyncLogError> {
        check_at_rest(project)?;
        let mut state = self.state.lock();
        let commit = Commit::create_new_version(state.last_commit.this_hash, project, now());
        state.append(commit)
    }

    /// Wait for everything queued so far to be written.
    pub fn flush(&self) -> Result<(), SyncLogError> {
        self.state.lock().queue.flush()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().commit_count
    }

    pub fn last_commit(&self) -> Commit {
        self.state.lock().last_commit.clone()
    }

    /// Stop logging, wait for pending writes and return the resume point.
    pub fn detach(mut self, project: &mut Project) -> Result<(Commit, usize), SyncLogError> {
        project.editing_mut().graph_mut().unsubscribe(self.subscription);
        self.detached = true;
        self.flush()?;
        let state = self.state.lock();
        Ok((state.last_commit.clone(), state.commit_count))
    }
}

impl Drop for SyncLogWriter {
    fn drop(&mut self) {
        if self.detached { return; }
        // Nobody is left to report this to.
        if let Err(err) = self.flush() {
            warn!(%err, "sync log writer dropped with failed writes");
        }
    }
}
