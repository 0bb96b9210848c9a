//! Block appends run on their own thread so committing a transaction never waits on the disk.

use std::sync::Arc;
use std::thread::JoinHandle;
use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;
use tracing::{error, trace};
use crate::sync_log::{BlockSink, SyncLogError};

enum Job {
    Append(Vec<u8>),
    Flush(Sender<()>),
}

#[derive(Default)]
struct Failure {
    /// The first failed write, waiting to be reported.
    error: Option<SyncLogError>,
    diverged: bool,
}

/// Single consumer FIFO in front of a [`BlockSink`]. Each write starts after the previous one
/// finished. After the first failure nothing more is written.
pub(crate) struct AppendQueue {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    failure: Arc<Mutex<Failure>>,
}

impl AppendQueue {
    pub(crate) fn spawn<S: BlockSink>(mut sink: S) -> Result<Self, SyncLogError> {
        let (sender, receiver) = unbounded::<Job>();
        let failure = Arc::new(Mutex::new(Failure::default()));
        let worker_failure = failure.clone();

        let worker = std::thread::Builder::new()
            .name("sync-log".into())
            .spawn(move || {
                for job in receiver {
                    match job {
                        Job::Append(block) => {
                            if worker_failure.lock().diverged() { continue; }
                            trace!(len = block.len(), "append block");
                            if let Err(err) = sink.append(&block) {
                                error!(%err, "sync log append failed");
                                worker_failure.lock().record(err.into());
                            }
                        }
                        Job::Flush(done) => {
                            if !worker_failure.lock().diverged() {
                                if let Err(err) = sink.flush() {
                                    error!(%err, "sync log flush failed");
                                    worker_failure.lock().record(err.into());
                                }
                            }
                            // The caller may have given up waiting.
                            let _ = done.send(());
                        }
                    }
                }
            })?;

        Ok(AppendQueue { sender: Some(sender), worker: Some(worker), failure })
    }

    pub(crate) fn push(&self, block: Vec<u8>) -> Result<(), SyncLogError> {
        if self.failure.lock().diverged() { return Err(SyncLogError::Diverged); }
        self.send(Job::Append(block))
    }

    /// Wait for every queued block to be written. Reports the first failure once, and
    /// [`SyncLogError::Diverged`] after that.
    pub(crate) fn flush(&self) -> Result<(), SyncLogError> {
        let (done, wait) = bounded(1);
        self.send(Job::Flush(done))?;
        wait.recv().map_err(|_| SyncLogError::Diverged)?;
        self.failure.lock().take()
    }

    fn send(&self, job: Job) -> Result<(), SyncLogError> {
        self.sender.as_ref()
            .ok_or(SyncLogError::Diverged)?
            .send(job)
            .map_err(|_| SyncLogError::Diverged)
    }
}

impl Failure {
    fn diverged(&self) -> bool {
        self.diverged || self.error.is_some()
    }

    fn record(&mut self, err: SyncLogError) {
        if self.error.is_none() && !self.diverged {
            self.error = Some(err);
        }
    }

    fn take(&mut self) -> Result<(), SyncLogError> {
        if let Some(err) = self.error.take() {
            self.diverged = true;
            Err(err)
        } else if self.diverged {
            Err(SyncLogError::Diverged)
        } else {
            Ok(())
        }
    }
}

impl Drop for AppendQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what's queued and exit.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
