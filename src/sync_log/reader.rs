use tracing::{debug, info};
use crate::encoding::ParseError;
use crate::project::Project;
use crate::sync_log::{Commit, CommitType, ReadOptions, SyncLogError};
use crate::sync_log::file::{read_block, BlockError};

/// The state a log unwraps to. Hand `last_commit` and `commit_count` to
/// [`SyncLogWriter::attach`](crate::sync_log::SyncLogWriter::attach) to keep appending.
#[derive(Debug)]
pub struct Unwrapped {
    pub project: Project,
    pub last_commit: Commit,
    /// Including the initial snapshot.
    pub commit_count: usize,
}

pub struct SyncLogReader;

impl SyncLogReader {
    /// Rebuild a project from log blocks: load the `Init` snapshot, then replay every commit in
    /// order. Each `Updates` commit is replayed as one graph transaction.
    pub fn unwrap(bytes: &[u8], options: ReadOptions) -> Result<Unwrapped, SyncLogError> {
        let mut commits = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let (commit, len) = read_block(bytes, pos, !options.ignore_crc).map_err(|err| match err {
                BlockError::Truncated => SyncLogError::Parse(ParseError::UnexpectedEOF),
                BlockError::ChecksumMismatch { .. } => SyncLogError::ChecksumMismatch { offset: pos as u64 },
            })?;
            commits.push(Commit::from_bytes(commit)?);
            pos += len;
        }

        let mut iter = commits.into_iter().enumerate();
        let (_, first) = iter.next().ok_or(SyncLogError::Empty)?;
        if first.commit_type != CommitType::Init {
            return Err(SyncLogError::UnexpectedCommit { index: 0, commit_type: first.commit_type });
        }
        if options.verify_chain && !first.verify_hash() {
            return Err(SyncLogError::BrokenChain { index: 0 });
        }
        let mut project = Project::from_bytes(&first.payload)?;

        let mut prev = first;
        let mut commit_count = 1;
        for (index, commit) in iter {
            if options.verify_chain && (!commit.follows(&prev) || !commit.verify_hash()) {
                return Err(SyncLogError::BrokenChain { index });
            }

            match commit.commit_type {
                CommitType::Init => {
                    return Err(SyncLogError::UnexpectedCommit { index, commit_type: commit.commit_type });
                }
                CommitType::Open => {
                    debug!(index, date = commit.date, "log reopened");
                }
                CommitType::Updates => {
                    let updates = commit.updates()?;
                    let graph = project.editing_mut().graph_mut();
                    graph.begin_transaction()?;
                    for update in updates.iter() {
                        if let Err(err) = update.forward(graph) {
                            graph.abort_transaction()?;
                            return Err(err.into());
                        }
                    }
                    graph.end_transaction()?;
                }
                CommitType::NewVersion => {
                    debug!(index, "new version snapshot");
                    project = Project::from_bytes(&commit.payload)?;
                }
            }
            prev = commit;
            commit_count += 1;
        }

        info!(commits = commit_count, bytes = bytes.len(), stats = %project.graph().stats(), "unwrapped sync log");
        Ok(Unwrapped { project, last_commit: prev, commit_count })
    }
}
