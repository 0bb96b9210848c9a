//! Append-only commit log.
//!
//! A [`SyncLogWriter`] listens to a project's committed transactions and appends each one as a
//! hash chained [`Commit`]. [`SyncLogReader::unwrap`] goes the other way, loading the initial
//! snapshot and replaying every commit after it.
//!
//! The log file is a bare sequence of blocks. Each block is:
//!
//! - CRC32-C of the commit bytes (u32 LE)
//! - Length of the commit bytes (u32 LE)
//! - The commit bytes
//!
//! A crash in the middle of an append leaves a partial block at the end of the file.
//! [`SyncLogFile::open`] cuts it off (after saving a backup) so the log can be resumed.

mod commit;
mod file;
mod queue;
mod reader;
mod sink;
mod writer;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use crate::encoding::ParseError;
use crate::graph::GraphError;
use crate::project::ProjectError;

pub use commit::{Commit, CommitType, Hash, EMPTY_HASH};
pub use file::SyncLogFile;
pub use reader::{SyncLogReader, Unwrapped};
pub use sink::{BlockSink, FileSink, MemorySink};
pub use writer::SyncLogWriter;

#[derive(Debug)]
#[non_exhaustive]
pub enum SyncLogError {
    Io(io::Error),
    Parse(ParseError),
    /// A block's CRC doesn't match its content. `offset` is where the block starts.
    ChecksumMismatch { offset: u64 },
    /// Commit `index` doesn't follow on from the commit before it, or its own hash is wrong.
    BrokenChain { index: usize },
    /// The log doesn't start with an `Init` commit, or has one somewhere else.
    UnexpectedCommit { index: usize, commit_type: CommitType },
    Empty,
    Project(ProjectError),
    Graph(GraphError),
    /// An earlier append failed, so the log on disk no longer matches the project. Nothing more
    /// will be written.
    Diverged,
}

impl Display for SyncLogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncLogError::Io(err) => write!(f, "IO error in sync log: {}", err),
            SyncLogError::Project(err) => Display::fmt(err, f),
            SyncLogError::Graph(err) => Display::fmt(err, f),
            other => write!(f, "SyncLogError {:?}", other),
        }
    }
}

impl Error for SyncLogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SyncLogError::Io(err) => Some(err),
            SyncLogError::Parse(err) => Some(err),
            SyncLogError::Project(err) => Some(err),
            SyncLogError::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SyncLogError {
    fn from(err: io::Error) -> Self {
        SyncLogError::Io(err)
    }
}

impl From<ParseError> for SyncLogError {
    fn from(err: ParseError) -> Self {
        SyncLogError::Parse(err)
    }
}

impl From<ProjectError> for SyncLogError {
    fn from(err: ProjectError) -> Self {
        SyncLogError::Project(err)
    }
}

impl From<GraphError> for SyncLogError {
    fn from(err: GraphError) -> Self {
        SyncLogError::Graph(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub(crate) verify_chain: bool,
    pub(crate) ignore_crc: bool,
}

pub const READ_STRICT: ReadOptions = ReadOptions {
    verify_chain: true,
    ignore_crc: false,
};

impl Default for ReadOptions {
    fn default() -> Self {
        READ_STRICT
    }
}

impl ReadOptions {
    /// Check every commit's hash and its link to the previous commit.
    pub fn verify_chain(mut self, verify_chain: bool) -> Self {
        self.verify_chain = verify_chain;
        self
    }

    /// Don't check block checksums. Only useful for salvaging damaged logs.
    pub fn ignore_crc(mut self, ignore_crc: bool) -> Self {
        self.ignore_crc = ignore_crc;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSinkOptions {
    pub(crate) sync_each_block: bool,
}

impl Default for FileSinkOptions {
    fn default() -> Self {
        FileSinkOptions { sync_each_block: true }
    }
}

impl FileSinkOptions {
    /// Issue a write barrier after every block. Turning this off is faster, but a crash can lose
    /// the most recent commits.
    pub fn sync_each_block(mut self, sync_each_block: bool) -> Self {
        self.sync_each_block = sync_each_block;
        self
    }
}
