use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use sha2::{Digest, Sha256};
use crate::Update;
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;
use crate::encoding::tools::{push_f64, push_i32, push_len_prefixed};
use crate::project::Project;
use crate::updates::{decode_updates, encode_updates};

pub type Hash = [u8; 32];

pub const EMPTY_HASH: Hash = [0; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum CommitType {
    /// Full project snapshot. Always the first commit in a log.
    Init = 0,
    /// The log was opened again for appending. No payload.
    Open = 1,
    /// One committed transaction.
    Updates = 2,
    /// Full project snapshot replacing everything before it.
    NewVersion = 3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub commit_type: CommitType,
    pub prev_hash: Hash,
    pub this_hash: Hash,
    pub payload: Vec<u8>,
    /// Milliseconds since the unix epoch.
    pub date: f64,
}

pub(crate) fn now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

fn hex(hash: &Hash) -> String {
    hash[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

impl Commit {
    pub const VERSION: i32 = 1;

    pub fn create_first(project: &Project, date: f64) -> Commit {
        Self::create(CommitType::Init, EMPTY_HASH, project.to_bytes(), date)
    }

    pub fn create_open(prev_hash: Hash, date: f64) -> Commit {
        Self::create(CommitType::Open, prev_hash, vec![0], date)
    }

    pub fn create_updates(prev_hash: Hash, updates: &[Update], date: f64) -> Commit {
        Self::create(CommitType::Updates, prev_hash, encode_updates(updates), date)
    }

    pub fn create_new_version(prev_hash: Hash, project: &Project, date: f64) -> Commit {
        Self::create(CommitType::NewVersion, prev_hash, project.to_bytes(), date)
    }

    fn create(commit_type: CommitType, prev_hash: Hash, payload: Vec<u8>, date: f64) -> Commit {
        let this_hash = Self::compute_hash(&payload, &prev_hash, date);
        Commit { commit_type, prev_hash, this_hash, payload, date }
    }

    /// SHA-256 over the payload, the previous hash and the date (as f64 LE).
    pub fn compute_hash(payload: &[u8], prev_hash: &Hash, date: f64) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.update(prev_hash);
        hasher.update(date.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn verify_hash(&self) -> bool {
        Self::compute_hash(&self.payload, &self.prev_hash, self.date) == self.this_hash
    }

    /// Is this commit the direct successor of `prev`?
    pub fn follows(&self, prev: &Commit) -> bool {
        self.prev_hash == prev.this_hash
    }

    pub fn updates(&self) -> Result<Vec<Update>, ParseError> {
        decode_updates(&self.payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 84);
        push_i32(&mut out, self.commit_type.into());
        push_i32(&mut out, Self::VERSION);
        out.extend_from_slice(&self.prev_hash);
        out.extend_from_slice(&self.this_hash);
        push_len_prefixed(&mut out, &self.payload);
        push_f64(&mut out, self.date);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Commit, ParseError> {
        let mut parser = BufParser(bytes);
        let commit_type = CommitType::try_from(parser.next_i32_le()?)
            .map_err(|_| ParseError::UnknownCommitType)?;
        if parser.next_i32_le()? != Self::VERSION {
            return Err(ParseError::UnsupportedProtocolVersion);
        }
        let prev_hash = parser.next_array::<32>()?;
        let this_hash = parser.next_array::<32>()?;
        let payload = parser.next_len_prefixed()?.to_vec();
        let date = parser.next_f64_le()?;
        parser.expect_empty()?;
        Ok(Commit { commit_type, prev_hash, this_hash, payload, date })
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {{prev: {}, this: {}, payload: {} bytes}}",
               self.commit_type, hex(&self.prev_hash), hex(&self.this_hash), self.payload.len())
    }
}
