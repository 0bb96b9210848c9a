use std::ffi::OsString;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use crate::encoding::tools::calc_checksum;
use crate::sync_log::{FileSink, FileSinkOptions, SyncLogError};

const BLOCK_HEADER_LEN: usize = 4 + 4; // CRC32 + Length (LE).

/// Wrap commit bytes in a block: checksum, length, then the bytes themselves.
pub(crate) fn frame_block(commit: &[u8]) -> Vec<u8> {
    // A u32 length means blocks can't be bigger than 4gb. Snapshots that big have other problems.
    assert!(commit.len() < u32::MAX as usize, "Block cannot be >4gb bytes in size");

    let mut block = Vec::with_capacity(BLOCK_HEADER_LEN + commit.len());
    block.extend_from_slice(&calc_checksum(commit).to_le_bytes());
    block.extend_from_slice(&(commit.len() as u32).to_le_bytes());
    block.extend_from_slice(commit);
    block
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum BlockError {
    /// The bytes end in the middle of a block.
    Truncated,
    /// `len` is the size of the whole damaged block.
    ChecksumMismatch { len: usize },
}

/// Read the block starting at `bytes[pos..]`. Returns the commit bytes and the total block size.
pub(crate) fn read_block(bytes: &[u8], pos: usize, check_crc: bool) -> Result<(&[u8], usize), BlockError> {
    let remaining = &bytes[pos..];
    if remaining.len() < BLOCK_HEADER_LEN { return Err(BlockError::Truncated); }

    let mut word = [0u8; 4];
    word.copy_from_slice(&remaining[0..4]);
    let expected_checksum = u32::from_le_bytes(word);
    word.copy_from_slice(&remaining[4..8]);
    let len = u32::from_le_bytes(word) as usize;

    if remaining.len() - BLOCK_HEADER_LEN < len { return Err(BlockError::Truncated); }
    let commit = &remaining[BLOCK_HEADER_LEN..BLOCK_HEADER_LEN + len];
    if check_crc && calc_checksum(commit) != expected_checksum {
        return Err(BlockError::ChecksumMismatch { len: BLOCK_HEADER_LEN + len });
    }
    Ok((commit, BLOCK_HEADER_LEN + len))
}

/// A log file opened for resuming. Opening scans every block, and if the last one is damaged
/// (a write was interrupted), backs the file up to `<path>.backup` and truncates the damage.
///
/// Damage anywhere else isn't a torn write. Opening fails with
/// [`SyncLogError::ChecksumMismatch`] and the file is left alone.
#[derive(Debug)]
pub struct SyncLogFile {
    path: PathBuf,
    bytes: Vec<u8>,
    truncated_at: Option<u64>,
}

impl SyncLogFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SyncLogError> {
        let path = path.as_ref().to_path_buf();
        let mut bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let mut pos = 0;
        let mut blocks = 0;
        let mut truncated_at = None;
        while pos < bytes.len() {
            match read_block(&bytes, pos, true) {
                Ok((_, len)) => {
                    pos += len;
                    blocks += 1;
                }
                Err(BlockError::ChecksumMismatch { len }) if pos + len != bytes.len() => {
                    warn!(offset = pos, path = %path.display(), "damaged block in the middle of sync log");
                    return Err(SyncLogError::ChecksumMismatch { offset: pos as u64 });
                }
                Err(err) => {
                    // A damaged last block probably means a partial write. Keep everything before it.
                    let mut backup_path = OsString::from(path.as_os_str());
                    backup_path.push(".backup");
                    let backup_path = PathBuf::from(backup_path);
                    warn!(?err, offset = pos, backup = %backup_path.display(),
                        "Last block of sync log is invalid. Truncating");
                    fs::copy(&path, &backup_path)?;

                    let file = File::options().write(true).open(&path)?;
                    file.set_len(pos as u64)?;
                    file.sync_all()?;
                    bytes.truncate(pos);
                    truncated_at = Some(pos as u64);
                    break;
                }
            }
        }

        info!(path = %path.display(), blocks, len = bytes.len(), "opened sync log");
        Ok(SyncLogFile { path, bytes, truncated_at })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every intact block in the file.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Where the file was cut, if it had a damaged tail.
    pub fn truncated_at(&self) -> Option<u64> {
        self.truncated_at
    }

    /// A sink appending after the last intact block.
    pub fn sink(&self, options: FileSinkOptions) -> Result<FileSink, SyncLogError> {
        Ok(FileSink::open(&self.path, options)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frames_and_reads_blocks() {
        let mut bytes = frame_block(b"hello");
        bytes.extend(frame_block(b""));
        assert_eq!(bytes.len(), 8 + 5 + 8);

        let (first, len) = read_block(&bytes, 0, true).unwrap();
        assert_eq!(first, b"hello");
        let (second, _) = read_block(&bytes, len, true).unwrap();
        assert!(second.is_empty());
        assert_eq!(read_block(&bytes[..bytes.len() - 1], len, true), Err(BlockError::Truncated));
    }

    #[test]
    fn detects_corruption() {
        let mut bytes = frame_block(b"hello");
        bytes[9] ^= 1;
        assert_eq!(read_block(&bytes, 0, true), Err(BlockError::ChecksumMismatch { len: bytes.len() }));
        assert!(read_block(&bytes, 0, false).is_ok());
    }

    #[test]
    fn truncates_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.log");
        let good = frame_block(b"first");
        let mut contents = good.clone();
        contents.extend_from_slice(&frame_block(b"second")[..7]);
        fs::write(&path, &contents).unwrap();

        let file = SyncLogFile::open(&path).unwrap();
        assert_eq!(file.truncated_at(), Some(good.len() as u64));
        assert_eq!(file.bytes(), &good[..]);
        assert_eq!(fs::read(&path).unwrap(), good);
        assert_eq!(fs::read(dir.path().join("project.log.backup")).unwrap(), contents);

        // Opening again is clean.
        assert_eq!(SyncLogFile::open(&path).unwrap().truncated_at(), None);
    }

    #[test]
    fn damaged_last_block_is_cut() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.log");
        let good = frame_block(b"first");
        let mut contents = good.clone();
        contents.extend_from_slice(&frame_block(b"second"));
        let last = contents.len() - 1;
        contents[last] ^= 0x10;
        fs::write(&path, &contents).unwrap();

        let file = SyncLogFile::open(&path).unwrap();
        assert_eq!(file.truncated_at(), Some(good.len() as u64));
        assert_eq!(fs::read(&path).unwrap(), good);
    }

    #[test]
    fn damage_before_the_tail_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.log");
        let mut contents = frame_block(b"first");
        contents.extend_from_slice(&frame_block(b"second"));
        contents[9] ^= 0x10;
        fs::write(&path, &contents).unwrap();

        assert!(matches!(SyncLogFile::open(&path), Err(SyncLogError::ChecksumMismatch { offset: 0 })));
        // Untouched, and no backup.
        assert_eq!(fs::read(&path).unwrap(), contents);
        assert!(!dir.path().join("project.log.backup").exists());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SyncLogFile::open(dir.path().join("nothing")).unwrap();
        assert!(file.is_empty());
        assert_eq!(file.truncated_at(), None);
    }
}
