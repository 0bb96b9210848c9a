use std::fs::File;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos"))]
use std::os::fd::AsRawFd;
use parking_lot::Mutex;
use crate::sync_log::FileSinkOptions;

/// Somewhere to append framed log blocks. Appends happen on the log's writer thread, one at a
/// time and in order.
pub trait BlockSink: Send + 'static {
    fn append(&mut self, block: &[u8]) -> io::Result<()>;

    /// Make everything appended so far durable.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Appends to a file on disk.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    options: FileSinkOptions,
}

impl FileSink {
    pub fn open<P: AsRef<Path>>(path: P, options: FileSinkOptions) -> io::Result<Self> {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(FileSink { file, options })
    }
}

fn write_barrier(file: &File) -> io::Result<()> {
    // fsync is very slow on apple hardware. F_BARRIERFSYNC only enforces write ordering, which is
    // all an append-only log needs. std doesn't wrap it, so we go through libc.
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos"))]
    {
        let ret = unsafe {
            libc::fcntl(file.as_raw_fd(), libc::F_BARRIERFSYNC)
        };

        if ret == -1 {
            Err(io::Error::last_os_error())
        } else { Ok(()) }
    }

    // Everywhere else can just do a normal fsync.
    #[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos")))]
    file.sync_data()
}

impl BlockSink for FileSink {
    fn append(&mut self, block: &[u8]) -> io::Result<()> {
        self.file.write_all(block)?;
        if self.options.sync_each_block {
            write_barrier(&self.file)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }
}

/// Appends to a shared buffer. Clones share the same buffer, so keep one around to look at what
/// was written.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockSink for MemorySink {
    fn append(&mut self, block: &[u8]) -> io::Result<()> {
        self.0.lock().extend_from_slice(block);
        Ok(())
    }
}
