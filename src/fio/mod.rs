pub mod file_io;
pub mod memory_io;

use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::{Errors, Result};
use crate::fio::file_io::FileIO;

/// Transport is the byte source/sink a buffered stream sits on top of.
///
/// Only the blocking methods are required. The async methods default to
/// checking the cancellation token and running the blocking call inline;
/// transports with native non-blocking I/O override them.
#[async_trait]
pub trait Transport: Send {
    /// Whether `read` may be called.
    fn can_read(&self) -> bool;
    /// Whether `write` may be called.
    fn can_write(&self) -> bool;
    /// Whether `seek`, `set_len` and `position` may be called.
    fn can_seek(&self) -> bool;

    /// Read up to `buf.len()` bytes. Returns 0 only at end of data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Write all of `buf` or fail.
    fn write(&mut self, buf: &[u8]) -> Result<()>;
    /// Move the cursor and return the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;
    /// Push any transport-level buffering to the device.
    fn flush(&mut self) -> Result<()>;
    /// Truncate or extend the underlying data.
    fn set_len(&mut self, len: u64) -> Result<()>;
    /// Total length of the underlying data.
    fn size(&mut self) -> Result<u64>;

    /// Current absolute cursor position.
    fn position(&mut self) -> Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    async fn read_async(&mut self, buf: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(Errors::Cancelled);
        }
        self.read(buf)
    }

    async fn write_async(&mut self, buf: &[u8], cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Errors::Cancelled);
        }
        self.write(buf)
    }

    async fn flush_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Errors::Cancelled);
        }
        self.flush()
    }
}

/// Open a read-write file transport for the given path.
pub fn new_file_transport(file_name: PathBuf) -> Result<impl Transport> {
    FileIO::new(file_name)
}
