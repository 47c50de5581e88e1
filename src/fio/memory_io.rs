use std::io::{self, SeekFrom};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::errors::{Errors, Result};
use crate::fio::Transport;

/// Call counters recorded by a `MemoryIO`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub reads: usize,
    pub writes: usize,
    pub seeks: usize,
    pub flushes: usize,
    pub set_lens: usize,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

struct Shared {
    data: RwLock<Vec<u8>>,
    counters: Mutex<IoCounters>,
    fail_next_write: Mutex<bool>,
}

/// An in-memory transport with a single cursor, shareable state and switchable capabilities.
///
/// Useful both as a scratch stream and as an observable stand-in for sockets
/// (`non_seekable`) or one-directional pipes (`read_only`, `write_only`).
pub struct MemoryIO {
    shared: Arc<Shared>,
    pos: u64,
    readable: bool,
    writable: bool,
    seekable: bool,
    // caps every read, to exercise short-read handling
    read_chunk: Option<usize>,
}

/// Observes a `MemoryIO` after it has been handed to a stream.
#[derive(Clone)]
pub struct MemoryHandle {
    shared: Arc<Shared>,
}

impl MemoryIO {
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        MemoryIO {
            shared: Arc::new(Shared {
                data: RwLock::new(data.into()),
                counters: Mutex::new(IoCounters::default()),
                fail_next_write: Mutex::new(false),
            }),
            pos: 0,
            readable: true,
            writable: true,
            seekable: true,
            read_chunk: None,
        }
    }

    pub fn non_seekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn with_read_chunk(mut self, chunk: usize) -> Self {
        self.read_chunk = Some(chunk.max(1));
        self
    }

    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            shared: self.shared.clone(),
        }
    }

    fn read_at_cursor(&mut self, buf: &mut [u8]) -> usize {
        let data = self.shared.data.read();
        let start = (self.pos as usize).min(data.len());
        let mut n = buf.len().min(data.len() - start);
        if let Some(chunk) = self.read_chunk {
            n = n.min(chunk);
        }
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;

        let mut counters = self.shared.counters.lock();
        counters.reads += 1;
        counters.bytes_read += n as u64;
        n
    }

    fn write_at_cursor(&mut self, buf: &[u8]) -> Result<()> {
        {
            let mut fail = self.shared.fail_next_write.lock();
            if *fail {
                *fail = false;
                return Err(Errors::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "injected write failure",
                )));
            }
        }

        let mut data = self.shared.data.write();
        let start = self.pos as usize;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.pos = end as u64;

        let mut counters = self.shared.counters.lock();
        counters.writes += 1;
        counters.bytes_written += buf.len() as u64;
        Ok(())
    }

    fn ensure_seekable(&self) -> Result<()> {
        if !self.seekable {
            return Err(Errors::SeekNotSupported);
        }
        Ok(())
    }
}

impl Default for MemoryIO {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryIO {
    fn can_read(&self) -> bool {
        self.readable
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn can_seek(&self) -> bool {
        self.seekable
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.readable {
            return Err(Errors::ReadNotSupported);
        }
        Ok(self.read_at_cursor(buf))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Errors::WriteNotSupported);
        }
        self.write_at_cursor(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_seekable()?;
        let len = self.shared.data.read().len() as i128;
        let target = match pos {
            SeekFrom::Start(off) => off as i128,
            SeekFrom::Current(off) => self.pos as i128 + off as i128,
            SeekFrom::End(off) => len + off as i128,
        };
        if target < 0 {
            return Err(Errors::NegativeSeekPosition);
        }
        self.pos = target as u64;
        self.shared.counters.lock().seeks += 1;
        Ok(self.pos)
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.counters.lock().flushes += 1;
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.ensure_seekable()?;
        self.shared.data.write().resize(len as usize, 0);
        self.shared.counters.lock().set_lens += 1;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.shared.data.read().len() as u64)
    }

    fn position(&mut self) -> Result<u64> {
        self.ensure_seekable()?;
        Ok(self.pos)
    }

    async fn read_async(&mut self, buf: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(Errors::Cancelled);
        }
        self.read(buf)
    }

    async fn write_async(&mut self, buf: &[u8], cancel: &CancellationToken) -> Result<()> {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(Errors::Cancelled);
        }
        self.write(buf)
    }
}

impl MemoryHandle {
    /// A copy of the bytes currently held by the transport.
    pub fn contents(&self) -> Bytes {
        Bytes::copy_from_slice(&self.shared.data.read())
    }

    pub fn counters(&self) -> IoCounters {
        *self.shared.counters.lock()
    }

    /// Makes the next transport write fail without storing anything.
    pub fn fail_next_write(&self) {
        *self.shared.fail_next_write.lock() = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_io_read_write() {
        let mut mem = MemoryIO::new();
        let handle = mem.handle();

        assert!(mem.write(b"hello world").is_ok());
        assert_eq!(handle.contents(), Bytes::from("hello world"));
        assert_eq!(mem.position().unwrap(), 11);

        assert_eq!(mem.seek(SeekFrom::Start(6)).unwrap(), 6);
        let mut buf = [0u8; 16];
        let n = mem.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"world");

        // end of data, and it stays that way
        assert_eq!(mem.read(&mut buf).unwrap(), 0);
        assert_eq!(mem.read(&mut buf).unwrap(), 0);

        let counters = handle.counters();
        assert_eq!(counters.writes, 1);
        assert_eq!(counters.reads, 3);
        assert_eq!(counters.bytes_read, 5);
    }

    #[test]
    fn test_memory_io_short_reads() {
        let mut mem = MemoryIO::from_bytes(b"abcdef".to_vec()).with_read_chunk(2);
        let mut buf = [0u8; 6];
        assert_eq!(mem.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
    }

    #[test]
    fn test_memory_io_capabilities() {
        let mut mem = MemoryIO::from_bytes(b"abc".to_vec()).non_seekable();
        assert!(!mem.can_seek());
        assert!(matches!(mem.seek(SeekFrom::Start(0)), Err(Errors::SeekNotSupported)));
        assert!(matches!(mem.position(), Err(Errors::SeekNotSupported)));

        let mut mem = MemoryIO::new().read_only();
        assert!(matches!(mem.write(b"x"), Err(Errors::WriteNotSupported)));

        let mut mem = MemoryIO::new().write_only();
        let mut buf = [0u8; 1];
        assert!(matches!(mem.read(&mut buf), Err(Errors::ReadNotSupported)));
    }

    #[test]
    fn test_memory_io_seek() {
        let mut mem = MemoryIO::from_bytes(b"0123456789".to_vec());
        assert_eq!(mem.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(mem.seek(SeekFrom::Current(-2)).unwrap(), 5);
        assert!(matches!(
            mem.seek(SeekFrom::Current(-6)),
            Err(Errors::NegativeSeekPosition)
        ));
        assert_eq!(mem.position().unwrap(), 5);

        // writing past the end zero-fills the gap
        mem.seek(SeekFrom::Start(12)).unwrap();
        mem.write(b"x").unwrap();
        assert_eq!(mem.handle().contents().len(), 13);
    }

    #[test]
    fn test_memory_io_injected_failure() {
        let mut mem = MemoryIO::new();
        let handle = mem.handle();
        handle.fail_next_write();

        assert!(matches!(mem.write(b"lost"), Err(Errors::Io(_))));
        assert!(handle.contents().is_empty());
        assert!(mem.write(b"kept").is_ok());
        assert_eq!(handle.contents(), Bytes::from("kept"));
    }

    #[tokio::test]
    async fn test_memory_io_async_observes_cancellation() {
        let mut mem = MemoryIO::from_bytes(b"abc".to_vec());
        let cancel = CancellationToken::new();
        let mut buf = [0u8; 3];
        assert_eq!(mem.read_async(&mut buf, &cancel).await.unwrap(), 3);

        cancel.cancel();
        assert!(matches!(mem.write_async(b"d", &cancel).await, Err(Errors::Cancelled)));
        assert_eq!(mem.handle().contents(), Bytes::from("abc"));
    }
}
