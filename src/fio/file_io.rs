use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::error;

use crate::errors::{Errors, Result};
use crate::fio::Transport;

/// A file-backed transport.
pub struct FileIO {
    /// The file descriptor wrapped by this object.
    fd: File,
    readable: bool,
    writable: bool,
    // Whether flush also forces data to disk.
    sync_writes: bool,
}

impl FileIO {
    /// Create a new `FileIO` object from a file path, opened for reading and writing.
    pub fn new(path: PathBuf) -> Result<Self> {
        // Open the file in read-write mode.
        let file = match OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .read(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) => {
                error!("open file {:?} err: {}", path, e);
                return Err(Errors::Io(e));
            }
        };

        Ok(Self::from_file(file, true, true))
    }

    /// Open an existing file for reading only.
    pub fn open_read(path: PathBuf) -> Result<Self> {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                error!("open file {:?} for read err: {}", path, e);
                return Err(Errors::Io(e));
            }
        };

        Ok(Self::from_file(file, true, false))
    }

    /// Wrap an already opened file; the flags must match how it was opened.
    pub fn from_file(fd: File, readable: bool, writable: bool) -> Self {
        FileIO {
            fd,
            readable,
            writable,
            sync_writes: false,
        }
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}

impl Transport for FileIO {
    fn can_read(&self) -> bool {
        self.readable
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.fd.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                error!("read from file err: {}", e);
                Err(Errors::Io(e))
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        match self.fd.write_all(buf) {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("write to file err: {}", e);
                Err(Errors::Io(e))
            }
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match self.fd.seek(pos) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Err(Errors::NegativeSeekPosition),
            Err(e) => Err(Errors::Io(e)),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.fd.flush()?;

        // Sync the memory buffer to disk.
        if self.sync_writes {
            if let Err(e) = self.fd.sync_data() {
                error!("sync file err: {}", e);
                return Err(Errors::Io(e));
            }
        }
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.fd.set_len(len)?;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        let metadata = self.fd.metadata()?;
        Ok(metadata.len())
    }
}
