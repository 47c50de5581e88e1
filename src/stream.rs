use std::io::SeekFrom;

use log::{debug, error, trace};
use tokio::sync::Mutex;

use crate::data::buffer_window::{BufferWindow, WindowState};
use crate::errors::{Errors, Result};
use crate::fio::Transport;
use crate::options::{check_options, StreamOptions};
use crate::sizing::{bypasses_buffer, plan_write, WritePlan};

/// A buffered, seekable stream over a `Transport`.
///
/// Small reads and writes are batched through one internal buffer that is
/// either a read window (bytes fetched, not yet consumed) or a write window
/// (bytes accepted, not yet flushed). Requests at least as large as the
/// buffer go straight to the transport.
///
/// The blocking API takes `&mut self`. The async API takes `&self` and
/// serializes callers through a single-permit gate, so a stream can be shared
/// between tasks behind an `Arc`. Because the blocking API needs exclusive
/// access, it can never run while an async call on the same stream is in flight.
///
/// Dropping the stream flushes a pending write window.
pub struct BufferedStream<T: Transport> {
    pub(crate) gate: Mutex<Core<T>>,
    options: StreamOptions,
}

/// The state guarded by the async gate.
pub(crate) struct Core<T: Transport> {
    // None once the stream is closed
    pub(crate) transport: Option<T>,
    pub(crate) window: BufferWindow,
    pub(crate) options: StreamOptions,
}

/// Borrows the transport of an open stream.
pub(crate) fn open_transport<T>(slot: &mut Option<T>) -> Result<&mut T> {
    slot.as_mut().ok_or(Errors::StreamClosed)
}

impl<T: Transport> BufferedStream<T> {
    /// Wrap `transport` with the default buffer size of 4096 bytes.
    pub fn new(transport: T) -> Result<Self> {
        Self::with_options(transport, StreamOptions::default())
    }

    pub fn with_capacity(transport: T, buffer_size: usize) -> Result<Self> {
        Self::with_options(transport, StreamOptions::with_buffer_size(buffer_size))
    }

    pub fn with_options(transport: T, options: StreamOptions) -> Result<Self> {
        // check options
        if let Some(e) = check_options(&options) {
            return Err(e);
        }

        if !transport.can_read() && !transport.can_write() {
            return Err(Errors::TransportUnusable);
        }

        Ok(Self {
            gate: Mutex::new(Core {
                transport: Some(transport),
                window: BufferWindow::new(options.buffer_size),
                options,
            }),
            options,
        })
    }

    fn core(&mut self) -> &mut Core<T> {
        self.gate.get_mut()
    }

    pub fn buffer_size(&self) -> usize {
        self.options.buffer_size
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    pub fn can_read(&mut self) -> bool {
        self.core().transport.as_ref().map_or(false, |t| t.can_read())
    }

    pub fn can_write(&mut self) -> bool {
        self.core().transport.as_ref().map_or(false, |t| t.can_write())
    }

    pub fn can_seek(&mut self) -> bool {
        self.core().transport.as_ref().map_or(false, |t| t.can_seek())
    }

    /// The underlying transport, `None` once closed.
    ///
    /// Reading or writing through it directly bypasses any buffered bytes.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.core().transport.as_mut()
    }

    /// Current role of the internal buffer.
    pub fn window_state(&mut self) -> WindowState {
        self.core().window.state()
    }

    /// Bytes currently allocated for the buffer, 0 before first use.
    pub fn buffered_capacity(&mut self) -> usize {
        self.core().window.capacity()
    }

    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize> {
        self.core().read(dest)
    }

    /// Reads a single byte, `None` at end of data.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.core().read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Writes all of `src`; never partial.
    pub fn write(&mut self, src: &[u8]) -> Result<()> {
        self.core().write(src)
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.core().write(std::slice::from_ref(&byte))
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.core().seek(pos)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.core().flush()
    }

    /// Logical position: the transport position corrected for buffered bytes.
    pub fn position(&mut self) -> Result<u64> {
        self.core().position()
    }

    pub fn set_position(&mut self, pos: u64) -> Result<()> {
        self.core().set_position(pos)
    }

    /// Length of the underlying data, including bytes still in the write window.
    pub fn len(&mut self) -> Result<u64> {
        self.core().len()
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.core().set_len(len)
    }

    /// Copies everything from the current position to end of data into `dest`.
    pub fn copy_to<D: Transport + ?Sized>(&mut self, dest: &mut D) -> Result<u64> {
        self.core().copy_to(dest)
    }

    /// Flushes and releases the transport. Later operations fail with `StreamClosed`.
    pub fn close(&mut self) -> Result<()> {
        self.core().close()
    }

    /// Flushes and hands back the transport.
    pub fn into_inner(self) -> Result<T> {
        let mut core = self.gate.into_inner();
        if core.window.pending_write() > 0 {
            core.flush_write()?;
        }
        core.transport.take().ok_or(Errors::StreamClosed)
    }
}

impl<T: Transport> Core<T> {
    pub(crate) fn ensure_can_read(&self) -> Result<()> {
        match &self.transport {
            None => Err(Errors::StreamClosed),
            Some(t) if !t.can_read() => Err(Errors::ReadNotSupported),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn ensure_can_write(&self) -> Result<()> {
        match &self.transport {
            None => Err(Errors::StreamClosed),
            Some(t) if !t.can_write() => Err(Errors::WriteNotSupported),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn ensure_can_seek(&self) -> Result<()> {
        match &self.transport {
            None => Err(Errors::StreamClosed),
            Some(t) if !t.can_seek() => Err(Errors::SeekNotSupported),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn transport_can_seek(&self) -> bool {
        self.transport.as_ref().map_or(false, |t| t.can_seek())
    }

    pub(crate) fn transport_can_write(&self) -> bool {
        self.transport.as_ref().map_or(false, |t| t.can_write())
    }

    /// Hands the write window to the transport without flushing the transport itself.
    fn write_pending(&mut self) -> Result<()> {
        let transport = open_transport(&mut self.transport)?;
        transport.write(self.window.pending_slice())?;
        self.window.clear_write();
        Ok(())
    }

    pub(crate) fn flush_write(&mut self) -> Result<()> {
        self.write_pending()?;
        open_transport(&mut self.transport)?.flush()
    }

    /// Moves the transport back over unread bytes and drops the read window.
    pub(crate) fn flush_read(&mut self) -> Result<()> {
        let unread = self.window.unread();
        if unread > 0 {
            trace!("seeking transport back over {} unread bytes", unread);
            open_transport(&mut self.transport)?.seek(SeekFrom::Current(-(unread as i64)))?;
        }
        self.window.discard();
        Ok(())
    }

    /// Makes the buffer available for writing while the transport position stays correct.
    pub(crate) fn clear_read_before_write(&mut self) -> Result<()> {
        if self.window.unread() == 0 {
            if let WindowState::Reading { .. } = self.window.state() {
                self.window.discard();
            }
            return Ok(());
        }

        if !self.transport_can_seek() {
            return Err(Errors::WriteAfterReadNotSeekable);
        }
        self.flush_read()
    }

    pub(crate) fn read(&mut self, dest: &mut [u8]) -> Result<usize> {
        self.ensure_can_read()?;

        let from_buffer = self.window.copy_out(dest);
        if from_buffer == dest.len() {
            return Ok(from_buffer);
        }
        let rest = &mut dest[from_buffer..];

        if self.window.pending_write() > 0 {
            self.flush_write()?;
        } else {
            self.window.discard();
        }

        let transport = open_transport(&mut self.transport)?;
        if bypasses_buffer(rest.len(), self.options.buffer_size) {
            trace!("reading {} bytes directly from transport", rest.len());
            return Ok(from_buffer + transport.read(rest)?);
        }

        let n = transport.read(self.window.fill_slot())?;
        self.window.set_filled(n);
        Ok(from_buffer + self.window.copy_out(rest))
    }

    pub(crate) fn write(&mut self, src: &[u8]) -> Result<()> {
        self.ensure_can_write()?;

        let pending = self.window.pending_write();
        if pending == 0 {
            self.clear_read_before_write()?;
        }

        match plan_write(
            pending,
            src.len(),
            self.options.buffer_size,
            self.options.max_shadow_buffer_size,
        ) {
            WritePlan::Buffer => {
                // the window is only published once the transport took the full buffer
                let staged = self.window.stage_fill(src);
                let full = pending + staged;
                if full < self.options.buffer_size {
                    self.window.commit_staged(staged);
                    return Ok(());
                }
                let transport = open_transport(&mut self.transport)?;
                transport.write(self.window.staged_slice(full))?;
                self.window.clear_write();
                self.window.copy_in(&src[staged..]);
            }
            WritePlan::Coalesce => {
                let total = self
                    .window
                    .stage_shadow(src, self.options.max_shadow_buffer_size);
                debug!("coalescing {} pending and {} new bytes into one write", pending, src.len());
                let transport = open_transport(&mut self.transport)?;
                transport.write(self.window.staged_slice(total))?;
                self.window.clear_write();
            }
            WritePlan::Bypass { flush_pending } => {
                if flush_pending {
                    self.write_pending()?;
                }
                trace!("writing {} bytes directly to transport", src.len());
                open_transport(&mut self.transport)?.write(src)?;
            }
        }
        Ok(())
    }

    pub(crate) fn position(&mut self) -> Result<u64> {
        self.ensure_can_seek()?;
        let transport_pos = open_transport(&mut self.transport)?.position()?;
        let pos = match self.window.state() {
            WindowState::Reading { pos, len } => transport_pos - (len - pos) as u64,
            WindowState::Writing { pos } => transport_pos + pos as u64,
            WindowState::Idle => transport_pos,
        };
        Ok(pos)
    }

    pub(crate) fn set_position(&mut self, pos: u64) -> Result<()> {
        self.ensure_can_seek()?;
        if self.window.pending_write() > 0 {
            self.flush_write()?;
        }
        self.window.discard();
        open_transport(&mut self.transport)?.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub(crate) fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_can_seek()?;

        if self.window.pending_write() > 0 {
            self.flush_write()?;
            return open_transport(&mut self.transport)?.seek(pos);
        }

        // the transport sits at the end of the read window
        let unread = self.window.unread() as i64;
        let target = match pos {
            SeekFrom::Current(offset) if unread > 0 => SeekFrom::Current(offset - unread),
            other => other,
        };

        let old_pos = self.position()?;
        let (read_pos, read_len) = self.window.read_window();
        let transport = open_transport(&mut self.transport)?;
        let new_pos = transport.seek(target)?;

        // offset of the target from the start of the buffered window
        let read_delta = new_pos as i128 - (old_pos as i128 - read_pos as i128);
        if 0 <= read_delta && read_delta < read_len as i128 {
            let read_delta = read_delta as usize;
            trace!("seek to {} stays inside the read window", new_pos);
            self.window.set_read_pos(read_delta);
            transport.seek(SeekFrom::Current((read_len - read_delta) as i64))?;
        } else {
            self.window.discard();
        }
        Ok(new_pos)
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Err(Errors::StreamClosed);
        }

        if self.window.pending_write() > 0 {
            return self.flush_write();
        }

        if self.window.unread() > 0 {
            // without seeking, the transport cannot be moved back over the unread bytes
            if !self.transport_can_seek() {
                return Ok(());
            }
            self.flush_read()?;
            if self.transport_can_write() {
                open_transport(&mut self.transport)?.flush()?;
            }
            return Ok(());
        }

        if self.transport_can_write() {
            open_transport(&mut self.transport)?.flush()?;
        }
        self.window.discard();
        Ok(())
    }

    pub(crate) fn len(&mut self) -> Result<u64> {
        self.ensure_can_seek()?;
        if self.window.pending_write() > 0 {
            self.flush_write()?;
        }
        open_transport(&mut self.transport)?.size()
    }

    pub(crate) fn set_len(&mut self, len: u64) -> Result<()> {
        self.ensure_can_seek()?;
        self.ensure_can_write()?;
        self.flush()?;
        open_transport(&mut self.transport)?.set_len(len)
    }

    /// Drains what is buffered into `dest` so the transport can be pumped directly.
    pub(crate) fn drain_into<D: Transport + ?Sized>(&mut self, dest: &mut D) -> Result<u64> {
        let unread = self.window.unread();
        if unread > 0 {
            dest.write(self.window.unread_slice())?;
            self.window.discard();
            return Ok(unread as u64);
        }
        if self.window.pending_write() > 0 {
            self.flush_write()?;
        }
        self.window.discard();
        Ok(0)
    }

    pub(crate) fn copy_to<D: Transport + ?Sized>(&mut self, dest: &mut D) -> Result<u64> {
        self.ensure_can_read()?;
        if !dest.can_write() {
            return Err(Errors::WriteNotSupported);
        }

        let mut total = self.drain_into(dest)?;
        loop {
            let transport = open_transport(&mut self.transport)?;
            let n = transport.read(self.window.fill_slot())?;
            if n == 0 {
                break;
            }
            dest.write(self.window.filled_slice(n))?;
            total += n as u64;
        }
        Ok(total)
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }
        if self.window.pending_write() > 0 {
            self.flush_write()?;
        } else if self.window.unread() > 0 && self.transport_can_seek() {
            self.flush_read()?;
        }
        self.window.discard();
        self.transport = None;
        Ok(())
    }
}

impl<T: Transport> Drop for Core<T> {
    fn drop(&mut self) {
        if self.transport.is_none() || self.window.pending_write() == 0 {
            return;
        }
        if let Err(e) = self.flush_write() {
            error!("flush pending writes on drop err: {}", e);
        }
    }
}
