use std::io::SeekFrom;

use log::{debug, trace};
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::errors::{Errors, Result};
use crate::fio::Transport;
use crate::sizing::{bypasses_buffer, plan_write, WritePlan};
use crate::stream::{open_transport, BufferedStream, Core};

impl<T: Transport> BufferedStream<T> {
    /// Waits for the single-permit gate, giving up if `cancel` fires first.
    ///
    /// The gate is released when the returned guard drops, on every exit path.
    async fn acquire(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, Core<T>>> {
        if cancel.is_cancelled() {
            return Err(Errors::Cancelled);
        }

        // uncontended: no suspension point at all
        if let Ok(core) = self.gate.try_lock() {
            return Ok(core);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Errors::Cancelled),
            core = self.gate.lock() => Ok(core),
        }
    }

    /// Reads into `dest`. A request the read window can fully satisfy
    /// completes on its first poll without touching the transport.
    pub async fn read_async(&self, dest: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
        let mut core = self.acquire(cancel).await?;
        core.read_async(dest, cancel).await
    }

    /// Writes all of `src`. A request that fits in the write window
    /// completes on its first poll without touching the transport.
    pub async fn write_async(&self, src: &[u8], cancel: &CancellationToken) -> Result<()> {
        let mut core = self.acquire(cancel).await?;
        core.write_async(src, cancel).await
    }

    pub async fn flush_async(&self, cancel: &CancellationToken) -> Result<()> {
        let mut core = self.acquire(cancel).await?;
        core.flush_async(cancel).await
    }

    pub async fn copy_to_async<D: Transport + ?Sized>(
        &self,
        dest: &mut D,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut core = self.acquire(cancel).await?;
        core.copy_to_async(dest, cancel).await
    }

    /// Seeks under the gate; the transport seek itself is blocking.
    pub async fn seek_async(&self, pos: SeekFrom, cancel: &CancellationToken) -> Result<u64> {
        let mut core = self.acquire(cancel).await?;
        core.seek(pos)
    }

    pub async fn position_async(&self, cancel: &CancellationToken) -> Result<u64> {
        let mut core = self.acquire(cancel).await?;
        core.position()
    }

    /// Flushes and releases the transport once every earlier async call has finished.
    pub async fn close_async(&self, cancel: &CancellationToken) -> Result<()> {
        let mut core = self.acquire(cancel).await?;
        if core.transport.is_none() {
            return Ok(());
        }
        if core.window.pending_write() > 0 {
            core.flush_write_async(cancel).await?;
        }
        core.close()
    }
}

impl<T: Transport> Core<T> {
    async fn write_pending_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        let transport = open_transport(&mut self.transport)?;
        transport.write_async(self.window.pending_slice(), cancel).await?;
        self.window.clear_write();
        Ok(())
    }

    async fn flush_write_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.write_pending_async(cancel).await?;
        open_transport(&mut self.transport)?.flush_async(cancel).await
    }

    async fn read_async(&mut self, dest: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
        self.ensure_can_read()?;

        let from_buffer = self.window.copy_out(dest);
        if from_buffer == dest.len() {
            return Ok(from_buffer);
        }
        let rest = &mut dest[from_buffer..];

        if self.window.pending_write() > 0 {
            self.flush_write_async(cancel).await?;
        } else {
            self.window.discard();
        }

        let transport = open_transport(&mut self.transport)?;
        if bypasses_buffer(rest.len(), self.options.buffer_size) {
            trace!("reading {} bytes directly from transport", rest.len());
            return Ok(from_buffer + transport.read_async(rest, cancel).await?);
        }

        let n = transport.read_async(self.window.fill_slot(), cancel).await?;
        self.window.set_filled(n);
        Ok(from_buffer + self.window.copy_out(rest))
    }

    async fn write_async(&mut self, src: &[u8], cancel: &CancellationToken) -> Result<()> {
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
                transport
                    .write_async(self.window.staged_slice(full), cancel)
                    .await?;
                self.window.clear_write();
                self.window.copy_in(&src[staged..]);
            }
            WritePlan::Coalesce => {
                let total = self
                    .window
                    .stage_shadow(src, self.options.max_shadow_buffer_size);
                debug!("coalescing {} pending and {} new bytes into one write", pending, src.len());
                let transport = open_transport(&mut self.transport)?;
                transport
                    .write_async(self.window.staged_slice(total), cancel)
                    .await?;
                self.window.clear_write();
            }
            WritePlan::Bypass { flush_pending } => {
                if flush_pending {
                    self.write_pending_async(cancel).await?;
                }
                trace!("writing {} bytes directly to transport", src.len());
                open_transport(&mut self.transport)?
                    .write_async(src, cancel)
                    .await?;
            }
        }
        Ok(())
    }

    async fn flush_async(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.transport.is_none() {
            return Err(Errors::StreamClosed);
        }

        if self.window.pending_write() > 0 {
            return self.flush_write_async(cancel).await;
        }

        if self.window.unread() > 0 {
            if !self.transport_can_seek() {
                return Ok(());
            }
            self.flush_read()?;
        }

        if self.transport_can_write() {
            open_transport(&mut self.transport)?.flush_async(cancel).await?;
        }
        self.window.discard();
        Ok(())
    }

    async fn copy_to_async<D: Transport + ?Sized>(
        &mut self,
        dest: &mut D,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        self.ensure_can_read()?;
        if !dest.can_write() {
            return Err(Errors::WriteNotSupported);
        }

        let mut total = 0u64;
        let unread = self.window.unread();
        if unread > 0 {
            dest.write_async(self.window.unread_slice(), cancel).await?;
            self.window.discard();
            total += unread as u64;
        } else {
            if self.window.pending_write() > 0 {
                self.flush_write_async(cancel).await?;
            }
            self.window.discard();
        }

        loop {
            let transport = open_transport(&mut self.transport)?;
            let n = transport.read_async(self.window.fill_slot(), cancel).await?;
            if n == 0 {
                break;
            }
            dest.write_async(self.window.filled_slice(n), cancel).await?;
            total += n as u64;
        }
        Ok(total)
    }
}
