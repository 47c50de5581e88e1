use log::{debug, trace};

use crate::sizing::next_capacity;

/// The role the internal buffer currently plays.
///
/// Holding either unread bytes or unflushed bytes is encoded in a single enum,
/// so a buffer with both an active read window and an active write window
/// cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowState {
    #[default]
    Idle,
    /// `[pos, len)` holds bytes fetched from the transport but not yet consumed.
    /// `[0, pos)` holds bytes already consumed, kept for seeks that land inside the window.
    Reading { pos: usize, len: usize },
    /// `[0, pos)` holds bytes accepted from the caller but not yet flushed.
    Writing { pos: usize },
}

impl WindowState {
    /// Number of fetched but unconsumed bytes.
    pub fn unread(&self) -> usize {
        match *self {
            WindowState::Reading { pos, len } => len - pos,
            _ => 0,
        }
    }

    /// Number of accepted but unflushed bytes.
    pub fn pending_write(&self) -> usize {
        match *self {
            WindowState::Writing { pos } => pos,
            _ => 0,
        }
    }
}

/// Owns the byte array shared by the read and write windows.
pub(crate) struct BufferWindow {
    // empty until the first read or write needs it
    buf: Vec<u8>,
    buffer_size: usize,
    state: WindowState,
}

impl BufferWindow {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            buffer_size,
            state: WindowState::Idle,
        }
    }

    /// Allocated bytes, which may exceed `buffer_size` after a shadow growth.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn unread(&self) -> usize {
        self.state.unread()
    }

    pub fn pending_write(&self) -> usize {
        self.state.pending_write()
    }

    /// Returns `(pos, len)` of the read window, `(0, 0)` when not reading.
    pub fn read_window(&self) -> (usize, usize) {
        match self.state {
            WindowState::Reading { pos, len } => (pos, len),
            _ => (0, 0),
        }
    }

    fn ensure_allocated(&mut self) {
        if self.buf.is_empty() {
            trace!("allocating {} byte stream buffer", self.buffer_size);
            self.buf = vec![0u8; self.buffer_size];
        }
    }

    /// Copies unread bytes into `dest` and advances the read cursor.
    pub fn copy_out(&mut self, dest: &mut [u8]) -> usize {
        let (pos, len) = match self.state {
            WindowState::Reading { pos, len } => (pos, len),
            _ => return 0,
        };
        let n = dest.len().min(len - pos);
        if n > 0 {
            dest[..n].copy_from_slice(&self.buf[pos..pos + n]);
            self.state = WindowState::Reading { pos: pos + n, len };
        }
        n
    }

    /// Unconsumed bytes of the read window.
    pub fn unread_slice(&self) -> &[u8] {
        let (pos, len) = self.read_window();
        &self.buf[pos..len]
    }

    /// Moves the read cursor to `pos`, which must lie inside the window.
    pub fn set_read_pos(&mut self, pos: usize) {
        if let WindowState::Reading { len, .. } = self.state {
            debug_assert!(pos <= len);
            self.state = WindowState::Reading { pos, len };
        }
    }

    /// Copies as much of `src` as fits into the write window.
    ///
    /// Must not be called while unread bytes exist; a fully consumed read
    /// window is dropped.
    pub fn copy_in(&mut self, src: &[u8]) -> usize {
        let n = self.stage_fill(src);
        self.commit_staged(n);
        n
    }

    /// Copies as much of `src` as fits behind the pending bytes without
    /// publishing it, so a failed transport write leaves the window as it was.
    pub fn stage_fill(&mut self, src: &[u8]) -> usize {
        debug_assert_eq!(self.unread(), 0, "write window opened over unread bytes");
        self.ensure_allocated();
        let pos = self.pending_write();
        let n = src.len().min(self.buffer_size - pos);
        self.buf[pos..pos + n].copy_from_slice(&src[..n]);
        n
    }

    /// Publishes `n` bytes placed by `stage_fill` as part of the write window.
    pub fn commit_staged(&mut self, n: usize) {
        let pos = self.pending_write() + n;
        self.state = if pos > 0 {
            WindowState::Writing { pos }
        } else {
            WindowState::Idle
        };
    }

    /// Bytes waiting to be flushed.
    pub fn pending_slice(&self) -> &[u8] {
        &self.buf[..self.pending_write()]
    }

    /// Appends `src` behind the pending bytes, growing the buffer once if needed,
    /// and returns the combined length.
    ///
    /// The window state is left untouched so a failed transport write keeps the
    /// original pending bytes only.
    pub fn stage_shadow(&mut self, src: &[u8], max_shadow: usize) -> usize {
        self.ensure_allocated();
        let pos = self.pending_write();
        let total = pos + src.len();
        let capacity = next_capacity(self.buf.len(), total, max_shadow);
        if capacity > self.buf.len() {
            debug!("growing stream buffer from {} to {} bytes", self.buf.len(), capacity);
            self.buf.resize(capacity, 0);
        }
        self.buf[pos..total].copy_from_slice(src);
        total
    }

    pub fn staged_slice(&self, total: usize) -> &[u8] {
        &self.buf[..total]
    }

    /// Drops the pending write bytes after the transport accepted them.
    pub fn clear_write(&mut self) {
        debug_assert!(matches!(self.state, WindowState::Writing { .. } | WindowState::Idle));
        self.state = WindowState::Idle;
    }

    /// Forgets the read window.
    pub fn discard(&mut self) {
        debug_assert_eq!(self.pending_write(), 0, "discarding unflushed bytes");
        self.state = WindowState::Idle;
    }

    /// Hands out the first `buffer_size` bytes for a transport read, resetting the window.
    pub fn fill_slot(&mut self) -> &mut [u8] {
        debug_assert_eq!(self.pending_write(), 0, "refilling over unflushed bytes");
        self.ensure_allocated();
        self.state = WindowState::Idle;
        &mut self.buf[..self.buffer_size]
    }

    /// Publishes `n` freshly read bytes as the new read window.
    pub fn set_filled(&mut self, n: usize) {
        debug_assert!(n <= self.buffer_size);
        self.state = WindowState::Reading { pos: 0, len: n };
    }

    /// The first `n` bytes of the buffer, as last written by `fill_slot`.
    pub fn filled_slice(&self, n: usize) -> &[u8] {
        &self.buf[..n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_allocated_lazily() {
        let mut window = BufferWindow::new(16);
        assert_eq!(window.capacity(), 0);
        assert_eq!(window.state(), WindowState::Idle);

        let mut dest = [0u8; 4];
        assert_eq!(window.copy_out(&mut dest), 0);
        assert_eq!(window.capacity(), 0);

        window.copy_in(b"ab");
        assert_eq!(window.capacity(), 16);
    }

    #[test]
    fn test_write_window_is_bounded() {
        let mut window = BufferWindow::new(4);
        assert_eq!(window.copy_in(b"abcdef"), 4);
        assert_eq!(window.pending_write(), 4);
        assert_eq!(window.pending_slice(), b"abcd");
        assert_eq!(window.copy_in(b"ef"), 0);

        window.clear_write();
        assert_eq!(window.state(), WindowState::Idle);
        assert_eq!(window.copy_in(b"ef"), 2);
        assert_eq!(window.state(), WindowState::Writing { pos: 2 });
    }

    #[test]
    fn test_read_window_copy_out() {
        let mut window = BufferWindow::new(8);
        window.fill_slot()[..5].copy_from_slice(b"hello");
        window.set_filled(5);
        assert_eq!(window.unread(), 5);

        let mut dest = [0u8; 3];
        assert_eq!(window.copy_out(&mut dest), 3);
        assert_eq!(&dest, b"hel");
        assert_eq!(window.state(), WindowState::Reading { pos: 3, len: 5 });
        assert_eq!(window.unread_slice(), b"lo");

        let mut dest = [0u8; 8];
        assert_eq!(window.copy_out(&mut dest), 2);
        assert_eq!(&dest[..2], b"lo");
        assert_eq!(window.unread(), 0);

        // consumed bytes stay addressable for in-window seeks
        window.set_read_pos(1);
        assert_eq!(window.unread_slice(), b"ello");
    }

    #[test]
    fn test_fully_consumed_read_window_yields_to_writes() {
        let mut window = BufferWindow::new(8);
        window.fill_slot()[..2].copy_from_slice(b"xy");
        window.set_filled(2);
        let mut dest = [0u8; 2];
        window.copy_out(&mut dest);

        assert_eq!(window.copy_in(b"z"), 1);
        assert_eq!(window.state(), WindowState::Writing { pos: 1 });
        assert_eq!(window.unread(), 0);
    }

    #[test]
    fn test_stage_shadow_grows_once() {
        let mut window = BufferWindow::new(8);
        window.copy_in(b"12345");

        let total = window.stage_shadow(b"6789abc", 64);
        assert_eq!(total, 12);
        assert_eq!(window.capacity(), 16);
        assert_eq!(window.staged_slice(total), b"123456789abc");
        // still only the original pending bytes until the transport accepts the write
        assert_eq!(window.state(), WindowState::Writing { pos: 5 });

        window.clear_write();
        window.copy_in(b"1");
        window.stage_shadow(b"23", 64);
        assert_eq!(window.capacity(), 16);
    }

    #[test]
    fn test_stage_fill_publishes_only_on_commit() {
        let mut window = BufferWindow::new(8);
        window.copy_in(b"abc");

        assert_eq!(window.stage_fill(b"defghijk"), 5);
        assert_eq!(window.state(), WindowState::Writing { pos: 3 });
        assert_eq!(window.pending_slice(), b"abc");
        assert_eq!(window.staged_slice(8), b"abcdefgh");

        window.commit_staged(5);
        assert_eq!(window.state(), WindowState::Writing { pos: 8 });
        assert_eq!(window.pending_slice(), b"abcdefgh");
    }
}
