//! Buffer sizing decisions, kept free of I/O so they can be tested on their own.

/// Window size used when the caller does not pick one.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Ceiling for the one-time buffer growth used to coalesce two writes.
pub const MAX_SHADOW_BUFFER_SIZE: usize = 81920;

/// How a write request should be serviced given what is already pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePlan {
    /// Copy into the write window, flushing once if it fills up.
    Buffer,
    /// Grow the buffer once and hand pending + incoming to the transport in a single write.
    Coalesce,
    /// Write the request straight to the transport, after flushing pending bytes if any.
    Bypass { flush_pending: bool },
}

/// Returns the capacity to grow to so that `required` bytes fit.
///
/// The buffer never shrinks and grows at most to `min(2 * current, max)`.
pub fn next_capacity(current: usize, required: usize, max: usize) -> usize {
    if required <= current {
        return current;
    }
    current.saturating_mul(2).min(max).max(current)
}

/// Decides how to service a write of `incoming` bytes with `pending` bytes already buffered.
pub fn plan_write(pending: usize, incoming: usize, buffer_size: usize, max_shadow: usize) -> WritePlan {
    let double = buffer_size.saturating_mul(2);
    let total = pending.saturating_add(incoming);

    // the copy is cheap as long as the request is small relative to the window
    if total.saturating_add(incoming) < double {
        return WritePlan::Buffer;
    }

    if pending > 0 && total <= double && total <= max_shadow {
        return WritePlan::Coalesce;
    }

    WritePlan::Bypass {
        flush_pending: pending > 0,
    }
}

/// Whether a read of `remaining` bytes should skip the buffer entirely.
#[inline]
pub fn bypasses_buffer(remaining: usize, buffer_size: usize) -> bool {
    remaining >= buffer_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_capacity() {
        assert_eq!(next_capacity(4096, 100, MAX_SHADOW_BUFFER_SIZE), 4096);
        assert_eq!(next_capacity(4096, 4096, MAX_SHADOW_BUFFER_SIZE), 4096);
        assert_eq!(next_capacity(4096, 5000, MAX_SHADOW_BUFFER_SIZE), 8192);

        // capped by the shadow ceiling
        assert_eq!(next_capacity(65536, 70000, MAX_SHADOW_BUFFER_SIZE), 81920);

        // never shrinks, even when the ceiling is below the current size
        assert_eq!(next_capacity(100_000, 150_000, MAX_SHADOW_BUFFER_SIZE), 100_000);
        assert_eq!(next_capacity(usize::MAX, usize::MAX, usize::MAX), usize::MAX);
    }

    #[test]
    fn test_plan_write_small_requests_are_buffered() {
        assert_eq!(plan_write(0, 1, 16, MAX_SHADOW_BUFFER_SIZE), WritePlan::Buffer);
        assert_eq!(plan_write(10, 5, 16, MAX_SHADOW_BUFFER_SIZE), WritePlan::Buffer);
        assert_eq!(plan_write(0, 15, 16, MAX_SHADOW_BUFFER_SIZE), WritePlan::Buffer);
    }

    #[test]
    fn test_plan_write_coalesces_pending_bytes() {
        assert_eq!(plan_write(8, 12, 16, MAX_SHADOW_BUFFER_SIZE), WritePlan::Coalesce);
        assert_eq!(plan_write(1, 31, 16, MAX_SHADOW_BUFFER_SIZE), WritePlan::Coalesce);

        // over two windows, or over the ceiling, falls back to a bypass
        assert_eq!(
            plan_write(1, 32, 16, MAX_SHADOW_BUFFER_SIZE),
            WritePlan::Bypass { flush_pending: true }
        );
        assert_eq!(plan_write(8, 12, 16, 16), WritePlan::Bypass { flush_pending: true });
    }

    #[test]
    fn test_plan_write_large_requests_bypass() {
        assert_eq!(
            plan_write(0, 16, 16, MAX_SHADOW_BUFFER_SIZE),
            WritePlan::Bypass { flush_pending: false }
        );
        assert_eq!(
            plan_write(0, 1, 1, MAX_SHADOW_BUFFER_SIZE),
            WritePlan::Bypass { flush_pending: false }
        );
        assert_eq!(
            plan_write(0, 1 << 20, 4096, MAX_SHADOW_BUFFER_SIZE),
            WritePlan::Bypass { flush_pending: false }
        );
    }

    #[test]
    fn test_bypasses_buffer() {
        assert!(!bypasses_buffer(4095, 4096));
        assert!(bypasses_buffer(4096, 4096));
        assert!(bypasses_buffer(1, 1));
    }
}
