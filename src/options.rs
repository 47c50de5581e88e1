use crate::errors::Errors;
use crate::sizing::{DEFAULT_BUFFER_SIZE, MAX_SHADOW_BUFFER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    // Size of the read/write window in bytes, also the bypass threshold.
    pub buffer_size: usize,
    // Upper bound the buffer may grow to when coalescing a pending write with the next one.
    pub max_shadow_buffer_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_shadow_buffer_size: MAX_SHADOW_BUFFER_SIZE,
        }
    }
}

impl StreamOptions {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..Self::default()
        }
    }
}

/// check the options for errors
pub(crate) fn check_options(opts: &StreamOptions) -> Option<Errors> {
    if opts.buffer_size == 0 {
        return Some(Errors::InvalidBufferSize);
    }

    if opts.max_shadow_buffer_size == 0 {
        return Some(Errors::InvalidShadowBufferSize);
    }

    None
}
