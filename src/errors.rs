use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Errors {
    #[error("buffer size must be greater than zero")]
    InvalidBufferSize,

    #[error("max shadow buffer size must be greater than zero")]
    InvalidShadowBufferSize,

    #[error("transport supports neither reading nor writing")]
    TransportUnusable,

    #[error("stream is closed")]
    StreamClosed,

    #[error("stream does not support reading")]
    ReadNotSupported,

    #[error("stream does not support writing")]
    WriteNotSupported,

    #[error("stream does not support seeking")]
    SeekNotSupported,

    #[error("attempted to seek before the beginning of the stream")]
    NegativeSeekPosition,

    #[error("cannot write after read with non-seekable transport")]
    WriteAfterReadNotSeekable,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Errors>;

impl Errors {
    /// Whether the error is a capability or lifecycle misuse rather than a transport failure.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, Errors::Io(_) | Errors::Cancelled)
    }
}

impl From<Errors> for io::Error {
    fn from(err: Errors) -> Self {
        let kind = match err {
            Errors::Io(e) => return e,
            Errors::ReadNotSupported
            | Errors::WriteNotSupported
            | Errors::SeekNotSupported
            | Errors::WriteAfterReadNotSeekable => io::ErrorKind::Unsupported,
            Errors::InvalidBufferSize
            | Errors::InvalidShadowBufferSize
            | Errors::NegativeSeekPosition => io::ErrorKind::InvalidInput,
            Errors::StreamClosed | Errors::TransportUnusable => io::ErrorKind::BrokenPipe,
            Errors::Cancelled => io::ErrorKind::Interrupted,
        };
        io::Error::new(kind, err)
    }
}
