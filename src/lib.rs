// cargo-fmt --all
//! A buffered, seekable stream over an arbitrary byte transport.
//!
//! `BufferedStream` batches small reads and writes through one internal
//! buffer and sends large requests straight to the underlying `Transport`.
//! It offers a blocking API and an async API that share the same buffer
//! logic; async callers are serialized by a single-permit gate.

mod data;
pub mod errors;
pub mod fio;
pub mod options;
pub mod sizing;
mod std_io;
pub mod stream;
mod stream_async;
#[cfg(test)]
mod util;

pub use data::buffer_window::WindowState;
pub use errors::{Errors, Result};
pub use fio::file_io::FileIO;
pub use fio::memory_io::{IoCounters, MemoryHandle, MemoryIO};
pub use fio::Transport;
pub use options::StreamOptions;
pub use stream::BufferedStream;
pub use tokio_util::sync::CancellationToken;
