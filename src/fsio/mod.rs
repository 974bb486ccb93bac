//! File I/O primitives: encodings, atomic replacement and streamed append.

pub mod atomic;
pub mod encoding;
pub mod stream;

pub use atomic::{atomic_write, read_bytes, read_text, AtomicWrite};
pub use encoding::{ByteOrder, Encoding, ErrorPolicy};
pub use stream::{stream_append, StreamSettings, StreamSummary};
