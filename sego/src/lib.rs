// SPDX-License-Identifier: Apache-2.0

//! ## How it works
//!
//! Data is written to and read from reusable 8KiB chunks of memory called
//! *segments*. When a segment is consumed, it's returned to a process-wide
//! *pool*. To write data, segments are claimed from this pool; when the pool is
//! exhausted, fresh segments are allocated and the pool keeps up to a set byte
//! count on recycle.
//!
//! ### Segments
//!
//! Segments are arranged in a deque forming a continuous byte queue: bytes are
//! read from the front and written to the back, claiming new segments from the
//! pool as the queue fills. Memory within segments can be owned by one segment
//! or shared between many, avoiding expensive mem-copy operations as much as
//! possible. Shared memory is copy-on-write; it can be read through any number
//! of aliases, and is copied into fresh memory the first time an alias writes.
//! Amounts of data under a set threshold (1024B) are copied rather than shared,
//! a tradeoff between allocation churn and fragmentation.
//!
//! ### Streams
//!
//! [`Source`](streams::Source) and [`Sink`](streams::Sink) are the unbuffered
//! stream contracts. Wrapping one in a [`BufferedSource`] or [`BufferedSink`]
//! amortizes small reads and writes against an internal [`Buffer`] and unlocks
//! the typed operations: integers in both endiannesses, UTF-8 code points and
//! lines, decimal and hexadecimal numerals, and longest-prefix selection over a
//! set of byte strings.
//!
//! ### Timeouts
//!
//! Blocking operations compose an idle timeout with an absolute deadline via
//! [`Timeout`]. [`AsyncTimeout`] registers with a single watchdog thread that
//! fires callbacks for operations that overrun, letting implementations
//! interrupt in-flight work by shutting the underlying resource.

mod buffer;
mod buffered_wrappers;
mod byte_str;
mod charset;
mod error;
pub mod fs;
mod options;
mod pipe;
pub mod pool;
mod segment;
mod std_io;
pub mod streams;
mod timeout;

pub use buffer::*;
pub use buffered_wrappers::*;
pub use byte_str::*;
pub use charset::*;
pub use error::*;
pub use options::*;
pub use pipe::*;
pub use segment::{Segment, SHARE_MINIMUM, SIZE as SEGMENT_SIZE};
pub use std_io::*;
pub use timeout::*;
