//! Broadcast ring over a memory-mapped file, for writers and readers living
//! in different processes.
//!
//! The slots use the same stamped seqlock protocol as the in-process
//! [`quartz_ring::RingBuffer`] broadcast modes, so the loss semantics are
//! identical: readers own their positions, a lapped reader jumps forward and
//! counts the skipped messages, and a single `None` sentinel ends the stream.
//!
//! Writers in several processes may [`attach`](ShmWriter::attach) to one
//! file; they serialize on a spinlock word stored in the header. Readers
//! cannot sleep on a process-private futex, so blocking reads spin with
//! backoff.
//!
//! `T` must be plain data: `Copy`, no pointers or references, identical
//! layout in every process that maps the file.

mod error;
mod layout;
mod reader;
mod writer;

pub use error::ShmError;
pub use layout::{SHM_MAGIC, SHM_VERSION, ShmHeader, bytes_for_ring};
pub use reader::ShmReader;
pub use writer::ShmWriter;
