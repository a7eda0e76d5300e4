//! # gzran
//!
//! Random access into gzip and zlib compressed data.
//!
//! Reading byte `n` of a DEFLATE stream normally means decompressing
//! everything before it. This library scans a stream once to build an
//! [`Index`] of resumable checkpoints; afterwards any range can be read by
//! resuming from the nearest checkpoint instead of from the start.
//!
//! ## Features
//!
//! - Index gzip and zlib streams in one pass, with progress and cancellation
//! - Persist indexes and reuse them across processes
//! - Seekable sessions implementing [`std::io::Read`] and [`std::io::Seek`]
//! - Stateless positional reads shared between threads
//! - Compressed data from memory, local files or HTTP servers with Range support
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use gzran::{build_index, LocalFileReader, Session, DEFAULT_SPAN};
//!
//! fn main() -> anyhow::Result<()> {
//!     let path = Path::new("logs.gz");
//!
//!     // One full pass to record checkpoints
//!     let index = build_index(LocalFileReader::new(path)?, DEFAULT_SPAN, |_| true)?
//!         .expect("not cancelled");
//!
//!     // Jump straight to a decompressed offset
//!     let mut session = Session::open_at(Arc::new(index), LocalFileReader::new(path)?, 5_000_000)?;
//!     let mut buf = [0u8; 100];
//!     let n = session.read(&mut buf)?;
//!     println!("{}", String::from_utf8_lossy(&buf[..n]));
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod gzip;
pub mod io;

pub use cli::Cli;
pub use error::{Error, Result};
pub use gzip::{
    Checkpoint, DEFAULT_SPAN, Index, Inflate, RandomAccess, Session, WINDOW_SIZE, ZlibInflater,
    build_index, build_index_with,
};
pub use io::{BufferSource, ByteSource, HttpRangeReader, HttpSource, LocalFileReader, SliceSource};
