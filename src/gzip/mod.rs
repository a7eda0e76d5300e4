//! Checkpoint indexing and random access for gzip and zlib streams.
//!
//! DEFLATE data can only be decoded front to back, and every position may
//! refer back up to 32 KiB into earlier output. A single forward scan
//! therefore records *checkpoints* at block boundaries: the compressed
//! position (to the bit), the decompressed position and the 32 KiB of output
//! preceding it. Decoding can later restart at any checkpoint with a raw
//! inflater primed with the leftover bits and the window as preset dictionary.
//!
//! ## Architecture
//!
//! - [`window`]: circular buffer of recent output, unrolled into checkpoints
//! - [`inflate`]: the engine adapter ([`Inflate`]) and its zlib implementation
//! - [`structures`]: [`Checkpoint`], [`Index`] and the persisted index format
//! - [`builder`]: the one-pass scan producing an [`Index`]
//! - [`extractor`]: [`Session`] and [`RandomAccess`] readers on top of an index
//!
//! ## Limitations
//!
//! - Only the first member of a multi-member gzip file is indexed
//! - zlib streams that require a preset dictionary are rejected

pub mod builder;
pub mod extractor;
pub mod inflate;
pub mod structures;
pub mod window;

pub use builder::{CHUNK_SIZE, DEFAULT_SPAN, build_index, build_index_with};
pub use extractor::{RandomAccess, Session};
pub use inflate::{BlockState, Inflate, Progress, ZlibInflater};
pub use structures::{Checkpoint, Index};
pub use window::WINDOW_SIZE;
