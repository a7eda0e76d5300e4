//! Seekable byte sources holding compressed data.
//!
//! Index building only needs sequential reads, so it accepts any
//! [`std::io::Read`]. Extraction additionally needs to reposition the
//! source at a checkpoint, which is what [`ByteSource`] adds.

mod buffer;
mod http;
mod local;
mod slice;

pub use buffer::BufferSource;
pub use http::{HttpRangeReader, HttpSource};
pub use local::LocalFileReader;
pub use slice::SliceSource;

use std::io::{Read, Result};

/// Trait for compressed data that can be read sequentially from an absolute position
pub trait ByteSource: Read + Send {
    /// Move the read position to `offset` bytes from the start of the source
    fn seek_to(&mut self, offset: u64) -> Result<()>;

    /// Get the total size of the data source
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn seek_to(&mut self, offset: u64) -> Result<()> {
        (**self).seek_to(offset)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn seek_to(&mut self, offset: u64) -> Result<()> {
        (**self).seek_to(offset)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

fn seek_out_of_range(offset: u64, len: u64) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("offset beyond end of source: {} > {}", offset, len),
    )
}
