use std::io::{Read, Result};

use super::{ByteSource, seek_out_of_range};

/// Byte source over a borrowed window of a byte array
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Expose only `len` bytes of `buf` starting at `offset`.
    ///
    /// Offsets passed to [`ByteSource::seek_to`] are relative to the window.
    /// Returns `None` if the window does not fit in `buf`.
    pub fn window(buf: &'a [u8], offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        buf.get(offset..end).map(Self::new)
    }
}

impl Read for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl ByteSource for SliceSource<'_> {
    fn seek_to(&mut self, offset: u64) -> Result<()> {
        match usize::try_from(offset) {
            Ok(pos) if pos <= self.data.len() => {
                self.pos = pos;
                Ok(())
            }
            _ => Err(seek_out_of_range(offset, self.len())),
        }
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}
