use bytes::Bytes;
use std::io::{Read, Result};

use super::{ByteSource, seek_out_of_range};

/// Byte source over an owned, reference-counted buffer.
///
/// Cloning is cheap and every clone keeps its own read position, so one
/// buffer can back several sessions at once.
#[derive(Clone)]
pub struct BufferSource {
    data: Bytes,
    pos: usize,
}

impl BufferSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Get the underlying buffer
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl Read for BufferSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl ByteSource for BufferSource {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_have_independent_positions() {
        let mut a = BufferSource::new(b"hello world".to_vec());
        let mut b = a.clone();

        a.seek_to(6).unwrap();
        let mut word = [0u8; 5];
        a.read_exact(&mut word).unwrap();
        assert_eq!(&word, b"world");

        b.read_exact(&mut word).unwrap();
        assert_eq!(&word, b"hello");
    }
}
