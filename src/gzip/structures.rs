//! Checkpoint index data structures and their persisted form.
//!
//! ## Persisted format
//!
//! All integers are little-endian.
//!
//! ```text
//! magic              4   "GZIX"
//! version            2   1
//! checkpoint count   8
//! per checkpoint:
//!   compressed_pos   8
//!   bit_remainder    1
//!   decompressed_pos 8
//!   window           32768
//! decompressed size  8
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::convert::Infallible;
use std::fmt;
use std::io::{Read, Write};

use super::window::WINDOW_SIZE;
use crate::error::{Error, Result};

/// A point in the compressed stream where decompression can be resumed.
#[derive(Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Offset of the first compressed byte not fully consumed at this point.
    ///
    /// When `bit_remainder` is non-zero the byte before it is only partially
    /// consumed and its top `bit_remainder` bits have to be primed first.
    pub compressed_pos: u64,
    /// Unused bits (0-7) of the byte at `compressed_pos - 1`.
    pub bit_remainder: u8,
    /// Decompressed bytes produced before this point.
    pub decompressed_pos: u64,
    /// The [`WINDOW_SIZE`] bytes of output preceding `decompressed_pos`, oldest first.
    pub window: Box<[u8; WINDOW_SIZE]>,
}

impl Checkpoint {
    /// Size of one checkpoint record in the persisted format.
    pub const RECORD_SIZE: usize = 8 + 1 + 8 + WINDOW_SIZE;

    /// Byte to seek the compressed source to before resuming.
    pub fn resume_offset(&self) -> u64 {
        self.compressed_pos - u64::from(self.bit_remainder > 0)
    }

    /// Fixed fields of the record; the window follows them.
    fn header(&self) -> [u8; 17] {
        let mut out = [0u8; 17];
        LittleEndian::write_u64(&mut out[..8], self.compressed_pos);
        out[8] = self.bit_remainder;
        LittleEndian::write_u64(&mut out[9..], self.decompressed_pos);
        out
    }

    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let compressed_pos = reader.read_u64::<LittleEndian>()?;
        let bit_remainder = reader.read_u8()?;
        let decompressed_pos = reader.read_u64::<LittleEndian>()?;
        let mut window = Box::new([0u8; WINDOW_SIZE]);
        reader.read_exact(&mut window[..])?;
        Ok(Self {
            compressed_pos,
            bit_remainder,
            decompressed_pos,
            window,
        })
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkpoint")
            .field("compressed_pos", &self.compressed_pos)
            .field("bit_remainder", &self.bit_remainder)
            .field("decompressed_pos", &self.decompressed_pos)
            .finish_non_exhaustive()
    }
}

/// Ordered checkpoints of one compressed stream plus its decompressed size.
///
/// Built once by [`build_index`](super::build_index), immutable afterwards,
/// and independent of any byte source, so it can be persisted and shared
/// freely between sessions and threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    checkpoints: Vec<Checkpoint>,
    decompressed_size: u64,
}

impl Index {
    pub const MAGIC: &'static [u8; 4] = b"GZIX";
    pub const VERSION: u16 = 1;

    /// Assemble an index, checking the checkpoint invariants.
    pub fn new(checkpoints: Vec<Checkpoint>, decompressed_size: u64) -> Result<Self> {
        let first = checkpoints
            .first()
            .ok_or_else(|| Error::InvalidIndex("index has no checkpoints".to_string()))?;
        if first.decompressed_pos != 0 {
            return Err(Error::InvalidIndex(format!(
                "first checkpoint starts at {} instead of 0",
                first.decompressed_pos
            )));
        }

        for (i, cp) in checkpoints.iter().enumerate() {
            if cp.bit_remainder > 7 {
                return Err(Error::InvalidIndex(format!(
                    "checkpoint {} has {} remainder bits",
                    i, cp.bit_remainder
                )));
            }
            if cp.bit_remainder > 0 && cp.compressed_pos == 0 {
                return Err(Error::InvalidIndex(format!(
                    "checkpoint {} primes bits from before the stream",
                    i
                )));
            }
            if cp.decompressed_pos > decompressed_size {
                return Err(Error::InvalidIndex(format!(
                    "checkpoint {} lies beyond the decompressed size",
                    i
                )));
            }
        }

        for (i, pair) in checkpoints.windows(2).enumerate() {
            if pair[1].decompressed_pos <= pair[0].decompressed_pos
                || pair[1].compressed_pos < pair[0].compressed_pos
            {
                return Err(Error::InvalidIndex(format!(
                    "checkpoint {} is out of order",
                    i + 1
                )));
            }
        }

        Ok(Self {
            checkpoints,
            decompressed_size,
        })
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Total size of the decompressed stream.
    pub fn decompressed_size(&self) -> u64 {
        self.decompressed_size
    }

    /// Find the last checkpoint at or before `offset`.
    ///
    /// Offsets past the end map to the final checkpoint; running out of data
    /// from there is the reader's concern.
    pub fn locate(&self, offset: u64) -> &Checkpoint {
        let after = self
            .checkpoints
            .partition_point(|cp| cp.decompressed_pos <= offset);
        // The first checkpoint is at 0, so `after` is at least 1.
        &self.checkpoints[after.saturating_sub(1)]
    }

    /// Hand the persisted form to `emit` piece by piece, in order.
    fn encode<E>(
        &self,
        mut emit: impl FnMut(&[u8]) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        let mut preamble = [0u8; 14];
        preamble[..4].copy_from_slice(Self::MAGIC);
        LittleEndian::write_u16(&mut preamble[4..6], Self::VERSION);
        LittleEndian::write_u64(&mut preamble[6..], self.checkpoints.len() as u64);
        emit(&preamble)?;

        for cp in &self.checkpoints {
            emit(&cp.header())?;
            emit(&cp.window[..])?;
        }

        let mut size = [0u8; 8];
        LittleEndian::write_u64(&mut size, self.decompressed_size);
        emit(&size)
    }

    /// Write the index in the persisted format.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        self.encode(|part| writer.write_all(part))?;
        writer.flush()?;
        Ok(())
    }

    /// Read an index written by [`write_to`](Index::write_to).
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(truncated)?;
        if &magic != Self::MAGIC {
            return Err(Error::InvalidIndex("bad magic".to_string()));
        }

        let version = reader.read_u16::<LittleEndian>().map_err(truncated)?;
        if version != Self::VERSION {
            return Err(Error::InvalidIndex(format!(
                "unsupported version {}",
                version
            )));
        }

        let count = reader.read_u64::<LittleEndian>().map_err(truncated)?;
        // Don't trust the count for preallocation.
        let mut checkpoints = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            checkpoints.push(Checkpoint::read_from(&mut reader).map_err(truncated)?);
        }
        let decompressed_size = reader.read_u64::<LittleEndian>().map_err(truncated)?;

        Self::new(checkpoints, decompressed_size)
    }

    /// Serialize into a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 2 + 8 + self.len() * Checkpoint::RECORD_SIZE + 8);
        let Ok(()) = self.encode(|part| {
            buf.extend_from_slice(part);
            Ok::<_, Infallible>(())
        });
        buf
    }

    /// Parse a complete persisted index, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;
        let index = Self::read_from(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(Error::InvalidIndex(format!(
                "{} trailing bytes after index",
                cursor.len()
            )));
        }
        Ok(index)
    }
}

fn truncated(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::InvalidIndex("index data is truncated".to_string())
    } else {
        Error::Io(err)
    }
}
