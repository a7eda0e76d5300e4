//! One-pass scan of a compressed stream that records resumable checkpoints.

use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

use super::inflate::{Inflate, ZlibInflater};
use super::structures::{Checkpoint, Index};
use super::window::Window;
use crate::error::{Error, Result};

/// Compressed bytes read from the source per step.
pub const CHUNK_SIZE: usize = 1 << 16;

/// Default minimum spacing between checkpoints, in decompressed bytes.
///
/// Every checkpoint carries a 32 KiB window, so this trades index size
/// against the amount of data discarded when seeking.
pub const DEFAULT_SPAN: u64 = 1 << 20;

/// Build an index over a gzip or zlib stream with the zlib engine.
///
/// `progress` is called with the number of compressed bytes consumed so far
/// before every read from `source`; returning `false` cancels the build,
/// which is reported as `Ok(None)`.
pub fn build_index<R, F>(source: R, span: u64, progress: F) -> Result<Option<Index>>
where
    R: Read,
    F: FnMut(u64) -> bool,
{
    build_index_with::<ZlibInflater, R, F>(source, span, progress)
}

/// Build an index using the inflate engine `E`.
pub fn build_index_with<E, R, F>(mut source: R, span: u64, mut progress: F) -> Result<Option<Index>>
where
    E: Inflate,
    R: Read,
    F: FnMut(u64) -> bool,
{
    debug!(span, "building index");

    let mut inflater = E::streaming()?;
    let mut window = Window::new();
    let mut input = vec![0u8; CHUNK_SIZE];
    let mut checkpoints = Vec::new();

    // Totals are only updated between inflate calls, so they stay exact for
    // streams far larger than a single call can report.
    let mut total_in = 0u64;
    let mut total_out = 0u64;
    let mut last = 0u64;

    'scan: loop {
        if !progress(total_in) {
            debug!(total_in, checkpoints = checkpoints.len(), "index build cancelled");
            return Ok(None);
        }

        let n = read_chunk(&mut source, &mut input)?;
        if n == 0 {
            return Err(Error::TruncatedSource("stream ended before its final block"));
        }

        let mut chunk = &input[..n];
        loop {
            let spare = window.spare();
            let room = spare.len();
            let step = inflater.inflate_to_block_boundary(chunk, spare)?;
            window.commit(step.produced);
            chunk = &chunk[step.consumed..];
            total_in += step.consumed as u64;
            total_out += step.produced as u64;

            if step.stream_end {
                break 'scan;
            }

            let block = step.block;
            if block.at_boundary
                && !block.final_block
                && (checkpoints.is_empty() || total_out - last > span)
            {
                trace!(
                    compressed = total_in,
                    bits = block.unused_bits,
                    decompressed = total_out,
                    "checkpoint"
                );
                checkpoints.push(Checkpoint {
                    compressed_pos: total_in,
                    bit_remainder: block.unused_bits,
                    decompressed_pos: total_out,
                    window: window.unroll(),
                });
                last = total_out;
            }

            // Filling the window may leave output pending inside the engine
            // even after the chunk is used up.
            if chunk.is_empty() && step.produced < room {
                break;
            }
        }
    }

    debug!(
        compressed = total_in,
        decompressed = total_out,
        checkpoints = checkpoints.len(),
        "index built"
    );
    Index::new(checkpoints, total_out).map(Some)
}

fn read_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
