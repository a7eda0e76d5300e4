#![allow(dead_code)]

use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::io::Write;

/// Incompressible bytes; deflate stores them in byte-aligned blocks.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// Word soup that compresses into Huffman-coded blocks, so block
/// boundaries fall in the middle of bytes.
pub fn text(len: usize, seed: u64) -> Vec<u8> {
    const WORDS: &[&str] = &[
        "index", "window", "block", "stream", "offset", "deflate", "huffman", "literal",
        "distance", "length", "header", "trailer", "checkpoint", "resume", "prime", "bits",
        "the", "a", "of", "and", "to", "in", "is", "it",
    ];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(len + 16);
    while out.len() < len {
        out.extend_from_slice(WORDS[rng.gen_range(0..WORDS.len())].as_bytes());
        out.push(if rng.gen_range(0..12) == 0 { b'\n' } else { b' ' });
        if rng.gen_range(0..40) == 0 {
            out.extend_from_slice(rng.gen_range(0..1_000_000u32).to_string().as_bytes());
        }
    }
    out.truncate(len);
    out
}

pub fn gzip(data: &[u8], level: Compression) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), level);
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn zlib(data: &[u8], level: Compression) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), level);
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Offsets drawn with a fixed seed.
pub fn offsets(count: usize, len: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen_range(0..len)).collect()
}
