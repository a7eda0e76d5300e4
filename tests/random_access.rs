mod common;

use flate2::Compression;
use gzran::{
    BufferSource, ByteSource, Index, LocalFileReader, RandomAccess, Session, SliceSource,
    build_index,
};
use std::io::{Read, Write};
use std::sync::Arc;

const TEN_MIB: usize = 10 * 1024 * 1024;
const ONE_MIB: u64 = 1024 * 1024;
const SEED: u64 = 56738138;

fn check_session<S: ByteSource>(data: &[u8], index: Arc<Index>, source: S) {
    let mut session = Session::open(index, source);
    for origin in common::offsets(100, data.len(), SEED) {
        let mut dest = vec![0u8; 100.min(data.len() - origin)];
        session.seek(origin as u64).unwrap();
        session.read_exact(&mut dest).unwrap();
        assert_eq!(dest, &data[origin..origin + dest.len()], "offset {}", origin);
    }
    session.close().unwrap();
}

fn check_read_at<S: ByteSource>(data: &[u8], index: Arc<Index>, mut source: S) {
    let access = RandomAccess::new(index);
    for origin in common::offsets(100, data.len(), SEED + 1) {
        let mut dest = vec![0u8; 100.min(data.len() - origin)];
        let n = access.read_at(&mut source, origin as u64, &mut dest).unwrap();
        assert_eq!(n, dest.len());
        assert_eq!(dest, &data[origin..origin + n], "offset {}", origin);
    }
}

#[test]
fn ten_mib_from_memory_before_and_after_persisting() {
    let data = common::random_bytes(TEN_MIB, 1);
    let gz = common::gzip(&data, Compression::fast());

    let index = build_index(&gz[..], ONE_MIB, |_| true).unwrap().unwrap();
    assert_eq!(index.decompressed_size(), data.len() as u64);
    assert!(index.len() >= 9);

    let index = Arc::new(index);
    check_session(&data, index.clone(), SliceSource::new(&gz));
    check_read_at(&data, index.clone(), SliceSource::new(&gz));

    let reloaded = Arc::new(Index::from_bytes(&index.to_bytes()).unwrap());
    assert_eq!(reloaded, index);
    check_session(&data, reloaded.clone(), SliceSource::new(&gz));
    check_read_at(&data, reloaded, SliceSource::new(&gz));
}

#[test]
fn ten_mib_from_buffer_and_file() {
    let data = common::random_bytes(TEN_MIB, 2);
    let gz = common::gzip(&data, Compression::fast());

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&gz).unwrap();
    tmp.flush().unwrap();

    // Index straight from the file, persisted through the file system.
    let index = build_index(LocalFileReader::new(tmp.path()).unwrap(), ONE_MIB, |_| true)
        .unwrap()
        .unwrap();
    let index_file = tempfile::NamedTempFile::new().unwrap();
    index.write_to(std::fs::File::create(index_file.path()).unwrap()).unwrap();
    let index = Arc::new(Index::read_from(std::fs::File::open(index_file.path()).unwrap()).unwrap());

    check_session(&data, index.clone(), BufferSource::new(gz.clone()));
    check_session(&data, index.clone(), LocalFileReader::new(tmp.path()).unwrap());
    check_read_at(&data, index, LocalFileReader::new(tmp.path()).unwrap());
}

#[test]
fn huffman_blocks_resume_mid_byte() {
    let data = common::text(4 * 1024 * 1024, 3);
    let gz = common::gzip(&data, Compression::default());

    let index = build_index(&gz[..], 32 * 1024, |_| true).unwrap().unwrap();
    assert!(
        index.checkpoints().iter().any(|cp| cp.bit_remainder > 0),
        "expected at least one checkpoint inside a byte"
    );

    // Land exactly on, just before and just after every checkpoint.
    let index = Arc::new(index);
    let mut session = Session::open(index.clone(), SliceSource::new(&gz));
    let mut buf = [0u8; 64];
    for cp in index.checkpoints() {
        let at = cp.decompressed_pos as usize;
        for origin in [at.saturating_sub(1), at, at + 1] {
            let len = buf.len().min(data.len() - origin);
            session.seek(origin as u64).unwrap();
            session.read_exact(&mut buf[..len]).unwrap();
            assert_eq!(&buf[..len], &data[origin..origin + len], "offset {}", origin);
        }
    }
}

#[test]
fn zlib_framing() {
    let data = common::text(2 * 1024 * 1024, 4);
    let compressed = common::zlib(&data, Compression::best());

    let index = Arc::new(build_index(&compressed[..], 256 * 1024, |_| true).unwrap().unwrap());
    assert_eq!(index.checkpoints()[0].compressed_pos, 2);
    check_session(&data, index.clone(), SliceSource::new(&compressed));
    check_read_at(&data, index, BufferSource::new(compressed.clone()));
}

#[test]
fn long_sequential_read_crosses_checkpoints() {
    let data = common::text(3 * 1024 * 1024, 5);
    let gz = common::gzip(&data, Compression::default());
    let index = Arc::new(build_index(&gz[..], 100_000, |_| true).unwrap().unwrap());

    let start = 12_345;
    let mut session = Session::open_at(index, SliceSource::new(&gz), start as u64).unwrap();
    let mut out = Vec::new();
    session.read_to_end(&mut out).unwrap();
    assert_eq!(out, &data[start..]);
}

#[test]
fn span_zero_checkpoints_every_boundary() {
    let data = common::text(600 * 1024, 6);
    let gz = common::gzip(&data, Compression::best());

    let sparse = build_index(&gz[..], ONE_MIB, |_| true).unwrap().unwrap();
    let dense = build_index(&gz[..], 0, |_| true).unwrap().unwrap();
    assert_eq!(sparse.len(), 1);
    assert!(dense.len() > 1);

    let dense = Arc::new(dense);
    check_session(&data, dense.clone(), SliceSource::new(&gz));
    check_read_at(&data, dense, SliceSource::new(&gz));
}
