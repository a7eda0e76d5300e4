mod common;

use flate2::Compression;
use gzran::{Error, Index, build_index};

const SPAN: u64 = 256 * 1024;

#[test]
fn rebuilding_gives_the_same_index() {
    let data = common::text(1024 * 1024, 10);
    let gz = common::gzip(&data, Compression::default());

    let first = build_index(&gz[..], SPAN, |_| true).unwrap().unwrap();
    let second = build_index(&gz[..], SPAN, |_| true).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_bytes(), second.to_bytes());
}

#[test]
fn checkpoints_respect_span_and_order() {
    let data = common::text(3 * 1024 * 1024, 11);
    let gz = common::gzip(&data, Compression::default());
    let index = build_index(&gz[..], SPAN, |_| true).unwrap().unwrap();

    assert_eq!(index.decompressed_size(), data.len() as u64);
    assert_eq!(index.checkpoints()[0].decompressed_pos, 0);
    assert!(index.len() > 1);

    for pair in index.checkpoints().windows(2) {
        assert!(pair[1].decompressed_pos - pair[0].decompressed_pos > SPAN);
        assert!(pair[1].compressed_pos > pair[0].compressed_pos);
    }
    for cp in index.checkpoints() {
        assert!(cp.bit_remainder <= 7);
        assert!(cp.decompressed_pos < index.decompressed_size());
        assert!(cp.compressed_pos < gz.len() as u64);
        // The window ends with the bytes just before the checkpoint.
        let at = cp.decompressed_pos as usize;
        if at >= 100 {
            assert_eq!(&cp.window[cp.window.len() - 100..], &data[at - 100..at]);
        }
    }
}

#[test]
fn cancellation_returns_none() {
    let data = common::random_bytes(512 * 1024, 12);
    let gz = common::gzip(&data, Compression::fast());

    assert!(build_index(&gz[..], SPAN, |_| false).unwrap().is_none());

    let mut calls = 0;
    let result = build_index(&gz[..], SPAN, |_| {
        calls += 1;
        calls < 3
    })
    .unwrap();
    assert!(result.is_none());
    assert_eq!(calls, 3);
}

#[test]
fn empty_stream() {
    let gz = common::gzip(b"", Compression::default());
    let index = build_index(&gz[..], SPAN, |_| true).unwrap().unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(index.decompressed_size(), 0);
    assert_eq!(index.checkpoints()[0].compressed_pos, 10);
}

#[test]
fn corrupt_streams_are_codec_errors() {
    // Valid gzip header followed by a final block of the reserved type.
    let mut bad_block = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 0xff, 0x07];
    bad_block.extend_from_slice(&[0u8; 32]);
    assert!(matches!(
        build_index(&bad_block[..], SPAN, |_| true),
        Err(Error::Codec { .. })
    ));

    let garbage = [0xffu8; 64];
    assert!(matches!(
        build_index(&garbage[..], SPAN, |_| true),
        Err(Error::Codec { .. })
    ));

    let data = common::text(64 * 1024, 13);
    let mut gz = common::gzip(&data, Compression::default());
    let crc = gz.len() - 8;
    gz[crc] ^= 0xff;
    assert!(matches!(
        build_index(&gz[..], SPAN, |_| true),
        Err(Error::Codec { .. })
    ));
}

#[test]
fn zlib_stream_with_preset_dictionary_is_rejected() {
    // CMF 0x78, FLG 0x20: FDICT set, and 0x7820 is a multiple of 31.
    let mut stream = vec![0x78, 0x20];
    // Adler-32 of the dictionary the stream expects.
    stream.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    stream.extend_from_slice(&[0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);

    match build_index(&stream[..], SPAN, |_| true) {
        // Z_NEED_DICT
        Err(Error::Codec { code, .. }) => assert_eq!(code, 2),
        other => panic!("expected a codec error, got {:?}", other.map(|i| i.map(|i| i.len()))),
    }
}

#[test]
fn truncated_streams() {
    let data = common::random_bytes(300 * 1024, 14);
    let gz = common::gzip(&data, Compression::fast());

    for cut in [0, 5, 10, gz.len() / 3, gz.len() - 9] {
        assert!(
            matches!(
                build_index(&gz[..cut], SPAN, |_| true),
                Err(Error::TruncatedSource(_))
            ),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn built_index_survives_persistence() {
    let data = common::text(2 * 1024 * 1024, 15);
    let gz = common::gzip(&data, Compression::best());
    let index = build_index(&gz[..], SPAN, |_| true).unwrap().unwrap();

    let mut bytes = Vec::new();
    index.write_to(&mut bytes).unwrap();
    assert_eq!(bytes, index.to_bytes());
    assert_eq!(Index::read_from(&bytes[..]).unwrap(), index);
}
