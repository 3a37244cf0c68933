use bitshard::codec::{decode, decode_base64, encode, encode_base64, MAX_RAW_LEN};
use bitshard::{Bitmap, Error};

fn sample() -> Bitmap {
    (0..5_000u64)
        .map(|i| i * 37)
        .chain([u32::MAX as u64 + 1, 1 << 50])
        .collect()
}

#[test]
fn frames_round_trip() {
    for bm in [Bitmap::new(), sample(), Bitmap::from_range(10..70_000)] {
        let frame = encode(&bm, 3).unwrap();
        assert_eq!(decode(&frame).unwrap(), bm);
    }
}

#[test]
fn base64_round_trip_tolerates_surrounding_whitespace() {
    let bm = sample();
    let text = format!("  {}\n", encode_base64(&bm, 9).unwrap());
    assert_eq!(decode_base64(&text).unwrap(), bm);
}

#[test]
fn truncated_frame_is_rejected() {
    let frame = encode(&sample(), 3).unwrap();
    for cut in [0, 4, 16, frame.len() - 1] {
        assert!(
            matches!(decode(&frame[..cut]), Err(Error::Decode(_))),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn bad_magic_and_version_are_rejected() {
    let mut frame = encode(&sample(), 3).unwrap();
    frame[0] = b'X';
    assert!(matches!(decode(&frame), Err(Error::Decode(_))));

    let mut frame = encode(&sample(), 3).unwrap();
    frame[4] = 99;
    assert!(matches!(decode(&frame), Err(Error::Decode(_))));
}

#[test]
fn checksum_mismatch_is_rejected() {
    let mut frame = encode(&sample(), 3).unwrap();
    frame[5] ^= 0xff;
    assert!(matches!(decode(&frame), Err(Error::Decode(_))));
}

#[test]
fn raw_bytes_round_trip() {
    let bm = sample();
    assert_eq!(Bitmap::from_bytes(&bm.to_bytes()).unwrap(), bm);
    assert!(Bitmap::from_bytes(&[1, 2, 3]).is_err());
}

fn with_raw_len(mut frame: Vec<u8>, len: u64) -> Vec<u8> {
    frame[9..17].copy_from_slice(&len.to_le_bytes());
    frame
}

#[test]
fn oversized_declared_length_is_rejected_before_decompressing() {
    let frame = with_raw_len(encode(&sample(), 3).unwrap(), MAX_RAW_LEN + 1);
    let err = decode(&frame).unwrap_err();
    assert!(err.to_string().contains("exceeds limit"), "{}", err);
}

#[test]
fn payload_larger_than_declared_length_is_rejected() {
    let frame = encode(&sample(), 3).unwrap();
    let len = u64::from_le_bytes(frame[9..17].try_into().unwrap());
    let frame = with_raw_len(frame, len - 1);
    assert!(matches!(decode(&frame), Err(Error::Decode(_))));
}

#[test]
fn encode_failures_are_reported_apart_from_decode_failures() {
    let err = Error::Encode("zstd compression failed: out of memory".into());
    assert!(err.to_string().starts_with("encode error"));
    assert_ne!(err, Error::Decode("zstd compression failed: out of memory".into()));
}
