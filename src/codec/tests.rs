//! Unit tests for the bundled wire codecs.
//!
//! Covers head layout, limit enforcement and the two-step decode path used
//! by the read loop.

use bytes::Bytes;
use proptest::prelude::*;
use rstest::rstest;

use super::*;

fn decode_all(codec: &dyn WireCodec, bytes: &[u8]) -> Result<Frame, CodecError> {
    let (head, body) = bytes.split_at(codec.head_size().min(bytes.len()));
    let head = codec.decode_head(head)?;
    codec.decode_body(head, Bytes::copy_from_slice(body))
}

#[test]
fn compact_head_is_id_then_length() {
    let codec = CompactCodec::new(4096);
    let head = codec
        .decode_head(&[0x00, 0x07, 0x00, 0x04])
        .expect("valid head");
    assert_eq!(
        head,
        FrameHead {
            id: 7,
            declared_len: 4,
            sign: None,
            sent_at: None,
        }
    );
}

#[test]
fn stamped_codec_writes_zero_for_absent_fields() {
    let codec = StampedCodec::new(4096);
    let frame = Frame::new(0x0102, &b"x"[..]).expect("payload fits");
    let bytes = codec.encode(&frame).expect("encode");
    assert_eq!(&bytes[..], &[1, 2, 0, 1, 0, 0, 0, 0, 0, 0, b'x']);

    let decoded = decode_all(&codec, &bytes).expect("decode");
    assert_eq!(decoded.sign(), Some(0));
    assert_eq!(decoded.sent_at(), Some(0));
}

#[test]
fn stamped_codec_carries_sign_and_timestamp() {
    let codec = StampedCodec::default();
    let frame = Frame::new(3, &b"hi"[..])
        .expect("payload fits")
        .with_sign(0xabcd)
        .with_sent_at(1_700_000_000);
    let bytes = codec.encode(&frame).expect("encode");
    assert_eq!(bytes.len(), StampedCodec::HEAD_SIZE + 2);
    assert_eq!(decode_all(&codec, &bytes).expect("decode"), frame);
}

#[rstest]
#[case(CompactCodec::new(16).decode_head(&[0, 1, 0, 17]))]
#[case(StampedCodec::new(16).decode_head(&[0, 1, 0, 17, 0, 0, 0, 0, 0, 0]))]
fn oversized_heads_are_rejected(#[case] result: Result<FrameHead, CodecError>) {
    assert_eq!(
        result,
        Err(CodecError::MalformedHead(HeadError::Oversized {
            declared: 17,
            max: 16,
        }))
    );
}

#[rstest]
#[case(&[], 0)]
#[case(&[0, 1, 0], 3)]
fn short_heads_are_truncated(#[case] bytes: &[u8], #[case] have: usize) {
    let err = CompactCodec::default()
        .decode_head(bytes)
        .expect_err("head too short");
    assert_eq!(
        err,
        CodecError::MalformedHead(HeadError::Truncated { have, need: 4 })
    );
}

#[test]
fn body_shorter_than_declared_is_a_mismatch() {
    let codec = CompactCodec::default();
    let err = decode_all(&codec, &[0, 1, 0, 3, b'a', b'b']).expect_err("short body");
    assert_eq!(
        err,
        CodecError::LengthMismatch {
            declared: 3,
            actual: 2,
        }
    );
}

#[test]
fn zero_length_payload_decodes_to_empty_frame() {
    let codec = CompactCodec::default();
    let frame = decode_all(&codec, &[0, 9, 0, 0]).expect("empty body");
    assert_eq!(frame.id(), 9);
    assert!(frame.payload().is_empty());
}

#[test]
fn encode_enforces_max_packet_size() {
    let codec = CompactCodec::new(8);
    let frame = Frame::new(1, vec![0_u8; 9]).expect("fits length field");
    assert_eq!(
        codec.encode(&frame),
        Err(CodecError::PayloadTooLarge { size: 9, max: 8 })
    );
}

#[rstest]
#[case(0, 1)]
#[case(usize::MAX, MAX_PAYLOAD_LEN)]
fn max_packet_size_is_clamped(#[case] requested: usize, #[case] expected: usize) {
    assert_eq!(CompactCodec::new(requested).max_packet_size(), expected);
    assert_eq!(StampedCodec::new(requested).max_packet_size(), expected);
}

proptest! {
    #[test]
    fn compact_frames_decode_to_what_was_encoded(
        id in any::<u16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let codec = CompactCodec::new(512);
        let frame = Frame::new(id, payload).expect("payload fits");
        let bytes = codec.encode(&frame).expect("encode");
        prop_assert_eq!(decode_all(&codec, &bytes).expect("decode"), frame);
    }
}
