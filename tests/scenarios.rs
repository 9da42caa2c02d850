//! Behavior at resolution levels, on damaged input and on caller errors.

use j2kbridge_rs::codestream::Codestream;
use j2kbridge_rs::{
    CodecError, DecodeMarshaler, EncodeParameters, FrameDescriptor, J2kCodestream, Point,
    ProgressionOrder, Size, header,
};

fn gradient(frame: &FrameDescriptor) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(frame.packed_len(frame.size()));
    for y in 0..frame.height {
        for x in 0..frame.width {
            for c in 0..frame.component_count as u32 {
                pixels.push(((x + 2 * y + 40 * c) % 256) as u8);
            }
        }
    }
    pixels
}

fn encode_gray(width: u32, height: u32, decompositions: u32, pixels: &[u8]) -> Vec<u8> {
    let frame = FrameDescriptor::new(width, height, 8, 1);
    let params = EncodeParameters::builder(&frame)
        .decompositions(decompositions)
        .progression_order(ProgressionOrder::Lrcp.index())
        .unwrap()
        .build()
        .unwrap();
    j2kbridge_rs::encode(pixels, &frame, &params).unwrap()
}

#[test]
fn flat_image_without_decomposition() {
    let encoded = encode_gray(4, 4, 0, &[128; 16]);
    let (frame, geometry) = j2kbridge_rs::read_header(&encoded).unwrap();
    assert_eq!(frame, FrameDescriptor::new(4, 4, 8, 1));
    assert_eq!(geometry.num_decompositions, 0);
    assert!(geometry.precincts.is_empty());
    assert_eq!(j2kbridge_rs::decode(&encoded).unwrap(), vec![128; 16]);
}

#[test]
fn five_level_image_sizes() {
    let frame = FrameDescriptor::new(512, 512, 8, 1);
    let pixels = gradient(&frame);
    let encoded = encode_gray(512, 512, 5, &pixels);

    let (_, geometry) = j2kbridge_rs::read_header(&encoded).unwrap();
    assert_eq!(geometry.num_decompositions, 5);
    let full = frame.size();
    assert_eq!(
        j2kbridge_rs::calculate_size_at_level(full, 1, 5).unwrap(),
        Size::new(256, 256)
    );
    assert_eq!(
        j2kbridge_rs::calculate_size_at_level(full, 5, 5).unwrap(),
        Size::new(16, 16)
    );

    assert_eq!(j2kbridge_rs::decode_at_level(&encoded, 1).unwrap().len(), 256 * 256);
    assert_eq!(j2kbridge_rs::decode_at_level(&encoded, 5).unwrap().len(), 16 * 16);
    assert_eq!(
        j2kbridge_rs::decode_at_level(&encoded, 6),
        Err(CodecError::InvalidLevel {
            level: 6,
            num_decompositions: 5
        })
    );
}

#[test]
fn output_length_follows_level() {
    let mut frame = FrameDescriptor::new(37, 23, 16, 3);
    frame.is_using_color_transform = true;
    let params = EncodeParameters::builder(&frame)
        .decompositions(4)
        .build()
        .unwrap();
    let pixels = vec![0u8; frame.packed_len(frame.size())];
    let encoded = j2kbridge_rs::encode(&pixels, &frame, &params).unwrap();

    let expected = [(37, 23), (19, 12), (10, 6), (5, 3), (3, 2)];
    for (level, &(w, h)) in expected.iter().enumerate() {
        let decoded = j2kbridge_rs::decode_at_level(&encoded, level as u32).unwrap();
        assert_eq!(decoded.len(), w * h * 3 * 2, "level {level}");
    }
}

#[test]
fn reduced_level_of_flat_image_stays_flat() {
    let encoded = encode_gray(40, 24, 3, &[77; 40 * 24]);
    let decoded = j2kbridge_rs::decode_at_level(&encoded, 2).unwrap();
    assert_eq!(decoded, vec![77; 10 * 6]);
}

#[test]
fn lossy_decode_saturates_instead_of_wrapping() {
    let mut frame = FrameDescriptor::new(32, 8, 16, 1);
    frame.is_signed = true;
    let params = EncodeParameters::builder(&frame)
        .decompositions(2)
        .lossless(false)
        .quantization_step(0.5)
        .build()
        .unwrap();

    let value = |x: u32| if x < 16 { i16::MAX } else { i16::MIN };
    let mut pixels = Vec::new();
    for _ in 0..8 {
        for x in 0..32 {
            pixels.extend_from_slice(&value(x).to_le_bytes());
        }
    }
    let encoded = j2kbridge_rs::encode(&pixels, &frame, &params).unwrap();
    let (_, geometry) = j2kbridge_rs::read_header(&encoded).unwrap();
    assert!(!geometry.is_reversible);

    let decoded = j2kbridge_rs::decode(&encoded).unwrap();
    assert_eq!(decoded.len(), pixels.len());
    for (i, sample) in decoded.chunks_exact(2).enumerate() {
        let v = i16::from_le_bytes([sample[0], sample[1]]) as i32;
        let expected = value(i as u32 % 32) as i32;
        assert!((v - expected).abs() <= 6, "sample {i}: {v} vs {expected}");
    }
}

#[test]
fn lossy_eight_bit_stays_close() {
    let frame = FrameDescriptor::new(24, 24, 8, 3);
    let params = EncodeParameters::builder(&frame)
        .decompositions(2)
        .lossless(false)
        .quantization_step(0.5)
        .color_transform(true)
        .build()
        .unwrap();
    let pixels = gradient(&frame);
    let encoded = j2kbridge_rs::encode(&pixels, &frame, &params).unwrap();
    let decoded = j2kbridge_rs::decode(&encoded).unwrap();
    assert_eq!(decoded.len(), pixels.len());
    let worst = decoded
        .iter()
        .zip(&pixels)
        .map(|(&a, &b)| (a as i32 - b as i32).abs())
        .max()
        .unwrap();
    assert!(worst <= 8, "worst error {worst}");
}

#[test]
fn truncated_tile_data_fails_without_resilience() {
    let frame = FrameDescriptor::new(16, 16, 8, 1);
    let encoded = encode_gray(16, 16, 2, &gradient(&frame));
    let truncated = &encoded[..encoded.len() - 12];

    let result = j2kbridge_rs::decode(truncated);
    assert!(matches!(result, Err(CodecError::CodestreamError(_))));

    let mut decoder = j2kbridge_rs::Decoder::<J2kCodestream>::new();
    decoder.set_encoded(truncated.to_vec());
    assert!(decoder.decode().is_err());
    assert!(decoder.decoded_bytes().is_empty());
}

#[test]
fn resilient_decode_zero_fills_truncated_data() {
    let frame = FrameDescriptor::new(16, 16, 8, 1);
    let pixels = gradient(&frame);
    let encoded = encode_gray(16, 16, 2, &pixels);
    let truncated = &encoded[..encoded.len() - 12];

    let mut engine = J2kCodestream::new();
    engine.enable_resilience();
    engine.read_headers(truncated).unwrap();
    let (frame, geometry) = header::describe(&engine).unwrap();
    let mut out = Vec::new();
    DecodeMarshaler::new(&frame, &geometry)
        .decode(&mut engine, 0, &mut out)
        .unwrap();
    assert_eq!(out.len(), pixels.len());

    // The coarse resolutions precede the damage in LRCP order.
    let mut engine = J2kCodestream::new();
    engine.enable_resilience();
    engine.read_headers(truncated).unwrap();
    let mut coarse = Vec::new();
    DecodeMarshaler::new(&frame, &geometry)
        .decode(&mut engine, 1, &mut coarse)
        .unwrap();
    assert_eq!(coarse, j2kbridge_rs::decode_at_level(&encoded, 1).unwrap());
}

#[test]
fn level_restriction_skips_damaged_fine_segment() {
    let frame = FrameDescriptor::new(16, 16, 8, 1);
    let mut encoded = encode_gray(16, 16, 2, &gradient(&frame));
    let expected = j2kbridge_rs::decode_at_level(&encoded, 1).unwrap();

    // The finest segment ends right before EOC; leave its last varint
    // unterminated.
    let last = encoded.len() - 3;
    encoded[last] = 0x80;

    assert!(matches!(
        j2kbridge_rs::decode(&encoded),
        Err(CodecError::CodestreamError(_))
    ));
    assert_eq!(j2kbridge_rs::decode_at_level(&encoded, 1).unwrap(), expected);
    assert_eq!(j2kbridge_rs::decode_at_level(&encoded, 2).unwrap().len(), 16);
}

#[test]
fn caller_buffer_must_match_frame() {
    let frame = FrameDescriptor::new(8, 8, 12, 1);
    let params = EncodeParameters::builder(&frame).build().unwrap();
    assert_eq!(
        j2kbridge_rs::encode(&[0u8; 64], &frame, &params),
        Err(CodecError::BufferSizeMismatch {
            expected: 128,
            actual: 64
        })
    );
}

#[test]
fn encode_rejects_offsets_outside_reference_grid() {
    let frame = FrameDescriptor::new(4, 4, 8, 1);
    let pixels = gradient(&frame);
    let mut params = EncodeParameters::builder(&frame)
        .decompositions(0)
        .build()
        .unwrap();

    params.geometry.tile_offset = Point::new(10, 10);
    assert_eq!(
        j2kbridge_rs::encode(&pixels, &frame, &params),
        Err(CodecError::InvalidTileOffset { x: 10, y: 10 })
    );
    params.geometry.tile_offset = Point::new(2, 2);
    assert_eq!(
        j2kbridge_rs::encode(&pixels, &frame, &params),
        Err(CodecError::InvalidTileOffset { x: 2, y: 2 })
    );
    params.geometry.tile_offset = Point::new(0, 0);
    params.geometry.image_offset = Point::new(u32::MAX - 1, 0);
    assert_eq!(
        j2kbridge_rs::encode(&pixels, &frame, &params),
        Err(CodecError::InvalidImageOffset {
            x: u32::MAX - 1,
            y: 0
        })
    );
}

#[test]
fn accepted_offsets_decode_again() {
    let frame = FrameDescriptor::new(5, 4, 8, 1);
    let pixels = gradient(&frame);
    let cases = [
        (Point::new(3, 2), Point::new(0, 0), Size::new(0, 0)),
        (Point::new(3, 2), Point::new(1, 1), Size::new(0, 0)),
        (Point::new(3, 2), Point::new(3, 2), Size::new(5, 4)),
        (Point::new(5, 3), Point::new(2, 1), Size::new(8, 6)),
        (Point::new(u32::MAX - 5, 0), Point::new(0, 0), Size::new(0, 0)),
    ];
    for (image_offset, tile_offset, tile_size) in cases {
        let params = EncodeParameters::builder(&frame)
            .decompositions(1)
            .image_offset(image_offset)
            .tile_offset(tile_offset)
            .tile_size(tile_size)
            .build()
            .unwrap();
        let encoded = j2kbridge_rs::encode(&pixels, &frame, &params).unwrap();
        let (read, geometry) = j2kbridge_rs::read_header(&encoded).unwrap();
        assert_eq!(read, frame, "{image_offset:?} {tile_offset:?}");
        assert_eq!(geometry.image_offset, image_offset);
        assert_eq!(geometry.tile_offset, tile_offset);
        assert_eq!(
            j2kbridge_rs::decode(&encoded).unwrap(),
            pixels,
            "{image_offset:?} {tile_offset:?}"
        );
    }
}

#[test]
fn header_of_jp2_container() {
    let frame = FrameDescriptor::new(10, 6, 8, 1);
    let codestream = encode_gray(10, 6, 1, &gradient(&frame));

    let mut jp2 = b"\x00\x00\x00\x0CjP  \r\n\x87\n".to_vec();
    jp2.extend_from_slice(&20u32.to_be_bytes());
    jp2.extend_from_slice(b"ftypjp2 \x00\x00\x00\x00jp2 ");
    jp2.extend_from_slice(&(codestream.len() as u32 + 8).to_be_bytes());
    jp2.extend_from_slice(b"jp2c");
    jp2.extend_from_slice(&codestream);

    let (read, geometry) = j2kbridge_rs::read_header(&jp2).unwrap();
    assert_eq!(read, frame);
    assert_eq!(geometry.num_decompositions, 1);
    assert_eq!(
        j2kbridge_rs::decode(&jp2).unwrap(),
        j2kbridge_rs::decode(&codestream).unwrap()
    );
}

#[test]
fn header_rejects_damaged_main_header() {
    let frame = FrameDescriptor::new(8, 8, 8, 1);
    let encoded = encode_gray(8, 8, 1, &gradient(&frame));
    assert!(matches!(
        j2kbridge_rs::read_header(&encoded[..20]),
        Err(CodecError::CodestreamError(_))
    ));
}
