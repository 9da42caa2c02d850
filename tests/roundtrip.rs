//! Lossless encode/decode round trips through the public API.

use j2kbridge_rs::codestream::{
    CodParams, Codestream, EncodedBuffer, LineSlot, QcdParams, SampleLine, SizParams,
};
use j2kbridge_rs::{
    DecodeMarshaler, EncodeParameters, FrameDescriptor, J2kCodestream, Point, Result,
    SampleEncoding, header,
};

/// Deterministic pixels inside the nominal range of `frame`.
fn test_pixels(frame: &FrameDescriptor, seed: u32) -> Vec<u8> {
    let encoding = SampleEncoding::for_frame(frame);
    let bytes = encoding.bytes_per_sample();
    let samples = frame.width as usize * frame.height as usize * frame.component_count;
    let bits = frame.bits_per_sample as u32;
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let mut pixels = Vec::with_capacity(samples * bytes);
    for i in 0..samples {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        // Mix a smooth ramp with noise so both low and high bands carry data.
        let raw = ((state >> 8) as usize ^ (i * 7)) as u32 & ((1u32 << bits) - 1);
        match encoding {
            SampleEncoding::U8 => pixels.push(raw as u8),
            SampleEncoding::U16 => pixels.extend_from_slice(&(raw as u16).to_le_bytes()),
            SampleEncoding::I16 => {
                let signed = raw as i32 - (1 << (bits - 1));
                pixels.extend_from_slice(&(signed as i16).to_le_bytes());
            }
        }
    }
    pixels
}

fn round_trip(frame: FrameDescriptor, params: &EncodeParameters, seed: u32) {
    let pixels = test_pixels(&frame, seed);
    let encoded = j2kbridge_rs::encode(&pixels, &frame, params).unwrap();
    let decoded = j2kbridge_rs::decode(&encoded).unwrap();
    assert_eq!(decoded.len(), pixels.len());
    assert!(
        decoded == pixels,
        "{}-bit {} {}-component image did not survive",
        frame.bits_per_sample,
        if frame.is_signed { "signed" } else { "unsigned" },
        frame.component_count
    );
}

#[test]
fn lossless_across_sample_formats() {
    let cases = [
        (2, false, 1),
        (8, false, 1),
        (8, true, 1),
        (8, false, 4),
        (10, false, 1),
        (12, true, 1),
        (12, false, 3),
        (16, false, 1),
        (16, true, 2),
    ];
    for (seed, &(bits, signed, components)) in cases.iter().enumerate() {
        let mut frame = FrameDescriptor::new(37, 21, bits, components);
        frame.is_signed = signed;
        let params = EncodeParameters::builder(&frame)
            .decompositions(3)
            .build()
            .unwrap();
        round_trip(frame, &params, seed as u32);
    }
}

#[test]
fn lossless_with_color_transform() {
    for bits in [8, 12, 16] {
        let mut frame = FrameDescriptor::new(24, 17, bits, 3);
        frame.is_using_color_transform = true;
        let params = EncodeParameters::builder(&frame)
            .decompositions(2)
            .build()
            .unwrap();
        assert!(params.color_transform);
        round_trip(frame, &params, bits as u32);
    }
}

#[test]
fn lossless_in_every_progression_order() {
    let frame = FrameDescriptor::new(19, 13, 8, 3);
    for index in 0..5 {
        let params = EncodeParameters::builder(&frame)
            .decompositions(2)
            .progression_order(index)
            .unwrap()
            .tile_part_divisions(true, true)
            .build()
            .unwrap();
        round_trip(frame, &params, 100 + index as u32);
    }
}

#[test]
fn lossless_with_image_offset_and_precincts() {
    let frame = FrameDescriptor::new(30, 30, 8, 1);
    let params = EncodeParameters::builder(&frame)
        .decompositions(2)
        .precincts(vec![
            j2kbridge_rs::Size::new(64, 64),
            j2kbridge_rs::Size::new(128, 128),
        ])
        .unwrap()
        .image_offset(Point::new(5, 3))
        .build()
        .unwrap();
    round_trip(frame, &params, 7);
}

#[test]
fn single_pixel_image() {
    let frame = FrameDescriptor::new(1, 1, 8, 1);
    let params = EncodeParameters::builder(&frame).build().unwrap();
    round_trip(frame, &params, 3);
}

#[test]
fn sub_sampled_component_is_replicated() {
    let frame = FrameDescriptor::new(6, 5, 8, 2);
    let params = EncodeParameters::builder(&frame)
        .decompositions(1)
        .down_sampling(1, Point::new(2, 2))
        .unwrap()
        .build()
        .unwrap();

    // Component 1 is constant over each 2x2 block, so nothing is lost.
    let mut pixels = Vec::new();
    for y in 0..5 {
        for x in 0..6 {
            pixels.push((x * 10 + y) as u8);
            pixels.push((100 + (x / 2) * 20 + (y / 2) * 3) as u8);
        }
    }
    let encoded = j2kbridge_rs::encode(&pixels, &frame, &params).unwrap();
    let (_, geometry) = j2kbridge_rs::read_header(&encoded).unwrap();
    assert_eq!(geometry.down_sampling, vec![Point::new(1, 1), Point::new(2, 2)]);
    assert_eq!(j2kbridge_rs::decode(&encoded).unwrap(), pixels);
}

/// Delegates to the reference engine but forces the line order.
struct ForcedLayout {
    inner: J2kCodestream,
    planar: bool,
}

impl Codestream for ForcedLayout {
    fn enable_resilience(&mut self) {
        self.inner.enable_resilience();
    }
    fn read_headers(&mut self, source: &[u8]) -> Result<()> {
        self.inner.read_headers(source)
    }
    fn siz(&self) -> &SizParams {
        self.inner.siz()
    }
    fn siz_mut(&mut self) -> &mut SizParams {
        self.inner.siz_mut()
    }
    fn cod(&self) -> &CodParams {
        self.inner.cod()
    }
    fn cod_mut(&mut self) -> &mut CodParams {
        self.inner.cod_mut()
    }
    fn qcd_mut(&mut self) -> &mut QcdParams {
        self.inner.qcd_mut()
    }
    fn restrict_input_resolution(&mut self, data: u32, recon: u32) {
        self.inner.restrict_input_resolution(data, recon);
    }
    fn set_planar(&mut self, _planar: bool) {
        self.inner.set_planar(self.planar);
    }
    fn set_tilepart_divisions(&mut self, at_resolutions: bool, at_components: bool) {
        self.inner.set_tilepart_divisions(at_resolutions, at_components);
    }
    fn create(&mut self) -> Result<()> {
        self.inner.create()
    }
    fn pull_line(&mut self) -> Result<Option<SampleLine<'_>>> {
        self.inner.pull_line()
    }
    fn write_headers(&mut self, sink: &mut EncodedBuffer) -> Result<()> {
        self.inner.write_headers(sink)
    }
    fn exchange_line(&mut self) -> Result<Option<LineSlot<'_>>> {
        self.inner.exchange_line()
    }
    fn flush(&mut self, sink: &mut EncodedBuffer) -> Result<()> {
        self.inner.flush(sink)
    }
    fn close(&mut self) {
        self.inner.close();
    }
}

fn decode_forced(encoded: &[u8], planar: bool, level: u32) -> Vec<u8> {
    let mut engine = ForcedLayout {
        inner: J2kCodestream::new(),
        planar,
    };
    engine.read_headers(encoded).unwrap();
    let (frame, geometry) = header::describe(&engine).unwrap();
    let mut out = Vec::new();
    DecodeMarshaler::new(&frame, &geometry)
        .decode(&mut engine, level, &mut out)
        .unwrap();
    out
}

#[test]
fn planar_and_interleaved_pulls_agree() {
    let mut frame = FrameDescriptor::new(21, 14, 12, 3);
    frame.is_using_color_transform = true;
    let params = EncodeParameters::builder(&frame)
        .decompositions(2)
        .build()
        .unwrap();
    let pixels = test_pixels(&frame, 42);
    let encoded = j2kbridge_rs::encode(&pixels, &frame, &params).unwrap();

    for level in 0..=2 {
        let planar = decode_forced(&encoded, true, level);
        let interleaved = decode_forced(&encoded, false, level);
        assert_eq!(planar, interleaved, "level {level}");
    }
    assert_eq!(decode_forced(&encoded, true, 0), pixels);
}

#[test]
fn encoder_and_decoder_front_ends() {
    let frame = FrameDescriptor::new(16, 16, 8, 1);
    let params = EncodeParameters::builder(&frame)
        .decompositions(2)
        .build()
        .unwrap();

    let mut encoder = j2kbridge_rs::Encoder::<J2kCodestream>::new();
    let source = encoder.decoded_buffer_mut(&frame).unwrap();
    for (i, v) in source.iter_mut().enumerate() {
        *v = (i % 251) as u8;
    }
    let expected = source.to_vec();
    encoder.encode(&params).unwrap();
    let encoded = encoder.take_encoded();

    let mut decoder = j2kbridge_rs::Decoder::<J2kCodestream>::new();
    decoder
        .encoded_buffer_mut(encoded.len())
        .copy_from_slice(&encoded);
    decoder.read_header().unwrap();
    assert_eq!(decoder.frame_descriptor(), Some(&frame));
    assert_eq!(
        decoder.calculate_size_at_level(2).unwrap(),
        j2kbridge_rs::Size::new(4, 4)
    );
    decoder.decode().unwrap();
    assert_eq!(decoder.decoded_bytes(), expected.as_slice());
}
