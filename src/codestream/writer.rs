//! Marker segment serialization.

use super::buffer::EncodedBuffer;
use super::marker::{MARKER_START_BYTE, MarkerCode};
use super::quantization::encode_step;
use super::{CodParams, SizParams};
use crate::constants::GUARD_BITS;

pub struct J2kWriter<'a> {
    sink: &'a mut EncodedBuffer,
}

impl<'a> J2kWriter<'a> {
    pub fn new(sink: &'a mut EncodedBuffer) -> Self {
        Self { sink }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.sink.write(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.sink.write(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.sink.write(&value.to_be_bytes());
    }

    pub fn write_marker(&mut self, marker: MarkerCode) {
        self.sink.write(&[MARKER_START_BYTE, marker.into()]);
    }

    pub fn write_soc(&mut self) {
        self.write_marker(MarkerCode::StartOfCodestream);
    }

    pub fn write_eoc(&mut self) {
        self.write_marker(MarkerCode::EndOfCodestream);
    }

    pub fn write_siz(&mut self, siz: &SizParams) {
        self.write_marker(MarkerCode::ImageAndTileSize);
        let count = siz.num_components();
        self.write_u16((38 + 3 * count) as u16);
        self.write_u16(0); // Rsiz: Part 1 profile-less
        self.write_u32(siz.image_extent.x);
        self.write_u32(siz.image_extent.y);
        self.write_u32(siz.image_offset.x);
        self.write_u32(siz.image_offset.y);
        let tile = siz.effective_tile_size();
        self.write_u32(tile.width);
        self.write_u32(tile.height);
        self.write_u32(siz.tile_offset.x);
        self.write_u32(siz.tile_offset.y);
        self.write_u16(count as u16);
        for component in &siz.components {
            let sign = if component.is_signed { 0x80 } else { 0 };
            self.write_u8(sign | (component.bit_depth - 1));
            self.write_u8(component.down_sampling.x as u8);
            self.write_u8(component.down_sampling.y as u8);
        }
    }

    pub fn write_cod(&mut self, cod: &CodParams) {
        self.write_marker(MarkerCode::CodingStyleDefault);
        let precinct_count = if cod.has_precincts() {
            cod.num_decompositions as usize + 1
        } else {
            0
        };
        self.write_u16((12 + precinct_count) as u16);
        self.write_u8(u8::from(cod.has_precincts())); // Scod
        self.write_u8(cod.progression_order.into());
        self.write_u16(cod.num_layers);
        self.write_u8(u8::from(cod.color_transform));
        self.write_u8(cod.num_decompositions as u8);
        self.write_u8((cod.block_dims.width.trailing_zeros() - 2) as u8);
        self.write_u8((cod.block_dims.height.trailing_zeros() - 2) as u8);
        self.write_u8(0); // code-block style
        self.write_u8(u8::from(cod.reversible)); // 1 = 5/3, 0 = 9/7
        for resolution in 0..precinct_count {
            let size = cod.precinct_size(resolution);
            let ppx = size.width.trailing_zeros() as u8;
            let ppy = size.height.trailing_zeros() as u8;
            self.write_u8(ppx | (ppy << 4));
        }
    }

    /// Reversible: one exponent per subband. Irreversible: scalar derived
    /// from a single base step.
    pub fn write_qcd(&mut self, cod: &CodParams, bit_depth: u8, irreversible_step: f32) {
        self.write_marker(MarkerCode::QuantizationDefault);
        if cod.reversible {
            let subbands = 3 * cod.num_decompositions as usize + 1;
            self.write_u16((3 + subbands) as u16);
            self.write_u8(GUARD_BITS << 5);
            // LL has gain 0, then HL/LH gain 1 and HH gain 2 per level.
            self.write_u8(bit_depth << 3);
            for _ in 0..cod.num_decompositions {
                self.write_u8((bit_depth + 1) << 3);
                self.write_u8((bit_depth + 1) << 3);
                self.write_u8((bit_depth + 2) << 3);
            }
        } else {
            self.write_u16(5);
            self.write_u8((GUARD_BITS << 5) | 1);
            self.write_u16(encode_step(irreversible_step, bit_depth));
        }
    }

    pub fn write_com(&mut self, text: &str) {
        self.write_marker(MarkerCode::Comment);
        self.write_u16((4 + text.len()) as u16);
        self.write_u16(1); // Rcom: Latin-1 text
        self.sink.write(text.as_bytes());
    }

    /// Writes SOT and SOD for a tile-part of tile 0 carrying `payload_len`
    /// bytes.
    pub fn write_tile_part_header(&mut self, index: u8, count: u8, payload_len: usize) {
        self.write_marker(MarkerCode::StartOfTile);
        self.write_u16(10);
        self.write_u16(0); // Isot
        // SOT (12) + SOD (2) + data
        self.write_u32((14 + payload_len) as u32);
        self.write_u8(index);
        self.write_u8(count);
        self.write_marker(MarkerCode::StartOfData);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.sink.write(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Size};

    #[test]
    fn siz_layout() {
        let mut siz = SizParams {
            image_extent: Point::new(640, 480),
            ..Default::default()
        };
        siz.set_component(0, Point::new(1, 1), 12, true);
        let mut sink = EncodedBuffer::new();
        J2kWriter::new(&mut sink).write_siz(&siz);
        let bytes = sink.as_bytes();
        assert_eq!(&bytes[..4], &[0xFF, 0x51, 0x00, 41]);
        assert_eq!(&bytes[6..10], &640u32.to_be_bytes());
        // tile size defaults to the image extent
        assert_eq!(&bytes[22..26], &640u32.to_be_bytes());
        assert_eq!(&bytes[38..40], &[0, 1]);
        assert_eq!(&bytes[40..], &[0x8B, 1, 1]);
    }

    #[test]
    fn cod_repeats_last_precinct() {
        let cod = CodParams {
            num_decompositions: 2,
            precincts: vec![Size::new(64, 128), Size::new(256, 256)],
            ..Default::default()
        };
        let mut sink = EncodedBuffer::new();
        J2kWriter::new(&mut sink).write_cod(&cod);
        let bytes = sink.as_bytes();
        assert_eq!(&bytes[2..4], &[0, 15]);
        assert_eq!(bytes[4], 1);
        // 64x64 code-blocks, reversible
        assert_eq!(&bytes[9..14], &[2, 4, 4, 0, 1]);
        assert_eq!(&bytes[14..], &[0x76, 0x88, 0x88]);
    }
}
