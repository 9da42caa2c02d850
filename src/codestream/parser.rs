//! Main header and tile-part parsing.

use tracing::{debug, warn};

use super::marker::MarkerCode;
use super::quantization::decode_step;
use super::reader::ByteReader;
use super::{CodParams, QcdParams, SizParams};
use crate::constants::{MAXIMUM_BLOCK_DIMENSION, MAXIMUM_BLOCK_AREA, MAXIMUM_DECOMPOSITIONS};
use crate::error::{CodecError, Result};
use crate::geometry::{Point, ProgressionOrder, Size};

const MAXIMUM_SIZ_COMPONENTS: usize = 16384;
const MAXIMUM_SIZ_BIT_DEPTH: u8 = 38;

/// Everything the main header says about the image.
#[derive(Debug, Clone, Default)]
pub struct MainHeader {
    pub siz: SizParams,
    pub cod: CodParams,
    pub qcd: QcdParams,
    /// Offset of the first SOT (or EOC) marker.
    pub tile_data_offset: usize,
}

pub struct J2kParser<'a> {
    reader: ByteReader<'a>,
    header: MainHeader,
}

impl<'a> J2kParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(data),
            header: MainHeader::default(),
        }
    }

    /// Parses SOC through the last main header segment.
    pub fn parse_main_header(mut self) -> Result<MainHeader> {
        if self.reader.read_marker()? != u8::from(MarkerCode::StartOfCodestream) {
            return Err(CodecError::codestream("missing SOC marker"));
        }
        if self.reader.read_marker()? != u8::from(MarkerCode::ImageAndTileSize) {
            return Err(CodecError::codestream("SIZ must follow SOC"));
        }
        self.parse_siz()?;

        let mut seen_cod = false;
        loop {
            let code = self.reader.read_marker()?;
            match MarkerCode::try_from(code) {
                Ok(MarkerCode::CodingStyleDefault) => {
                    self.parse_cod()?;
                    seen_cod = true;
                }
                Ok(MarkerCode::QuantizationDefault) => self.parse_qcd()?,
                Ok(MarkerCode::StartOfTile | MarkerCode::EndOfCodestream) => {
                    self.header.tile_data_offset = self.reader.position() - 2;
                    break;
                }
                Ok(MarkerCode::ImageAndTileSize) => {
                    return Err(CodecError::codestream("duplicate SIZ marker"));
                }
                _ if MarkerCode::has_no_segment(code) => {
                    return Err(CodecError::codestream(format!(
                        "unexpected marker 0xFF{code:02X} in main header"
                    )));
                }
                _ => {
                    let length = self.reader.read_segment_length()?;
                    debug!("skipping segment 0xFF{code:02X} ({length} bytes)");
                    self.reader.advance(length)?;
                }
            }
        }

        if !seen_cod {
            return Err(CodecError::codestream("missing COD marker"));
        }
        Ok(self.header)
    }

    fn parse_siz(&mut self) -> Result<()> {
        let length = self.reader.read_segment_length()?;
        let _rsiz = self.reader.read_u16()?;
        let siz = &mut self.header.siz;
        siz.image_extent = Point::new(self.reader.read_u32()?, self.reader.read_u32()?);
        siz.image_offset = Point::new(self.reader.read_u32()?, self.reader.read_u32()?);
        siz.tile_size = Size::new(self.reader.read_u32()?, self.reader.read_u32()?);
        siz.tile_offset = Point::new(self.reader.read_u32()?, self.reader.read_u32()?);
        let count = self.reader.read_u16()? as usize;

        if count == 0 || count > MAXIMUM_SIZ_COMPONENTS {
            return Err(CodecError::codestream(format!(
                "invalid component count {count}"
            )));
        }
        if length != 36 + 3 * count {
            return Err(CodecError::codestream(format!(
                "SIZ length {} does not match {count} components",
                length + 2
            )));
        }
        if siz.image_extent.x <= siz.image_offset.x || siz.image_extent.y <= siz.image_offset.y {
            return Err(CodecError::codestream("empty image area"));
        }
        if siz.tile_size.width == 0 || siz.tile_size.height == 0 {
            return Err(CodecError::codestream("zero tile size"));
        }
        siz.validate_tile_grid()?;

        siz.set_num_components(count);
        for c in 0..count {
            let ssiz = self.reader.read_u8()?;
            let dx = self.reader.read_u8()?;
            let dy = self.reader.read_u8()?;
            let bit_depth = (ssiz & 0x7F) + 1;
            if bit_depth > MAXIMUM_SIZ_BIT_DEPTH {
                return Err(CodecError::codestream(format!(
                    "component {c} has bit depth {bit_depth}"
                )));
            }
            if dx == 0 || dy == 0 {
                return Err(CodecError::codestream(format!(
                    "component {c} has zero sub-sampling"
                )));
            }
            siz.set_component(c, Point::new(dx as u32, dy as u32), bit_depth, ssiz & 0x80 != 0);
        }
        Ok(())
    }

    fn parse_cod(&mut self) -> Result<()> {
        let length = self.reader.read_segment_length()?;
        if length < 10 {
            return Err(CodecError::codestream("COD segment too short"));
        }
        let scod = self.reader.read_u8()?;
        let sprog = self.reader.read_u8()?;
        let num_layers = self.reader.read_u16()?;
        let mct = self.reader.read_u8()?;
        let num_decompositions = self.reader.read_u8()? as u32;
        let xcb = (self.reader.read_u8()? & 0x0F) as u32 + 2;
        let ycb = (self.reader.read_u8()? & 0x0F) as u32 + 2;
        let _block_style = self.reader.read_u8()?;
        let transform = self.reader.read_u8()?;

        let progression_order = ProgressionOrder::try_from(sprog).map_err(|_| {
            CodecError::codestream(format!("invalid progression order {sprog}"))
        })?;
        if num_decompositions > MAXIMUM_DECOMPOSITIONS {
            return Err(CodecError::codestream(format!(
                "{num_decompositions} decomposition levels"
            )));
        }
        let block_dims = Size::new(1 << xcb, 1 << ycb);
        if block_dims.width > MAXIMUM_BLOCK_DIMENSION
            || block_dims.height > MAXIMUM_BLOCK_DIMENSION
            || block_dims.width * block_dims.height > MAXIMUM_BLOCK_AREA
        {
            return Err(CodecError::codestream(format!(
                "invalid code-block size {}x{}",
                block_dims.width, block_dims.height
            )));
        }
        if num_layers == 0 {
            return Err(CodecError::codestream("zero quality layers"));
        }
        if transform > 1 {
            return Err(CodecError::codestream(format!(
                "unknown wavelet transform {transform}"
            )));
        }

        let mut precincts = Vec::new();
        if scod & 0x01 != 0 {
            for _ in 0..=num_decompositions {
                let pp = self.reader.read_u8()?;
                precincts.push(Size::new(1 << (pp & 0x0F), 1 << (pp >> 4)));
            }
        }
        let consumed = 10 + precincts.len();
        if length < consumed {
            return Err(CodecError::codestream("COD segment too short"));
        }
        self.reader.advance(length - consumed)?;

        self.header.cod = CodParams {
            num_decompositions,
            block_dims,
            progression_order,
            num_layers,
            reversible: transform == 1,
            color_transform: mct == 1,
            precincts,
        };
        Ok(())
    }

    fn parse_qcd(&mut self) -> Result<()> {
        let length = self.reader.read_segment_length()?;
        if length < 1 {
            return Err(CodecError::codestream("QCD segment too short"));
        }
        let sqcd = self.reader.read_u8()?;
        let mut consumed = 1;
        self.header.qcd = QcdParams::default();
        // Scalar derived (1) or expounded (2): the first step is the base step.
        if sqcd & 0x1F != 0 {
            if length < 3 {
                return Err(CodecError::codestream("QCD segment too short"));
            }
            let value = self.reader.read_u16()?;
            consumed += 2;
            let range_bits = self.header.siz.bit_depth(0);
            self.header.qcd.set_irrev_quant(decode_step(value, range_bits));
        }
        self.reader.advance(length - consumed)?;
        Ok(())
    }
}

/// Concatenates the bodies of all tile-parts starting at `offset`.
///
/// Tile-part boundaries come from Psot; data is never scanned for markers.
/// With `resilient` set, a truncated or malformed tile-part ends collection
/// with a warning instead of an error.
pub fn read_tile_data(data: &[u8], offset: usize, resilient: bool) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    let mut reader = ByteReader::new(data);
    reader.advance(offset)?;
    loop {
        if reader.remaining() == 0 {
            if resilient {
                warn!("codestream ends without EOC");
                break;
            }
            return Err(CodecError::codestream("codestream ends without EOC"));
        }
        match read_tile_part(&mut reader, data, resilient, &mut payload) {
            Ok(true) => continue,
            Ok(false) => break,
            Err(err) if resilient => {
                warn!(error = %err, "stopping at damaged tile-part");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(payload)
}

/// Reads one tile-part, returning false once EOC has been consumed.
fn read_tile_part(
    reader: &mut ByteReader<'_>,
    data: &[u8],
    resilient: bool,
    payload: &mut Vec<u8>,
) -> Result<bool> {
    let start = reader.position();
    let code = reader.read_marker()?;
    match MarkerCode::try_from(code) {
        Ok(MarkerCode::EndOfCodestream) => return Ok(false),
        Ok(MarkerCode::StartOfTile) => {}
        _ => {
            return Err(CodecError::codestream(format!(
                "expected SOT at offset {start}, found 0xFF{code:02X}"
            )));
        }
    }

    let length = reader.read_segment_length()?;
    if length != 8 {
        return Err(CodecError::codestream(format!("invalid SOT length {}", length + 2)));
    }
    let tile_index = reader.read_u16()?;
    let psot = reader.read_u32()? as usize;
    let part_index = reader.read_u8()?;
    let _part_count = reader.read_u8()?;
    if tile_index != 0 {
        return Err(CodecError::codestream(format!(
            "tile-part of tile {tile_index} in a single-tile image"
        )));
    }

    loop {
        let code = reader.read_marker()?;
        if code == u8::from(MarkerCode::StartOfData) {
            break;
        }
        let length = reader.read_segment_length()?;
        reader.advance(length)?;
    }

    let body_start = reader.position();
    let mut body_end = if psot == 0 {
        // Last tile-part: runs to EOC.
        if data.ends_with(&[0xFF, u8::from(MarkerCode::EndOfCodestream)]) {
            data.len() - 2
        } else {
            data.len()
        }
    } else {
        start.saturating_add(psot)
    };
    if body_end < body_start {
        return Err(CodecError::codestream(format!(
            "tile-part {part_index} length {psot} is shorter than its header"
        )));
    }
    if body_end > data.len() {
        if !resilient {
            return Err(CodecError::codestream(format!(
                "tile-part {part_index} is truncated"
            )));
        }
        warn!(part_index, psot, available = data.len() - start, "truncated tile-part");
        body_end = data.len();
    }

    payload.extend_from_slice(&data[body_start..body_end]);
    reader.advance(body_end - body_start)?;
    debug!(part_index, bytes = body_end - body_start, "read tile-part");
    Ok(true)
}
