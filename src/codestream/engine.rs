//! Reference JPEG 2000 engine.
//!
//! Writes and reads genuine Part 1 main headers and tile-part framing. The
//! tile body stores quantized wavelet coefficients as varints (see `tile`)
//! instead of running the EBCOT/HT block coder.

use tracing::{debug, trace, warn};

use super::dwt::{Dwt53, Dwt97, forward_2d, inverse_2d};
use super::jp2::Jp2Reader;
use super::mct::{forward_ict, forward_rct, inverse_ict, inverse_rct};
use super::parser::{J2kParser, read_tile_data};
use super::quantization::{decode_step, dequantize_scalar, encode_step, quantize_scalar};
use super::tile::{
    Plane, SegmentId, decode_segment, encode_segment, resolution_bands, segment_order,
    split_tile_parts,
};
use super::writer::J2kWriter;
use super::{CodParams, Codestream, EncodedBuffer, LineSlot, QcdParams, SampleLine, SizParams};
use crate::constants::{
    DEFAULT_QUANTIZATION_STEP, MAXIMUM_BLOCK_AREA, MAXIMUM_BLOCK_DIMENSION,
    MAXIMUM_DECOMPOSITIONS, MAXIMUM_DOWN_SAMPLING, MAXIMUM_ENGINE_BIT_DEPTH,
    MAXIMUM_PRECINCT_EXPONENT, MINIMUM_BLOCK_DIMENSION,
};
use crate::error::{CodecError, Result};
use crate::resolution::reduce;

const COMMENT: &str = concat!("j2kbridge-rs ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    HeadersRead,
    Decoded,
    Collecting,
    Collected,
}

#[derive(Debug, Default)]
pub struct J2kCodestream {
    siz: SizParams,
    cod: CodParams,
    qcd: QcdParams,
    resilient: bool,
    planar: bool,
    skipped_res_for_data: u32,
    skipped_res_for_recon: u32,
    tile_parts_at_resolutions: bool,
    tile_parts_at_components: bool,
    source: Vec<u8>,
    tile_data_offset: usize,
    planes: Vec<Plane<i32>>,
    line_order: Vec<(usize, usize)>,
    next_line: usize,
    state: State,
}

impl J2kCodestream {
    pub fn new() -> Self {
        Self::default()
    }

    fn num_components(&self) -> usize {
        self.siz.num_components()
    }

    fn check_single_tile(&self) -> Result<()> {
        match self.siz.tile_grid() {
            (1, 1) => Ok(()),
            (x, y) => Err(CodecError::codestream(format!(
                "tiled codestreams are not supported ({x}x{y} tiles)"
            ))),
        }
    }

    fn check_color_transform(&self) -> Result<()> {
        if !self.cod.color_transform {
            return Ok(());
        }
        if self.num_components() < 3 {
            return Err(CodecError::codestream(format!(
                "color transform needs 3 components, image has {}",
                self.num_components()
            )));
        }
        let first = self.siz.down_sampling(0);
        if (1..3).any(|c| self.siz.down_sampling(c) != first) {
            return Err(CodecError::codestream(
                "color transform needs identical down-sampling on the first three components",
            ));
        }
        Ok(())
    }

    fn check_bit_depths(&self) -> Result<()> {
        for (c, component) in self.siz.components.iter().enumerate() {
            if component.bit_depth == 0 || component.bit_depth > MAXIMUM_ENGINE_BIT_DEPTH {
                return Err(CodecError::codestream(format!(
                    "component {c} bit depth {} is outside 1..={MAXIMUM_ENGINE_BIT_DEPTH}",
                    component.bit_depth
                )));
            }
        }
        Ok(())
    }

    /// The step actually signalled in QCD, which both sides quantize with.
    fn effective_step(&self) -> f32 {
        let range_bits = self.siz.bit_depth(0);
        let step = self.qcd.irreversible_step.unwrap_or(DEFAULT_QUANTIZATION_STEP);
        decode_step(encode_step(step, range_bits), range_bits)
    }

    fn build_line_order(&mut self) {
        let heights: Vec<usize> = self
            .planes
            .iter()
            .map(|p| p.size().height as usize)
            .collect();
        self.line_order.clear();
        if self.planar {
            for (c, &height) in heights.iter().enumerate() {
                self.line_order.extend((0..height).map(|row| (c, row)));
            }
        } else {
            let tallest = heights.iter().copied().max().unwrap_or(0);
            for row in 0..tallest {
                for (c, &height) in heights.iter().enumerate() {
                    if row < height {
                        self.line_order.push((c, row));
                    }
                }
            }
        }
        self.next_line = 0;
    }

    fn level_offset(&self, component: usize) -> i32 {
        if self.siz.is_signed(component) {
            0
        } else {
            1 << (self.siz.bit_depth(component) - 1)
        }
    }

    /// Reads the segments of the tile body into coefficient planes.
    fn read_coefficients(&self, payload: &[u8], data_limit: u32) -> Result<Vec<Plane<i32>>> {
        let levels = self.cod.num_decompositions;
        let mut planes: Vec<Plane<i32>> = (0..self.num_components())
            .map(|c| Plane::new(self.siz.component_size(c)))
            .collect();

        let mut position = 0;
        for SegmentId {
            resolution,
            component,
        } in segment_order(self.cod.progression_order, self.num_components(), levels)
        {
            let skipped = resolution > data_limit;
            if payload.len() - position < 4 {
                if skipped {
                    continue;
                }
                if !self.resilient {
                    return Err(CodecError::codestream(format!(
                        "tile data ends before resolution {resolution} of component {component}"
                    )));
                }
                warn!(resolution, component, "missing segment, coefficients zero-filled");
                continue;
            }

            let header = &payload[position..position + 4];
            let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let start = position + 4;
            let end = start.saturating_add(length);
            let available = end.min(payload.len());
            position = available;
            if skipped {
                continue;
            }
            if end > payload.len() {
                if !self.resilient {
                    return Err(CodecError::codestream(format!(
                        "segment of resolution {resolution}, component {component} is truncated"
                    )));
                }
                warn!(
                    resolution,
                    component,
                    missing = end - payload.len(),
                    "truncated segment, coefficients zero-filled"
                );
            }

            let plane = &mut planes[component];
            let bands = resolution_bands(plane.size(), levels, resolution);
            if !decode_segment(&payload[start..available], plane, &bands) && end <= payload.len() {
                if !self.resilient {
                    return Err(CodecError::codestream(format!(
                        "segment of resolution {resolution}, component {component} is short"
                    )));
                }
                warn!(resolution, component, "short segment, coefficients zero-filled");
            }
        }
        Ok(planes)
    }

    fn reconstruct_reversible(&mut self, mut planes: Vec<Plane<i32>>, level: u32) {
        let levels = self.cod.num_decompositions;
        for plane in &mut planes {
            inverse_2d::<Dwt53>(plane, levels, level);
            *plane = plane.crop(reduce(plane.size(), level));
        }
        if self.cod.color_transform {
            let (c0, c1, c2) = split_three(&mut planes);
            inverse_rct(c0, c1, c2);
        }
        self.planes = planes;
    }

    fn reconstruct_irreversible(&mut self, planes: Vec<Plane<i32>>, level: u32) {
        let levels = self.cod.num_decompositions;
        let step = self.effective_step();
        let mut planes: Vec<Plane<f32>> = planes
            .iter()
            .map(|p| p.map(|q| dequantize_scalar(q, step)))
            .collect();
        for plane in &mut planes {
            inverse_2d::<Dwt97>(plane, levels, level);
            *plane = plane.crop(reduce(plane.size(), level));
        }
        if self.cod.color_transform {
            let (c0, c1, c2) = split_three(&mut planes);
            inverse_ict(c0, c1, c2);
        }
        self.planes = planes.iter().map(|p| p.map(|v| v.round() as i32)).collect();
    }

    fn validate_for_encoding(&self) -> Result<()> {
        if self.num_components() == 0 {
            return Err(CodecError::codestream("no components configured"));
        }
        let size = self.siz.image_size();
        if size.width == 0 || size.height == 0 {
            return Err(CodecError::codestream("empty image area"));
        }
        self.siz.validate_tile_grid()?;
        self.check_single_tile()?;
        self.check_bit_depths()?;
        self.check_color_transform()?;
        for (c, component) in self.siz.components.iter().enumerate() {
            let ds = component.down_sampling;
            if !(1..=MAXIMUM_DOWN_SAMPLING).contains(&ds.x)
                || !(1..=MAXIMUM_DOWN_SAMPLING).contains(&ds.y)
            {
                return Err(CodecError::codestream(format!(
                    "component {c} down-sampling {}x{} is out of range",
                    ds.x, ds.y
                )));
            }
        }

        let cod = &self.cod;
        if cod.num_decompositions > MAXIMUM_DECOMPOSITIONS {
            return Err(CodecError::codestream(format!(
                "{} decomposition levels",
                cod.num_decompositions
            )));
        }
        let block = cod.block_dims;
        let valid_dimension = |d: u32| {
            d.is_power_of_two() && (MINIMUM_BLOCK_DIMENSION..=MAXIMUM_BLOCK_DIMENSION).contains(&d)
        };
        if !valid_dimension(block.width)
            || !valid_dimension(block.height)
            || block.width * block.height > MAXIMUM_BLOCK_AREA
        {
            return Err(CodecError::codestream(format!(
                "invalid code-block size {}x{}",
                block.width, block.height
            )));
        }
        let valid_precinct =
            |d: u32| d.is_power_of_two() && d.trailing_zeros() <= MAXIMUM_PRECINCT_EXPONENT as u32;
        if let Some(bad) = cod
            .precincts
            .iter()
            .find(|p| !valid_precinct(p.width) || !valid_precinct(p.height))
        {
            return Err(CodecError::codestream(format!(
                "invalid precinct size {}x{}",
                bad.width, bad.height
            )));
        }
        if !cod.reversible {
            let step = self.qcd.irreversible_step.unwrap_or(DEFAULT_QUANTIZATION_STEP);
            if !step.is_finite() || step <= 0.0 {
                return Err(CodecError::codestream(format!(
                    "invalid quantization step {step}"
                )));
            }
        }
        Ok(())
    }

    fn forward_transform(&mut self) -> Vec<Plane<i32>> {
        let levels = self.cod.num_decompositions;
        let mut planes = std::mem::take(&mut self.planes);
        for (c, plane) in planes.iter_mut().enumerate() {
            let offset = self.level_offset(c);
            plane.samples_mut().iter_mut().for_each(|v| *v -= offset);
        }

        if self.cod.reversible {
            if self.cod.color_transform {
                let (c0, c1, c2) = split_three(&mut planes);
                forward_rct(c0, c1, c2);
            }
            for plane in &mut planes {
                forward_2d::<Dwt53>(plane, levels);
            }
            planes
        } else {
            let step = self.effective_step();
            let mut floats: Vec<Plane<f32>> =
                planes.iter().map(|p| p.map(|v| v as f32)).collect();
            if self.cod.color_transform {
                let (c0, c1, c2) = split_three(&mut floats);
                forward_ict(c0, c1, c2);
            }
            floats
                .iter_mut()
                .map(|plane| {
                    forward_2d::<Dwt97>(plane, levels);
                    plane.map(|v| quantize_scalar(v, step))
                })
                .collect()
        }
    }
}

/// Sample slices of the first three planes.
fn split_three<T: Copy + Default>(planes: &mut [Plane<T>]) -> (&mut [T], &mut [T], &mut [T]) {
    let (first, rest) = planes.split_at_mut(1);
    let (second, third) = rest.split_at_mut(1);
    (
        first[0].samples_mut(),
        second[0].samples_mut(),
        third[0].samples_mut(),
    )
}

impl Codestream for J2kCodestream {
    fn enable_resilience(&mut self) {
        self.resilient = true;
    }

    fn read_headers(&mut self, source: &[u8]) -> Result<()> {
        let codestream = Jp2Reader::new(source).find_codestream()?.unwrap_or(source);
        let header = J2kParser::new(codestream).parse_main_header()?;
        debug!(
            extent_x = header.siz.image_extent.x,
            extent_y = header.siz.image_extent.y,
            components = header.siz.num_components(),
            decompositions = header.cod.num_decompositions,
            reversible = header.cod.reversible,
            "read main header"
        );
        self.siz = header.siz;
        self.cod = header.cod;
        self.qcd = header.qcd;
        self.tile_data_offset = header.tile_data_offset;
        self.source = codestream.to_vec();
        self.state = State::HeadersRead;
        Ok(())
    }

    fn siz(&self) -> &SizParams {
        &self.siz
    }

    fn siz_mut(&mut self) -> &mut SizParams {
        &mut self.siz
    }

    fn cod(&self) -> &CodParams {
        &self.cod
    }

    fn cod_mut(&mut self) -> &mut CodParams {
        &mut self.cod
    }

    fn qcd_mut(&mut self) -> &mut QcdParams {
        &mut self.qcd
    }

    fn restrict_input_resolution(&mut self, skipped_res_for_data: u32, skipped_res_for_recon: u32) {
        self.skipped_res_for_data = skipped_res_for_data;
        self.skipped_res_for_recon = skipped_res_for_recon;
    }

    fn set_planar(&mut self, planar: bool) {
        self.planar = planar;
    }

    fn set_tilepart_divisions(&mut self, at_resolutions: bool, at_components: bool) {
        self.tile_parts_at_resolutions = at_resolutions;
        self.tile_parts_at_components = at_components;
    }

    fn create(&mut self) -> Result<()> {
        if self.state != State::HeadersRead {
            return Err(CodecError::InvalidOperation(
                "create requires headers read from a codestream",
            ));
        }
        self.check_single_tile()?;
        self.check_bit_depths()?;
        self.check_color_transform()?;

        let levels = self.cod.num_decompositions;
        for skipped in [self.skipped_res_for_data, self.skipped_res_for_recon] {
            if skipped > levels {
                return Err(CodecError::InvalidLevel {
                    level: skipped,
                    num_decompositions: levels,
                });
            }
        }
        let recon_level = self.skipped_res_for_recon;
        let data_limit = levels - self.skipped_res_for_data;

        let payload = read_tile_data(&self.source, self.tile_data_offset, self.resilient)?;
        let coefficients = self.read_coefficients(&payload, data_limit)?;
        debug!(
            bytes = payload.len(),
            level = recon_level,
            resolutions = data_limit + 1,
            "decoding tile"
        );

        if self.cod.reversible {
            self.reconstruct_reversible(coefficients, recon_level);
        } else {
            self.reconstruct_irreversible(coefficients, recon_level);
        }
        for c in 0..self.planes.len() {
            let offset = self.level_offset(c);
            if offset != 0 {
                self.planes[c]
                    .samples_mut()
                    .iter_mut()
                    .for_each(|v| *v += offset);
            }
        }

        self.build_line_order();
        self.state = State::Decoded;
        Ok(())
    }

    fn pull_line(&mut self) -> Result<Option<SampleLine<'_>>> {
        if self.state != State::Decoded {
            return Err(CodecError::InvalidOperation("pull_line called before create"));
        }
        let Some(&(component, row)) = self.line_order.get(self.next_line) else {
            return Ok(None);
        };
        self.next_line += 1;
        Ok(Some(SampleLine {
            component,
            samples: self.planes[component].row(row),
        }))
    }

    fn write_headers(&mut self, sink: &mut EncodedBuffer) -> Result<()> {
        if self.state != State::Idle {
            return Err(CodecError::InvalidOperation(
                "write_headers called on an engine already in use",
            ));
        }
        self.validate_for_encoding()?;

        let step = self.effective_step();
        let mut writer = J2kWriter::new(sink);
        writer.write_soc();
        writer.write_siz(&self.siz);
        writer.write_cod(&self.cod);
        writer.write_qcd(&self.cod, self.siz.bit_depth(0), step);
        writer.write_com(COMMENT);

        self.planes = (0..self.num_components())
            .map(|c| Plane::new(self.siz.component_size(c)))
            .collect();
        self.build_line_order();
        self.state = State::Collecting;
        Ok(())
    }

    fn exchange_line(&mut self) -> Result<Option<LineSlot<'_>>> {
        if self.state != State::Collecting {
            return Err(CodecError::InvalidOperation(
                "exchange_line called outside of encoding",
            ));
        }
        let Some(&(component, row)) = self.line_order.get(self.next_line) else {
            self.state = State::Collected;
            return Ok(None);
        };
        self.next_line += 1;
        Ok(Some(LineSlot {
            component,
            samples: self.planes[component].row_mut(row),
        }))
    }

    fn flush(&mut self, sink: &mut EncodedBuffer) -> Result<()> {
        if self.state != State::Collected {
            return Err(CodecError::InvalidOperation(
                "flush called before every line was exchanged",
            ));
        }
        let levels = self.cod.num_decompositions;
        let coefficients = self.forward_transform();

        let segments: Vec<(SegmentId, Vec<u8>)> =
            segment_order(self.cod.progression_order, coefficients.len(), levels)
                .into_iter()
                .map(|id| {
                    let plane = &coefficients[id.component];
                    let bands = resolution_bands(plane.size(), levels, id.resolution);
                    (id, encode_segment(plane, &bands))
                })
                .collect();
        let parts = split_tile_parts(
            &segments,
            self.tile_parts_at_resolutions,
            self.tile_parts_at_components,
        );
        let part_count = u8::try_from(parts.len()).map_err(|_| {
            CodecError::codestream(format!("{} tile-parts exceed the limit of 255", parts.len()))
        })?;

        let mut writer = J2kWriter::new(sink);
        for (index, part) in parts.iter().enumerate() {
            if u32::try_from(part.len() + 14).is_err() {
                return Err(CodecError::codestream("tile-part exceeds 4 GiB"));
            }
            trace!(index, bytes = part.len(), "tile-part");
            writer.write_tile_part_header(index as u8, part_count, part.len());
            writer.write_bytes(part);
        }
        writer.write_eoc();
        debug!(tile_parts = parts.len(), bytes = sink.tell(), "flushed codestream");
        self.state = State::Idle;
        Ok(())
    }

    fn close(&mut self) {
        self.planes = Vec::new();
        self.line_order = Vec::new();
        self.source = Vec::new();
        self.next_line = 0;
        self.state = State::Idle;
    }
}
