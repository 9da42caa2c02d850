//! Decode path: engine lines into a packed pixel buffer.

use std::marker::PhantomData;

use tracing::debug;

use crate::FrameDescriptor;
use crate::codestream::{Codestream, J2kCodestream};
use crate::error::{CodecError, Result};
use crate::geometry::{GeometryDescriptor, Size};
use crate::header;
use crate::resolution::{check_level, reduce, size_at_level};
use crate::sample::SampleEncoding;

/// Order in which the engine hands out component lines.
///
/// The packed buffer is component-interleaved either way; this only decides
/// how the engine walks its planes. A color transform needs all components
/// of a row together, so it gets interleaved lines. Without one, planar
/// pulls let the engine finish one component before starting the next,
/// which is faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLayout {
    Planar,
    Interleaved,
}

impl LineLayout {
    pub fn choose(component_count: usize, color_transform: bool) -> Self {
        if component_count > 1 && color_transform {
            LineLayout::Interleaved
        } else {
            LineLayout::Planar
        }
    }

    pub fn is_planar(self) -> bool {
        self == LineLayout::Planar
    }
}

/// Writes the lines pulled from an engine into a packed buffer.
pub struct DecodeMarshaler<'a> {
    frame: &'a FrameDescriptor,
    geometry: &'a GeometryDescriptor,
}

impl<'a> DecodeMarshaler<'a> {
    pub fn new(frame: &'a FrameDescriptor, geometry: &'a GeometryDescriptor) -> Self {
        Self { frame, geometry }
    }

    pub fn layout(&self) -> LineLayout {
        LineLayout::choose(self.frame.component_count, self.frame.is_using_color_transform)
    }

    pub fn output_size(&self, level: u32) -> Result<Size> {
        size_at_level(self.frame.size(), level, self.geometry.num_decompositions)
    }

    /// Decodes at `level` from an engine whose headers have been read,
    /// replacing the contents of `destination`. On failure `destination` is
    /// left empty.
    pub fn decode<C: Codestream + ?Sized>(
        &self,
        codestream: &mut C,
        level: u32,
        destination: &mut Vec<u8>,
    ) -> Result<()> {
        destination.clear();
        let size = self.output_size(level)?;
        destination.resize(self.frame.packed_len(size), 0);

        let result = self.pull_lines(codestream, level, size, destination);
        codestream.close();
        if result.is_err() {
            destination.clear();
        }
        result
    }

    fn pull_lines<C: Codestream + ?Sized>(
        &self,
        codestream: &mut C,
        level: u32,
        size: Size,
        destination: &mut [u8],
    ) -> Result<()> {
        let layout = self.layout();
        codestream.restrict_input_resolution(level, level);
        codestream.set_planar(layout.is_planar());
        codestream.create()?;
        debug!(
            width = size.width,
            height = size.height,
            level,
            ?layout,
            "pulling lines"
        );

        let components = self.frame.component_count;
        let encoding = SampleEncoding::for_frame(self.frame);
        let bytes_per_sample = encoding.bytes_per_sample();
        let width = size.width as usize;
        let height = size.height as usize;
        let pixel_stride = components * bytes_per_sample;
        let row_stride = width * pixel_stride;
        let expected: Vec<Size> = (0..components)
            .map(|c| reduce(self.geometry.component_size(c, self.frame.size()), level))
            .collect();
        let mut next_row = vec![0usize; components];

        while let Some(line) = codestream.pull_line()? {
            let c = line.component;
            if c >= components {
                return Err(CodecError::codestream(format!(
                    "engine returned a line for component {c} of {components}"
                )));
            }
            let samples = line.samples;
            let row = next_row[c];
            if row >= expected[c].height as usize || samples.len() != expected[c].width as usize {
                return Err(CodecError::codestream(format!(
                    "unexpected line {row} of component {c} with {} samples, expected {}x{}",
                    samples.len(),
                    expected[c].width,
                    expected[c].height
                )));
            }
            next_row[c] += 1;
            if samples.is_empty() {
                continue;
            }

            let factor = self.geometry.down_sampling(c);
            let dx = factor.x.max(1) as usize;
            let dy = factor.y.max(1) as usize;
            let first = (row * dy).min(height);
            let last = ((row + 1) * dy).min(height);
            for y in first..last {
                let line_start = y * row_stride + c * bytes_per_sample;
                for x in 0..width {
                    let value = samples[(x / dx).min(samples.len() - 1)];
                    let offset = line_start + x * pixel_stride;
                    encoding.store(value, &mut destination[offset..offset + bytes_per_sample]);
                }
            }
        }

        for (c, &rows) in next_row.iter().enumerate() {
            if rows != expected[c].height as usize {
                return Err(CodecError::codestream(format!(
                    "engine returned {rows} of {} lines for component {c}",
                    expected[c].height
                )));
            }
            // A sub-sampled component may cover fewer rows than the image;
            // the last row extends to the bottom.
            let dy = self.geometry.down_sampling(c).y.max(1) as usize;
            let covered = (rows * dy).min(height);
            if covered == 0 {
                continue;
            }
            for y in covered..height {
                for x in 0..width {
                    let from = (covered - 1) * row_stride + x * pixel_stride + c * bytes_per_sample;
                    let to = y * row_stride + x * pixel_stride + c * bytes_per_sample;
                    destination.copy_within(from..from + bytes_per_sample, to);
                }
            }
        }
        Ok(())
    }
}

/// Owns the encoded input and decoded output of one image.
///
/// Each decode runs on a fresh engine `C`.
#[derive(Debug)]
pub struct Decoder<C: Codestream + Default = J2kCodestream> {
    encoded: Vec<u8>,
    decoded: Vec<u8>,
    descriptors: Option<(FrameDescriptor, GeometryDescriptor)>,
    engine: PhantomData<C>,
}

impl<C: Codestream + Default> Default for Decoder<C> {
    fn default() -> Self {
        Self {
            encoded: Vec::new(),
            decoded: Vec::new(),
            descriptors: None,
            engine: PhantomData,
        }
    }
}

impl<C: Codestream + Default> Decoder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resizes the encoded buffer to `size` bytes for the caller to fill.
    pub fn encoded_buffer_mut(&mut self, size: usize) -> &mut [u8] {
        self.encoded.resize(size, 0);
        self.descriptors = None;
        &mut self.encoded
    }

    pub fn set_encoded(&mut self, encoded: Vec<u8>) {
        self.encoded = encoded;
        self.descriptors = None;
    }

    pub fn encoded_bytes(&self) -> &[u8] {
        &self.encoded
    }

    pub fn decoded_bytes(&self) -> &[u8] {
        &self.decoded
    }

    pub fn take_decoded(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.decoded)
    }

    /// Parses the main header only.
    pub fn read_header(&mut self) -> Result<()> {
        self.check_encoded()?;
        let descriptors = header::read_header(&mut C::default(), &self.encoded)?;
        self.descriptors = Some(descriptors);
        Ok(())
    }

    pub fn frame_descriptor(&self) -> Option<&FrameDescriptor> {
        self.descriptors.as_ref().map(|(frame, _)| frame)
    }

    pub fn geometry(&self) -> Option<&GeometryDescriptor> {
        self.descriptors.as_ref().map(|(_, geometry)| geometry)
    }

    pub fn calculate_size_at_level(&self, level: u32) -> Result<Size> {
        let (frame, geometry) = self
            .descriptors
            .as_ref()
            .ok_or(CodecError::InvalidOperation("header has not been read"))?;
        size_at_level(frame.size(), level, geometry.num_decompositions)
    }

    pub fn decode(&mut self) -> Result<()> {
        self.decode_at_level(0)
    }

    /// Decodes at decomposition `level`; the output holds
    /// `calculate_size_at_level(level)` pixels.
    pub fn decode_at_level(&mut self, level: u32) -> Result<()> {
        self.check_encoded()?;
        if let Some((_, geometry)) = &self.descriptors {
            check_level(level, geometry.num_decompositions)?;
        }

        let mut engine = C::default();
        engine.read_headers(&self.encoded)?;
        let (frame, geometry) = header::describe(&engine)?;
        let result = DecodeMarshaler::new(&frame, &geometry).decode(
            &mut engine,
            level,
            &mut self.decoded,
        );
        self.descriptors = Some((frame, geometry));
        result
    }

    fn check_encoded(&self) -> Result<()> {
        if self.encoded.is_empty() {
            return Err(CodecError::InvalidOperation("no encoded bytes to decode"));
        }
        Ok(())
    }
}
