//! Encode path: a packed pixel buffer into engine lines.

use std::marker::PhantomData;

use tracing::debug;

use crate::FrameDescriptor;
use crate::codestream::{Codestream, EncodedBuffer, J2kCodestream};
use crate::constants::ENCODED_BUFFER_INITIAL_SIZE;
use crate::decoder::LineLayout;
use crate::error::{CodecError, Result};
use crate::geometry::{Point, Size};
use crate::parameters::EncodeParameters;
use crate::sample::SampleEncoding;

/// Feeds a packed buffer to an engine line by line.
pub struct EncodeMarshaler<'a> {
    frame: &'a FrameDescriptor,
    params: &'a EncodeParameters,
}

impl<'a> EncodeMarshaler<'a> {
    pub fn new(frame: &'a FrameDescriptor, params: &'a EncodeParameters) -> Self {
        Self { frame, params }
    }

    pub fn layout(&self) -> LineLayout {
        LineLayout::choose(self.frame.component_count, self.params.color_transform)
    }

    /// Configures `codestream` and writes the encoded image to `sink`.
    pub fn encode<C: Codestream + ?Sized>(
        &self,
        codestream: &mut C,
        source: &[u8],
        sink: &mut EncodedBuffer,
    ) -> Result<()> {
        let frame = self.frame;
        frame.validate()?;
        self.params.geometry.validate_offsets(frame.size())?;
        if self.params.component_count() != frame.component_count {
            return Err(CodecError::InvalidArgumentComponentCount(
                self.params.component_count(),
            ));
        }
        let expected = frame.packed_len(frame.size());
        if source.len() != expected {
            return Err(CodecError::BufferSizeMismatch {
                expected,
                actual: source.len(),
            });
        }

        self.configure(codestream)?;
        let layout = self.layout();
        codestream.set_planar(layout.is_planar());
        sink.open(ENCODED_BUFFER_INITIAL_SIZE);

        let result = self.push_lines(codestream, source, sink);
        codestream.close();
        result
    }

    fn configure<C: Codestream + ?Sized>(&self, codestream: &mut C) -> Result<()> {
        let frame = self.frame;
        let geometry = &self.params.geometry;
        let origin = geometry.image_offset;
        let extent = origin
            .x
            .checked_add(frame.width)
            .zip(origin.y.checked_add(frame.height))
            .map(|(x, y)| Point::new(x, y))
            .ok_or(CodecError::InvalidImageOffset {
                x: origin.x,
                y: origin.y,
            })?;
        let siz = codestream.siz_mut();
        siz.image_offset = origin;
        siz.image_extent = extent;
        siz.tile_size = geometry.tile_size;
        siz.tile_offset = geometry.tile_offset;
        siz.set_num_components(frame.component_count);
        for c in 0..frame.component_count {
            siz.set_component(
                c,
                geometry.down_sampling(c),
                frame.bits_per_sample,
                frame.is_signed,
            );
        }
        self.params.apply(codestream);
        Ok(())
    }

    fn push_lines<C: Codestream + ?Sized>(
        &self,
        codestream: &mut C,
        source: &[u8],
        sink: &mut EncodedBuffer,
    ) -> Result<()> {
        codestream.write_headers(sink)?;

        let frame = self.frame;
        let components = frame.component_count;
        let encoding = SampleEncoding::for_frame(frame);
        let bytes_per_sample = encoding.bytes_per_sample();
        let width = frame.width as usize;
        let height = frame.height as usize;
        let pixel_stride = components * bytes_per_sample;
        let row_stride = width * pixel_stride;
        let expected: Vec<Size> = (0..components)
            .map(|c| self.params.geometry.component_size(c, frame.size()))
            .collect();
        let mut next_row = vec![0usize; components];

        while let Some(slot) = codestream.exchange_line()? {
            let c = slot.component;
            if c >= components {
                return Err(CodecError::codestream(format!(
                    "engine requested a line for component {c} of {components}"
                )));
            }
            if next_row[c] >= expected[c].height as usize
                || slot.samples.len() != expected[c].width as usize
            {
                return Err(CodecError::codestream(format!(
                    "unexpected line {} of component {c} with {} samples, expected {}x{}",
                    next_row[c],
                    slot.samples.len(),
                    expected[c].width,
                    expected[c].height
                )));
            }
            let factor = self.params.geometry.down_sampling(c);
            let dx = factor.x.max(1) as usize;
            let dy = factor.y.max(1) as usize;
            let y = (next_row[c] * dy).min(height - 1);
            next_row[c] += 1;

            let line_start = y * row_stride + c * bytes_per_sample;
            for (k, sample) in slot.samples.iter_mut().enumerate() {
                let x = (k * dx).min(width - 1);
                let offset = line_start + x * pixel_stride;
                *sample = encoding.load(&source[offset..offset + bytes_per_sample]);
            }
        }

        codestream.flush(sink)?;
        debug!(
            width,
            height,
            components,
            bytes = sink.tell(),
            "encoded image"
        );
        Ok(())
    }
}

/// Owns the decoded input and encoded output of one image.
#[derive(Debug)]
pub struct Encoder<C: Codestream + Default = J2kCodestream> {
    decoded: Vec<u8>,
    frame: Option<FrameDescriptor>,
    encoded: EncodedBuffer,
    engine: PhantomData<C>,
}

impl<C: Codestream + Default> Default for Encoder<C> {
    fn default() -> Self {
        Self {
            decoded: Vec::new(),
            frame: None,
            encoded: EncodedBuffer::new(),
            engine: PhantomData,
        }
    }
}

impl<C: Codestream + Default> Encoder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the input buffer for `frame` and returns it for the caller to
    /// fill.
    pub fn decoded_buffer_mut(&mut self, frame: &FrameDescriptor) -> Result<&mut [u8]> {
        frame.validate()?;
        self.decoded.clear();
        self.decoded.resize(frame.packed_len(frame.size()), 0);
        self.frame = Some(*frame);
        Ok(&mut self.decoded)
    }

    pub fn set_decoded(&mut self, decoded: Vec<u8>, frame: FrameDescriptor) -> Result<()> {
        frame.validate()?;
        let expected = frame.packed_len(frame.size());
        if decoded.len() != expected {
            return Err(CodecError::BufferSizeMismatch {
                expected,
                actual: decoded.len(),
            });
        }
        self.decoded = decoded;
        self.frame = Some(frame);
        Ok(())
    }

    pub fn frame_descriptor(&self) -> Option<&FrameDescriptor> {
        self.frame.as_ref()
    }

    pub fn encode(&mut self, params: &EncodeParameters) -> Result<()> {
        let frame = self
            .frame
            .ok_or(CodecError::InvalidOperation("no decoded image to encode"))?;
        let mut engine = C::default();
        let result = EncodeMarshaler::new(&frame, params).encode(
            &mut engine,
            &self.decoded,
            &mut self.encoded,
        );
        if result.is_err() {
            self.encoded.open(0);
        }
        result
    }

    pub fn encoded_bytes(&self) -> &[u8] {
        self.encoded.as_bytes()
    }

    pub fn take_encoded(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.encoded, EncodedBuffer::new()).into_vec()
    }
}
