//! Pixel-buffer marshaling and multi-resolution geometry for JPEG 2000
//! codestreams.
//!
//! The crate moves packed, possibly sub-sampled pixel buffers to and from a
//! codestream engine one scanline at a time, and derives the tiling,
//! precinct and decomposition-level geometry a caller needs to size its
//! buffers. The engine sits behind [`codestream::Codestream`]; the bundled
//! [`J2kCodestream`] reference engine is used by the free functions below.
//!
//! ```no_run
//! use j2kbridge_rs::{EncodeParameters, FrameDescriptor};
//!
//! let frame = FrameDescriptor::new(256, 256, 8, 1);
//! let pixels = vec![0u8; 256 * 256];
//! let params = EncodeParameters::builder(&frame).decompositions(3).build()?;
//! let encoded = j2kbridge_rs::encode(&pixels, &frame, &params)?;
//! let half = j2kbridge_rs::decode_at_level(&encoded, 1)?;
//! assert_eq!(half.len(), 128 * 128);
//! # Ok::<(), j2kbridge_rs::CodecError>(())
//! ```

pub mod codestream;
pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod geometry;
pub mod header;
pub mod parameters;
pub mod resolution;
pub mod sample;

pub use codestream::{Codestream, EncodedBuffer, J2kCodestream};
pub use decoder::{DecodeMarshaler, Decoder, LineLayout};
pub use encoder::{EncodeMarshaler, Encoder};
pub use error::{CodecError, Result};
pub use geometry::{GeometryDescriptor, Point, ProgressionOrder, Size};
pub use parameters::{EncodeParameters, EncodeParametersBuilder};
pub use sample::SampleEncoding;

use constants::{
    MAXIMUM_BITS_PER_SAMPLE, MAXIMUM_COMPONENT_COUNT, MAXIMUM_HEIGHT, MAXIMUM_WIDTH,
    MINIMUM_BITS_PER_SAMPLE, MINIMUM_COMPONENT_COUNT, MINIMUM_HEIGHT, MINIMUM_WIDTH,
};

/// Sample format of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u8,
    pub component_count: usize,
    pub is_signed: bool,
    pub is_using_color_transform: bool,
}

impl FrameDescriptor {
    pub fn new(width: u32, height: u32, bits_per_sample: u8, component_count: usize) -> Self {
        Self {
            width,
            height,
            bits_per_sample,
            component_count,
            is_signed: false,
            is_using_color_transform: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MINIMUM_WIDTH..=MAXIMUM_WIDTH).contains(&self.width) {
            return Err(CodecError::InvalidArgumentWidth(self.width));
        }
        if !(MINIMUM_HEIGHT..=MAXIMUM_HEIGHT).contains(&self.height) {
            return Err(CodecError::InvalidArgumentHeight(self.height));
        }
        if !(MINIMUM_BITS_PER_SAMPLE..=MAXIMUM_BITS_PER_SAMPLE).contains(&self.bits_per_sample) {
            return Err(CodecError::InvalidArgumentBitsPerSample(self.bits_per_sample));
        }
        if !(MINIMUM_COMPONENT_COUNT..=MAXIMUM_COMPONENT_COUNT).contains(&self.component_count) {
            return Err(CodecError::InvalidArgumentComponentCount(self.component_count));
        }
        Ok(())
    }

    /// ceil(bits_per_sample / 8): 1 or 2.
    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_sample.div_ceil(8) as usize
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Byte length of a packed buffer of `size` pixels in this format.
    pub fn packed_len(&self, size: Size) -> usize {
        size.area() * self.component_count * self.bytes_per_pixel()
    }
}

/// Parses only the main header of `encoded`.
pub fn read_header(encoded: &[u8]) -> Result<(FrameDescriptor, GeometryDescriptor)> {
    header::read_header(&mut J2kCodestream::new(), encoded)
}

/// Decodes `encoded` at full resolution.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>> {
    decode_at_level(encoded, 0)
}

/// Decodes `encoded` at decomposition `level` (0 = full resolution).
pub fn decode_at_level(encoded: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut decoder = Decoder::<J2kCodestream>::new();
    decoder.set_encoded(encoded.to_vec());
    decoder.decode_at_level(level)?;
    Ok(decoder.take_decoded())
}

/// Encodes a packed `pixels` buffer described by `frame`.
pub fn encode(pixels: &[u8], frame: &FrameDescriptor, params: &EncodeParameters) -> Result<Vec<u8>> {
    let mut encoder = Encoder::<J2kCodestream>::new();
    encoder.set_decoded(pixels.to_vec(), *frame)?;
    encoder.encode(params)?;
    Ok(encoder.take_encoded())
}

/// Size of a `full` image at decomposition `level` of a codestream with
/// `num_decompositions` levels.
pub fn calculate_size_at_level(full: Size, level: u32, num_decompositions: u32) -> Result<Size> {
    resolution::size_at_level(full, level, num_decompositions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_validation_bounds() {
        assert!(FrameDescriptor::new(1, 1, 2, 1).validate().is_ok());
        assert!(FrameDescriptor::new(65535, 65535, 16, 255).validate().is_ok());
        assert_eq!(
            FrameDescriptor::new(0, 1, 8, 1).validate(),
            Err(CodecError::InvalidArgumentWidth(0))
        );
        assert_eq!(
            FrameDescriptor::new(1, 65536, 8, 1).validate(),
            Err(CodecError::InvalidArgumentHeight(65536))
        );
        assert_eq!(
            FrameDescriptor::new(1, 1, 17, 1).validate(),
            Err(CodecError::InvalidArgumentBitsPerSample(17))
        );
        assert_eq!(
            FrameDescriptor::new(1, 1, 8, 256).validate(),
            Err(CodecError::InvalidArgumentComponentCount(256))
        );
    }

    #[test]
    fn bytes_per_pixel_rounds_up() {
        assert_eq!(FrameDescriptor::new(1, 1, 2, 1).bytes_per_pixel(), 1);
        assert_eq!(FrameDescriptor::new(1, 1, 8, 1).bytes_per_pixel(), 1);
        assert_eq!(FrameDescriptor::new(1, 1, 9, 1).bytes_per_pixel(), 2);
        assert_eq!(FrameDescriptor::new(1, 1, 16, 3).packed_len(Size::new(4, 2)), 48);
    }
}
