//! Packed sample encodings.
//!
//! A packed buffer stores each sample in `ceil(bits_per_sample / 8)` bytes.
//! Converting to and from the engine's `i32` lines goes through
//! [`SampleEncoding`], which saturates on the way out: reconstruction can
//! overshoot the nominal range even for lossless streams.

use crate::FrameDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// One byte per sample, [0, 255].
    U8,
    /// Two bytes per sample, little-endian two's complement, [-32768, 32767].
    I16,
    /// Two bytes per sample, little-endian, [0, 65535].
    U16,
}

impl SampleEncoding {
    pub fn for_frame(frame: &FrameDescriptor) -> Self {
        Self::new(frame.bits_per_sample, frame.is_signed)
    }

    pub fn new(bits_per_sample: u8, is_signed: bool) -> Self {
        match (bits_per_sample.div_ceil(8), is_signed) {
            (0 | 1, _) => SampleEncoding::U8,
            (_, true) => SampleEncoding::I16,
            (_, false) => SampleEncoding::U16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::U8 => 1,
            SampleEncoding::I16 | SampleEncoding::U16 => 2,
        }
    }

    /// Clamps `value` to the encoding's range and writes it to the start of
    /// `out`.
    #[inline]
    pub fn store(self, value: i32, out: &mut [u8]) {
        match self {
            SampleEncoding::U8 => out[0] = value.clamp(0, u8::MAX as i32) as u8,
            SampleEncoding::I16 => {
                let v = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                out[..2].copy_from_slice(&v.to_le_bytes());
            }
            SampleEncoding::U16 => {
                let v = value.clamp(0, u16::MAX as i32) as u16;
                out[..2].copy_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Reads one sample from the start of `bytes`, widened to `i32`.
    #[inline]
    pub fn load(self, bytes: &[u8]) -> i32 {
        match self {
            SampleEncoding::U8 => bytes[0] as i32,
            SampleEncoding::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            SampleEncoding::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        }
    }
}
