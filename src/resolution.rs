//! Decomposition level to pixel dimension math.
//!
//! Each wavelet decomposition halves the low-pass band, rounding up, so the
//! image at level `L` is `ceil(dim / 2)` applied `L` times to the full
//! resolution size.

use crate::error::{CodecError, Result};
use crate::geometry::Size;

/// Halves `size` (rounding up) `level` times.
pub fn reduce(size: Size, level: u32) -> Size {
    let mut width = size.width;
    let mut height = size.height;
    for _ in 0..level {
        width = width.div_ceil(2);
        height = height.div_ceil(2);
        if width <= 1 && height <= 1 {
            break;
        }
    }
    Size::new(width, height)
}

/// Size of the image reconstructed at decomposition `level`.
///
/// Level 0 is full resolution and `num_decompositions` the coarsest level
/// the codestream can produce; anything above fails with
/// [`CodecError::InvalidLevel`].
pub fn size_at_level(full: Size, level: u32, num_decompositions: u32) -> Result<Size> {
    check_level(level, num_decompositions)?;
    Ok(reduce(full, level))
}

pub fn check_level(level: u32, num_decompositions: u32) -> Result<()> {
    if level > num_decompositions {
        return Err(CodecError::InvalidLevel {
            level,
            num_decompositions,
        });
    }
    Ok(())
}
