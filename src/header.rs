//! Frame and geometry extraction from a codestream main header.

use crate::FrameDescriptor;
use crate::codestream::Codestream;
use crate::error::{CodecError, Result};
use crate::geometry::{GeometryDescriptor, Point};

/// Reads the main header of `encoded` in resilient mode and describes it.
/// No tile data is decoded.
pub fn read_header<C: Codestream + ?Sized>(
    codestream: &mut C,
    encoded: &[u8],
) -> Result<(FrameDescriptor, GeometryDescriptor)> {
    codestream.enable_resilience();
    codestream.read_headers(encoded)?;
    describe(codestream)
}

/// Builds the frame and geometry descriptors from headers the engine has
/// already read. Bit depth and signedness are taken from component 0.
pub fn describe<C: Codestream + ?Sized>(
    codestream: &C,
) -> Result<(FrameDescriptor, GeometryDescriptor)> {
    let siz = codestream.siz();
    let cod = codestream.cod();

    let size = siz.image_size();
    let frame = FrameDescriptor {
        width: size.width,
        height: size.height,
        bits_per_sample: siz.bit_depth(0),
        component_count: siz.num_components(),
        is_signed: siz.is_signed(0),
        is_using_color_transform: cod.color_transform,
    };
    frame
        .validate()
        .map_err(|err| CodecError::codestream(format!("unsupported image: {err}")))?;

    let precincts = if cod.has_precincts() {
        (0..cod.num_decompositions as usize)
            .map(|level| cod.precinct_size(level))
            .collect()
    } else {
        Vec::new()
    };

    let geometry = GeometryDescriptor {
        image_offset: siz.image_offset,
        tile_size: siz.tile_size,
        tile_offset: siz.tile_offset,
        block_dimensions: cod.block_dims,
        down_sampling: (0..siz.num_components())
            .map(|c| siz.down_sampling(c))
            .collect::<Vec<Point>>(),
        num_decompositions: cod.num_decompositions,
        num_layers: cod.num_layers,
        progression_order: cod.progression_order,
        is_reversible: cod.reversible,
        precincts,
    };
    Ok((frame, geometry))
}
