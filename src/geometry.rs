//! Tiling, precinct and decomposition layout of a codestream.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::constants::{
    DEFAULT_BLOCK_HEIGHT, DEFAULT_BLOCK_WIDTH, DEFAULT_DECOMPOSITIONS, DEFAULT_NUM_LAYERS,
};
use crate::error::{CodecError, Result};

/// A position on the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Order in which layer/resolution/component/position data appears in the
/// bitstream. Discriminants are the Sprog values of the COD segment, which
/// are also the indices accepted by the encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ProgressionOrder {
    Lrcp = 0,
    Rlcp = 1,
    #[default]
    Rpcl = 2,
    Pcrl = 3,
    Cprl = 4,
}

impl ProgressionOrder {
    pub const ALL: [ProgressionOrder; 5] = [
        ProgressionOrder::Lrcp,
        ProgressionOrder::Rlcp,
        ProgressionOrder::Rpcl,
        ProgressionOrder::Pcrl,
        ProgressionOrder::Cprl,
    ];

    /// Maps an option index 0..=4 to its progression order.
    pub fn from_index(index: usize) -> Result<Self> {
        u8::try_from(index)
            .ok()
            .and_then(|v| Self::try_from(v).ok())
            .ok_or(CodecError::InvalidProgressionOrder(index))
    }

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ProgressionOrder::Lrcp => "LRCP",
            ProgressionOrder::Rlcp => "RLCP",
            ProgressionOrder::Rpcl => "RPCL",
            ProgressionOrder::Pcrl => "PCRL",
            ProgressionOrder::Cprl => "CPRL",
        }
    }

    /// True when resolutions are the outermost loop that matters for a
    /// single-layer, single-precinct tile (LRCP, RLCP, RPCL).
    pub fn is_resolution_major(self) -> bool {
        matches!(
            self,
            ProgressionOrder::Lrcp | ProgressionOrder::Rlcp | ProgressionOrder::Rpcl
        )
    }
}

impl std::fmt::Display for ProgressionOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ProgressionOrder {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|order| order.name().eq_ignore_ascii_case(s))
            .ok_or(CodecError::InvalidProgressionOrder(usize::MAX))
    }
}

/// Tiling, precinct and decomposition layout shared by the decoder (filled
/// from the codestream header) and the encoder (filled from the options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryDescriptor {
    pub image_offset: Point,
    /// (0, 0) means a single tile spanning the image.
    pub tile_size: Size,
    pub tile_offset: Point,
    pub block_dimensions: Size,
    /// One factor per component.
    pub down_sampling: Vec<Point>,
    pub num_decompositions: u32,
    pub num_layers: u16,
    pub progression_order: ProgressionOrder,
    pub is_reversible: bool,
    /// Empty, or exactly `num_decompositions` entries. Empty means no
    /// precinct partition: every level uses the maximum precinct size
    /// (2^15 x 2^15), which is what the header reader reports when COD
    /// does not signal precincts.
    pub precincts: Vec<Size>,
}

impl GeometryDescriptor {
    /// Layout with the encoder defaults for `component_count` components.
    pub fn new(component_count: usize) -> Self {
        Self {
            image_offset: Point::default(),
            tile_size: Size::default(),
            tile_offset: Point::default(),
            block_dimensions: Size::new(DEFAULT_BLOCK_WIDTH, DEFAULT_BLOCK_HEIGHT),
            down_sampling: vec![Point::new(1, 1); component_count],
            num_decompositions: DEFAULT_DECOMPOSITIONS,
            num_layers: DEFAULT_NUM_LAYERS,
            progression_order: ProgressionOrder::default(),
            is_reversible: true,
            precincts: Vec::new(),
        }
    }

    pub fn down_sampling(&self, component: usize) -> Point {
        self.down_sampling
            .get(component)
            .copied()
            .unwrap_or(Point::new(1, 1))
    }

    /// Sample grid of `component` for an image of `image` pixels placed at
    /// `image_offset` on the reference grid.
    pub fn component_size(&self, component: usize, image: Size) -> Size {
        let factor = self.down_sampling(component);
        let span = |offset: u32, extent: u32, d: u32| {
            let d = d.max(1) as u64;
            let offset = offset as u64;
            ((offset + extent as u64).div_ceil(d) - offset.div_ceil(d)) as u32
        };
        Size::new(
            span(self.image_offset.x, image.width, factor.x),
            span(self.image_offset.y, image.height, factor.y),
        )
    }

    /// Precinct size of decomposition level `level`, if precincts are set.
    pub fn precinct(&self, level: usize) -> Option<Size> {
        self.precincts.get(level).copied()
    }

    /// Checks that an image of `image` pixels placed at `image_offset` fits
    /// the 32-bit reference grid and that the tile grid anchored at
    /// `tile_offset` covers the image origin.
    pub fn validate_offsets(&self, image: Size) -> Result<()> {
        let origin = self.image_offset;
        if origin.x.checked_add(image.width).is_none()
            || origin.y.checked_add(image.height).is_none()
        {
            return Err(CodecError::InvalidImageOffset {
                x: origin.x,
                y: origin.y,
            });
        }
        let tile = self.tile_offset;
        let reaches = |offset: u32, size: u32, origin: u32| {
            size == 0 || offset as u64 + size as u64 > origin as u64
        };
        if tile.x > origin.x
            || tile.y > origin.y
            || !reaches(tile.x, self.tile_size.width, origin.x)
            || !reaches(tile.y, self.tile_size.height, origin.y)
        {
            return Err(CodecError::InvalidTileOffset {
                x: tile.x,
                y: tile.y,
            });
        }
        Ok(())
    }

    pub fn validate_precincts(&self) -> Result<()> {
        if !self.precincts.is_empty() && self.precincts.len() != self.num_decompositions as usize
        {
            return Err(CodecError::InvalidPrecinctConfiguration {
                expected: self.num_decompositions as usize,
                actual: self.precincts.len(),
            });
        }
        Ok(())
    }
}
