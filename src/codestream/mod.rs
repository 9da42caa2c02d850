//! The codestream engine seam.
//!
//! The marshaling core never touches bitstream syntax or wavelet math; it
//! drives an engine through [`Codestream`], one sample line at a time. The
//! crate ships [`J2kCodestream`], a reference engine built on the submodules
//! below:
//!
//! - `marker` / `reader` / `writer` / `parser`: JPEG 2000 Part 1 marker
//!   segments (SOC, SIZ, COD, QCD, SOT, SOD, EOC).
//! - `jp2`: locating the codestream inside a JP2 container.
//! - `dwt`: reversible 5/3 and irreversible 9/7 lifting transforms.
//! - `mct`: reversible (RCT) and irreversible (ICT) component transforms.
//! - `quantization`: dead-zone scalar quantization and QCD step coding.
//! - `tile`: coefficient planes and their tile-part payload layout.

mod buffer;
mod dwt;
mod engine;
mod jp2;
mod marker;
mod mct;
mod parser;
mod quantization;
mod reader;
mod tile;
mod writer;

pub use buffer::EncodedBuffer;
pub use engine::J2kCodestream;

use crate::constants::{
    DEFAULT_BLOCK_HEIGHT, DEFAULT_BLOCK_WIDTH, DEFAULT_DECOMPOSITIONS, DEFAULT_NUM_LAYERS,
    DEFAULT_PRECINCT_SIZE,
};
use crate::error::{CodecError, Result};
use crate::geometry::{Point, ProgressionOrder, Size};

/// Per-component sample format as signalled in SIZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub bit_depth: u8,
    pub is_signed: bool,
    pub down_sampling: Point,
}

impl Default for ComponentInfo {
    fn default() -> Self {
        Self {
            bit_depth: 8,
            is_signed: false,
            down_sampling: Point::new(1, 1),
        }
    }
}

/// Image and tile size parameters (SIZ).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizParams {
    /// Bottom-right corner of the image area on the reference grid.
    pub image_extent: Point,
    pub image_offset: Point,
    /// (0, 0) means one tile covering the whole image.
    pub tile_size: Size,
    pub tile_offset: Point,
    pub components: Vec<ComponentInfo>,
}

impl SizParams {
    pub fn set_num_components(&mut self, count: usize) {
        self.components.resize(count, ComponentInfo::default());
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn set_component(
        &mut self,
        component: usize,
        down_sampling: Point,
        bit_depth: u8,
        is_signed: bool,
    ) {
        if component >= self.components.len() {
            self.set_num_components(component + 1);
        }
        self.components[component] = ComponentInfo {
            bit_depth,
            is_signed,
            down_sampling,
        };
    }

    pub fn bit_depth(&self, component: usize) -> u8 {
        self.components.get(component).map_or(0, |c| c.bit_depth)
    }

    pub fn is_signed(&self, component: usize) -> bool {
        self.components.get(component).is_some_and(|c| c.is_signed)
    }

    pub fn down_sampling(&self, component: usize) -> Point {
        self.components
            .get(component)
            .map_or(Point::new(1, 1), |c| c.down_sampling)
    }

    /// Width and height of the image area (extent minus offset).
    pub fn image_size(&self) -> Size {
        Size::new(
            self.image_extent.x.saturating_sub(self.image_offset.x),
            self.image_extent.y.saturating_sub(self.image_offset.y),
        )
    }

    /// Sample grid of one component: `ceil(x1 / dx) - ceil(x0 / dx)` per axis.
    pub fn component_size(&self, component: usize) -> Size {
        let ds = self.down_sampling(component);
        let dx = ds.x.max(1);
        let dy = ds.y.max(1);
        Size::new(
            self.image_extent.x.div_ceil(dx) - self.image_offset.x.div_ceil(dx),
            self.image_extent.y.div_ceil(dy) - self.image_offset.y.div_ceil(dy),
        )
    }

    /// Span of the tile grid from its offset to the image extent; empty when
    /// the offset lies past the extent.
    fn tiled_span(&self) -> Size {
        Size::new(
            self.image_extent.x.saturating_sub(self.tile_offset.x),
            self.image_extent.y.saturating_sub(self.tile_offset.y),
        )
    }

    /// Tile dimensions with the (0, 0) shorthand resolved.
    pub fn effective_tile_size(&self) -> Size {
        if self.tile_size.width == 0 || self.tile_size.height == 0 {
            self.tiled_span()
        } else {
            self.tile_size
        }
    }

    /// Number of tiles across and down.
    pub fn tile_grid(&self) -> (u32, u32) {
        let tile = self.effective_tile_size();
        if tile.width == 0 || tile.height == 0 {
            return (0, 0);
        }
        let span = self.tiled_span();
        (span.width.div_ceil(tile.width), span.height.div_ceil(tile.height))
    }

    /// The tile grid must start at or above-left of the image origin and its
    /// first tile must reach it.
    pub fn validate_tile_grid(&self) -> Result<()> {
        let tile = self.effective_tile_size();
        if self.tile_offset.x > self.image_offset.x
            || self.tile_offset.y > self.image_offset.y
            || self.tile_offset.x as u64 + tile.width as u64 <= self.image_offset.x as u64
            || self.tile_offset.y as u64 + tile.height as u64 <= self.image_offset.y as u64
        {
            return Err(CodecError::codestream(
                "tile grid does not cover the image origin",
            ));
        }
        Ok(())
    }
}

/// Coding style parameters (COD).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodParams {
    pub num_decompositions: u32,
    pub block_dims: Size,
    pub progression_order: ProgressionOrder,
    pub num_layers: u16,
    pub reversible: bool,
    pub color_transform: bool,
    /// Precinct size per resolution, index 0 being the coarsest. A short
    /// list repeats its last entry; an empty list means no precinct
    /// partition (maximum precinct size everywhere).
    pub precincts: Vec<Size>,
}

impl Default for CodParams {
    fn default() -> Self {
        Self {
            num_decompositions: DEFAULT_DECOMPOSITIONS,
            block_dims: Size::new(DEFAULT_BLOCK_WIDTH, DEFAULT_BLOCK_HEIGHT),
            progression_order: ProgressionOrder::default(),
            num_layers: DEFAULT_NUM_LAYERS,
            reversible: true,
            color_transform: false,
            precincts: Vec::new(),
        }
    }
}

impl CodParams {
    pub fn has_precincts(&self) -> bool {
        !self.precincts.is_empty()
    }

    pub fn precinct_size(&self, resolution: usize) -> Size {
        match self.precincts.last() {
            None => Size::new(DEFAULT_PRECINCT_SIZE, DEFAULT_PRECINCT_SIZE),
            Some(last) => self.precincts.get(resolution).copied().unwrap_or(*last),
        }
    }
}

/// Quantization parameters (QCD).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QcdParams {
    /// Base step of the irreversible path; unused when reversible.
    pub irreversible_step: Option<f32>,
}

impl QcdParams {
    pub fn set_irrev_quant(&mut self, step: f32) {
        self.irreversible_step = Some(step);
    }
}

/// One reconstructed line of one component, borrowed from the engine until
/// the next `pull_line` call.
#[derive(Debug)]
pub struct SampleLine<'a> {
    pub component: usize,
    pub samples: &'a [i32],
}

/// An engine-owned line to be filled with source samples of `component`.
/// Ownership returns to the engine on the next `exchange_line` call.
#[derive(Debug)]
pub struct LineSlot<'a> {
    pub component: usize,
    pub samples: &'a mut [i32],
}

/// A JPEG 2000 codestream engine driven one scanline at a time.
///
/// Decoding: `enable_resilience` (optional), `read_headers`, optional
/// `restrict_input_resolution` / `set_planar`, `create`, then `pull_line`
/// until it yields `None`.
///
/// Encoding: fill `siz_mut` / `cod_mut` / `qcd_mut`, `set_planar`,
/// `write_headers`, then `exchange_line` until it yields `None`, `flush`,
/// `close`.
pub trait Codestream {
    /// Tolerate damaged tile data instead of failing. Header errors still fail.
    fn enable_resilience(&mut self);

    fn read_headers(&mut self, source: &[u8]) -> Result<()>;

    fn siz(&self) -> &SizParams;
    fn siz_mut(&mut self) -> &mut SizParams;
    fn cod(&self) -> &CodParams;
    fn cod_mut(&mut self) -> &mut CodParams;
    fn qcd_mut(&mut self) -> &mut QcdParams;

    /// Discards the finest `skipped_res_for_data` resolutions from the input
    /// and reconstructs `skipped_res_for_recon` levels below full resolution.
    fn restrict_input_resolution(&mut self, skipped_res_for_data: u32, skipped_res_for_recon: u32);

    /// Planar: every line of component 0, then component 1, ...
    /// Interleaved: line 0 of every component, then line 1, ...
    fn set_planar(&mut self, planar: bool);

    /// Starts a new tile-part whenever the resolution and/or component of
    /// the emitted data changes.
    fn set_tilepart_divisions(&mut self, at_resolutions: bool, at_components: bool);

    /// Decodes the tile data read by `read_headers`.
    fn create(&mut self) -> Result<()>;

    fn pull_line(&mut self) -> Result<Option<SampleLine<'_>>>;

    fn write_headers(&mut self, sink: &mut EncodedBuffer) -> Result<()>;

    /// Commits the previously returned slot and hands out the next one.
    fn exchange_line(&mut self) -> Result<Option<LineSlot<'_>>>;

    /// Transforms the collected lines and writes the tile-parts and EOC.
    fn flush(&mut self, sink: &mut EncodedBuffer) -> Result<()>;

    /// Releases all per-image state.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_size_follows_reference_grid() {
        let mut siz = SizParams {
            image_extent: Point::new(11, 7),
            image_offset: Point::new(1, 0),
            ..Default::default()
        };
        siz.set_component(0, Point::new(1, 1), 8, false);
        siz.set_component(1, Point::new(2, 2), 8, false);
        assert_eq!(siz.image_size(), Size::new(10, 7));
        assert_eq!(siz.component_size(0), Size::new(10, 7));
        // ceil(11/2) - ceil(1/2) = 5, ceil(7/2) - 0 = 4
        assert_eq!(siz.component_size(1), Size::new(5, 4));
    }

    #[test]
    fn zero_tile_size_means_single_tile() {
        let siz = SizParams {
            image_extent: Point::new(300, 200),
            ..Default::default()
        };
        assert_eq!(siz.effective_tile_size(), Size::new(300, 200));
        assert_eq!(siz.tile_grid(), (1, 1));

        let tiled = SizParams {
            tile_size: Size::new(128, 128),
            ..siz
        };
        assert_eq!(tiled.tile_grid(), (3, 2));
    }

    #[test]
    fn tile_offset_past_extent_does_not_wrap() {
        let siz = SizParams {
            image_extent: Point::new(4, 4),
            tile_offset: Point::new(10, 10),
            ..Default::default()
        };
        assert_eq!(siz.effective_tile_size(), Size::new(0, 0));
        assert_eq!(siz.tile_grid(), (0, 0));
        assert!(matches!(
            siz.validate_tile_grid(),
            Err(CodecError::CodestreamError(_))
        ));
    }

    #[test]
    fn tile_grid_must_cover_image_origin() {
        let siz = SizParams {
            image_extent: Point::new(9, 7),
            image_offset: Point::new(5, 3),
            tile_offset: Point::new(2, 1),
            ..Default::default()
        };
        assert!(siz.validate_tile_grid().is_ok());

        let beyond = SizParams {
            tile_offset: Point::new(6, 1),
            ..siz.clone()
        };
        assert!(beyond.validate_tile_grid().is_err());

        let short = SizParams {
            tile_size: Size::new(3, 8),
            ..siz
        };
        assert!(short.validate_tile_grid().is_err());
    }

    #[test]
    fn short_precinct_list_repeats_last_entry() {
        let cod = CodParams {
            num_decompositions: 3,
            precincts: vec![Size::new(64, 64), Size::new(128, 128)],
            ..Default::default()
        };
        assert_eq!(cod.precinct_size(0), Size::new(64, 64));
        assert_eq!(cod.precinct_size(3), Size::new(128, 128));
        assert_eq!(
            CodParams::default().precinct_size(2),
            Size::new(DEFAULT_PRECINCT_SIZE, DEFAULT_PRECINCT_SIZE)
        );
    }
}
