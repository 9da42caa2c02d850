//! Encoder options and their translation into engine configuration.

use crate::FrameDescriptor;
use crate::codestream::Codestream;
use crate::constants::{
    DEFAULT_PROGRESSION_ORDER_INDEX, DEFAULT_QUANTIZATION_STEP, MAXIMUM_BLOCK_AREA,
    MAXIMUM_BLOCK_DIMENSION, MAXIMUM_DECOMPOSITIONS, MAXIMUM_DOWN_SAMPLING,
    MAXIMUM_PRECINCT_EXPONENT, MINIMUM_BLOCK_DIMENSION,
};
use crate::error::{CodecError, Result};
use crate::geometry::{GeometryDescriptor, Point, ProgressionOrder, Size};

/// Validated encoder options. Built once per encode with
/// [`EncodeParameters::builder`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParameters {
    pub geometry: GeometryDescriptor,
    /// Step of the irreversible path in sample units; ignored when lossless.
    pub quantization_step: f32,
    pub color_transform: bool,
    pub tile_parts_at_resolutions: bool,
    pub tile_parts_at_components: bool,
}

impl EncodeParameters {
    pub fn builder(frame: &FrameDescriptor) -> EncodeParametersBuilder {
        EncodeParametersBuilder::new(frame)
    }

    pub fn is_lossless(&self) -> bool {
        self.geometry.is_reversible
    }

    pub fn component_count(&self) -> usize {
        self.geometry.down_sampling.len()
    }

    /// Configures coding style, quantization and tile-part division of the
    /// engine. Image and tile size parameters are set by the encoder, which
    /// also knows the frame.
    pub fn apply<C: Codestream + ?Sized>(&self, codestream: &mut C) {
        let geometry = &self.geometry;
        let cod = codestream.cod_mut();
        cod.num_decompositions = geometry.num_decompositions;
        cod.block_dims = geometry.block_dimensions;
        cod.progression_order = geometry.progression_order;
        cod.num_layers = geometry.num_layers;
        cod.reversible = geometry.is_reversible;
        cod.color_transform = self.color_transform;
        cod.precincts = geometry.precincts.clone();
        if !geometry.is_reversible {
            codestream.qcd_mut().set_irrev_quant(self.quantization_step);
        }
        codestream.set_tilepart_divisions(
            self.tile_parts_at_resolutions,
            self.tile_parts_at_components,
        );
    }
}

/// Consuming builder for [`EncodeParameters`].
#[derive(Debug, Clone)]
pub struct EncodeParametersBuilder {
    params: EncodeParameters,
    image: Size,
}

impl EncodeParametersBuilder {
    fn new(frame: &FrameDescriptor) -> Self {
        let mut geometry = GeometryDescriptor::new(frame.component_count);
        geometry.progression_order = ProgressionOrder::from_index(DEFAULT_PROGRESSION_ORDER_INDEX)
            .unwrap_or_default();
        Self {
            params: EncodeParameters {
                geometry,
                quantization_step: DEFAULT_QUANTIZATION_STEP,
                color_transform: frame.is_using_color_transform,
                tile_parts_at_resolutions: false,
                tile_parts_at_components: false,
            },
            image: frame.size(),
        }
    }

    /// Also clears the precinct list, whose length depends on this value.
    pub fn decompositions(mut self, num_decompositions: u32) -> Self {
        self.params.geometry.num_decompositions = num_decompositions;
        self.params.geometry.precincts.clear();
        self
    }

    pub fn lossless(mut self, lossless: bool) -> Self {
        self.params.geometry.is_reversible = lossless;
        self
    }

    pub fn quantization_step(mut self, step: f32) -> Self {
        self.params.quantization_step = step;
        self
    }

    /// Index 0..=4 into LRCP, RLCP, RPCL, PCRL, CPRL.
    pub fn progression_order(mut self, index: usize) -> Result<Self> {
        self.params.geometry.progression_order = ProgressionOrder::from_index(index)?;
        Ok(self)
    }

    pub fn block_dimensions(mut self, size: Size) -> Self {
        self.params.geometry.block_dimensions = size;
        self
    }

    /// One precinct size per decomposition level; the length must match the
    /// current decomposition count.
    pub fn precincts(mut self, precincts: Vec<Size>) -> Result<Self> {
        let expected = self.params.geometry.num_decompositions as usize;
        if precincts.len() != expected {
            return Err(CodecError::InvalidPrecinctConfiguration {
                expected,
                actual: precincts.len(),
            });
        }
        self.params.geometry.precincts = precincts;
        Ok(self)
    }

    pub fn down_sampling(mut self, component: usize, factor: Point) -> Result<Self> {
        let count = self.params.geometry.down_sampling.len();
        let slot = self
            .params
            .geometry
            .down_sampling
            .get_mut(component)
            .ok_or(CodecError::InvalidArgumentComponentCount(count))?;
        *slot = factor;
        Ok(self)
    }

    /// Position of the image on the reference grid; `offset + size` must fit
    /// in 32 bits.
    pub fn image_offset(mut self, offset: Point) -> Self {
        self.params.geometry.image_offset = offset;
        self
    }

    pub fn tile_size(mut self, size: Size) -> Self {
        self.params.geometry.tile_size = size;
        self
    }

    /// Must not lie right of or below the image offset, and the first tile
    /// must reach the image origin.
    pub fn tile_offset(mut self, offset: Point) -> Self {
        self.params.geometry.tile_offset = offset;
        self
    }

    /// Values below one are raised to one.
    pub fn num_layers(mut self, layers: u16) -> Self {
        self.params.geometry.num_layers = layers.max(1);
        self
    }

    pub fn color_transform(mut self, enabled: bool) -> Self {
        self.params.color_transform = enabled;
        self
    }

    pub fn tile_part_divisions(mut self, at_resolutions: bool, at_components: bool) -> Self {
        self.params.tile_parts_at_resolutions = at_resolutions;
        self.params.tile_parts_at_components = at_components;
        self
    }

    pub fn build(self) -> Result<EncodeParameters> {
        let params = self.params;
        let geometry = &params.geometry;

        geometry.validate_offsets(self.image)?;
        if geometry.num_decompositions > MAXIMUM_DECOMPOSITIONS {
            return Err(CodecError::InvalidDecompositions(geometry.num_decompositions));
        }

        let block = geometry.block_dimensions;
        let valid_block = |d: u32| {
            d.is_power_of_two() && (MINIMUM_BLOCK_DIMENSION..=MAXIMUM_BLOCK_DIMENSION).contains(&d)
        };
        if !valid_block(block.width)
            || !valid_block(block.height)
            || block.width * block.height > MAXIMUM_BLOCK_AREA
        {
            return Err(CodecError::InvalidBlockDimensions {
                width: block.width,
                height: block.height,
            });
        }

        geometry.validate_precincts()?;
        let valid_precinct =
            |d: u32| d.is_power_of_two() && d.trailing_zeros() <= MAXIMUM_PRECINCT_EXPONENT as u32;
        if let Some(bad) = geometry
            .precincts
            .iter()
            .find(|p| !valid_precinct(p.width) || !valid_precinct(p.height))
        {
            return Err(CodecError::InvalidPrecinctSize {
                width: bad.width,
                height: bad.height,
            });
        }

        if !geometry.is_reversible
            && (!params.quantization_step.is_finite() || params.quantization_step <= 0.0)
        {
            return Err(CodecError::InvalidQuantizationStep(params.quantization_step));
        }

        for (component, factor) in geometry.down_sampling.iter().enumerate() {
            let valid = |d: u32| (1..=MAXIMUM_DOWN_SAMPLING).contains(&d);
            if !valid(factor.x) || !valid(factor.y) {
                return Err(CodecError::InvalidDownSampling {
                    component,
                    x: factor.x,
                    y: factor.y,
                });
            }
        }

        if params.color_transform && geometry.down_sampling.len() < 3 {
            return Err(CodecError::InvalidArgumentComponentCount(
                geometry.down_sampling.len(),
            ));
        }
        Ok(params)
    }
}
