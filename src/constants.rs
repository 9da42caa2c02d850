pub const MINIMUM_WIDTH: u32 = 1;
pub const MAXIMUM_WIDTH: u32 = 65535;
pub const MINIMUM_HEIGHT: u32 = 1;
pub const MAXIMUM_HEIGHT: u32 = 65535;
pub const MINIMUM_COMPONENT_COUNT: usize = 1;
pub const MAXIMUM_COMPONENT_COUNT: usize = 255;
pub const MINIMUM_BITS_PER_SAMPLE: u8 = 2;
pub const MAXIMUM_BITS_PER_SAMPLE: u8 = 16;

// Encoder defaults.
pub const DEFAULT_DECOMPOSITIONS: u32 = 5;
pub const DEFAULT_PROGRESSION_ORDER_INDEX: usize = 2; // RPCL
pub const DEFAULT_BLOCK_WIDTH: u32 = 64;
pub const DEFAULT_BLOCK_HEIGHT: u32 = 64;
pub const DEFAULT_NUM_LAYERS: u16 = 1;

// ISO/IEC 15444-1, Table A.10: SPcod allows at most 32 decomposition levels.
pub const MAXIMUM_DECOMPOSITIONS: u32 = 32;

// ISO/IEC 15444-1, A.6.1: code-block dimensions are powers of two in
// [4, 1024] with xcb + ycb <= 12.
pub const MINIMUM_BLOCK_DIMENSION: u32 = 4;
pub const MAXIMUM_BLOCK_DIMENSION: u32 = 1024;
pub const MAXIMUM_BLOCK_AREA: u32 = 4096;

// PPx/PPy are 4-bit exponents; 15 is also the value implied when no
// precinct sizes are signalled.
pub const MAXIMUM_PRECINCT_EXPONENT: u8 = 15;
pub const DEFAULT_PRECINCT_SIZE: u32 = 1 << MAXIMUM_PRECINCT_EXPONENT;

pub const MAXIMUM_DOWN_SAMPLING: u32 = 255;

// Guard bits written to QCD.
pub const GUARD_BITS: u8 = 1;

// Initial reservation of the encoded output sink.
pub const ENCODED_BUFFER_INITIAL_SIZE: usize = 65536;

// Quantization step of the irreversible path when none is configured, in
// sample units.
pub const DEFAULT_QUANTIZATION_STEP: f32 = 1.0;

// Widest sample the reference engine transforms without overflowing i32.
pub const MAXIMUM_ENGINE_BIT_DEPTH: u8 = 24;
