//! j2kbridge CLI - JPEG 2000 codestream marshaling utility.
//!
//! Decodes codestreams to packed pixel buffers at any resolution level,
//! encodes packed buffers, prints header geometry and benchmarks decoding.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use j2kbridge_rs::{
    Decoder, EncodeParameters, FrameDescriptor, J2kCodestream, Point, ProgressionOrder, Size,
};

/// Packed pixel buffers to and from JPEG 2000 codestreams
#[derive(Parser)]
#[command(name = "j2kbridge")]
#[command(author = "j2kbridge-rs contributors")]
#[command(version)]
#[command(about = "Decode, encode and inspect JPEG 2000 codestreams", long_about = None)]
#[command(after_help = "EXAMPLES:
    j2kbridge decode -i image.j2k -o pixels.raw
    j2kbridge decode -i image.jp2 -o thumb.pgm --level 2 -f pnm
    j2kbridge encode -i pixels.raw -o image.j2k -w 512 -H 512 -n 3 --color-transform
    j2kbridge info -i image.j2k
    j2kbridge bench -i image.j2k --iterations 50

Set RUST_LOG=debug (or pass -v) for engine diagnostics.")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a codestream to packed pixels
    ///
    /// Samples are component-interleaved, one byte per sample up to 8 bits
    /// and two little-endian bytes above.
    #[command(visible_alias = "d")]
    Decode {
        /// Input codestream (.j2k/.j2c) or JP2 file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path for decoded pixels
        #[arg(short, long)]
        output: PathBuf,

        /// Decomposition level to decode at (0 = full resolution)
        #[arg(short, long, default_value = "0")]
        level: u32,

        /// Output format: raw (packed pixels) or pnm (PGM/PPM)
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,
    },

    /// Encode packed pixels to a codestream
    #[command(visible_alias = "e")]
    Encode {
        /// Input packed pixel file
        #[arg(short, long)]
        input: PathBuf,

        /// Output codestream file
        #[arg(short, long)]
        output: PathBuf,

        /// Image width in pixels
        #[arg(short, long)]
        width: u32,

        /// Image height in pixels
        #[arg(short = 'H', long)]
        height: u32,

        /// Number of components
        #[arg(short = 'n', long, default_value = "1")]
        components: usize,

        /// Bits per sample (2-16)
        #[arg(short, long, default_value = "8")]
        bits: u8,

        /// Samples are signed
        #[arg(long)]
        signed: bool,

        /// Number of wavelet decomposition levels
        #[arg(short, long, default_value = "5")]
        decompositions: u32,

        /// Use the irreversible 9/7 path
        #[arg(long)]
        lossy: bool,

        /// Quantization step of the irreversible path, in sample units
        #[arg(long, default_value = "1.0")]
        step: f32,

        /// Progression order (LRCP, RLCP, RPCL, PCRL, CPRL)
        #[arg(short, long, default_value = "RPCL")]
        progression: ProgressionOrder,

        /// Code-block width and height
        #[arg(long, default_value = "64")]
        block: u32,

        /// Apply the multi-component color transform (3+ components)
        #[arg(long)]
        color_transform: bool,

        /// Start a new tile-part at each resolution
        #[arg(long)]
        tile_parts_at_resolutions: bool,

        /// Start a new tile-part at each component
        #[arg(long)]
        tile_parts_at_components: bool,
    },

    /// Display header geometry
    #[command(visible_alias = "i")]
    Info {
        /// Input codestream or JP2 file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Benchmark repeated decoding
    #[command(visible_alias = "b")]
    Bench {
        /// Input codestream or JP2 file
        #[arg(short, long)]
        input: PathBuf,

        /// Number of timed decodes
        #[arg(long, default_value = "10")]
        iterations: u32,

        /// Decomposition level to decode at
        #[arg(short, long, default_value = "0")]
        level: u32,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Packed binary pixel data
    Raw,
    /// Portable GrayMap/PixMap (1 or 3 components)
    Pnm,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Decode {
            input,
            output,
            level,
            format,
        } => decode_image(&input, &output, level, &format),
        Commands::Encode {
            input,
            output,
            width,
            height,
            components,
            bits,
            signed,
            decompositions,
            lossy,
            step,
            progression,
            block,
            color_transform,
            tile_parts_at_resolutions,
            tile_parts_at_components,
        } => {
            let mut frame = FrameDescriptor::new(width, height, bits, components);
            frame.is_signed = signed;
            frame.is_using_color_transform = color_transform;
            EncodeParameters::builder(&frame)
                .decompositions(decompositions)
                .lossless(!lossy)
                .quantization_step(step)
                .progression_order(progression.index())
                .map(|builder| {
                    builder
                        .block_dimensions(Size::new(block, block))
                        .tile_part_divisions(tile_parts_at_resolutions, tile_parts_at_components)
                })
                .and_then(|builder| builder.build())
                .map_err(Into::into)
                .and_then(|params| encode_image(&input, &output, &frame, &params))
        }
        Commands::Info { input } => show_info(&input),
        Commands::Bench {
            input,
            iterations,
            level,
        } => bench_decode(&input, iterations, level),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn decode_image(
    input: &Path,
    output: &Path,
    level: u32,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut decoder = Decoder::<J2kCodestream>::new();
    decoder.set_encoded(fs::read(input)?);
    decoder.read_header()?;
    let size = decoder.calculate_size_at_level(level)?;
    decoder.decode_at_level(level)?;
    let frame = *decoder
        .frame_descriptor()
        .ok_or("decoder did not report a frame")?;
    let pixels = decoder.take_decoded();

    match format {
        OutputFormat::Raw => fs::write(output, &pixels)?,
        OutputFormat::Pnm => write_pnm(output, &pixels, &frame, size)?,
    }

    println!(
        "✓ Decoded {}x{} image ({} components, {} bits) at level {} to {:?}",
        size.width, size.height, frame.component_count, frame.bits_per_sample, level, output
    );
    Ok(())
}

fn encode_image(
    input: &Path,
    output: &Path,
    frame: &FrameDescriptor,
    params: &EncodeParameters,
) -> Result<(), Box<dyn std::error::Error>> {
    let pixels = fs::read(input)?;
    let encoded = j2kbridge_rs::encode(&pixels, frame, params)?;
    fs::write(output, &encoded)?;
    println!(
        "✓ Encoded {}x{} image ({} bytes, {}) to {:?}",
        frame.width,
        frame.height,
        encoded.len(),
        if params.is_lossless() { "lossless" } else { "lossy" },
        output
    );
    Ok(())
}

fn show_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let (frame, geometry) = j2kbridge_rs::read_header(&data)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();
    println!("Dimensions:   {}x{}", frame.width, frame.height);
    println!("Components:   {}", frame.component_count);
    println!(
        "Bit depth:    {} ({})",
        frame.bits_per_sample,
        if frame.is_signed { "signed" } else { "unsigned" }
    );
    println!("Color xform:  {}", frame.is_using_color_transform);
    println!(
        "Wavelet:      {}",
        if geometry.is_reversible { "5/3 reversible" } else { "9/7 irreversible" }
    );
    println!("Progression:  {}", geometry.progression_order);
    println!("Layers:       {}", geometry.num_layers);
    println!(
        "Code-block:   {}x{}",
        geometry.block_dimensions.width, geometry.block_dimensions.height
    );
    println!(
        "Image offset: ({}, {})",
        geometry.image_offset.x, geometry.image_offset.y
    );
    println!(
        "Tile:         {}x{} at ({}, {})",
        geometry.tile_size.width,
        geometry.tile_size.height,
        geometry.tile_offset.x,
        geometry.tile_offset.y
    );
    for (c, Point { x, y }) in geometry.down_sampling.iter().enumerate() {
        if (*x, *y) != (1, 1) {
            println!("Component {c}:  sub-sampled {x}x{y}");
        }
    }
    println!("Levels:       {}", geometry.num_decompositions);
    for level in 0..=geometry.num_decompositions {
        let size = j2kbridge_rs::calculate_size_at_level(
            frame.size(),
            level,
            geometry.num_decompositions,
        )?;
        let precinct = geometry
            .precinct(level as usize)
            .map(|p| format!(", precinct {}x{}", p.width, p.height))
            .unwrap_or_default();
        println!("  level {level}: {}x{}{precinct}", size.width, size.height);
    }
    Ok(())
}

fn bench_decode(
    input: &Path,
    iterations: u32,
    level: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut decoder = Decoder::<J2kCodestream>::new();
    decoder.set_encoded(fs::read(input)?);
    decoder.read_header()?;
    let size = decoder.calculate_size_at_level(level)?;

    // Warm-up decode, also surfaces errors before timing.
    decoder.decode_at_level(level)?;
    debug!(bytes = decoder.decoded_bytes().len(), "warm-up decode done");

    let iterations = iterations.max(1);
    let start = Instant::now();
    for _ in 0..iterations {
        decoder.decode_at_level(level)?;
    }
    let elapsed = start.elapsed().as_secs_f64();

    let per_decode = elapsed / iterations as f64;
    let megapixels = size.area() as f64 / 1_000_000.0;
    info!(iterations, elapsed, "benchmark finished");
    println!(
        "{}x{} at level {}: {:.3} ms/decode, {:.2} MP/s, {:.1} FPS",
        size.width,
        size.height,
        level,
        per_decode * 1000.0,
        megapixels / per_decode,
        1.0 / per_decode
    );
    Ok(())
}

/// PGM/PPM output. Samples above 8 bits are written big-endian as PNM
/// requires.
fn write_pnm(
    path: &Path,
    pixels: &[u8],
    frame: &FrameDescriptor,
    size: Size,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;

    let magic = match frame.component_count {
        1 => "P5",
        3 => "P6",
        n => return Err(format!("PNM output needs 1 or 3 components, image has {n}").into()),
    };
    if frame.is_signed {
        return Err("PNM output needs unsigned samples".into());
    }
    let max_value = (1u32 << frame.bits_per_sample) - 1;

    let mut file = std::io::BufWriter::new(fs::File::create(path)?);
    writeln!(file, "{magic}")?;
    writeln!(file, "{} {}", size.width, size.height)?;
    writeln!(file, "{max_value}")?;
    if frame.bytes_per_pixel() == 1 {
        file.write_all(pixels)?;
    } else {
        for sample in pixels.chunks_exact(2) {
            file.write_all(&[sample[1], sample[0]])?;
        }
    }
    file.flush()?;
    Ok(())
}
