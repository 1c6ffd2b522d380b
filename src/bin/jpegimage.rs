//! jpegimage CLI - convert between BMP bitmaps and baseline JPEG streams.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use jpegimage_rs::bitmap_source::HostBitmap;
use jpegimage_rs::bmp::BmpBitmap;
use jpegimage_rs::jpeg_stream_reader::JpegStreamReader;
use jpegimage_rs::{CompressionSettings, JpegImage, is_compressed_stream, map_pixel_format, patch_huffman_tables};

/// In-memory JPEG container: compress bitmaps, decompress JPEGs, repair Huffman tables
#[derive(Parser)]
#[command(name = "jpegimage")]
#[command(version)]
#[command(about = "Convert between BMP bitmaps and baseline JPEG streams", long_about = None)]
#[command(after_help = "EXAMPLES:
    jpegimage compress -i photo.bmp -o photo.jpg -q 90
    jpegimage decompress -i photo.jpg -o photo.bmp
    jpegimage patch -i frame.jpg -o fixed.jpg
    jpegimage info -i photo.jpg

Set RUST_LOG=debug (or pass -v) to trace cache and codec activity.")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a BMP (or re-encode a JPEG) into a baseline JPEG
    #[command(visible_alias = "c")]
    Compress {
        #[arg(short, long, help = "Path to the input image file")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the JPEG output file")]
        output: PathBuf,

        /// Quality level (1-100)
        #[arg(short, long, default_value = "75")]
        quality: u8,

        /// Smoothing pre-filter strength (0-100)
        #[arg(short, long, default_value = "0")]
        smoothing: u8,

        /// MCUs between restart markers (0 disables them)
        #[arg(short, long, default_value = "0")]
        restart: u16,
    },

    /// Decompress a JPEG into a BMP bitmap
    #[command(visible_alias = "d")]
    Decompress {
        #[arg(short, long, help = "Path to the JPEG input file")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the BMP output file")]
        output: PathBuf,
    },

    /// Insert the default Huffman tables into a JPEG that lacks them
    #[command(visible_alias = "p")]
    Patch {
        #[arg(short, long, help = "Path to the JPEG input file")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the patched output file")]
        output: PathBuf,
    },

    /// Display image metadata
    #[command(visible_alias = "i")]
    Info {
        #[arg(short, long, help = "Path to the image file to inspect")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            quality,
            smoothing,
            restart,
        } => {
            let settings = CompressionSettings::default()
                .with_quality(quality)
                .with_smoothing_factor(smoothing)
                .with_restart_interval(restart);
            compress_image(&input, &output, &settings)
        }
        Commands::Decompress { input, output } => decompress_image(&input, &output),
        Commands::Patch { input, output } => patch_image(&input, &output),
        Commands::Info { input } => show_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn compress_image(
    input: &PathBuf,
    output: &PathBuf,
    settings: &CompressionSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let mut image = JpegImage::from_stream(&data)?;
    let mut file = fs::File::create(output)?;
    image.write_compressed(&mut file, settings)?;

    println!(
        "✓ Compressed {}x{} image to {:?} at quality {}",
        image.width(),
        image.height(),
        output,
        settings.quality
    );
    Ok(())
}

fn decompress_image(input: &PathBuf, output: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::File::open(input)?;
    let mut image = JpegImage::from_reader(file)?;
    let mut out = fs::File::create(output)?;
    image.write_decompressed(&mut out)?;

    println!(
        "✓ Decompressed {}x{} image ({:?}) to {:?}",
        image.width(),
        image.height(),
        image.colorspace(),
        output
    );
    Ok(())
}

fn patch_image(input: &PathBuf, output: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    if !is_compressed_stream(&data) {
        return Err("input is not a JPEG stream".into());
    }
    let patched = patch_huffman_tables(&data);
    let inserted = patched.patched;
    fs::write(output, patched.data.as_ref())?;

    if inserted {
        println!("✓ Inserted default Huffman tables, wrote {:?}", output);
    } else {
        println!("✓ Stream already usable, copied unchanged to {:?}", output);
    }
    Ok(())
}

fn show_info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();

    if is_compressed_stream(&data) {
        println!("Format: JPEG");
        let patched = patch_huffman_tables(&data);
        let mut reader = JpegStreamReader::new(&patched.data);
        reader.read_header()?;
        let info = reader.frame_info()?;
        println!("  Dimensions: {}x{}", info.width, info.height);
        println!("  Bit depth:  {} bits", info.bits_per_sample);
        println!("  Components: {}", info.component_count);
        println!("  Stored as:  {:?}", reader.stored_colorspace());
        println!("  Huffman:    {}", if patched.patched { "missing (default tables apply)" } else { "present" });
        if reader.restart_interval > 0 {
            println!("  Restart:    every {} MCUs", reader.restart_interval);
        }
    } else if BmpBitmap::is_bmp(&data) {
        println!("Format: BMP");
        let bitmap = BmpBitmap::parse(&data)?;
        let layout = map_pixel_format(bitmap.pixel_format());
        println!("  Dimensions: {}x{}", bitmap.width(), bitmap.height());
        println!("  Bits/pixel: {}", bitmap.pixel_format().bits_per_pixel());
        println!(
            "  Samples:    {} x {}-bit {:?}",
            layout.components_per_sample, layout.bits_per_component, layout.colorspace
        );
    } else {
        println!("Format: Unknown");
    }

    Ok(())
}
