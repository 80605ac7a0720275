#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use uirt_core::formats::{DecodeFlags, TargetFormat};
use uirt_core::header::{parse_slice_descs, FileHeader};
use uirt_core::transcoder::Transcoder;

#[derive(Parser)]
#[command(name = "uirt", version, author, about = "Inspect and transcode universal intermediate representation texture files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a file's header and print its slice descriptor table.
    Info {
        /// Path to a `.uirt` file.
        path: PathBuf,
    },
    /// Transcode one image/level pair into a target GPU block format.
    Transcode {
        /// Path to a `.uirt` file.
        path: PathBuf,
        /// Image index to transcode.
        #[arg(long, default_value_t = 0)]
        image: u16,
        /// Mip level index to transcode.
        #[arg(long, default_value_t = 0)]
        level: u8,
        /// Target GPU block format.
        #[arg(long, value_enum)]
        format: Format,
        /// Output path for the raw block buffer.
        #[arg(long)]
        output: PathBuf,
        /// Force BC1 (and BC3's color half) into 4-color mode.
        #[arg(long)]
        forbid_three_color: bool,
        /// PVRTC1 modulation addressing wraps at slice edges instead of clamping.
        #[arg(long)]
        wrap: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Etc1,
    Bc1,
    Bc4,
    Bc3,
    Bc5,
    Bc7M6,
    Pvrtc1,
    Etc2EacA8,
}

impl From<Format> for TargetFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Etc1 => TargetFormat::Etc1,
            Format::Bc1 => TargetFormat::Bc1,
            Format::Bc4 => TargetFormat::Bc4,
            Format::Bc3 => TargetFormat::Bc3,
            Format::Bc5 => TargetFormat::Bc5,
            Format::Bc7M6 => TargetFormat::Bc7M6,
            Format::Pvrtc1 => TargetFormat::Pvrtc1,
            Format::Etc2EacA8 => TargetFormat::Etc2EacA8,
        }
    }
}

fn run_info(path: &PathBuf) -> uirt_core::errors::Result<()> {
    let file = std::fs::read(path).map_err(|_| uirt_core::errors::Error::BufferTooSmall("could not read input file"))?;
    let header = FileHeader::parse(&file)?;
    header.validate_in_bounds(file.len())?;
    let descs = parse_slice_descs(&file, &header)?;

    println!("version:          0x{:04x}", header.version);
    println!("texture_type:     {:?}", header.texture_type);
    println!("total_images:     {}", header.total_images);
    println!("total_slices:     {}", header.total_slices);
    println!("total_endpoints:  {}", header.total_endpoints);
    println!("total_selectors:  {}", header.total_selectors);
    println!("y_flipped:        {}", header.is_y_flipped());
    println!("has_alpha_slices: {}", header.has_alpha_slices());
    println!();
    println!("{:>6} {:>6} {:>6} {:>6} {:>6}", "image", "level", "alpha", "nbx", "nby");
    for desc in &descs {
        println!("{:>6} {:>6} {:>6} {:>6} {:>6}", desc.image_index, desc.level_index, desc.is_alpha, desc.num_blocks_x, desc.num_blocks_y);
    }

    Ok(())
}

fn run_transcode(
    path: &PathBuf,
    image: u16,
    level: u8,
    format: Format,
    output: &PathBuf,
    forbid_three_color: bool,
    wrap: bool,
) -> uirt_core::errors::Result<()> {
    let file = std::fs::read(path).map_err(|_| uirt_core::errors::Error::BufferTooSmall("could not read input file"))?;
    let header = FileHeader::parse(&file)?;
    let descs = parse_slice_descs(&file, &header)?;

    let mut transcoder = Transcoder::new();
    transcoder.start_transcoding(&file, &header)?;

    let target: TargetFormat = format.into();
    let color_desc = descs
        .iter()
        .find(|d| d.image_index == image && d.level_index == level && !d.is_alpha)
        .ok_or(uirt_core::errors::Error::UnsupportedRequest("no color slice for the requested image/level"))?;
    let total_blocks = color_desc.num_blocks_x as usize * color_desc.num_blocks_y as usize;
    let out_len = if target == TargetFormat::Pvrtc1 { total_blocks * 8 } else { total_blocks * target.bytes_per_block() };

    let mut out = vec![0u8; out_len];
    let flags = DecodeFlags { bc1_forbid_three_color_blocks: forbid_three_color, pvrtc_wrap_addressing: wrap };
    transcoder.transcode_image_level(&file, &descs, image, level, target, flags, &mut out)?;

    std::fs::write(output, &out).map_err(|_| uirt_core::errors::Error::BufferTooSmall("could not write output file"))?;
    info!("wrote {} bytes ({} blocks) to {}", out.len(), total_blocks, output.display());

    Ok(())
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Info { path } => run_info(path),
        Command::Transcode { path, image, level, format, output, forbid_three_color, wrap } => {
            run_transcode(path, *image, *level, *format, output, *forbid_three_color, *wrap)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
