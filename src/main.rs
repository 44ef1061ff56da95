//! `inkcal` command line.
//!
//! ```text
//! inkcal encode calendar_400x300.bmp --bin compressed_image.bin --header compressed_image.h
//! inkcal serve --source compressed_image.bin --port 8122
//! inkcal decode compressed_image.bin --width 400 --height 300 --output preview.png
//! ```
//!
//! Set `RUST_LOG=debug` for per-session state transitions.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use inkcal::config::DEFAULT_SOURCE;
use inkcal::{
    Config, DeliveryServer, Error, PackedImage, Quantizer, Raster, RasterSource, DEFAULT_HEIGHT,
    DEFAULT_WIDTH,
};

#[derive(Parser, Debug)]
#[command(name = "inkcal", version)]
#[command(about = "Pack calendar images for a 3-color e-ink panel and serve them over TCP")]
struct Cli {
    /// YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quantize and pack an image into a binary buffer and/or C header
    Encode(EncodeArgs),
    /// Serve a packed buffer to one client at a time
    Serve(ServeArgs),
    /// Render a packed buffer back to an image for inspection
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Input image (BMP or PNG)
    input: PathBuf,

    /// Raw packed output (default: compressed_image.bin when no --header is given)
    #[arg(long)]
    bin: Option<PathBuf>,

    /// C header output
    #[arg(long)]
    header: Option<PathBuf>,

    /// C array name for the header
    #[arg(long)]
    name: Option<String>,

    /// Luminance threshold for non-palette colors
    #[arg(short, long)]
    threshold: Option<u8>,

    /// Also save the binarized image
    #[arg(long)]
    save_binarized: Option<PathBuf>,

    /// Optional decoration pasted in black and white before packing
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Overlay top-left corner as X,Y
    #[arg(long, value_parser = parse_point, default_value = "0,0")]
    overlay_at: (u32, u32),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Packed buffer to serve
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Bytes per write
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Packed buffer
    input: PathBuf,

    /// Frame width in pixels
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    /// Output image (format follows the extension)
    #[arg(short, long)]
    output: PathBuf,
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x = x.trim().parse().map_err(|e| format!("bad X '{}': {}", x, e))?;
    let y = y.trim().parse().map_err(|e| format!("bad Y '{}': {}", y, e))?;
    Ok((x, y))
}

fn load_config(path: Option<&Path>) -> Result<Config, Error> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env()
}

fn encode(args: EncodeArgs, config: &Config) -> Result<(), Error> {
    let mut raster = Raster::open(&args.input)?;
    tracing::info!(
        "Loaded {}x{} image from {}",
        raster.width(),
        raster.height(),
        args.input.display()
    );

    if let Some(overlay) = &args.overlay {
        let (x, y) = args.overlay_at;
        raster.paste_overlay(overlay, x, y);
    }

    let quantizer = Quantizer::new(args.threshold.unwrap_or(config.codec.threshold));

    if let Some(path) = &args.save_binarized {
        quantizer.binarize_raster(&raster).save(path)?;
    }

    let packed = PackedImage::encode(&raster, &quantizer)?;

    let bin = match (&args.bin, &args.header) {
        (None, None) => Some(PathBuf::from(DEFAULT_SOURCE)),
        (bin, _) => bin.clone(),
    };
    if let Some(path) = bin {
        packed.write_binary(path)?;
    }
    if let Some(path) = &args.header {
        let name = args.name.as_deref().unwrap_or(&config.codec.array_name);
        packed.write_header(path, name)?;
    }
    Ok(())
}

async fn serve(args: ServeArgs, config: Config) -> Result<(), Error> {
    let mut server_config = config.server;
    if let Some(source) = args.source {
        server_config.source = source;
    }
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(chunk_size) = args.chunk_size {
        server_config.chunk_size = chunk_size;
    }

    let server = DeliveryServer::bind(&server_config).await?;
    server.run().await;
    Ok(())
}

fn decode(args: DecodeArgs) -> Result<(), Error> {
    let packed = PackedImage::read_binary(&args.input, args.width, args.height)?;
    packed.to_raster().save(&args.output)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Command::Encode(args) => encode(args, &config),
            Command::Serve(args) => serve(args, config).await,
            Command::Decode(args) => decode(args),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("50,120"), Ok((50, 120)));
        assert_eq!(parse_point(" 3 , 4 "), Ok((3, 4)));
        assert!(parse_point("50").is_err());
        assert!(parse_point("a,1").is_err());
    }

    #[test]
    fn test_encode_defaults() {
        let cli = Cli::try_parse_from(["inkcal", "encode", "in.bmp"]).unwrap();
        match cli.command {
            Command::Encode(args) => {
                assert_eq!(args.input, PathBuf::from("in.bmp"));
                assert_eq!(args.overlay_at, (0, 0));
                assert!(args.bin.is_none());
                assert!(args.threshold.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_encode_writes_both_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let bin = dir.path().join("out.bin");
        let header = dir.path().join("out.h");
        Raster::new(2, 1, inkcal::Rgb::WHITE).save(&input).unwrap();

        let args = EncodeArgs {
            input,
            bin: Some(bin.clone()),
            header: Some(header.clone()),
            name: Some("frame".to_string()),
            threshold: None,
            save_binarized: None,
            overlay: Some(dir.path().join("missing.bmp")),
            overlay_at: (0, 0),
        };
        encode(args, &Config::default()).unwrap();

        assert_eq!(std::fs::read(&bin).unwrap(), vec![0x00]);
        let text = std::fs::read_to_string(&header).unwrap();
        assert!(text.contains("const int frame_width = 2;"));
        assert!(text.contains("const int frame_height = 1;"));
    }
}
