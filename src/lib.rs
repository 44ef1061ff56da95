//! # inkcal
//!
//! Frame codec and delivery server for a 3-color (white / black / red) e-ink
//! calendar panel.
//!
//! A rendered calendar page goes through three steps:
//!
//! 1. **Quantize** every pixel to one of three palette symbols, binarizing
//!    anything that isn't an exact palette color by luminance
//! 2. **Pack** the symbols four to a byte, row-major, most significant pair
//!    first
//! 3. **Ship** the bytes, either as a C header for firmware builds or over a
//!    raw TCP socket to the panel
//!
//! ## Quick Start
//!
//! ```
//! use inkcal::{PackedImage, Quantizer, Raster, Rgb};
//!
//! // Any RasterSource works; here a 4x1 strip
//! let raster = Raster::from_fn(4, 1, |x, _| match x {
//!     0 => Rgb::BLACK,
//!     1 => Rgb::RED,
//!     2 => Rgb::WHITE,
//!     _ => Rgb::new(30, 30, 30), // dark grey binarizes to black
//! });
//!
//! let packed = PackedImage::encode(&raster, &Quantizer::default()).unwrap();
//! assert_eq!(packed.bytes(), &[0b01_10_00_01]);
//! ```
//!
//! ## Wire Format
//!
//! The packed buffer is exactly [`packed_len`]`(width, height)` bytes with no
//! header, length prefix or separator. Readers must know the dimensions in
//! advance. The delivery server writes the buffer as-is and closes the
//! connection; end of stream marks the end of the frame.
//!
//! | Symbol | Color |
//! |--------|-------|
//! | `0b00` | white |
//! | `0b01` | black |
//! | `0b10` | red |
//! | `0b11` | reserved |
//!
//! ## Feature Flags
//!
//! - `image` - Load BMP/PNG files and save previews via the `image` crate
//! - `server` - TCP delivery server (tokio)
//! - `cli` - The `inkcal` binary (default)

pub mod config;
mod error;
pub mod header;
mod packer;
mod palette;
mod raster;

pub use config::{CodecConfig, Config, ServerConfig};
pub use error::Error;
pub use packer::{pack_symbols, unpack_symbols, BitPacker, PackedImage};
pub use palette::{luminance, Palette, Quantizer, Rgb, Symbol};
pub use raster::{Raster, RasterSource};

/// Reference panel width in pixels
pub const DEFAULT_WIDTH: u32 = 400;

/// Reference panel height in pixels
pub const DEFAULT_HEIGHT: u32 = 300;

/// Default binarization threshold
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Default listen address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default TCP port the panel polls
pub const DEFAULT_PORT: u16 = 8122;

/// Default bytes per socket write
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default listen backlog (one waiting panel)
pub const DEFAULT_BACKLOG: u32 = 1;

// Optional modules
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub use server::{DeliveryServer, ServeSummary, SessionOutcome, SessionState};

/// Byte length of a packed `width` × `height` frame: `ceil(width * height * 2 / 8)`.
///
/// # Example
///
/// ```
/// use inkcal::packed_len;
///
/// assert_eq!(packed_len(400, 300), 30_000);
/// assert_eq!(packed_len(1, 1), 1);
/// assert_eq!(packed_len(5, 1), 2);
/// assert_eq!(packed_len(0, 10), 0);
/// ```
pub const fn packed_len(width: u32, height: u32) -> usize {
    (width as usize * height as usize).div_ceil(4)
}
