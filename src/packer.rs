//! 2-bit symbol packing.
//!
//! Symbols are written row-major, four to a byte, most significant pair
//! first. A final partial byte keeps its unused low bits at zero. The buffer
//! has no header or framing, so width and height travel out of band.
//!
//! ```text
//! symbols   01   10   00   11
//! byte      0b01_10_00_11 = 0x63
//! ```

use std::path::Path;

use crate::error::Error;
use crate::packed_len;
use crate::palette::{Palette, Quantizer, Rgb, Symbol};
use crate::raster::{Raster, RasterSource};

/// Symbols per output byte.
const SYMBOLS_PER_BYTE: usize = 4;

/// Accumulates 2-bit codes into bytes.
///
/// # Example
///
/// ```
/// use inkcal::{BitPacker, Symbol};
///
/// let mut packer = BitPacker::new();
/// packer.push(Symbol::Red);
/// assert_eq!(packer.finish(), vec![0x80]);
/// ```
#[derive(Debug, Default)]
pub struct BitPacker {
    bytes: Vec<u8>,
    acc: u8,
    offset: u8,
}

impl BitPacker {
    /// An empty packer.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty packer sized for `symbols` codes.
    pub fn with_capacity(symbols: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(symbols.div_ceil(SYMBOLS_PER_BYTE)),
            ..Self::default()
        }
    }

    /// Append one symbol.
    pub fn push(&mut self, symbol: Symbol) {
        self.push_bits(symbol.bits());
    }

    /// Append one raw 2-bit code. Bits above the low two are discarded.
    pub fn push_bits(&mut self, bits: u8) {
        self.acc |= (bits & 0b11) << (6 - self.offset);
        self.offset += 2;
        if self.offset == 8 {
            self.bytes.push(self.acc);
            self.acc = 0;
            self.offset = 0;
        }
    }

    /// Flush any partial byte and return the packed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.offset > 0 {
            self.bytes.push(self.acc);
        }
        self.bytes
    }
}

/// Pack a row-major sequence of 2-bit codes.
///
/// Accepts [`Symbol`]s or raw `u8` codes.
///
/// ```
/// use inkcal::pack_symbols;
///
/// assert_eq!(pack_symbols([0b01u8, 0b10, 0b00, 0b11]), vec![0x63]);
/// ```
pub fn pack_symbols<I>(symbols: I) -> Vec<u8>
where
    I: IntoIterator,
    I::Item: Into<u8>,
{
    let iter = symbols.into_iter();
    let mut packer = BitPacker::with_capacity(iter.size_hint().0);
    for symbol in iter {
        packer.push_bits(symbol.into());
    }
    packer.finish()
}

/// Unpack the first `count` 2-bit codes from `bytes`.
///
/// Stops early if `bytes` runs out.
pub fn unpack_symbols(bytes: &[u8], count: usize) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&byte| [byte >> 6, (byte >> 4) & 0b11, (byte >> 2) & 0b11, byte & 0b11])
        .take(count)
        .collect()
}

/// A packed frame together with the dimensions it was packed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedImage {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

impl PackedImage {
    /// Quantize and pack a raster.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] if the raster is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use inkcal::{PackedImage, Quantizer, Raster, Rgb};
    ///
    /// let white = Raster::new(2, 1, Rgb::WHITE);
    /// let packed = PackedImage::encode(&white, &Quantizer::default()).unwrap();
    /// assert_eq!(packed.bytes(), &[0x00]);
    /// ```
    pub fn encode<R: RasterSource + ?Sized>(
        raster: &R,
        quantizer: &Quantizer,
    ) -> Result<Self, Error> {
        let (width, height) = (raster.width(), raster.height());
        if width == 0 || height == 0 {
            return Err(Error::Dimension { width, height });
        }

        let bytes = pack_symbols(quantizer.symbols(raster));
        debug_assert_eq!(bytes.len(), packed_len(width, height));

        tracing::debug!(
            "Packed {}x{} raster into {} bytes (threshold {})",
            width,
            height,
            bytes.len(),
            quantizer.threshold()
        );

        Ok(Self {
            width,
            height,
            bytes,
        })
    }

    /// Wrap already-packed bytes, checking their length.
    pub fn from_bytes(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::Dimension { width, height });
        }
        let expected = packed_len(width, height);
        if bytes.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: bytes.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            bytes,
        })
    }

    /// Read a raw packed buffer produced by [`PackedImage::write_binary`].
    pub fn read_binary<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_bytes(width, height, bytes)
    }

    /// Write the raw packed bytes: no header, no length prefix.
    pub fn write_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes).map_err(|e| Error::io(path, e))?;
        tracing::info!("Wrote {} packed bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }

    /// Decode back to canonical colors. The reserved code decodes as white.
    pub fn to_raster(&self) -> Raster {
        let palette = Palette::STANDARD;
        let count = self.width as usize * self.height as usize;
        let mut codes = unpack_symbols(&self.bytes, count).into_iter();
        Raster::from_fn(self.width, self.height, |_, _| {
            codes
                .next()
                .and_then(Symbol::from_bits)
                .map_or(Rgb::WHITE, |s| palette.color_of(s))
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the packed bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
