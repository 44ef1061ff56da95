//! Fixed 3-color palette and luminance-threshold quantizer.
//!
//! The panel understands exactly three colors, each addressed by a 2-bit
//! symbol:
//!
//! | Color | RGB | Symbol |
//! |-------|-----|--------|
//! | White | `(255, 255, 255)` | `0b00` |
//! | Black | `(0, 0, 0)` | `0b01` |
//! | Red | `(255, 0, 0)` | `0b10` |
//!
//! Symbol `0b11` is reserved. Any pixel that is not exactly one of the
//! canonical colors is binarized to white or black by its luminance.
//!
//! # Example
//!
//! ```
//! use inkcal::{Quantizer, Rgb, Symbol};
//!
//! let quantizer = Quantizer::default();
//!
//! assert_eq!(quantizer.quantize(Rgb::RED), Symbol::Red);
//! assert_eq!(quantizer.quantize(Rgb::new(200, 200, 200)), Symbol::White);
//! assert_eq!(quantizer.quantize(Rgb::new(40, 40, 40)), Symbol::Black);
//! ```

use crate::raster::{Raster, RasterSource};
use crate::DEFAULT_THRESHOLD;

/// An 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Rgb {
    /// Canonical white
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    /// Canonical black
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    /// Canonical red
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    /// Create a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

/// A 2-bit palette code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Symbol {
    /// `0b00`
    White = 0b00,
    /// `0b01`
    Black = 0b01,
    /// `0b10`
    Red = 0b10,
}

impl Symbol {
    /// Raw 2-bit value.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Parse a 2-bit value. Returns `None` for the reserved code `0b11`
    /// (and anything wider than two bits).
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b00 => Some(Symbol::White),
            0b01 => Some(Symbol::Black),
            0b10 => Some(Symbol::Red),
            _ => None,
        }
    }
}

impl From<Symbol> for u8 {
    fn from(symbol: Symbol) -> Self {
        symbol.bits()
    }
}

/// The fixed bijection between canonical colors and symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    entries: [(Rgb, Symbol); 3],
}

impl Palette {
    /// White / black / red, in symbol order.
    pub const STANDARD: Palette = Palette {
        entries: [
            (Rgb::WHITE, Symbol::White),
            (Rgb::BLACK, Symbol::Black),
            (Rgb::RED, Symbol::Red),
        ],
    };

    /// Symbol for an exact canonical color, or `None` if the color is not in
    /// the palette.
    pub fn symbol_of(&self, color: Rgb) -> Option<Symbol> {
        self.entries
            .iter()
            .find(|(c, _)| *c == color)
            .map(|(_, s)| *s)
    }

    /// Canonical color for a symbol.
    pub fn color_of(&self, symbol: Symbol) -> Rgb {
        self.entries
            .iter()
            .find(|(_, s)| *s == symbol)
            .map(|(c, _)| *c)
            .unwrap_or(Rgb::WHITE)
    }

    /// All `(color, symbol)` pairs.
    pub fn entries(&self) -> &[(Rgb, Symbol)] {
        &self.entries
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Integer-truncated luma: `0.299 R + 0.587 G + 0.114 B`.
///
/// Summed left to right in `f64` and truncated, so values sitting exactly on
/// an integer can land one below it (mid-grey 128 gives 127).
///
/// ```
/// use inkcal::{luminance, Rgb};
///
/// assert_eq!(luminance(Rgb::WHITE), 255);
/// assert_eq!(luminance(Rgb::RED), 76);
/// assert_eq!(luminance(Rgb::new(0, 255, 0)), 149);
/// ```
pub fn luminance(c: Rgb) -> u8 {
    (0.299 * f64::from(c.r) + 0.587 * f64::from(c.g) + 0.114 * f64::from(c.b)) as u8
}

/// Maps arbitrary RGB pixels onto the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    palette: Palette,
    threshold: u8,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Quantizer {
    /// Quantizer over the standard palette with the given binarization
    /// threshold.
    pub fn new(threshold: u8) -> Self {
        Self {
            palette: Palette::STANDARD,
            threshold,
        }
    }

    /// Binarization threshold in use.
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Palette in use.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Canonical color a pixel ends up as.
    ///
    /// Canonical colors pass through unchanged; everything else becomes white
    /// when `luminance >= threshold` and black otherwise.
    pub fn binarize(&self, pixel: Rgb) -> Rgb {
        if self.palette.symbol_of(pixel).is_some() {
            pixel
        } else if luminance(pixel) >= self.threshold {
            Rgb::WHITE
        } else {
            Rgb::BLACK
        }
    }

    /// Symbol for a pixel. Never fails.
    pub fn quantize(&self, pixel: Rgb) -> Symbol {
        if let Some(symbol) = self.palette.symbol_of(pixel) {
            return symbol;
        }
        if luminance(pixel) >= self.threshold {
            Symbol::White
        } else {
            Symbol::Black
        }
    }

    /// Symbols of a whole raster in row-major order.
    pub fn symbols<'a, R: RasterSource + ?Sized>(
        &'a self,
        raster: &'a R,
    ) -> impl Iterator<Item = Symbol> + 'a {
        let (width, height) = (raster.width(), raster.height());
        (0..height).flat_map(move |y| (0..width).map(move |x| self.quantize(raster.pixel(x, y))))
    }

    /// A new raster holding the binarized colors of `raster`.
    ///
    /// The source is left untouched.
    pub fn binarize_raster<R: RasterSource + ?Sized>(&self, raster: &R) -> Raster {
        Raster::from_fn(raster.width(), raster.height(), |x, y| {
            self.binarize(raster.pixel(x, y))
        })
    }
}
