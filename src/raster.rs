//! Raster images consumed by the codec.
//!
//! The codec does not care where pixels come from. Anything that can report
//! its dimensions and hand out an [`Rgb`] per `(x, y)` implements
//! [`RasterSource`]; [`Raster`] is the owned, in-memory implementation used
//! for binarized copies, overlays and decoded previews.

use crate::palette::{luminance, Rgb};

#[cfg(feature = "image")]
use std::path::Path;

#[cfg(feature = "image")]
use crate::error::Error;

/// Read access to a width × height grid of RGB pixels.
pub trait RasterSource {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Pixel at column `x`, row `y`. Callers stay within bounds.
    fn pixel(&self, x: u32, y: u32) -> Rgb;
}

/// An owned RGB raster stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl Raster {
    /// A raster filled with one color.
    pub fn new(width: u32, height: u32, fill: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    /// A raster whose pixels are produced by `f(x, y)`, visited row-major.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Rgb) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Row-major pixel slice.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Overwrite one pixel. Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.pixels[idx] = color;
        }
    }

    /// Paste `overlay` with its top-left corner at `(left, top)`, reduced to
    /// pure black and white by Floyd-Steinberg error diffusion on luminance
    /// with a cut at 128. Parts falling outside this raster are clipped, but
    /// still take part in the diffusion.
    pub fn paste_monochrome<R: RasterSource + ?Sized>(&mut self, overlay: &R, left: u32, top: u32) {
        // Sixteenths of error owed to this row and the next, shifted by one
        // so the x - 1 neighbour is always in range.
        let span = overlay.width() as usize + 2;
        let mut current = vec![0i32; span];
        let mut next = vec![0i32; span];

        for y in 0..overlay.height() {
            for x in 0..overlay.width() {
                let i = x as usize;
                let level = (i32::from(luminance(overlay.pixel(x, y))) + current[i + 1] / 16)
                    .clamp(0, 255);
                let (color, target) = if level >= 128 {
                    (Rgb::WHITE, 255)
                } else {
                    (Rgb::BLACK, 0)
                };

                let err = level - target;
                current[i + 2] += err * 7;
                next[i] += err * 3;
                next[i + 1] += err * 5;
                next[i + 2] += err;

                if let (Some(dx), Some(dy)) = (left.checked_add(x), top.checked_add(y)) {
                    self.set_pixel(dx, dy, color);
                }
            }
            std::mem::swap(&mut current, &mut next);
            next.fill(0);
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl RasterSource for Raster {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> Rgb {
        self.pixels[self.index(x, y)]
    }
}

impl<R: RasterSource + ?Sized> RasterSource for &R {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn pixel(&self, x: u32, y: u32) -> Rgb {
        (**self).pixel(x, y)
    }
}

#[cfg(feature = "image")]
impl RasterSource for image::RgbImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn pixel(&self, x: u32, y: u32) -> Rgb {
        Rgb::from(self.get_pixel(x, y).0)
    }
}

#[cfg(feature = "image")]
impl Raster {
    /// Load any BMP or PNG file and convert it to RGB.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| Error::Image(format!("failed to open '{}': {}", path.display(), e)))?
            .to_rgb8();
        Ok(Self::from(&img))
    }

    /// Save as an image file; the format follows the extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        self.to_rgb_image()
            .save(path)
            .map_err(|e| Error::Image(format!("failed to save '{}': {}", path.display(), e)))?;
        tracing::info!("Saved {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }

    /// Paste a decorative image from disk, see [`Raster::paste_monochrome`].
    ///
    /// The overlay is optional: if it cannot be loaded a warning is logged,
    /// the raster is left unchanged and `false` is returned.
    pub fn paste_overlay<P: AsRef<Path>>(&mut self, path: P, left: u32, top: u32) -> bool {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(overlay) => {
                self.paste_monochrome(&overlay, left, top);
                tracing::debug!(
                    "Pasted {}x{} overlay {} at ({}, {})",
                    overlay.width,
                    overlay.height,
                    path.display(),
                    left,
                    top
                );
                true
            }
            Err(e) => {
                tracing::warn!("Skipping overlay: {}", e);
                false
            }
        }
    }

    /// Convert into an `image` crate buffer.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width, self.height, |x, y| {
            image::Rgb(self.pixel(x, y).into())
        })
    }
}

#[cfg(feature = "image")]
impl From<&image::RgbImage> for Raster {
    fn from(img: &image::RgbImage) -> Self {
        Raster::from_fn(img.width(), img.height(), |x, y| {
            Rgb::from(img.get_pixel(x, y).0)
        })
    }
}
