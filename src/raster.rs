use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use log::debug;
use slime_common::{Rgb, SpeciesPalette};
use std::path::Path;

/// An RGB raster the agent population is seeded from. Row-major, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRaster {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl SeedRaster {
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb>) -> Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("Seed raster must be at least 1x1, got {}x{}.", width, height);
        }
        if pixels.len() != width as usize * height as usize {
            anyhow::bail!(
                "Seed raster of {}x{} needs {} pixels, got {}.",
                width, height, width as usize * height as usize, pixels.len()
            );
        }
        Ok(Self { width, height, pixels })
    }

    pub fn from_image(image: &RgbImage) -> Result<Self> {
        let pixels = image.pixels().map(|p| p.0).collect();
        Self::new(image.width(), image.height(), pixels)
    }

    /// Vertical bands of the palette colours, left to right in species order.
    pub fn palette_bands(width: u32, height: u32, palette: &SpeciesPalette) -> Result<Self> {
        let bands = palette.len().max(1) as u64;
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for _ in 0..height {
            for x in 0..width {
                let species = (x as u64 * bands / width.max(1) as u64) as u32;
                pixels.push(palette.color(species).unwrap_or([0, 0, 0]));
            }
        }
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }
}

/// Decodes an image file and resamples it to `width` x `height`.
pub fn load_seed_image<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<SeedRaster> {
    let path = path.as_ref();
    let decoded = image::open(path)
        .with_context(|| format!("Failed to decode seed image '{}'", path.display()))?;
    debug!(
        "Seed image {} is {}x{}, resizing to {}x{}.",
        path.display(), decoded.width(), decoded.height(), width, height
    );
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3).to_rgb8();
    SeedRaster::from_image(&resized)
}
