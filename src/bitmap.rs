use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::Path;

/// A decoded, scaled bitmap in the layout the Win32 alpha compositor wants:
/// premultiplied BGRA, 8 bits per channel, rows top-down.
#[derive(Debug, Clone)]
pub struct ArgbBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ArgbBitmap {
    /// Decode `path` and scale it by `scale` with bilinear filtering.
    ///
    /// Re-reads the file on every call; the refresh cycle deliberately
    /// reloads from disk so an edited image is picked up on the next rebuild.
    pub fn load_scaled(path: &Path, scale: f64) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("failed to load image {}", path.display()))?
            .to_rgba8();
        let (w, h) = scaled_size(img.width(), img.height(), scale);
        let img = if (w, h) == img.dimensions() {
            img
        } else {
            image::imageops::resize(&img, w, h, FilterType::Triangle)
        };
        Ok(Self::from_rgba(&img))
    }

    /// Convert straight-alpha RGBA to premultiplied BGRA.
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let mut pixels = Vec::with_capacity(img.as_raw().len());
        for px in img.pixels() {
            let [r, g, b, a] = px.0;
            pixels.push(premultiply(b, a));
            pixels.push(premultiply(g, a));
            pixels.push(premultiply(r, a));
            pixels.push(a);
        }
        Self {
            width: img.width(),
            height: img.height(),
            pixels,
        }
    }
}

/// Scaled dimensions, rounded half away from zero, never below one pixel.
pub fn scaled_size(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Map a fractional opacity to the compositor's constant alpha multiplier.
pub fn alpha_multiplier(opacity: f64) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((channel as u16 * alpha as u16 + 127) / 255) as u8
}
