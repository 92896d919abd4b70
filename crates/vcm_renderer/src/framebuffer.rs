//! Multi-channel accumulation buffers.
//!
//! Every channel stores one `Vec4` per pixel: the accumulated estimate in
//! `xyz` and the number of samples in `w`. Dividing by `w` gives the mean.

use crate::tiles::Tile;
use vcm_core::Color;
use vcm_math::{UVec2, Vec4};

#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    names: Vec<String>,
    channels: Vec<Vec<Vec4>>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            names: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    #[inline]
    pub fn pixel_index(&self, pixel: UVec2) -> usize {
        (pixel.y * self.width + pixel.x) as usize
    }

    /// Add a zeroed channel and return its index.
    pub fn add_channel(&mut self, name: impl Into<String>) -> usize {
        self.names.push(name.into());
        self.channels.push(vec![Vec4::ZERO; self.pixel_count()]);
        self.channels.len() - 1
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_names(&self) -> &[String] {
        &self.names
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[inline]
    pub fn accumulate(&mut self, channel: usize, pixel: usize, value: Vec4) {
        self.channels[channel][pixel] += value;
    }

    pub fn channel(&self, channel: usize) -> &[Vec4] {
        &self.channels[channel]
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&[Vec4]> {
        self.channel_index(name).map(|i| self.channel(i))
    }

    /// Reset every channel to zero.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(Vec4::ZERO);
        }
    }

    /// Add the content of a tile accumulator.
    pub fn merge_tile(&mut self, acc: &TileAccumulator) {
        let tile = acc.tile;
        for (c, local) in acc.channels.iter().enumerate() {
            for row in 0..tile.height {
                let src = (row * tile.width) as usize;
                let dst = self.pixel_index(UVec2::new(tile.x, tile.y + row));
                let width = tile.width as usize;
                for (d, s) in self.channels[c][dst..dst + width]
                    .iter_mut()
                    .zip(&local[src..src + width])
                {
                    *d += *s;
                }
            }
        }
    }

    /// Per-pixel mean of a channel.
    pub fn resolve(&self, channel: usize) -> Vec<Color> {
        self.channels[channel]
            .iter()
            .map(|v| {
                if v.w > 0.0 {
                    v.truncate() / v.w
                } else {
                    Color::ZERO
                }
            })
            .collect()
    }

    /// Gamma-corrected 8-bit RGBA bytes of a channel.
    pub fn to_rgba(&self, channel: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixel_count() * 4);
        for color in self.resolve(channel) {
            bytes.extend_from_slice(&color_to_rgba(color));
        }
        bytes
    }
}

/// Tile-local framebuffer with the same channel layout as the image.
///
/// Only pixels of its tile may be written.
#[derive(Debug, Clone)]
pub struct TileAccumulator {
    tile: Tile,
    channels: Vec<Vec<Vec4>>,
}

impl TileAccumulator {
    pub fn new(tile: Tile, channel_count: usize) -> Self {
        let pixels = tile.pixel_count() as usize;
        Self {
            tile,
            channels: vec![vec![Vec4::ZERO; pixels]; channel_count],
        }
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Accumulate into `pixel`, in image coordinates.
    #[inline]
    pub fn accumulate(&mut self, channel: usize, pixel: UVec2, value: Vec4) {
        debug_assert!(self.tile.contains(pixel), "pixel {pixel} outside tile");
        if !self.tile.contains(pixel) {
            return;
        }
        let local = ((pixel.y - self.tile.y) * self.tile.width + pixel.x - self.tile.x) as usize;
        self.channels[channel][local] += value;
    }

    /// Accumulate a color (alpha untouched).
    #[inline]
    pub fn add_color(&mut self, channel: usize, pixel: UVec2, color: Color) {
        self.accumulate(channel, pixel, color.extend(0.0));
    }

    /// Count one sample in every channel of `pixel`.
    pub fn add_sample(&mut self, pixel: UVec2) {
        for c in 0..self.channels.len() {
            self.accumulate(c, pixel, Vec4::new(0.0, 0.0, 0.0, 1.0));
        }
    }

    pub fn get(&self, channel: usize, pixel: UVec2) -> Vec4 {
        let local = ((pixel.y - self.tile.y) * self.tile.width + pixel.x - self.tile.x) as usize;
        self.channels[channel][local]
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileGrid;

    #[test]
    fn test_channels_by_name() {
        let mut fb = Framebuffer::new(4, 2);
        let a = fb.add_channel("final_render");
        let b = fb.add_channel("depth_1");
        assert_eq!((a, b), (0, 1));
        assert_eq!(fb.channel_index("depth_1"), Some(1));
        assert!(fb.channel_by_name("missing").is_none());
        assert_eq!(fb.channel(0).len(), 8);
    }

    #[test]
    fn test_resolve_divides_by_sample_count() {
        let mut fb = Framebuffer::new(2, 1);
        fb.add_channel("final_render");
        fb.accumulate(0, 1, Vec4::new(2.0, 4.0, 6.0, 2.0));
        let resolved = fb.resolve(0);
        assert_eq!(resolved[0], Color::ZERO);
        assert_eq!(resolved[1], Color::new(1.0, 2.0, 3.0));
        fb.clear();
        assert_eq!(fb.channel(0)[1], Vec4::ZERO);
    }

    #[test]
    fn test_merge_tile_places_pixels() {
        let grid = TileGrid::new(5, 3, 2);
        let mut fb = Framebuffer::new(5, 3);
        fb.add_channel("final_render");
        for tile in grid.tiles() {
            let mut acc = TileAccumulator::new(*tile, 1);
            for pixel in tile.pixels() {
                acc.add_color(0, pixel, Color::splat((pixel.y * 5 + pixel.x) as f32));
                acc.add_sample(pixel);
            }
            fb.merge_tile(&acc);
        }
        for (i, v) in fb.channel(0).iter().enumerate() {
            assert_eq!(v.x, i as f32);
            assert_eq!(v.w, 1.0);
        }
    }

    #[test]
    fn test_color_to_rgba() {
        assert_eq!(color_to_rgba(Color::ZERO), [0, 0, 0, 255]);
        assert_eq!(color_to_rgba(Color::ONE), [255, 255, 255, 255]);
        assert_eq!(color_to_rgba(Color::splat(0.25))[0], 127);
    }
}
