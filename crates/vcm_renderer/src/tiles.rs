//! Tile partitioning of the image.
//!
//! The image is split into square tiles that are rendered independently.
//! Tiles are numbered in row-major order; that order is also the order in
//! which their results are merged into the framebuffer.

use vcm_math::UVec2;

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's top-left corner
    pub x: u32,
    /// Y coordinate of the tile's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Row-major index of this tile
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    pub fn contains(&self, pixel: UVec2) -> bool {
        pixel.x >= self.x
            && pixel.y >= self.y
            && pixel.x < self.x + self.width
            && pixel.y < self.y + self.height
    }

    /// Pixels of the tile in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = UVec2> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |y| (self.x..self.x + self.width).map(move |x| UVec2::new(x, y)))
    }
}

/// Default tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 32;

/// Tile layout of an image.
#[derive(Debug, Clone)]
pub struct TileGrid {
    tiles: Vec<Tile>,
    tiles_per_row: u32,
    tile_size: u32,
}

impl TileGrid {
    /// Split a `width` x `height` image into tiles of `tile_size`. Border
    /// tiles are clipped to the image.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        let tiles_per_row = width.div_ceil(tile_size);
        let mut tiles = Vec::new();

        let mut y = 0;
        while y < height {
            let mut x = 0;
            while x < width {
                let tw = tile_size.min(width - x);
                let th = tile_size.min(height - y);
                tiles.push(Tile::new(x, y, tw, th, tiles.len()));
                x += tile_size;
            }
            y += tile_size;
        }

        Self {
            tiles,
            tiles_per_row,
            tile_size,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Index of the tile containing `pixel`.
    pub fn tile_of_pixel(&self, pixel: UVec2) -> usize {
        let tx = pixel.x / self.tile_size;
        let ty = pixel.y / self.tile_size;
        (ty * self.tiles_per_row + tx) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fit() {
        let grid = TileGrid::new(64, 64, 32);
        assert_eq!(grid.len(), 4);
        for tile in grid.tiles() {
            assert_eq!(tile.pixel_count(), 32 * 32);
        }
    }

    #[test]
    fn test_partial_border_tiles() {
        let grid = TileGrid::new(100, 50, 32);
        assert_eq!(grid.len(), 4 * 2);
        let last = grid.tiles()[3];
        assert_eq!((last.x, last.width), (96, 4));
        let bottom = grid.tiles()[4];
        assert_eq!((bottom.y, bottom.height), (32, 18));
        let covered: u32 = grid.tiles().iter().map(|t| t.pixel_count()).sum();
        assert_eq!(covered, 100 * 50);
    }

    #[test]
    fn test_tile_of_pixel_round_trips() {
        let grid = TileGrid::new(70, 45, 16);
        for tile in grid.tiles() {
            for pixel in tile.pixels() {
                assert_eq!(grid.tile_of_pixel(pixel), tile.index);
                assert!(tile.contains(pixel));
            }
        }
    }

    #[test]
    fn test_indices_are_row_major() {
        let grid = TileGrid::new(64, 64, 32);
        let origins: Vec<(u32, u32)> = grid.tiles().iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(origins, vec![(0, 0), (32, 0), (0, 32), (32, 32)]);
    }
}
