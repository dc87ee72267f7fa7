//! Pixel markers drawn into the raster by the compositor.

use crate::geometry::Color;

/// A world-anchored rectangle, resampled together with the terrain.
///
/// Covers `[x, x + width) x [z, z + height)` in block coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldPixel {
    pub world: String,
    pub x: f64,
    pub z: f64,
    pub width: f64,
    pub height: f64,
    pub color: Color,
    /// Ordering inside the world layer; higher draws later.
    pub depth: u16,
}

impl WorldPixel {
    #[must_use]
    pub fn new(world: impl Into<String>, x: f64, z: f64, color: Color) -> Self {
        Self { world: world.into(), x, z, width: 1.0, height: 1.0, color, depth: 0 }
    }

    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u16) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn contains(&self, x: f64, z: f64) -> bool {
        x >= self.x && x < self.x + self.width && z >= self.z && z < self.z + self.height
    }
}

/// A screen-space pixel drawn above the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapPixel {
    pub x: i32,
    pub y: i32,
    pub color: Color,
    /// Ordering inside the foreground layer; higher draws later.
    pub depth: u16,
}

impl MapPixel {
    #[must_use]
    pub fn new(x: i32, y: i32, color: Color) -> Self {
        Self { x, y, color, depth: 0 }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u16) -> Self {
        self.depth = depth;
        self
    }
}
