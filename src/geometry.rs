//! Geometry and color primitives shared by every layer.
//!
//! DESIGN
//! ======
//! Rasters are fixed 128x128 grids addressed row-major. Colors are straight
//! (non-premultiplied) RGBA and are only reduced to palette indices at the
//! very end of a composition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable identity of a user session.
pub type UserId = Uuid;

/// Numeric id of the map item surface a renderer is bound to.
pub type SurfaceId = u32;

/// Side length of a delivered raster, in pixels.
pub const RASTER_SIZE: usize = 128;

/// Number of bytes in a delivered raster.
pub const RASTER_LEN: usize = RASTER_SIZE * RASTER_SIZE;

// =============================================================================
// LOCATION
// =============================================================================

/// A position and heading in a named world.
///
/// `yaw` follows the host convention: 0 faces +z (south), 90 faces -x,
/// 180 faces -z, 270 faces +x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    #[must_use]
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self { world: world.into(), x, y, z, yaw: 0.0, pitch: 0.0 }
    }

    #[must_use]
    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }
}

/// Normalize an angle in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = ((degrees % 360.0) + 360.0) % 360.0;
    // EDGE: tiny negative inputs can round up to exactly 360.0.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Rotate `(x, y)` clockwise on screen (y grows downward) by `radians`.
#[must_use]
pub fn rotate(x: f64, y: f64, radians: f64) -> (f64, f64) {
    let (sin, cos) = radians.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

// =============================================================================
// COLOR
// =============================================================================

/// Straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Source-over composite of `self` on top of `below`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn over(self, below: Self) -> Self {
        match self.a {
            255 => return self,
            0 => return below,
            _ => {}
        }

        let sa = f32::from(self.a) / 255.0;
        let ba = f32::from(below.a) / 255.0;
        let out_a = sa + ba * (1.0 - sa);
        let mix = |s: u8, b: u8| -> u8 {
            let v = (f32::from(s) * sa + f32::from(b) * ba * (1.0 - sa)) / out_a;
            v.round().clamp(0.0, 255.0) as u8
        };

        Self {
            r: mix(self.r, below.r),
            g: mix(self.g, below.g),
            b: mix(self.b, below.b),
            a: (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
        }
    }
}

// =============================================================================
// IMAGE
// =============================================================================

/// A small true-color image used for overlay, background, and placeholder layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    pixels: Vec<Color>,
}

impl Image {
    /// Build an image from row-major pixels. Returns `None` when the pixel
    /// count does not match the dimensions.
    #[must_use]
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Color>) -> Option<Self> {
        if width.checked_mul(height) != Some(pixels.len()) {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    #[must_use]
    pub fn filled(width: usize, height: usize, color: Color) -> Self {
        Self { width, height, pixels: vec![color; width * height] }
    }

    /// Two-color checkerboard with square cells of `cell` pixels.
    #[must_use]
    pub fn checkerboard(size: usize, cell: usize, a: Color, b: Color) -> Self {
        let cell = cell.max(1);
        let pixels = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if (x / cell + y / cell) % 2 == 0 { a } else { b }
            })
            .collect();
        Self { width: size, height: size, pixels }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Color {
        if x >= self.width || y >= self.height {
            return Color::TRANSPARENT;
        }
        self.pixels[y * self.width + x]
    }

    /// Nearest-neighbour sample as if the image were stretched over a
    /// `target` x `target` grid.
    #[must_use]
    pub fn sample(&self, x: usize, y: usize, target: usize) -> Color {
        if target == 0 || self.width == 0 || self.height == 0 {
            return Color::TRANSPARENT;
        }
        self.get(x * self.width / target, y * self.height / target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_negative_and_large_angles() {
        assert!((normalize_degrees(-90.0) - 270.0).abs() < 1e-9);
        assert!((normalize_degrees(720.0 + 45.0) - 45.0).abs() < 1e-9);
        assert!(normalize_degrees(360.0).abs() < 1e-9);
    }

    #[test]
    fn rotate_quarter_turn_maps_up_to_right() {
        let (x, y) = rotate(0.0, -1.0, std::f64::consts::FRAC_PI_2);
        assert!((x - 1.0).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn opaque_over_replaces_and_transparent_over_keeps() {
        let red = Color::rgb(255, 0, 0);
        let blue = Color::rgb(0, 0, 255);
        assert_eq!(red.over(blue), red);
        assert_eq!(Color::TRANSPARENT.over(blue), blue);
    }

    #[test]
    fn half_alpha_over_blends() {
        let white = Color::rgba(255, 255, 255, 128);
        let black = Color::rgb(0, 0, 0);
        let out = white.over(black);
        assert_eq!(out.a, 255);
        assert!(out.r > 120 && out.r < 136);
    }

    #[test]
    fn from_pixels_rejects_wrong_length() {
        assert!(Image::from_pixels(2, 2, vec![Color::TRANSPARENT; 3]).is_none());
        assert!(Image::from_pixels(2, 2, vec![Color::TRANSPARENT; 4]).is_some());
    }

    #[test]
    fn sample_stretches_small_image() {
        let img = Image::checkerboard(2, 1, Color::rgb(1, 1, 1), Color::rgb(2, 2, 2));
        assert_eq!(img.sample(0, 0, 128), Color::rgb(1, 1, 1));
        assert_eq!(img.sample(127, 0, 128), Color::rgb(2, 2, 2));
        assert_eq!(img.sample(127, 127, 128), Color::rgb(1, 1, 1));
    }
}
