//! Palette conversion between true color and indexed raster bytes.
//!
//! The target surface only understands a fixed palette. Conversion is a pure
//! function owned by the host; `NearestPalette` is a small stand-in that maps
//! each color to the closest opaque entry.

use crate::geometry::{Color, Image, RASTER_LEN, RASTER_SIZE};

/// Index used for fully transparent pixels.
pub const TRANSPARENT_INDEX: u8 = 0;

/// Pure color <-> index conversion for the target palette.
pub trait Palette: Send + Sync {
    /// Closest palette index for `color`.
    fn index_of(&self, color: Color) -> u8;

    /// True color of a palette index. Unknown indices are transparent.
    fn color_of(&self, index: u8) -> Color;

    /// Convert an image, stretched over a full raster, into palette indices.
    fn dither(&self, image: &Image) -> Vec<u8> {
        let mut out = Vec::with_capacity(RASTER_LEN);
        for y in 0..RASTER_SIZE {
            for x in 0..RASTER_SIZE {
                out.push(self.index_of(image.sample(x, y, RASTER_SIZE)));
            }
        }
        out
    }
}

// Base colors, each expanded into four shades. Base 0 is transparent.
const BASE_COLORS: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (127, 178, 56),
    (247, 233, 163),
    (199, 199, 199),
    (255, 0, 0),
    (160, 160, 255),
    (167, 167, 167),
    (0, 124, 0),
    (255, 255, 255),
    (164, 168, 184),
    (151, 109, 77),
    (112, 112, 112),
    (64, 64, 255),
    (143, 119, 72),
    (255, 252, 245),
    (216, 127, 51),
];

const SHADES: [u16; 4] = [180, 220, 255, 135];

/// Nearest-match palette over a fixed color table.
#[derive(Debug, Clone)]
pub struct NearestPalette {
    colors: Vec<Color>,
}

impl NearestPalette {
    /// Build a palette where `colors[i]` is index `i`. Entries past 256 are dropped.
    #[must_use]
    pub fn new(mut colors: Vec<Color>) -> Self {
        colors.truncate(256);
        Self { colors }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for NearestPalette {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        let mut colors = Vec::with_capacity(BASE_COLORS.len() * SHADES.len());
        for (base, (r, g, b)) in BASE_COLORS.iter().enumerate() {
            for shade in SHADES {
                if base == 0 {
                    colors.push(Color::TRANSPARENT);
                    continue;
                }
                let scale = |c: u8| (u16::from(c) * shade / 255) as u8;
                colors.push(Color::rgb(scale(*r), scale(*g), scale(*b)));
            }
        }
        Self::new(colors)
    }
}

impl Palette for NearestPalette {
    #[allow(clippy::cast_possible_truncation)]
    fn index_of(&self, color: Color) -> u8 {
        if color.a < 128 {
            return self
                .colors
                .iter()
                .position(|c| c.is_transparent())
                .map_or(TRANSPARENT_INDEX, |i| i as u8);
        }

        let distance = |c: &Color| {
            let dr = i32::from(c.r) - i32::from(color.r);
            let dg = i32::from(c.g) - i32::from(color.g);
            let db = i32::from(c.b) - i32::from(color.b);
            dr * dr + dg * dg + db * db
        };

        self.colors
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_transparent())
            .min_by_key(|(_, c)| distance(c))
            .map_or(TRANSPARENT_INDEX, |(i, _)| i as u8)
    }

    fn color_of(&self, index: u8) -> Color {
        self.colors.get(usize::from(index)).copied().unwrap_or(Color::TRANSPARENT)
    }
}
