//! Cursor markers: point markers delivered alongside the raster.
//!
//! DESIGN
//! ======
//! Cursors are never rasterized. Their coordinates live in half-pixel units
//! centred on the raster (`-128..=127` per axis, clamped here to `±127`),
//! with a 16-step direction where 0 points up and steps turn clockwise.

use serde::{Deserialize, Serialize};

use crate::geometry::{Location, normalize_degrees};

/// Largest magnitude allowed on either cursor axis.
pub const CURSOR_LIMIT: i8 = 127;

/// Visual type of a cursor marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKind {
    WhitePointer,
    GreenPointer,
    RedPointer,
    BluePointer,
    WhiteCross,
    RedMarker,
    WhiteCircle,
    SmallWhiteCircle,
    Mansion,
    Temple,
    RedX,
}

/// A cursor in raster space, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCursor {
    pub x: i8,
    pub y: i8,
    /// 0..16, 0 = up, clockwise.
    pub direction: u8,
    pub kind: CursorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl MapCursor {
    /// Build a cursor from unclamped half-pixel coordinates.
    #[must_use]
    pub fn new(x: f64, y: f64, direction: u8, kind: CursorKind) -> Self {
        Self { x: clamp_axis(x), y: clamp_axis(y), direction: direction % 16, kind, caption: None }
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Same cursor with both axes forced into `±CURSOR_LIMIT`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.x = self.x.max(-CURSOR_LIMIT);
        self.y = self.y.max(-CURSOR_LIMIT);
        self.direction %= 16;
        self
    }
}

/// Round and clamp one axis into `±CURSOR_LIMIT`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn clamp_axis(value: f64) -> i8 {
    if value.is_nan() {
        return 0;
    }
    let limit = f64::from(CURSOR_LIMIT);
    value.round().clamp(-limit, limit) as i8
}

/// 16-step direction for a screen-space angle (0 = up, clockwise degrees).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn direction_from_degrees(degrees: f64) -> u8 {
    ((normalize_degrees(degrees) / 22.5).round() as u8) % 16
}

/// A marker anchored at a world position, projected by the compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldCursor {
    pub location: Location,
    pub kind: CursorKind,
    pub caption: Option<String>,
    /// Drop the cursor instead of pinning it to the edge when off the raster.
    pub hide_off_map: bool,
}

impl WorldCursor {
    #[must_use]
    pub fn new(location: Location, kind: CursorKind) -> Self {
        Self { location, kind, caption: None, hide_off_map: false }
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    #[must_use]
    pub fn hidden_off_map(mut self) -> Self {
        self.hide_off_map = true;
        self
    }
}
