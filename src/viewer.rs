//! Viewer state: one record per (surface, user) currently holding the surface.
//!
//! DESIGN
//! ======
//! `ViewerState` is owned and mutated only by the scheduler's driver. Work
//! that runs in parallel receives a `ViewerSnapshot`, an owned copy with no
//! way back into the live record.
//!
//! The aim cursor follows the user's head: yaw drives aim-X relative to a
//! tracked heading centre, pitch drives aim-Y. Yaw inside the deadzone leaves
//! the centre alone; yaw beyond it drags the centre along so the cursor stays
//! pinned at the edge instead of jittering.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{BooleanOption, OrientationTuning};
use crate::cursor::CURSOR_LIMIT;
use crate::geometry::{Image, Location, SurfaceId, UserId, normalize_degrees};
use crate::menu::{MapInteraction, MapMenu};

// =============================================================================
// HANDS
// =============================================================================

/// Which hand holds the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Main,
    Off,
}

/// Per-user overrides consulted after the sub-map's own settings.
#[derive(Debug, Clone, Default)]
pub struct ViewerPreferences {
    pub rotate: BooleanOption,
    pub overlay: Option<Arc<Image>>,
    pub background: Option<Arc<Image>>,
}

// =============================================================================
// AIM MAPPING
// =============================================================================

/// New aim values computed from a heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimUpdate {
    pub cursor_x: f64,
    pub cursor_y: f64,
    pub cursor_center: f64,
}

/// Map a yaw/pitch onto the aim cursor relative to `cursor_center`.
#[must_use]
pub fn aim_from_heading(yaw: f64, pitch: f64, cursor_center: f64, tuning: &OrientationTuning) -> AimUpdate {
    let limit = f64::from(CURSOR_LIMIT);
    let deadzone = tuning.deadzone_degrees.max(f64::EPSILON);

    // Signed deviation of the centre from the current yaw, in (-180, 180].
    let offset = normalize_degrees(yaw + 180.0 - cursor_center);
    let deviation = 180.0 - offset;
    let cursor_x = -(deviation * limit / deadzone).clamp(-limit, limit);

    let excess = if deviation < -deadzone {
        deviation + deadzone
    } else if deviation > deadzone {
        deviation - deadzone
    } else {
        0.0
    };

    let pitch_mid = (tuning.pitch_min + tuning.pitch_max) / 2.0;
    let pitch_half = ((tuning.pitch_max - tuning.pitch_min) / 2.0).max(f64::EPSILON);
    let clamped_pitch = pitch.clamp(tuning.pitch_min.min(tuning.pitch_max), tuning.pitch_max.max(tuning.pitch_min));
    let cursor_y = (clamped_pitch - pitch_mid) / pitch_half * limit;

    AimUpdate { cursor_x, cursor_y, cursor_center: cursor_center - excess }
}

// =============================================================================
// VIEWER STATE
// =============================================================================

/// Live record for a user holding the surface.
pub struct ViewerState {
    user: UserId,
    surface: SurfaceId,
    map: Option<String>,
    zoom: f64,
    rotating: bool,
    main_hand: bool,
    cursor_x: f64,
    cursor_y: f64,
    cursor_center: f64,
    location: Location,
    last_updated: Instant,
    interaction: Option<MapInteraction>,
    menu: Option<Box<dyn MapMenu>>,
}

impl ViewerState {
    /// Fresh record with the aim reset. Held in the off hand until `with_hand`.
    #[must_use]
    pub fn new(user: UserId, surface: SurfaceId, map: Option<String>, location: Location, now: Instant) -> Self {
        Self {
            user,
            surface,
            map,
            zoom: 1.0,
            rotating: false,
            main_hand: false,
            cursor_x: 0.0,
            cursor_y: 0.0,
            cursor_center: 0.0,
            location,
            last_updated: now,
            interaction: None,
            menu: None,
        }
    }

    /// Set the holding hand. A main-hand record starts centred on the current yaw.
    #[must_use]
    pub fn with_hand(mut self, hand: Hand) -> Self {
        self.main_hand = hand == Hand::Main;
        if self.main_hand {
            self.cursor_x = 0.0;
            self.cursor_y = 0.0;
            self.cursor_center = normalize_degrees(f64::from(self.location.yaw));
        }
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotating: bool) -> Self {
        self.rotating = rotating;
        self
    }

    #[must_use]
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.set_zoom(zoom);
        self
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    #[must_use]
    pub fn map(&self) -> Option<&str> {
        self.map.as_deref()
    }

    pub fn set_map(&mut self, map: Option<String>) {
        self.map = map;
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Non-positive or non-finite zooms are ignored.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom;
        }
    }

    #[must_use]
    pub fn is_rotating(&self) -> bool {
        self.rotating
    }

    pub fn set_rotating(&mut self, rotating: bool) {
        self.rotating = rotating;
    }

    #[must_use]
    pub fn is_main_hand(&self) -> bool {
        self.main_hand
    }

    #[must_use]
    pub fn hand(&self) -> Hand {
        if self.main_hand { Hand::Main } else { Hand::Off }
    }

    #[must_use]
    pub fn cursor(&self) -> (f64, f64) {
        (self.cursor_x, self.cursor_y)
    }

    #[must_use]
    pub fn cursor_center(&self) -> f64 {
        self.cursor_center
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    #[must_use]
    pub fn last_updated(&self) -> Instant {
        self.last_updated
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_updated = now;
    }

    /// Recompute the aim cursor from the current location's heading.
    pub fn update_aim(&mut self, tuning: &OrientationTuning) {
        let update = aim_from_heading(
            f64::from(self.location.yaw),
            f64::from(self.location.pitch),
            self.cursor_center,
            tuning,
        );
        self.cursor_x = update.cursor_x;
        self.cursor_y = update.cursor_y;
        self.cursor_center = update.cursor_center;
    }

    #[must_use]
    pub fn interaction(&self) -> Option<MapInteraction> {
        self.interaction
    }

    pub fn set_interaction(&mut self, interaction: MapInteraction) {
        self.interaction = Some(interaction);
    }

    pub fn clear_interaction(&mut self) {
        self.interaction = None;
    }

    #[must_use]
    pub fn has_menu(&self) -> bool {
        self.menu.is_some()
    }

    pub(crate) fn menu_mut(&mut self) -> Option<&mut (dyn MapMenu + 'static)> {
        self.menu.as_deref_mut()
    }

    /// Attach `menu`, returning whatever was bound before (not yet closed).
    pub(crate) fn replace_menu(&mut self, menu: Box<dyn MapMenu>) -> Option<Box<dyn MapMenu>> {
        self.menu.replace(menu)
    }

    pub(crate) fn take_menu(&mut self) -> Option<Box<dyn MapMenu>> {
        self.menu.take()
    }

    /// Owned copy of everything a parallel task may read.
    #[must_use]
    pub fn snapshot(&self) -> ViewerSnapshot {
        ViewerSnapshot {
            user: self.user,
            surface: self.surface,
            map: self.map.clone(),
            zoom: self.zoom,
            rotating: self.rotating,
            main_hand: self.main_hand,
            cursor_x: self.cursor_x,
            cursor_y: self.cursor_y,
            cursor_center: self.cursor_center,
            location: self.location.clone(),
            interaction: self.interaction,
        }
    }
}

impl fmt::Debug for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerState")
            .field("user", &self.user)
            .field("surface", &self.surface)
            .field("map", &self.map)
            .field("zoom", &self.zoom)
            .field("rotating", &self.rotating)
            .field("main_hand", &self.main_hand)
            .field("cursor_x", &self.cursor_x)
            .field("cursor_y", &self.cursor_y)
            .field("cursor_center", &self.cursor_center)
            .field("location", &self.location)
            .field("interaction", &self.interaction)
            .field("menu_open", &self.menu.is_some())
            .finish_non_exhaustive()
    }
}

/// Immutable copy of a viewer, handed to providers and composition tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSnapshot {
    pub user: UserId,
    pub surface: SurfaceId,
    pub map: Option<String>,
    pub zoom: f64,
    pub rotating: bool,
    pub main_hand: bool,
    pub cursor_x: f64,
    pub cursor_y: f64,
    pub cursor_center: f64,
    pub location: Location,
    pub interaction: Option<MapInteraction>,
}

#[cfg(test)]
#[path = "viewer_test.rs"]
mod tests;
