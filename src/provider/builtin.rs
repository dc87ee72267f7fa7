//! Stock providers: the viewer's own arrow and named world locations.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::cursor::{CursorKind, MapCursor, WorldCursor, direction_from_degrees};
use crate::geometry::{Location, UserId};
use crate::minimap::Minimap;
use crate::provider::{MapCursorProvider, ProviderError, WorldCursorProvider};
use crate::viewer::ViewerSnapshot;

/// Arrow at the raster centre showing where the viewer faces.
///
/// When the map rotates the heading is always up; otherwise the arrow turns
/// with the viewer's yaw.
#[derive(Debug, Clone, Copy)]
pub struct ViewerArrowProvider {
    pub kind: CursorKind,
}

impl Default for ViewerArrowProvider {
    fn default() -> Self {
        Self { kind: CursorKind::WhitePointer }
    }
}

impl MapCursorProvider for ViewerArrowProvider {
    fn map_cursors(&self, _user: UserId, _map: &Minimap, viewer: &ViewerSnapshot) -> Result<Vec<MapCursor>, ProviderError> {
        let direction = if viewer.rotating {
            0
        } else {
            direction_from_degrees(f64::from(viewer.location.yaw) + 180.0)
        };
        Ok(vec![MapCursor::new(0.0, 0.0, direction, self.kind)])
    }
}

/// A remembered location, e.g. where a user last died.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedLocation {
    pub name: String,
    pub location: Location,
}

/// World cursors for per-user named locations, captioned with their name.
#[derive(Debug)]
pub struct NamedLocationProvider {
    kind: CursorKind,
    locations: RwLock<HashMap<UserId, Vec<NamedLocation>>>,
}

impl NamedLocationProvider {
    #[must_use]
    pub fn new(kind: CursorKind) -> Self {
        Self { kind, locations: RwLock::new(HashMap::new()) }
    }

    /// Remember `location` under `name`, replacing an earlier entry of that name.
    pub fn set(&self, user: UserId, name: impl Into<String>, location: Location) {
        let name = name.into();
        let mut locations = self.locations.write().unwrap_or_else(PoisonError::into_inner);
        let entries = locations.entry(user).or_default();
        entries.retain(|entry| entry.name != name);
        entries.push(NamedLocation { name, location });
    }

    pub fn clear(&self, user: UserId) {
        let mut locations = self.locations.write().unwrap_or_else(PoisonError::into_inner);
        locations.remove(&user);
    }

    #[must_use]
    pub fn get(&self, user: UserId) -> Vec<NamedLocation> {
        let locations = self.locations.read().unwrap_or_else(PoisonError::into_inner);
        locations.get(&user).cloned().unwrap_or_default()
    }
}

impl WorldCursorProvider for NamedLocationProvider {
    fn world_cursors(&self, user: UserId, _map: &Minimap, viewer: &ViewerSnapshot) -> Result<Vec<WorldCursor>, ProviderError> {
        Ok(self
            .get(user)
            .into_iter()
            .filter(|entry| entry.location.world == viewer.location.world)
            .map(|entry| WorldCursor::new(entry.location, self.kind).with_caption(entry.name))
            .collect())
    }
}
