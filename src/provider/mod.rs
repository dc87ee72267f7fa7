//! Layer providers: pluggable sources of pixels and cursors per sub-map.
//!
//! ARCHITECTURE
//! ============
//! Four capability traits, one per layer kind. A sub-map's `ProviderSet`
//! holds any number of each, queried in registration order with results
//! concatenated. Providers are plain query objects; they are called on the
//! driver while gathering, never from inside a composition task.
//!
//! ERROR HANDLING
//! ==============
//! The first provider error aborts gathering for that viewer only. The
//! scheduler logs it and skips the viewer's frame.

pub mod builtin;

use std::fmt;
use std::sync::Arc;

use crate::cache::PixelSource;
use crate::config::RenderConfig;
use crate::cursor::{MapCursor, WorldCursor};
use crate::geometry::{Image, UserId};
use crate::minimap::Minimap;
use crate::pixel::{MapPixel, WorldPixel};
use crate::viewer::{ViewerPreferences, ViewerSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} provider failed: {reason}")]
    Failed { provider: String, reason: String },
}

impl ProviderError {
    #[must_use]
    pub fn failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed { provider: provider.into(), reason: reason.into() }
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// World-anchored rectangles drawn between terrain and overlay.
pub trait WorldPixelProvider: Send + Sync {
    fn world_pixels(&self, user: UserId, map: &Minimap, viewer: &ViewerSnapshot) -> Result<Vec<WorldPixel>, ProviderError>;
}

/// World-anchored cursors, projected and rotated by the compositor.
pub trait WorldCursorProvider: Send + Sync {
    fn world_cursors(&self, user: UserId, map: &Minimap, viewer: &ViewerSnapshot) -> Result<Vec<WorldCursor>, ProviderError>;
}

/// Screen-space pixels drawn above the overlay.
pub trait MapPixelProvider: Send + Sync {
    fn map_pixels(&self, user: UserId, map: &Minimap, viewer: &ViewerSnapshot) -> Result<Vec<MapPixel>, ProviderError>;
}

/// Screen-space cursors delivered after the world cursors.
pub trait MapCursorProvider: Send + Sync {
    fn map_cursors(&self, user: UserId, map: &Minimap, viewer: &ViewerSnapshot) -> Result<Vec<MapCursor>, ProviderError>;
}

// =============================================================================
// PROVIDER SET
// =============================================================================

/// Registered providers of a sub-map, in registration order per kind.
#[derive(Clone, Default)]
pub struct ProviderSet {
    world_pixels: Vec<Arc<dyn WorldPixelProvider>>,
    world_cursors: Vec<Arc<dyn WorldCursorProvider>>,
    map_pixels: Vec<Arc<dyn MapPixelProvider>>,
    map_cursors: Vec<Arc<dyn MapCursorProvider>>,
}

impl ProviderSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_world_pixels(&mut self, provider: Arc<dyn WorldPixelProvider>) -> &mut Self {
        self.world_pixels.push(provider);
        self
    }

    pub fn register_world_cursors(&mut self, provider: Arc<dyn WorldCursorProvider>) -> &mut Self {
        self.world_cursors.push(provider);
        self
    }

    pub fn register_map_pixels(&mut self, provider: Arc<dyn MapPixelProvider>) -> &mut Self {
        self.map_pixels.push(provider);
        self
    }

    pub fn register_map_cursors(&mut self, provider: Arc<dyn MapCursorProvider>) -> &mut Self {
        self.map_cursors.push(provider);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.world_pixels.is_empty()
            && self.world_cursors.is_empty()
            && self.map_pixels.is_empty()
            && self.map_cursors.is_empty()
    }

    /// Query every provider of every kind for one viewer.
    ///
    /// # Errors
    ///
    /// Returns the first provider error encountered.
    pub fn gather(&self, user: UserId, map: &Minimap, viewer: &ViewerSnapshot) -> Result<GatheredLayers, ProviderError> {
        let mut layers = GatheredLayers::default();
        for provider in &self.world_pixels {
            layers.world_pixels.extend(provider.world_pixels(user, map, viewer)?);
        }
        for provider in &self.world_cursors {
            layers.world_cursors.extend(provider.world_cursors(user, map, viewer)?);
        }
        for provider in &self.map_pixels {
            layers.map_pixels.extend(provider.map_pixels(user, map, viewer)?);
        }
        for provider in &self.map_cursors {
            layers.map_cursors.extend(provider.map_cursors(user, map, viewer)?);
        }
        Ok(layers)
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet")
            .field("world_pixels", &self.world_pixels.len())
            .field("world_cursors", &self.world_cursors.len())
            .field("map_pixels", &self.map_pixels.len())
            .field("map_cursors", &self.map_cursors.len())
            .finish()
    }
}

/// Concatenated provider output for one viewer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatheredLayers {
    pub world_pixels: Vec<WorldPixel>,
    pub world_cursors: Vec<WorldCursor>,
    pub map_pixels: Vec<MapPixel>,
    pub map_cursors: Vec<MapCursor>,
}

// =============================================================================
// LAYER BUNDLE
// =============================================================================

/// Everything one composition task needs, owned so it can move to a worker.
#[derive(Clone)]
pub struct LayerBundle {
    pub layers: GatheredLayers,
    pub overlay: Option<Arc<Image>>,
    pub background: Option<Arc<Image>>,
    pub cache: Arc<dyn PixelSource>,
    pub viewer: ViewerSnapshot,
}

impl LayerBundle {
    /// Gather provider output and resolve the whole-image layers for a viewer.
    ///
    /// # Errors
    ///
    /// Returns the first provider error encountered.
    pub fn gather(
        map: &Minimap,
        viewer: ViewerSnapshot,
        prefs: &ViewerPreferences,
        config: &RenderConfig,
    ) -> Result<Self, ProviderError> {
        let layers = map.providers().gather(viewer.user, map, &viewer)?;
        let settings = map.settings();
        Ok(Self {
            layers,
            overlay: resolve_image(settings.overlay.as_ref(), prefs.overlay.as_ref(), config.overlay.as_ref()),
            background: resolve_image(settings.background.as_ref(), prefs.background.as_ref(), config.background.as_ref()),
            cache: Arc::clone(map.cache()),
            viewer,
        })
    }
}

impl fmt::Debug for LayerBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerBundle")
            .field("layers", &self.layers)
            .field("overlay", &self.overlay.is_some())
            .field("background", &self.background.is_some())
            .field("viewer", &self.viewer)
            .finish_non_exhaustive()
    }
}

/// Sub-map override, then user override, then global default.
#[must_use]
pub fn resolve_image(
    map: Option<&Arc<Image>>,
    user: Option<&Arc<Image>>,
    global: Option<&Arc<Image>>,
) -> Option<Arc<Image>> {
    map.or(user).or(global).cloned()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
