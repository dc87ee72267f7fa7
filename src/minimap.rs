//! Sub-maps: named minimap definitions and the registry that resolves them.
//!
//! DESIGN
//! ======
//! Surfaces and viewers hold a sub-map by its string id. The registry is the
//! only owner of `Minimap` values; removing one drops it for good, and every
//! later lookup through a stale id simply yields `None`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::cache::{LoadQueue, PixelSource};
use crate::config::BooleanOption;
use crate::geometry::Image;
use crate::provider::ProviderSet;

// =============================================================================
// ZOOM
// =============================================================================

/// Preset zoom levels, expressed as blocks per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomScale {
    Quarter,
    Half,
    #[default]
    One,
    Two,
    Four,
    Eight,
    Sixteen,
}

impl ZoomScale {
    pub const ALL: [Self; 7] = [Self::Quarter, Self::Half, Self::One, Self::Two, Self::Four, Self::Eight, Self::Sixteen];

    #[must_use]
    pub fn blocks_per_pixel(self) -> f64 {
        match self {
            Self::Quarter => 0.25,
            Self::Half => 0.5,
            Self::One => 1.0,
            Self::Two => 2.0,
            Self::Four => 4.0,
            Self::Eight => 8.0,
            Self::Sixteen => 16.0,
        }
    }

    /// Preset closest to `blocks_per_pixel` on a logarithmic scale.
    #[must_use]
    pub fn nearest(blocks_per_pixel: f64) -> Self {
        if !blocks_per_pixel.is_finite() || blocks_per_pixel <= 0.0 {
            return Self::One;
        }
        let target = blocks_per_pixel.log2();
        Self::ALL
            .into_iter()
            .min_by(|a, b| {
                let da = (a.blocks_per_pixel().log2() - target).abs();
                let db = (b.blocks_per_pixel().log2() - target).abs();
                da.total_cmp(&db)
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// MINIMAP
// =============================================================================

/// Per-sub-map display settings; unset values defer to the user, then global.
#[derive(Debug, Clone, Default)]
pub struct MinimapSettings {
    pub rotation: BooleanOption,
    pub default_zoom: ZoomScale,
    pub overlay: Option<Arc<Image>>,
    pub background: Option<Arc<Image>>,
}

/// A configured minimap: terrain source, load queue, settings, providers.
pub struct Minimap {
    id: String,
    settings: MinimapSettings,
    providers: ProviderSet,
    cache: Arc<dyn PixelSource>,
    queue: Arc<dyn LoadQueue>,
}

impl Minimap {
    #[must_use]
    pub fn new(id: impl Into<String>, cache: Arc<dyn PixelSource>, queue: Arc<dyn LoadQueue>) -> Self {
        Self {
            id: id.into(),
            settings: MinimapSettings::default(),
            providers: ProviderSet::default(),
            cache,
            queue,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: MinimapSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_providers(mut self, providers: ProviderSet) -> Self {
        self.providers = providers;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn settings(&self) -> &MinimapSettings {
        &self.settings
    }

    #[must_use]
    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    pub fn providers_mut(&mut self) -> &mut ProviderSet {
        &mut self.providers
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<dyn PixelSource> {
        &self.cache
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<dyn LoadQueue> {
        &self.queue
    }
}

impl fmt::Debug for Minimap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Minimap")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Owner of every live sub-map, keyed by id.
#[derive(Debug, Default)]
pub struct MinimapRegistry {
    maps: RwLock<HashMap<String, Arc<Minimap>>>,
}

impl MinimapRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `map`, replacing any sub-map with the same id.
    pub fn insert(&self, map: Minimap) -> Arc<Minimap> {
        let map = Arc::new(map);
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        maps.insert(map.id().to_owned(), Arc::clone(&map));
        map
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Minimap>> {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        maps.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Minimap>> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.get(id).cloned()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = maps.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryTileCache, RegionKey};

    struct NullQueue;

    impl LoadQueue for NullQueue {
        fn load(&self, _key: RegionKey) {}
    }

    fn map(id: &str) -> Minimap {
        Minimap::new(id, Arc::new(MemoryTileCache::new()), Arc::new(NullQueue))
    }

    #[test]
    fn zoom_nearest_snaps_to_presets() {
        assert_eq!(ZoomScale::nearest(1.0), ZoomScale::One);
        assert_eq!(ZoomScale::nearest(3.5), ZoomScale::Four);
        assert_eq!(ZoomScale::nearest(0.3), ZoomScale::Quarter);
        assert_eq!(ZoomScale::nearest(100.0), ZoomScale::Sixteen);
        assert_eq!(ZoomScale::nearest(-2.0), ZoomScale::One);
    }

    #[test]
    fn registry_resolves_lazily_and_forgets_removed_maps() {
        let registry = MinimapRegistry::new();
        registry.insert(map("overview"));
        registry.insert(map("nether"));
        assert_eq!(registry.ids(), vec!["nether".to_owned(), "overview".to_owned()]);
        assert_eq!(registry.get("overview").map(|m| m.id().to_owned()), Some("overview".to_owned()));

        assert!(registry.remove("overview").is_some());
        assert!(registry.get("overview").is_none());
    }

    #[test]
    fn insert_replaces_same_id() {
        let registry = MinimapRegistry::new();
        registry.insert(map("a"));
        let settings = MinimapSettings { default_zoom: ZoomScale::Four, ..MinimapSettings::default() };
        registry.insert(map("a").with_settings(settings));
        let resolved = registry.get("a").map(|m| m.settings().default_zoom);
        assert_eq!(resolved, Some(ZoomScale::Four));
    }
}
