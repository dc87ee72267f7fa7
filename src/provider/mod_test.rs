use super::builtin::{NamedLocationProvider, ViewerArrowProvider};
use super::*;
use crate::cursor::CursorKind;
use crate::geometry::{Color, Location};
use crate::test_helpers::{FlatCache, RecordingQueue, snapshot, test_map, user};

// =============================================================================
// FIXTURES
// =============================================================================

struct FixedCursors(Vec<MapCursor>);

impl MapCursorProvider for FixedCursors {
    fn map_cursors(&self, _user: UserId, _map: &Minimap, _viewer: &ViewerSnapshot) -> Result<Vec<MapCursor>, ProviderError> {
        Ok(self.0.clone())
    }
}

struct FixedPixels(Vec<MapPixel>);

impl MapPixelProvider for FixedPixels {
    fn map_pixels(&self, _user: UserId, _map: &Minimap, _viewer: &ViewerSnapshot) -> Result<Vec<MapPixel>, ProviderError> {
        Ok(self.0.clone())
    }
}

struct Broken;

impl WorldPixelProvider for Broken {
    fn world_pixels(&self, _user: UserId, _map: &Minimap, _viewer: &ViewerSnapshot) -> Result<Vec<WorldPixel>, ProviderError> {
        Err(ProviderError::failed("broken", "backing store offline"))
    }
}

/// Echoes the user id back as a caption, to prove per-viewer partitioning.
struct WhoAmI;

impl MapCursorProvider for WhoAmI {
    fn map_cursors(&self, user: UserId, _map: &Minimap, _viewer: &ViewerSnapshot) -> Result<Vec<MapCursor>, ProviderError> {
        Ok(vec![MapCursor::new(0.0, 0.0, 0, CursorKind::RedX).with_caption(user.to_string())])
    }
}

fn cursor(x: f64) -> MapCursor {
    MapCursor::new(x, 0.0, 0, CursorKind::WhiteCross)
}

fn empty_map() -> Minimap {
    test_map("overview", Arc::new(FlatCache::new(6)), Arc::new(RecordingQueue::default()))
}

// =============================================================================
// GATHER
// =============================================================================

#[test]
fn gather_concatenates_in_registration_order() {
    let mut providers = ProviderSet::new();
    providers
        .register_map_cursors(Arc::new(FixedCursors(vec![cursor(1.0), cursor(2.0)])))
        .register_map_cursors(Arc::new(FixedCursors(vec![cursor(3.0)])));
    let map = empty_map();
    let viewer = snapshot(user());

    let layers = providers.gather(viewer.user, &map, &viewer).unwrap();
    let xs: Vec<i8> = layers.map_cursors.iter().map(|c| c.x).collect();
    assert_eq!(xs, vec![1, 2, 3]);
    assert!(layers.world_pixels.is_empty());
}

#[test]
fn gather_keeps_duplicates() {
    let mut providers = ProviderSet::new();
    let px = MapPixel::new(4, 4, Color::rgb(255, 0, 0));
    providers.register_map_pixels(Arc::new(FixedPixels(vec![px, px])));
    let map = empty_map();
    let viewer = snapshot(user());

    let layers = providers.gather(viewer.user, &map, &viewer).unwrap();
    assert_eq!(layers.map_pixels.len(), 2);
}

#[test]
fn gather_fails_on_first_provider_error() {
    let mut providers = ProviderSet::new();
    providers.register_world_pixels(Arc::new(Broken));
    providers.register_map_cursors(Arc::new(FixedCursors(vec![cursor(1.0)])));
    let map = empty_map();
    let viewer = snapshot(user());

    let err = providers.gather(viewer.user, &map, &viewer).unwrap_err();
    assert!(err.to_string().contains("broken provider failed"));
}

#[test]
fn gather_is_partitioned_per_user() {
    let mut providers = ProviderSet::new();
    providers.register_map_cursors(Arc::new(WhoAmI));
    let map = empty_map();
    let (a, b) = (snapshot(user()), snapshot(user()));

    let from_a = providers.gather(a.user, &map, &a).unwrap();
    let from_b = providers.gather(b.user, &map, &b).unwrap();
    assert_eq!(from_a.map_cursors[0].caption, Some(a.user.to_string()));
    assert_eq!(from_b.map_cursors[0].caption, Some(b.user.to_string()));
}

#[test]
fn empty_set_reports_empty() {
    let mut providers = ProviderSet::new();
    assert!(providers.is_empty());
    providers.register_map_cursors(Arc::new(ViewerArrowProvider::default()));
    assert!(!providers.is_empty());
}

// =============================================================================
// IMAGE RESOLUTION
// =============================================================================

#[test]
fn resolve_image_prefers_map_then_user_then_global() {
    let map = Arc::new(Image::filled(1, 1, Color::rgb(1, 0, 0)));
    let user = Arc::new(Image::filled(1, 1, Color::rgb(0, 1, 0)));
    let global = Arc::new(Image::filled(1, 1, Color::rgb(0, 0, 1)));

    let picked = resolve_image(Some(&map), Some(&user), Some(&global)).unwrap();
    assert!(Arc::ptr_eq(&picked, &map));
    let picked = resolve_image(None, Some(&user), Some(&global)).unwrap();
    assert!(Arc::ptr_eq(&picked, &user));
    let picked = resolve_image(None, None, Some(&global)).unwrap();
    assert!(Arc::ptr_eq(&picked, &global));
    assert!(resolve_image(None, None, None).is_none());
}

#[test]
fn layer_bundle_resolves_user_overlay_over_global() {
    let map = empty_map();
    let user_overlay = Arc::new(Image::filled(1, 1, Color::rgb(9, 9, 9)));
    let prefs = ViewerPreferences { overlay: Some(Arc::clone(&user_overlay)), ..ViewerPreferences::default() };
    let config = RenderConfig::default()
        .with_overlay(Image::filled(1, 1, Color::rgb(1, 1, 1)))
        .with_background(Image::filled(1, 1, Color::rgb(2, 2, 2)));

    let bundle = LayerBundle::gather(&map, snapshot(user()), &prefs, &config).unwrap();
    assert!(Arc::ptr_eq(bundle.overlay.as_ref().unwrap(), &user_overlay));
    assert_eq!(bundle.background.as_ref().unwrap().get(0, 0), Color::rgb(2, 2, 2));
}

// =============================================================================
// BUILT-IN PROVIDERS
// =============================================================================

#[test]
fn viewer_arrow_points_up_when_rotating() {
    let map = empty_map();
    let mut viewer = snapshot(user());
    viewer.rotating = true;
    viewer.location.yaw = 73.0;

    let cursors = ViewerArrowProvider::default().map_cursors(viewer.user, &map, &viewer).unwrap();
    assert_eq!(cursors.len(), 1);
    assert_eq!((cursors[0].x, cursors[0].y, cursors[0].direction), (0, 0, 0));
}

#[test]
fn viewer_arrow_follows_heading_when_fixed() {
    let map = empty_map();
    let mut viewer = snapshot(user());
    // Facing south (+z) is straight down on a north-up map.
    viewer.location.yaw = 0.0;
    let cursors = ViewerArrowProvider::default().map_cursors(viewer.user, &map, &viewer).unwrap();
    assert_eq!(cursors[0].direction, 8);

    // Facing west (-x) points left.
    viewer.location.yaw = 90.0;
    let cursors = ViewerArrowProvider::default().map_cursors(viewer.user, &map, &viewer).unwrap();
    assert_eq!(cursors[0].direction, 12);
}

#[test]
fn named_locations_are_per_user_and_per_world() {
    let provider = NamedLocationProvider::new(CursorKind::RedX);
    let map = empty_map();
    let viewer = snapshot(user());
    let other = user();

    provider.set(viewer.user, "death", Location::new("world", 10.0, 64.0, 10.0));
    provider.set(viewer.user, "nether portal", Location::new("nether", 0.0, 64.0, 0.0));
    provider.set(other, "home", Location::new("world", 0.0, 64.0, 0.0));

    let cursors = provider.world_cursors(viewer.user, &map, &viewer).unwrap();
    assert_eq!(cursors.len(), 1);
    assert_eq!(cursors[0].caption.as_deref(), Some("death"));
    assert_eq!(cursors[0].kind, CursorKind::RedX);
}

#[test]
fn named_location_set_replaces_same_name() {
    let provider = NamedLocationProvider::new(CursorKind::RedX);
    let who = user();
    provider.set(who, "death", Location::new("world", 1.0, 64.0, 1.0));
    provider.set(who, "death", Location::new("world", 2.0, 64.0, 2.0));

    let entries = provider.get(who);
    assert_eq!(entries.len(), 1);
    assert!((entries[0].location.x - 2.0).abs() < f64::EPSILON);

    provider.clear(who);
    assert!(provider.get(who).is_empty());
}
