//! Frame compositor: turns one viewer's layer bundle into a raster and cursors.
//!
//! DESIGN
//! ======
//! `compose` is a pure function of its inputs: the same bundle and palette
//! always produce the same bytes. It runs inside a blocking worker, so it
//! never touches scheduler state, never queues loads, and never fails. A
//! missing terrain region is painted with `LOADING_COLOR` and its key is
//! returned in `needs_render` for the driver to queue after fan-in.
//!
//! Layers, bottom to top:
//!
//! 1. background image
//! 2. base terrain (depth 0)
//! 3. world pixels, ascending depth
//! 4. overlay image (depth 0xFFFF)
//! 5. map pixels, ascending depth
//!
//! Blending happens in true color; the palette is applied once at the end.
//!
//! ROTATION
//! ========
//! When the viewer's map rotates, screen-up follows the viewer's heading.
//! Each raster pixel is mapped to a world position by rotating its offset
//! from the centre by `phi` and scaling by zoom. World cursors take the
//! inverse path.

use std::collections::{BTreeSet, HashMap};

use crate::cache::{RegionKey, TileData, region_coords};
use crate::cursor::{CURSOR_LIMIT, MapCursor, WorldCursor, direction_from_degrees};
use crate::geometry::{Color, Location, RASTER_LEN, RASTER_SIZE, SurfaceId, UserId, rotate};
use crate::palette::Palette;
use crate::provider::LayerBundle;
use crate::viewer::ViewerSnapshot;

/// Fill for terrain whose region has not been rendered yet.
pub const LOADING_COLOR: Color = Color::rgb(112, 112, 112);

#[allow(clippy::cast_precision_loss)]
const HALF_RASTER: f64 = (RASTER_SIZE / 2) as f64;

/// Finished frame for one viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub user: UserId,
    pub surface: SurfaceId,
    pub raster: Vec<u8>,
    pub cursors: Vec<MapCursor>,
    /// Regions that were not ready and should be queued for loading.
    pub needs_render: BTreeSet<RegionKey>,
}

// =============================================================================
// PROJECTION
// =============================================================================

/// Screen-to-world transform for one viewer.
#[derive(Debug, Clone, Copy)]
struct Projection {
    origin_x: f64,
    origin_z: f64,
    zoom: f64,
    phi: f64,
}

impl Projection {
    fn for_viewer(viewer: &ViewerSnapshot) -> Self {
        Self {
            origin_x: viewer.location.x,
            origin_z: viewer.location.z,
            zoom: viewer.zoom,
            phi: rotation_degrees(viewer).to_radians(),
        }
    }

    /// World position under the centre of raster pixel `(px, py)`.
    #[allow(clippy::cast_precision_loss)]
    fn to_world(self, px: usize, py: usize) -> (f64, f64) {
        let u = px as f64 + 0.5 - HALF_RASTER;
        let v = py as f64 + 0.5 - HALF_RASTER;
        let (dx, dz) = rotate(u, v, self.phi);
        (self.origin_x + dx * self.zoom, self.origin_z + dz * self.zoom)
    }

    /// Raster offset from the centre, in pixels, of a world position.
    fn to_screen(self, x: f64, z: f64) -> (f64, f64) {
        let (u, v) = rotate(x - self.origin_x, z - self.origin_z, -self.phi);
        (u / self.zoom, v / self.zoom)
    }
}

/// Clockwise screen rotation in degrees: the viewer's heading when rotating.
fn rotation_degrees(viewer: &ViewerSnapshot) -> f64 {
    if viewer.rotating { f64::from(viewer.location.yaw) + 180.0 } else { 0.0 }
}

// =============================================================================
// COMPOSE
// =============================================================================

/// Compose a full frame for the bundle's viewer.
#[must_use]
pub fn compose(bundle: &LayerBundle, palette: &dyn Palette) -> Composition {
    let viewer = &bundle.viewer;
    let projection = Projection::for_viewer(viewer);
    let world = viewer.location.world.as_str();

    let mut world_pixels: Vec<_> = bundle.layers.world_pixels.iter().filter(|p| p.world == world).collect();
    world_pixels.sort_by_key(|p| p.depth);

    let mut tiles: HashMap<(i32, i32), TileData> = HashMap::new();
    let mut needs_render = BTreeSet::new();
    let mut buffer = Vec::with_capacity(RASTER_LEN);

    for py in 0..RASTER_SIZE {
        for px in 0..RASTER_SIZE {
            let mut color = bundle.background.as_ref().map_or(Color::TRANSPARENT, |img| img.sample(px, py, RASTER_SIZE));

            let (wx, wz) = projection.to_world(px, py);
            let terrain = terrain_color(bundle, palette, world, wx, wz, &mut tiles, &mut needs_render);
            color = terrain.over(color);

            for pixel in &world_pixels {
                if pixel.contains(wx, wz) {
                    color = pixel.color.over(color);
                }
            }

            if let Some(overlay) = &bundle.overlay {
                color = overlay.sample(px, py, RASTER_SIZE).over(color);
            }
            buffer.push(color);
        }
    }

    let mut map_pixels = bundle.layers.map_pixels.clone();
    map_pixels.sort_by_key(|p| p.depth);
    for pixel in map_pixels {
        let (Ok(x), Ok(y)) = (usize::try_from(pixel.x), usize::try_from(pixel.y)) else {
            continue;
        };
        if x >= RASTER_SIZE || y >= RASTER_SIZE {
            continue;
        }
        let slot = &mut buffer[y * RASTER_SIZE + x];
        *slot = pixel.color.over(*slot);
    }

    let raster = buffer.into_iter().map(|c| palette.index_of(c)).collect();

    Composition {
        user: viewer.user,
        surface: viewer.surface,
        raster,
        cursors: project_cursors(bundle, projection),
        needs_render,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn terrain_color(
    bundle: &LayerBundle,
    palette: &dyn Palette,
    world: &str,
    wx: f64,
    wz: f64,
    tiles: &mut HashMap<(i32, i32), TileData>,
    needs_render: &mut BTreeSet<RegionKey>,
) -> Color {
    let (bx, bz) = (wx.floor() as i64, wz.floor() as i64);
    let coords = region_coords(bx, bz);
    let tile = tiles.entry(coords).or_insert_with(|| {
        let key = RegionKey::new(world, coords.0, coords.1);
        let tile = bundle.cache.fetch(&key);
        if matches!(tile, TileData::NotReady) {
            needs_render.insert(key);
        }
        tile
    });

    match tile {
        TileData::Ready(bytes) => bytes
            .get(RegionKey::local_index(bx, bz))
            .map_or(Color::TRANSPARENT, |&index| palette.color_of(index)),
        TileData::NotReady => LOADING_COLOR,
    }
}

// =============================================================================
// CURSORS
// =============================================================================

fn project_cursors(bundle: &LayerBundle, projection: Projection) -> Vec<MapCursor> {
    let viewer = &bundle.viewer;
    let phi_degrees = rotation_degrees(viewer);
    let mut cursors: Vec<MapCursor> = Vec::new();

    let world_cursors = bundle
        .layers
        .world_cursors
        .iter()
        .filter(|c| c.location.world == viewer.location.world)
        .filter_map(|c| project_world_cursor(c, projection, phi_degrees));
    let map_cursors = bundle.layers.map_cursors.iter().cloned().map(MapCursor::clamped);

    for cursor in world_cursors.chain(map_cursors) {
        if !cursors.contains(&cursor) {
            cursors.push(cursor);
        }
    }
    cursors
}

fn project_world_cursor(cursor: &WorldCursor, projection: Projection, phi_degrees: f64) -> Option<MapCursor> {
    let Location { x, z, yaw, .. } = &cursor.location;
    let (u, v) = projection.to_screen(*x, *z);
    // Cursor axes are in half-pixel units.
    let (cx, cy) = (u * 2.0, v * 2.0);

    let limit = f64::from(CURSOR_LIMIT);
    if cursor.hide_off_map && (cx.abs() > limit || cy.abs() > limit) {
        return None;
    }

    let direction = direction_from_degrees(f64::from(*yaw) + 180.0 - phi_degrees);
    let mapped = MapCursor::new(cx, cy, direction, cursor.kind);
    Some(match &cursor.caption {
        Some(caption) => mapped.with_caption(caption.clone()),
        None => mapped,
    })
}

#[cfg(test)]
#[path = "compositor_test.rs"]
mod tests;
