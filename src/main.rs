//! Demo host driving one map surface for a handful of simulated users.
//!
//! Terrain is synthesised on demand by a loader task fed from the region
//! load queue, and finished frames are drained by a transport task that
//! encodes them as JSON. Set `MINIMAP_RENDER_MODE=free` to compose from the
//! free-running loop instead of the host tick.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use minimap::cache::{REGION_LEN, REGION_SIZE};
use minimap::config::env_parse;
use minimap::provider::WorldPixelProvider;
use minimap::provider::builtin::{NamedLocationProvider, ViewerArrowProvider};
use minimap::{
    ChannelGateway, ChannelLoadQueue, Color, CursorKind, FramePacket, FrameScheduler, Host, Location,
    MemoryTileCache, Minimap, MinimapRegistry, NearestPalette, PixelSource, PlayerSnapshot, ProviderError,
    ProviderSet, RegionKey, RenderConfig, RenderMode, SurfaceId, TileData, UserId, ViewerSnapshot, WorldPixel,
    spawn_free_running,
};

const DEFAULT_DEMO_TICKS: u64 = 200;
const DEFAULT_DEMO_PLAYERS: usize = 3;
const HOST_TICK_MS: u64 = 50;
const LOAD_QUEUE_CAPACITY: usize = 256;
const FRAME_QUEUE_CAPACITY: usize = 64;
const LOAD_LATENCY_MS: u64 = 5;

const SURFACE: SurfaceId = 1;
const WORLD: &str = "world";
const ORBIT_RADIUS: f64 = 120.0;

// Palette indices used by the synthetic terrain.
const GRASS: u8 = 6;
const GRASS_DARK: u8 = 5;
const WATER: u8 = 50;

// =============================================================================
// SIMULATED HOST
// =============================================================================

/// Users orbit spawn. The second user holds the map in the off hand and the
/// last one puts it away for a while midway through.
#[derive(Default)]
struct DemoHost {
    players: RwLock<HashMap<UserId, PlayerSnapshot>>,
}

impl DemoHost {
    #[allow(clippy::cast_precision_loss)]
    fn advance(&self, users: &[UserId], tick: u64, ticks: u64) {
        let mut players = self.players.write().unwrap_or_else(PoisonError::into_inner);
        for (i, &user) in users.iter().enumerate() {
            let angle = tick as f64 * 0.02 + i as f64 * TAU / users.len() as f64;
            let (sin, cos) = angle.sin_cos();
            // Moving along the orbit tangent (-sin, cos) means a yaw of `angle`.
            #[allow(clippy::cast_possible_truncation)]
            let yaw = angle.to_degrees() as f32;
            let location = Location::new(WORLD, cos * ORBIT_RADIUS, 64.0, sin * ORBIT_RADIUS).with_rotation(yaw, 70.0);

            let away = i + 1 == users.len() && (ticks / 2..ticks / 2 + 40).contains(&tick);
            let (main_hand, off_hand) = match (i, away) {
                (_, true) => (None, None),
                (1, false) => (None, Some(SURFACE)),
                _ => (Some(SURFACE), None),
            };
            players.insert(user, PlayerSnapshot { location, main_hand, off_hand });
        }
    }
}

impl Host for DemoHost {
    fn is_overloaded(&self) -> bool {
        false
    }

    fn player(&self, user: UserId) -> Option<PlayerSnapshot> {
        let players = self.players.read().unwrap_or_else(PoisonError::into_inner);
        players.get(&user).cloned()
    }
}

/// Red square marking world spawn.
struct SpawnBeacon;

impl WorldPixelProvider for SpawnBeacon {
    fn world_pixels(&self, _user: UserId, _map: &Minimap, _viewer: &ViewerSnapshot) -> Result<Vec<WorldPixel>, ProviderError> {
        Ok(vec![WorldPixel::new(WORLD, -2.0, -2.0, Color::rgb(255, 0, 0)).with_size(4.0, 4.0).with_depth(1)])
    }
}

// =============================================================================
// COLLABORATOR TASKS
// =============================================================================

fn synthesize_region(key: &RegionKey) -> Vec<u8> {
    let mut tile = Vec::with_capacity(REGION_LEN);
    for lz in 0..REGION_SIZE {
        for lx in 0..REGION_SIZE {
            let x = i64::from(key.x) * REGION_SIZE + lx;
            let z = i64::from(key.z) * REGION_SIZE + lz;
            let index = if (x + z / 3).rem_euclid(96) < 6 {
                WATER
            } else if (x.div_euclid(32) + z.div_euclid(32)).rem_euclid(2) == 0 {
                GRASS
            } else {
                GRASS_DARK
            };
            tile.push(index);
        }
    }
    tile
}

/// Renders queued regions into the cache. Ends when every queue handle is gone.
fn spawn_loader(cache: Arc<MemoryTileCache>, mut rx: mpsc::Receiver<RegionKey>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut loaded = 0;
        while let Some(key) = rx.recv().await {
            // The same region is reported every frame until it lands.
            if matches!(cache.fetch(&key), TileData::Ready(_)) {
                continue;
            }
            tokio::time::sleep(Duration::from_millis(LOAD_LATENCY_MS)).await;
            cache.insert(key.clone(), synthesize_region(&key));
            loaded += 1;
            debug!(world = %key.world, x = key.x, z = key.z, "region rendered");
        }
        loaded
    })
}

/// Drains delivered frames. Ends when the gateway is dropped.
fn spawn_transport(mut rx: mpsc::Receiver<FramePacket>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut frames = 0;
        while let Some(packet) = rx.recv().await {
            frames += 1;
            match packet.to_json() {
                Ok(json) => debug!(
                    user = %packet.user,
                    surface = packet.surface,
                    bytes = json.len(),
                    cursors = packet.cursors.len(),
                    "frame sent"
                ),
                Err(e) => warn!(error = %e, user = %packet.user, "frame encoding failed"),
            }
        }
        frames
    })
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = RenderConfig::from_env();
    let ticks = env_parse("MINIMAP_DEMO_TICKS", DEFAULT_DEMO_TICKS);
    let player_count = env_parse("MINIMAP_DEMO_PLAYERS", DEFAULT_DEMO_PLAYERS).max(1);
    let mode = config.mode;

    let cache = Arc::new(MemoryTileCache::new());
    let (queue, load_rx) = ChannelLoadQueue::new(LOAD_QUEUE_CAPACITY);
    let loader = spawn_loader(Arc::clone(&cache), load_rx);

    let users: Vec<UserId> = (0..player_count).map(|_| Uuid::new_v4()).collect();
    let markers = Arc::new(NamedLocationProvider::new(CursorKind::RedX));
    for &user in &users {
        markers.set(user, "spawn", Location::new(WORLD, 0.0, 64.0, 0.0));
    }

    let mut providers = ProviderSet::new();
    providers
        .register_world_pixels(Arc::new(SpawnBeacon))
        .register_world_cursors(markers)
        .register_map_cursors(Arc::new(ViewerArrowProvider::default()));

    let registry = Arc::new(MinimapRegistry::new());
    registry.insert(Minimap::new("overview", cache, Arc::new(queue)).with_providers(providers));

    let (gateway, frames_rx) = ChannelGateway::new(FRAME_QUEUE_CAPACITY);
    let transport = spawn_transport(frames_rx);

    let scheduler = FrameScheduler::new(SURFACE, config, registry, Arc::new(NearestPalette::default()), Arc::new(gateway))
        .with_minimap("overview");
    let scheduler = Arc::new(Mutex::new(scheduler));
    let host = Arc::new(DemoHost::default());

    let free_running = if mode == RenderMode::FreeRunning {
        match spawn_free_running(Arc::clone(&scheduler), Arc::clone(&host) as Arc<dyn Host>).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, "free-running loop not started");
                None
            }
        }
    } else {
        None
    };

    info!(ticks, players = users.len(), ?mode, "demo started");

    let mut ticker = tokio::time::interval(Duration::from_millis(HOST_TICK_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    for tick in 0..ticks {
        ticker.tick().await;
        host.advance(&users, tick, ticks);

        let mut guard = scheduler.lock().await;
        for &user in &users {
            guard.on_render(host.as_ref(), user);
        }
        let report = guard.tick(host.as_ref()).await;
        if tick % 20 == 0 {
            info!(
                tick,
                viewers = guard.viewer_count(),
                delivered = report.delivered,
                regions_queued = report.regions_queued,
                "host tick"
            );
        }
    }

    if let Some(handle) = free_running {
        handle.terminate().await;
    }
    let retired = scheduler.lock().await.shutdown();

    // Dropping the scheduler drops the gateway and load queue, ending both tasks.
    drop(scheduler);
    match (transport.await, loader.await) {
        (Ok(frames), Ok(regions)) => info!(retired, frames, regions, "demo finished"),
        (Err(e), _) | (_, Err(e)) => error!(error = %e, "collaborator task failed"),
    }
}
