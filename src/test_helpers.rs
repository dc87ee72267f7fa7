//! Shared mocks for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::cache::{LoadQueue, PixelSource, REGION_LEN, RegionKey, TileData};
use crate::cursor::MapCursor;
use crate::delivery::{DeliveryError, DeliveryGateway, FramePacket};
use crate::events::{InteractEvent, NotifyError, RendererListener};
use crate::geometry::{Location, SurfaceId, UserId};
use crate::menu::{MapMenu, MenuFrame};
use crate::minimap::Minimap;
use crate::scheduler::{Host, PlayerSnapshot};
use crate::viewer::{ViewerPreferences, ViewerSnapshot};

// =============================================================================
// TILE CACHE / QUEUE
// =============================================================================

/// Every region is rendered with one palette index, except those in `missing`.
pub struct FlatCache {
    tile: Arc<[u8]>,
    missing: HashSet<(i32, i32)>,
}

impl FlatCache {
    pub fn new(index: u8) -> Self {
        Self { tile: vec![index; REGION_LEN].into(), missing: HashSet::new() }
    }

    pub fn missing(mut self, x: i32, z: i32) -> Self {
        self.missing.insert((x, z));
        self
    }
}

impl PixelSource for FlatCache {
    fn fetch(&self, key: &RegionKey) -> TileData {
        if self.missing.contains(&(key.x, key.z)) {
            TileData::NotReady
        } else {
            TileData::Ready(Arc::clone(&self.tile))
        }
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub loaded: Mutex<Vec<RegionKey>>,
}

impl RecordingQueue {
    pub fn keys(&self) -> Vec<RegionKey> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LoadQueue for RecordingQueue {
    fn load(&self, key: RegionKey) {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner).push(key);
    }
}

pub fn test_map(id: &str, cache: Arc<dyn PixelSource>, queue: Arc<dyn LoadQueue>) -> Minimap {
    Minimap::new(id, cache, queue)
}

// =============================================================================
// HOST
// =============================================================================

#[derive(Default)]
pub struct MockHost {
    pub overloaded: AtomicBool,
    pub players: Mutex<HashMap<UserId, PlayerSnapshot>>,
    pub preferences: Mutex<HashMap<UserId, ViewerPreferences>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_player(&self, user: UserId, player: PlayerSnapshot) {
        self.players.lock().unwrap_or_else(PoisonError::into_inner).insert(user, player);
    }

    pub fn remove_player(&self, user: UserId) {
        self.players.lock().unwrap_or_else(PoisonError::into_inner).remove(&user);
    }

    pub fn set_overloaded(&self, overloaded: bool) {
        self.overloaded.store(overloaded, Ordering::SeqCst);
    }

    pub fn set_preferences(&self, user: UserId, prefs: ViewerPreferences) {
        self.preferences.lock().unwrap_or_else(PoisonError::into_inner).insert(user, prefs);
    }
}

impl Host for MockHost {
    fn is_overloaded(&self) -> bool {
        self.overloaded.load(Ordering::SeqCst)
    }

    fn player(&self, user: UserId) -> Option<PlayerSnapshot> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner).get(&user).cloned()
    }

    fn preferences(&self, user: UserId) -> ViewerPreferences {
        self.preferences.lock().unwrap_or_else(PoisonError::into_inner).get(&user).cloned().unwrap_or_default()
    }
}

pub fn location(yaw: f32, pitch: f32) -> Location {
    Location::new("world", 0.5, 64.0, 0.5).with_rotation(yaw, pitch)
}

pub fn holding_main(surface: SurfaceId) -> PlayerSnapshot {
    PlayerSnapshot { location: location(0.0, 70.0), main_hand: Some(surface), off_hand: None }
}

pub fn holding_off(surface: SurfaceId) -> PlayerSnapshot {
    PlayerSnapshot { location: location(0.0, 70.0), main_hand: None, off_hand: Some(surface) }
}

pub fn holding_nothing() -> PlayerSnapshot {
    PlayerSnapshot { location: location(0.0, 70.0), main_hand: None, off_hand: None }
}

pub fn snapshot(user: UserId) -> ViewerSnapshot {
    ViewerSnapshot {
        user,
        surface: 1,
        map: Some("overview".into()),
        zoom: 1.0,
        rotating: false,
        main_hand: true,
        cursor_x: 0.0,
        cursor_y: 0.0,
        cursor_center: 0.0,
        location: location(0.0, 70.0),
        interaction: None,
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<FramePacket>>,
    pub fail: AtomicBool,
}

impl RecordingGateway {
    pub fn packets(&self) -> Vec<FramePacket> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl DeliveryGateway for RecordingGateway {
    fn send(&self, surface: SurfaceId, raster: &[u8], cursors: &[MapCursor], user: UserId) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transport("offline".into()));
        }
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(FramePacket {
            surface,
            user,
            raster: raster.to_vec(),
            cursors: cursors.to_vec(),
        });
        Ok(())
    }
}

// =============================================================================
// LISTENER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Activate(UserId, bool),
    Deactivate(UserId),
    Interact(UserId),
    MenuClosed(UserId),
}

/// Records notifications (and menu closes, via `ScriptedMenu`) in order.
#[derive(Default)]
pub struct RecordingListener {
    pub log: Arc<Mutex<Vec<Recorded>>>,
    pub fail: bool,
    pub cancel_interact: bool,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Recorded> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn deactivations(&self, user: UserId) -> usize {
        self.events().iter().filter(|e| **e == Recorded::Deactivate(user)).count()
    }

    pub fn activations(&self, user: UserId) -> usize {
        self.events().iter().filter(|e| matches!(e, Recorded::Activate(u, _) if *u == user)).count()
    }

    fn outcome(&self) -> Result<(), NotifyError> {
        if self.fail { Err(NotifyError::Failed("listener exploded".into())) } else { Ok(()) }
    }
}

impl RendererListener for RecordingListener {
    fn on_activate(&self, user: UserId, _surface: SurfaceId, main_hand: bool) -> Result<(), NotifyError> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(Recorded::Activate(user, main_hand));
        self.outcome()
    }

    fn on_deactivate(&self, user: UserId, _surface: SurfaceId) -> Result<(), NotifyError> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(Recorded::Deactivate(user));
        self.outcome()
    }

    fn on_interact(&self, event: &mut InteractEvent) -> Result<(), NotifyError> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(Recorded::Interact(event.user));
        if self.cancel_interact {
            event.cancel();
        }
        self.outcome()
    }
}

// =============================================================================
// MENU
// =============================================================================

/// Menu that shows a fixed raster, optionally closing from `view` or `interact`.
pub struct ScriptedMenu {
    pub raster: Vec<u8>,
    pub close_on_view: bool,
    pub done_on_interact: bool,
    pub closes: Arc<AtomicUsize>,
    pub interacts: Arc<AtomicUsize>,
    pub log: Option<Arc<Mutex<Vec<Recorded>>>>,
}

impl ScriptedMenu {
    pub fn new(fill: u8) -> Self {
        Self {
            raster: vec![fill; crate::geometry::RASTER_LEN],
            close_on_view: false,
            done_on_interact: false,
            closes: Arc::new(AtomicUsize::new(0)),
            interacts: Arc::new(AtomicUsize::new(0)),
            log: None,
        }
    }
}

impl MapMenu for ScriptedMenu {
    fn view(&mut self, _user: UserId, _viewer: &ViewerSnapshot) -> MenuFrame {
        if self.close_on_view { MenuFrame::Close } else { MenuFrame::Show(self.raster.clone()) }
    }

    fn interact(&mut self, _user: UserId, _viewer: &ViewerSnapshot) -> bool {
        self.interacts.fetch_add(1, Ordering::SeqCst);
        self.done_on_interact
    }

    fn on_close(&mut self, user: UserId) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap_or_else(PoisonError::into_inner).push(Recorded::MenuClosed(user));
        }
    }
}

pub fn user() -> UserId {
    Uuid::new_v4()
}
