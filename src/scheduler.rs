//! Frame scheduler: owns every viewer of one surface and drives composition.
//!
//! DESIGN
//! ======
//! One `FrameScheduler` per surface. It is the only owner of `ViewerState`
//! and every mutation goes through `&mut self`, so the host tick, the render
//! callback, menu binding and interactions are mutually exclusive by
//! construction.
//!
//! A compose pass (`refresh`) runs in three phases:
//!
//! 1. Driver: retire idle or offline viewers, service open menus, deliver the
//!    placeholder for unresolved sub-maps, and gather one `LayerBundle` per
//!    remaining viewer. Providers are only ever called here.
//! 2. Fan-out: one `spawn_blocking` composition per bundle in a `JoinSet`,
//!    optionally in waves of `max_workers`.
//! 3. Fan-in: join every task, queue missed regions, then deliver. Nothing is
//!    delivered before the whole wave set has joined.
//!
//! RENDER MODES
//! ============
//! In `RenderMode::HostTick` the host calls `tick` and composition happens
//! inline. In `RenderMode::FreeRunning` `tick` only sweeps viewer state and
//! a spawned interval loop (`spawn_free_running`) owns composition. The
//! free-running loop queries providers off the host thread, so providers
//! must tolerate that. Host-tick mode is the default.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here is fatal. Any provider, task or delivery failure costs one
//! viewer one frame and is logged at `warn`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::LoadQueue;
use crate::compositor::{Composition, compose};
use crate::config::{BooleanOption, RenderConfig, RenderMode};
use crate::cursor::{CursorKind, MapCursor};
use crate::delivery::DeliveryGateway;
use crate::events::{InteractEvent, NotificationBus, RendererListener};
use crate::geometry::{Location, RASTER_LEN, SurfaceId, UserId};
use crate::menu::{MapInteraction, MapMenu, MenuFrame};
use crate::minimap::{Minimap, MinimapRegistry, ZoomScale};
use crate::palette::Palette;
use crate::provider::LayerBundle;
use crate::viewer::{Hand, ViewerPreferences, ViewerSnapshot, ViewerState};

// =============================================================================
// HOST BOUNDARY
// =============================================================================

/// What the scheduler needs to know about a user from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub location: Location,
    /// Surface in the main hand, if it is a map surface.
    pub main_hand: Option<SurfaceId>,
    /// Surface in the off hand, if it is a map surface.
    pub off_hand: Option<SurfaceId>,
}

impl PlayerSnapshot {
    /// Hand holding `surface`. The main hand wins when both do.
    #[must_use]
    pub fn holding(&self, surface: SurfaceId) -> Option<Hand> {
        if self.main_hand == Some(surface) {
            Some(Hand::Main)
        } else if self.off_hand == Some(surface) {
            Some(Hand::Off)
        } else {
            None
        }
    }
}

/// Host engine queries. Called from the driver only.
pub trait Host: Send + Sync {
    /// True when the host is behind and compose passes should be skipped.
    fn is_overloaded(&self) -> bool;

    /// Current state of an online user, `None` when the session is gone.
    fn player(&self, user: UserId) -> Option<PlayerSnapshot>;

    /// Per-user display overrides.
    fn preferences(&self, _user: UserId) -> ViewerPreferences {
        ViewerPreferences::default()
    }
}

// =============================================================================
// ERRORS / REPORTS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("user {0} is not viewing this surface")]
    ViewerNotFound(UserId),
    #[error("operation not available in {0:?} mode")]
    WrongMode(RenderMode),
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Overloaded,
    RateLimited,
}

/// Counters for one tick or compose pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub skipped: Option<SkipReason>,
    pub activated: usize,
    pub deactivated: usize,
    /// Composition tasks that completed with a result.
    pub composed: usize,
    /// Missing-map placeholder frames.
    pub placeholders: usize,
    /// Menu frames.
    pub menus: usize,
    /// Viewers that produced no frame (provider error, task panic).
    pub failed: usize,
    pub delivered: usize,
    pub undelivered: usize,
    pub regions_queued: usize,
}

impl TickReport {
    fn skip(reason: SkipReason) -> Self {
        Self { skipped: Some(reason), ..Self::default() }
    }

    fn absorb(&mut self, other: Self) {
        self.activated += other.activated;
        self.deactivated += other.deactivated;
        self.composed += other.composed;
        self.placeholders += other.placeholders;
        self.menus += other.menus;
        self.failed += other.failed;
        self.delivered += other.delivered;
        self.undelivered += other.undelivered;
        self.regions_queued += other.regions_queued;
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Viewer tracking and frame scheduling for a single surface.
pub struct FrameScheduler {
    surface: SurfaceId,
    map_id: Option<String>,
    config: RenderConfig,
    registry: Arc<MinimapRegistry>,
    palette: Arc<dyn Palette>,
    gateway: Arc<dyn DeliveryGateway>,
    events: NotificationBus,
    viewers: BTreeMap<UserId, ViewerState>,
    /// Zoom remembered across deactivation, in blocks per pixel.
    scales: HashMap<UserId, f64>,
    tick: u64,
    missing_raster: Vec<u8>,
}

impl FrameScheduler {
    #[must_use]
    pub fn new(
        surface: SurfaceId,
        config: RenderConfig,
        registry: Arc<MinimapRegistry>,
        palette: Arc<dyn Palette>,
        gateway: Arc<dyn DeliveryGateway>,
    ) -> Self {
        let missing_raster = palette.dither(&config.missing_map);
        Self {
            surface,
            map_id: None,
            config,
            registry,
            palette,
            gateway,
            events: NotificationBus::new(),
            viewers: BTreeMap::new(),
            scales: HashMap::new(),
            tick: 0,
            missing_raster,
        }
    }

    /// Bind the surface to a sub-map before any viewer arrives.
    #[must_use]
    pub fn with_minimap(mut self, id: impl Into<String>) -> Self {
        self.map_id = Some(id.into());
        self
    }

    pub fn subscribe(&mut self, listener: Arc<dyn RendererListener>) {
        self.events.subscribe(listener);
    }

    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Raster delivered when a viewer's sub-map cannot be resolved.
    #[must_use]
    pub fn placeholder_raster(&self) -> &[u8] {
        &self.missing_raster
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn is_viewing(&self, user: UserId) -> bool {
        self.viewers.contains_key(&user)
    }

    #[must_use]
    pub fn viewer(&self, user: UserId) -> Option<&ViewerState> {
        self.viewers.get(&user)
    }

    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    #[must_use]
    pub fn menu_open(&self, user: UserId) -> bool {
        self.viewers.get(&user).is_some_and(ViewerState::has_menu)
    }

    /// Id of the sub-map bound to the surface.
    #[must_use]
    pub fn minimap_id(&self) -> Option<&str> {
        self.map_id.as_deref()
    }

    /// The bound sub-map, if it still exists.
    #[must_use]
    pub fn minimap(&self) -> Option<Arc<Minimap>> {
        self.map_id.as_deref().and_then(|id| self.registry.get(id))
    }

    /// Zoom of an active viewer, snapped to the nearest preset.
    #[must_use]
    pub fn scale(&self, user: UserId) -> Option<ZoomScale> {
        self.viewers.get(&user).map(|viewer| ZoomScale::nearest(viewer.zoom()))
    }

    // -------------------------------------------------------------------------
    // Mutators
    // -------------------------------------------------------------------------

    /// Set a user's zoom. Remembered even if the user is not viewing.
    /// Returns `false` for a non-positive or non-finite zoom.
    pub fn set_scale(&mut self, user: UserId, blocks_per_pixel: f64) -> bool {
        if !blocks_per_pixel.is_finite() || blocks_per_pixel <= 0.0 {
            return false;
        }
        if let Some(viewer) = self.viewers.get_mut(&user) {
            viewer.set_zoom(blocks_per_pixel);
        }
        self.scales.insert(user, blocks_per_pixel);
        true
    }

    /// Rebind the surface, and every active viewer, to another sub-map.
    pub fn set_minimap(&mut self, id: Option<String>) {
        for viewer in self.viewers.values_mut() {
            viewer.set_map(id.clone());
        }
        info!(surface = self.surface, map = ?id, "surface rebound");
        self.map_id = id;
    }

    /// Point one viewer at another sub-map, resetting zoom to its default.
    ///
    /// # Errors
    ///
    /// Returns `ViewerNotFound` if `user` is not viewing this surface.
    pub fn set_viewer_map(&mut self, user: UserId, id: Option<String>) -> Result<(), SchedulerError> {
        let resolved = id.as_deref().and_then(|id| self.registry.get(id));
        let viewer = self.viewers.get_mut(&user).ok_or(SchedulerError::ViewerNotFound(user))?;
        if let Some(map) = &resolved {
            viewer.set_zoom(map.settings().default_zoom.blocks_per_pixel());
        }
        viewer.set_map(id);
        Ok(())
    }

    /// Bind a menu to a viewer. A previously bound menu is closed first.
    ///
    /// # Errors
    ///
    /// Returns `ViewerNotFound` if `user` is not viewing this surface.
    pub fn bind_menu(&mut self, user: UserId, menu: Box<dyn MapMenu>) -> Result<(), SchedulerError> {
        let viewer = self.viewers.get_mut(&user).ok_or(SchedulerError::ViewerNotFound(user))?;
        if let Some(mut old) = viewer.replace_menu(menu) {
            old.on_close(user);
        }
        debug!(user = %user, surface = self.surface, "menu bound");
        Ok(())
    }

    /// Close and detach a viewer's menu. Returns `false` if none was open.
    pub fn close_menu(&mut self, user: UserId) -> bool {
        let Some(mut menu) = self.viewers.get_mut(&user).and_then(ViewerState::take_menu) else {
            return false;
        };
        menu.on_close(user);
        debug!(user = %user, surface = self.surface, "menu closed");
        true
    }

    /// Record an interaction and forward it to the bound menu unless a
    /// listener cancels it. Returns `true` when a menu received it.
    ///
    /// # Errors
    ///
    /// Returns `ViewerNotFound` if `user` is not viewing this surface.
    pub fn record_interaction(&mut self, user: UserId, interaction: MapInteraction) -> Result<bool, SchedulerError> {
        let viewer = self.viewers.get_mut(&user).ok_or(SchedulerError::ViewerNotFound(user))?;
        viewer.set_interaction(interaction);
        if !viewer.has_menu() {
            return Ok(false);
        }

        let mut event = InteractEvent::new(user, self.surface, interaction);
        if !self.events.interact(&mut event) {
            debug!(user = %user, surface = self.surface, ?interaction, "interaction cancelled");
            return Ok(false);
        }

        let snapshot = viewer.snapshot();
        let done = viewer.menu_mut().is_some_and(|menu| menu.interact(user, &snapshot));
        if done {
            if let Some(mut menu) = viewer.take_menu() {
                menu.on_close(user);
            }
            debug!(user = %user, surface = self.surface, "menu finished");
        }
        Ok(true)
    }

    /// Deactivate a viewer right away. Returns `false` if it was not active.
    pub fn unregister(&mut self, user: UserId) -> bool {
        self.deactivate(user, "unregistered")
    }

    /// Deactivate every viewer. Returns how many were active.
    pub fn shutdown(&mut self) -> usize {
        let users: Vec<UserId> = self.viewers.keys().copied().collect();
        users.into_iter().filter(|&user| self.deactivate(user, "shutdown")).count()
    }

    // -------------------------------------------------------------------------
    // Render callback
    // -------------------------------------------------------------------------

    /// Host render callback for one user. See `on_render_at`.
    pub fn on_render(&mut self, host: &dyn Host, user: UserId) -> bool {
        self.on_render_at(host, user, Instant::now())
    }

    /// Activate, refresh, or retire `user` depending on whether they hold the
    /// surface. Returns `true` while the user is viewing.
    pub fn on_render_at(&mut self, host: &dyn Host, user: UserId, now: Instant) -> bool {
        let held = host
            .player(user)
            .and_then(|player| player.holding(self.surface).map(|hand| (hand, player.location)));
        let Some((hand, location)) = held else {
            self.deactivate(user, "surface not held");
            return false;
        };

        match self.viewers.get(&user).map(ViewerState::hand) {
            None => self.activate(host, user, hand, location, now),
            Some(current) if current != hand => {
                self.deactivate(user, "hand changed");
                self.activate(host, user, hand, location, now);
            }
            Some(_) => {
                let rotating = self.resolve_rotation(host, user);
                if let Some(viewer) = self.viewers.get_mut(&user) {
                    viewer.set_location(location);
                    viewer.set_rotating(rotating);
                    viewer.touch(now);
                }
            }
        }
        true
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Host tick. See `tick_at`.
    pub async fn tick(&mut self, host: &dyn Host) -> TickReport {
        self.tick_at(host, Instant::now()).await
    }

    /// One host tick: overload guard, rate guard, liveness sweep, then a
    /// compose pass when running in host-tick mode.
    pub async fn tick_at(&mut self, host: &dyn Host, now: Instant) -> TickReport {
        if host.is_overloaded() {
            debug!(surface = self.surface, "host overloaded; tick skipped");
            return TickReport::skip(SkipReason::Overloaded);
        }

        let due = self.tick % self.config.render_delay.max(1) == 0;
        self.tick = self.tick.wrapping_add(1);
        if !due {
            return TickReport::skip(SkipReason::RateLimited);
        }

        let mut report = TickReport::default();
        self.sweep(host, now, &mut report);

        if self.config.mode == RenderMode::HostTick {
            let pass = self.refresh_at(host, now).await;
            report.absorb(pass);
        }
        report
    }

    /// Liveness and orientation update for every viewer.
    fn sweep(&mut self, host: &dyn Host, now: Instant, report: &mut TickReport) {
        let users: Vec<UserId> = self.viewers.keys().copied().collect();
        for user in users {
            let Some(player) = host.player(user) else {
                self.deactivate(user, "offline");
                report.deactivated += 1;
                continue;
            };
            let Some(hand) = player.holding(self.surface) else {
                self.deactivate(user, "surface not held");
                report.deactivated += 1;
                continue;
            };

            if self.viewers.get(&user).map(ViewerState::hand) != Some(hand) {
                self.deactivate(user, "hand changed");
                report.deactivated += 1;
                self.activate(host, user, hand, player.location, now);
                report.activated += 1;
                continue;
            }

            let rotating = self.resolve_rotation(host, user);
            let Some(viewer) = self.viewers.get_mut(&user) else {
                continue;
            };
            viewer.set_location(player.location);
            viewer.set_rotating(rotating);
            if viewer.is_main_hand() {
                viewer.update_aim(&self.config.orientation);
            }
            viewer.touch(now);
        }
    }

    // -------------------------------------------------------------------------
    // Compose pass
    // -------------------------------------------------------------------------

    /// Compose and deliver a frame for every viewer. See `refresh_at`.
    pub async fn refresh(&mut self, host: &dyn Host) -> TickReport {
        self.refresh_at(host, Instant::now()).await
    }

    /// Compose and deliver a frame for every active viewer.
    pub async fn refresh_at(&mut self, host: &dyn Host, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        self.retire_stale(host, now, &mut report);

        let (bundles, queues) = self.prepare(host, &mut report);
        let palette = Arc::clone(&self.palette);
        let compositions = fan_out(palette, self.config.max_workers, self.surface, bundles, &mut report).await;
        self.fan_in(compositions, &queues, &mut report);

        for viewer in self.viewers.values_mut() {
            viewer.clear_interaction();
        }

        debug!(
            surface = self.surface,
            viewers = self.viewers.len(),
            composed = report.composed,
            delivered = report.delivered,
            placeholders = report.placeholders,
            menus = report.menus,
            failed = report.failed,
            regions_queued = report.regions_queued,
            "compose pass finished"
        );
        report
    }

    /// Drop viewers whose session closed or who have not been refreshed
    /// within the idle timeout.
    fn retire_stale(&mut self, host: &dyn Host, now: Instant, report: &mut TickReport) {
        let timeout = self.config.idle_timeout;
        let stale: Vec<(UserId, &'static str)> = self
            .viewers
            .iter()
            .filter_map(|(&user, viewer)| {
                if now.saturating_duration_since(viewer.last_updated()) > timeout {
                    Some((user, "idle timeout"))
                } else if host.player(user).is_none() {
                    Some((user, "offline"))
                } else {
                    None
                }
            })
            .collect();

        for (user, reason) in stale {
            if self.deactivate(user, reason) {
                report.deactivated += 1;
            }
        }
    }

    /// Driver phase: menus, placeholders, and provider gathering.
    fn prepare(
        &mut self,
        host: &dyn Host,
        report: &mut TickReport,
    ) -> (Vec<LayerBundle>, HashMap<UserId, Arc<dyn LoadQueue>>) {
        let mut bundles = Vec::new();
        let mut queues: HashMap<UserId, Arc<dyn LoadQueue>> = HashMap::new();

        for (&user, viewer) in &mut self.viewers {
            if viewer.has_menu() {
                let snapshot = viewer.snapshot();
                match viewer.menu_mut().map(|menu| menu.view(user, &snapshot)) {
                    Some(MenuFrame::Show(raster)) => {
                        report.menus += 1;
                        if raster.len() == RASTER_LEN {
                            let cursors = [aim_cursor(&snapshot)];
                            deliver(self.gateway.as_ref(), self.surface, user, &raster, &cursors, report);
                        } else {
                            warn!(user = %user, surface = self.surface, len = raster.len(), "menu raster has wrong size");
                            report.failed += 1;
                        }
                    }
                    Some(MenuFrame::Close) => {
                        if let Some(mut menu) = viewer.take_menu() {
                            menu.on_close(user);
                        }
                        debug!(user = %user, surface = self.surface, "menu closed itself");
                    }
                    None => {}
                }
                continue;
            }

            let Some(map) = viewer.map().and_then(|id| self.registry.get(id)) else {
                report.placeholders += 1;
                deliver(self.gateway.as_ref(), self.surface, user, &self.missing_raster, &[], report);
                continue;
            };

            let prefs = host.preferences(user);
            match LayerBundle::gather(&map, viewer.snapshot(), &prefs, &self.config) {
                Ok(bundle) => {
                    queues.insert(user, Arc::clone(map.queue()));
                    bundles.push(bundle);
                }
                Err(e) => {
                    warn!(error = %e, user = %user, surface = self.surface, map = map.id(), "provider failed; frame skipped");
                    report.failed += 1;
                }
            }
        }
        (bundles, queues)
    }

    /// Driver phase after the barrier: queue missed regions, then deliver.
    fn fan_in(
        &self,
        compositions: Vec<Composition>,
        queues: &HashMap<UserId, Arc<dyn LoadQueue>>,
        report: &mut TickReport,
    ) {
        for Composition { user, surface, raster, cursors, needs_render } in compositions {
            report.composed += 1;
            if let Some(queue) = queues.get(&user) {
                for key in needs_render {
                    queue.load(key);
                    report.regions_queued += 1;
                }
            }

            if !self.viewers.contains_key(&user) {
                debug!(user = %user, surface, "viewer left during composition; frame discarded");
                continue;
            }
            deliver(self.gateway.as_ref(), surface, user, &raster, &cursors, report);
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn activate(&mut self, host: &dyn Host, user: UserId, hand: Hand, location: Location, now: Instant) {
        let rotating = self.resolve_rotation(host, user);
        let zoom = self.scales.get(&user).copied().unwrap_or(1.0);
        let viewer = ViewerState::new(user, self.surface, self.map_id.clone(), location, now)
            .with_hand(hand)
            .with_rotation(rotating)
            .with_zoom(zoom);
        self.viewers.insert(user, viewer);

        let main_hand = hand == Hand::Main;
        self.events.activate(user, self.surface, main_hand);
        info!(user = %user, surface = self.surface, main_hand, rotating, zoom, "viewer activated");
    }

    /// Remove a viewer: remember its zoom, close its menu, notify.
    fn deactivate(&mut self, user: UserId, reason: &str) -> bool {
        let Some(mut viewer) = self.viewers.remove(&user) else {
            return false;
        };
        self.scales.insert(user, viewer.zoom());
        if let Some(mut menu) = viewer.take_menu() {
            menu.on_close(user);
        }
        self.events.deactivate(user, self.surface);
        info!(user = %user, surface = self.surface, reason, "viewer deactivated");
        true
    }

    /// Sub-map setting, then user preference, then the global default. The
    /// chain only applies while the surface's sub-map resolves.
    fn resolve_rotation(&self, host: &dyn Host, user: UserId) -> bool {
        match self.minimap() {
            Some(map) => BooleanOption::resolve(
                &[map.settings().rotation, host.preferences(user).rotate],
                self.config.rotate_by_default,
            ),
            None => self.config.rotate_by_default,
        }
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("surface", &self.surface)
            .field("map_id", &self.map_id)
            .field("mode", &self.config.mode)
            .field("viewers", &self.viewers.len())
            .field("tick", &self.tick)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Parallel phase. Every spawned task is joined before this returns.
///
/// Takes no scheduler reference so the enclosing pass stays `Send` for the
/// free-running loop.
async fn fan_out(
    palette: Arc<dyn Palette>,
    max_workers: usize,
    surface: SurfaceId,
    mut bundles: Vec<LayerBundle>,
    report: &mut TickReport,
) -> Vec<Composition> {
    let wave = match max_workers {
        0 => bundles.len().max(1),
        n => n,
    };
    let mut compositions = Vec::with_capacity(bundles.len());

    while !bundles.is_empty() {
        let batch: Vec<LayerBundle> = bundles.drain(..wave.min(bundles.len())).collect();
        let mut tasks = JoinSet::new();
        for bundle in batch {
            let palette = Arc::clone(&palette);
            tasks.spawn_blocking(move || compose(&bundle, palette.as_ref()));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(composition) => compositions.push(composition),
                Err(e) => {
                    warn!(error = %e, surface, "composition task failed");
                    report.failed += 1;
                }
            }
        }
    }

    compositions.sort_by_key(|c| c.user);
    compositions
}

/// Single aim cursor shown over a menu.
fn aim_cursor(viewer: &ViewerSnapshot) -> MapCursor {
    MapCursor::new(viewer.cursor_x, viewer.cursor_y, 0, CursorKind::WhiteCircle)
}

fn deliver(
    gateway: &dyn DeliveryGateway,
    surface: SurfaceId,
    user: UserId,
    raster: &[u8],
    cursors: &[MapCursor],
    report: &mut TickReport,
) {
    match gateway.send(surface, raster, cursors, user) {
        Ok(()) => report.delivered += 1,
        Err(e) => {
            warn!(error = %e, user = %user, surface, "frame delivery failed");
            report.undelivered += 1;
        }
    }
}

// =============================================================================
// FREE-RUNNING LOOP
// =============================================================================

/// Handle to a running free-running loop. Dropping it also stops the loop.
#[derive(Debug)]
pub struct FreeRunningHandle {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FreeRunningHandle {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait for the in-progress pass to finish.
    pub async fn terminate(self) {
        if self.stop.send(()).is_err() {
            debug!("free-running loop already stopped");
        }
        if let Err(e) = self.handle.await {
            warn!(error = %e, "free-running loop ended abnormally");
        }
    }
}

/// Spawn the free-running compose loop for a scheduler configured with
/// `RenderMode::FreeRunning`.
///
/// # Errors
///
/// Returns `WrongMode` if the scheduler is in host-tick mode.
pub async fn spawn_free_running(
    scheduler: Arc<Mutex<FrameScheduler>>,
    host: Arc<dyn Host>,
) -> Result<FreeRunningHandle, SchedulerError> {
    let (interval, surface) = {
        let guard = scheduler.lock().await;
        if guard.config.mode != RenderMode::FreeRunning {
            return Err(SchedulerError::WrongMode(guard.config.mode));
        }
        (guard.config.free_run_interval, guard.surface)
    };

    let (stop, mut stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(surface, interval_ms = interval.as_millis(), "free-running render loop started");

        loop {
            tokio::select! {
                _ = &mut stopped => break,
                _ = ticker.tick() => {
                    if host.is_overloaded() {
                        debug!(surface, "host overloaded; free-running pass skipped");
                        continue;
                    }
                    let mut guard = scheduler.lock().await;
                    guard.refresh(host.as_ref()).await;
                }
            }
        }

        info!(surface, "free-running render loop stopped");
    });

    Ok(FreeRunningHandle { stop, handle })
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
