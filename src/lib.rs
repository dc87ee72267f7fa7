//! Per-user minimap frame composition and scheduling.
//!
//! ARCHITECTURE
//! ============
//! A host engine owns the world; this crate owns what each user sees on a
//! held map surface. One `FrameScheduler` per surface tracks its viewers,
//! decides when to refresh, gathers layers from pluggable providers, fans
//! composition out across blocking workers, and hands each finished raster
//! plus cursor list to a `DeliveryGateway`.
//!
//! ```text
//! Host ──tick / on_render──▶ FrameScheduler ──gather──▶ ProviderSet + PixelSource
//!                                 │
//!                          JoinSet fan-out ──▶ compose() per viewer
//!                                 │
//!                           fan-in barrier ──▶ LoadQueue (missed regions)
//!                                 │
//!                                 └──────────▶ DeliveryGateway
//! ```
//!
//! The tile cache, transport, palette and marker providers are collaborators
//! behind traits; the crate ships small in-memory and channel-backed
//! implementations of each so it runs standalone.

pub mod cache;
pub mod compositor;
pub mod config;
pub mod cursor;
pub mod delivery;
pub mod events;
pub mod geometry;
pub mod menu;
pub mod minimap;
pub mod palette;
pub mod pixel;
pub mod provider;
pub mod scheduler;
pub mod viewer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::{ChannelLoadQueue, LoadQueue, MemoryTileCache, PixelSource, RegionKey, TileData};
pub use compositor::{Composition, compose};
pub use config::{BooleanOption, RenderConfig, RenderMode};
pub use cursor::{CursorKind, MapCursor, WorldCursor};
pub use delivery::{ChannelGateway, DeliveryError, DeliveryGateway, FramePacket};
pub use events::{InteractEvent, NotificationBus, RendererListener};
pub use geometry::{Color, Image, Location, SurfaceId, UserId};
pub use menu::{MapInteraction, MapMenu, MenuFrame};
pub use minimap::{Minimap, MinimapRegistry, MinimapSettings, ZoomScale};
pub use palette::{NearestPalette, Palette};
pub use pixel::{MapPixel, WorldPixel};
pub use provider::{LayerBundle, ProviderError, ProviderSet};
pub use scheduler::{
    FrameScheduler, FreeRunningHandle, Host, PlayerSnapshot, SchedulerError, TickReport, spawn_free_running,
};
pub use viewer::{Hand, ViewerSnapshot, ViewerState};
