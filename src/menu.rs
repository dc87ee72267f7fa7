//! Modal map menus that take over a viewer's surface.
//!
//! While a menu is bound the scheduler skips composition for that viewer and
//! delivers whatever the menu draws, plus a single aim cursor.

use serde::{Deserialize, Serialize};

use crate::geometry::UserId;
use crate::viewer::ViewerSnapshot;

/// Input a user performed while holding the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapInteraction {
    LeftClick,
    RightClick,
    ShiftLeftClick,
    ShiftRightClick,
    Drop,
}

/// What a menu wants shown this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuFrame {
    /// Deliver this raster.
    Show(Vec<u8>),
    /// The menu is finished; close and detach it.
    Close,
}

/// A modal menu bound to one viewer.
pub trait MapMenu: Send {
    /// Render the menu for this frame.
    fn view(&mut self, user: UserId, viewer: &ViewerSnapshot) -> MenuFrame;

    /// Handle the viewer's latest interaction. Returns `true` when done.
    fn interact(&mut self, user: UserId, viewer: &ViewerSnapshot) -> bool;

    /// Called exactly once when the menu is detached.
    fn on_close(&mut self, user: UserId);
}
