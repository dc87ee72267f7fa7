//! Renderer notifications: activate, deactivate, interact.
//!
//! DESIGN
//! ======
//! Listeners are registered on a `NotificationBus` and called in
//! registration order. Emission is best-effort: a failing listener is logged
//! and skipped, and the scheduler's own state transition always completes.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::geometry::{SurfaceId, UserId};
use crate::menu::MapInteraction;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("listener failed: {0}")]
    Failed(String),
}

/// Interaction about to be forwarded to a bound menu. Any listener may cancel it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractEvent {
    pub user: UserId,
    pub surface: SurfaceId,
    pub interaction: MapInteraction,
    cancelled: bool,
}

impl InteractEvent {
    #[must_use]
    pub fn new(user: UserId, surface: SurfaceId, interaction: MapInteraction) -> Self {
        Self { user, surface, interaction, cancelled: false }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Observer of viewer lifecycle. Every hook defaults to a no-op.
pub trait RendererListener: Send + Sync {
    fn on_activate(&self, _user: UserId, _surface: SurfaceId, _main_hand: bool) -> Result<(), NotifyError> {
        Ok(())
    }

    fn on_deactivate(&self, _user: UserId, _surface: SurfaceId) -> Result<(), NotifyError> {
        Ok(())
    }

    fn on_interact(&self, _event: &mut InteractEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Ordered list of listeners.
#[derive(Clone, Default)]
pub struct NotificationBus {
    listeners: Vec<Arc<dyn RendererListener>>,
}

impl NotificationBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn RendererListener>) {
        self.listeners.push(listener);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn activate(&self, user: UserId, surface: SurfaceId, main_hand: bool) {
        for listener in &self.listeners {
            if let Err(e) = listener.on_activate(user, surface, main_hand) {
                warn!(error = %e, user = %user, surface, "activate listener failed");
            }
        }
    }

    pub fn deactivate(&self, user: UserId, surface: SurfaceId) {
        for listener in &self.listeners {
            if let Err(e) = listener.on_deactivate(user, surface) {
                warn!(error = %e, user = %user, surface, "deactivate listener failed");
            }
        }
    }

    /// Emit an interact event. Returns `false` when a listener cancelled it.
    pub fn interact(&self, event: &mut InteractEvent) -> bool {
        for listener in &self.listeners {
            if let Err(e) = listener.on_interact(event) {
                warn!(error = %e, user = %event.user, surface = event.surface, "interact listener failed");
            }
        }
        !event.is_cancelled()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus").field("listeners", &self.listeners.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
        cancel: bool,
    }

    impl Counting {
        fn new(fail: bool, cancel: bool) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail, cancel })
        }

        fn result(&self) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err(NotifyError::Failed("boom".into())) } else { Ok(()) }
        }
    }

    impl RendererListener for Counting {
        fn on_activate(&self, _user: UserId, _surface: SurfaceId, _main_hand: bool) -> Result<(), NotifyError> {
            self.result()
        }

        fn on_deactivate(&self, _user: UserId, _surface: SurfaceId) -> Result<(), NotifyError> {
            self.result()
        }

        fn on_interact(&self, event: &mut InteractEvent) -> Result<(), NotifyError> {
            if self.cancel {
                event.cancel();
            }
            self.result()
        }
    }

    #[test]
    fn failing_listener_does_not_stop_later_listeners() {
        let failing = Counting::new(true, false);
        let healthy = Counting::new(false, false);
        let mut bus = NotificationBus::new();
        bus.subscribe(failing.clone());
        bus.subscribe(healthy.clone());

        bus.activate(Uuid::new_v4(), 1, true);
        bus.deactivate(Uuid::new_v4(), 1);

        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 2);
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn interact_reports_cancellation() {
        let mut bus = NotificationBus::new();
        let mut event = InteractEvent::new(Uuid::new_v4(), 1, MapInteraction::LeftClick);
        assert!(bus.interact(&mut event));

        bus.subscribe(Counting::new(false, true));
        let mut event = InteractEvent::new(Uuid::new_v4(), 1, MapInteraction::LeftClick);
        assert!(!bus.interact(&mut event));
        assert!(event.is_cancelled());
    }
}
