//! Delivery gateway: hands finished frames to the transport.
//!
//! Delivery is best-effort. A failed send is logged by the scheduler and
//! never retried; the next refresh produces a fresh frame anyway.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::cursor::MapCursor;
use crate::geometry::{SurfaceId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery queue full")]
    QueueFull,
    #[error("delivery channel closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Transport for finished frames.
pub trait DeliveryGateway: Send + Sync {
    /// Transmit one frame to `user`.
    ///
    /// # Errors
    ///
    /// Returns a `DeliveryError` if the frame could not be handed off.
    fn send(&self, surface: SurfaceId, raster: &[u8], cursors: &[MapCursor], user: UserId) -> Result<(), DeliveryError>;
}

/// Owned frame as it travels to a transport task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePacket {
    pub surface: SurfaceId,
    pub user: UserId,
    pub raster: Vec<u8>,
    pub cursors: Vec<MapCursor>,
}

impl FramePacket {
    /// Encode as JSON for text transports.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Gateway that forwards packets over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    tx: mpsc::Sender<FramePacket>,
}

impl ChannelGateway {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FramePacket>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl DeliveryGateway for ChannelGateway {
    fn send(&self, surface: SurfaceId, raster: &[u8], cursors: &[MapCursor], user: UserId) -> Result<(), DeliveryError> {
        let packet = FramePacket { surface, user, raster: raster.to_vec(), cursors: cursors.to_vec() };
        self.tx.try_send(packet).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::CursorKind;
    use uuid::Uuid;

    #[tokio::test]
    async fn channel_gateway_forwards_packets() {
        let (gateway, mut rx) = ChannelGateway::new(4);
        let user = Uuid::new_v4();
        let cursors = vec![MapCursor::new(0.0, 0.0, 0, CursorKind::WhitePointer)];

        assert!(gateway.send(7, &[1, 2, 3], &cursors, user).is_ok());

        let packet = rx.recv().await;
        assert_eq!(
            packet,
            Some(FramePacket { surface: 7, user, raster: vec![1, 2, 3], cursors })
        );
    }

    #[tokio::test]
    async fn channel_gateway_reports_full_and_closed() {
        let (gateway, rx) = ChannelGateway::new(1);
        let user = Uuid::new_v4();
        assert!(gateway.send(1, &[0], &[], user).is_ok());
        assert!(matches!(gateway.send(1, &[0], &[], user), Err(DeliveryError::QueueFull)));

        drop(rx);
        assert!(matches!(gateway.send(1, &[0], &[], user), Err(DeliveryError::Closed)));
    }

    #[test]
    fn packet_json_names_fields() {
        let packet = FramePacket { surface: 3, user: Uuid::nil(), raster: vec![9], cursors: Vec::new() };
        let json = packet.to_json().unwrap_or_default();
        assert!(json.contains("\"surface\":3"));
        assert!(json.contains("\"raster\":[9]"));
    }
}
