//! Seam between the session and the BLE stack underneath it.

use crate::Result;
use async_trait::async_trait;
use btleplug::api::CharPropFlags;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

/// Values received from a subscribed characteristic.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Matches advertised local names during discovery.
pub type NameFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Finds devices and opens connections to them.
#[async_trait]
pub trait LinkClient: Send + Sync {
    /// A discovered but not yet connected device.
    type Peer: Send;
    type Link: Link + 'static;

    /// Returns the first device whose local name passes `filter`,
    /// or `None` if nothing matched before `timeout`.
    async fn discover(&self, filter: NameFilter, timeout: Duration) -> Result<Option<Self::Peer>>;

    async fn open(&self, peer: Self::Peer) -> Result<Self::Link>;
}

/// An open connection to a single device.
#[async_trait]
pub trait Link: Send + Sync {
    /// Human readable address of the remote device
    fn address(&self) -> String;

    async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()>;

    async fn read(&self, uuid: Uuid) -> Result<Vec<u8>>;

    /// Enables notifications and returns the values sent for `uuid` only.
    async fn subscribe(&self, uuid: Uuid) -> Result<NotificationStream>;

    /// Every characteristic of every service on the device
    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>>;

    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub service: Uuid,
    pub uuid: Uuid,
    pub properties: CharPropFlags,
}

impl CharacteristicInfo {
    pub fn is_readable(&self) -> bool {
        self.properties.contains(CharPropFlags::READ)
    }
}
