//! [`LinkClient`] implementation on top of the platform BLE stack.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use uuid::Uuid;

use crate::link::{CharacteristicInfo, Link, LinkClient, NameFilter, NotificationStream};
use crate::{Characteristic, Device, Error, Result, ScanConfig, Scanner};

#[derive(Debug, Clone, Default)]
pub struct BtleplugClient {
    adapter_index: usize,
}

impl BtleplugClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of bluetooth adapter to use
    pub fn adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }
}

#[async_trait]
impl LinkClient for BtleplugClient {
    type Peer = Device;
    type Link = Device;

    async fn discover(&self, filter: NameFilter, timeout: Duration) -> Result<Option<Device>> {
        let config = ScanConfig::default()
            .adapter_index(self.adapter_index)
            .filter_by_name(move |name| filter(name))
            .stop_after_first_match()
            .stop_after_timeout(timeout);

        let mut scanner = Scanner::new();
        let mut devices = scanner.device_stream();
        scanner.start(config).await?;

        let device = devices.next().await;

        scanner.stop().await?;

        Ok(device)
    }

    async fn open(&self, peer: Device) -> Result<Device> {
        establish(&peer).await?;
        Ok(peer)
    }
}

/// Steps to bring a discovered peer up.
#[async_trait]
trait Establish: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn discover_services(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
}

#[async_trait]
impl Establish for Device {
    async fn connect(&self) -> Result<()> {
        Device::connect(self).await
    }

    async fn discover_services(&self) -> Result<()> {
        Device::discover_services(self).await
    }

    async fn disconnect(&self) -> Result<()> {
        Device::disconnect(self).await
    }
}

/// Connect and discover services. A peer whose services cannot be
/// discovered is disconnected again.
async fn establish<P: Establish>(peer: &P) -> Result<()> {
    peer.connect().await?;

    if let Err(e) = peer.discover_services().await {
        if let Err(close_err) = peer.disconnect().await {
            log::warn!("Could not disconnect after failed discovery: {}", close_err);
        }
        return Err(e);
    }

    Ok(())
}

impl Device {
    fn require_characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.characteristic(uuid)
            .ok_or(Error::CharacteristicNotFound(uuid))
    }
}

/// Operations never reconnect. A dropped link fails with `Error::Transport`.
#[async_trait]
impl Link for Device {
    fn address(&self) -> String {
        Device::address(self).to_string()
    }

    async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        self.require_characteristic(uuid)?.write(data).await
    }

    async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        self.require_characteristic(uuid)?.read().await
    }

    async fn subscribe(&self, uuid: Uuid) -> Result<NotificationStream> {
        self.require_characteristic(uuid)?.subscribe().await
    }

    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>> {
        Ok(self
            .services()
            .iter()
            .flat_map(|service| service.characteristic_infos())
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Peer {
        fail_discovery: bool,
        steps: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Establish for Peer {
        async fn connect(&self) -> Result<()> {
            self.steps.lock().unwrap().push("connect");
            Ok(())
        }

        async fn discover_services(&self) -> Result<()> {
            self.steps.lock().unwrap().push("discover");
            if self.fail_discovery {
                Err(Error::Transport(btleplug::Error::NotConnected))
            } else {
                Ok(())
            }
        }

        async fn disconnect(&self) -> Result<()> {
            self.steps.lock().unwrap().push("disconnect");
            Ok(())
        }
    }

    #[tokio::test]
    async fn establish_connects_and_discovers() {
        let peer = Peer::default();

        establish(&peer).await.unwrap();

        assert_eq!(*peer.steps.lock().unwrap(), vec!["connect", "discover"]);
    }

    #[tokio::test]
    async fn failed_discovery_disconnects_and_keeps_error() {
        let peer = Peer {
            fail_discovery: true,
            ..Default::default()
        };

        let err = establish(&peer).await.unwrap_err();

        assert!(matches!(err, Error::Transport(btleplug::Error::NotConnected)));
        assert_eq!(
            *peer.steps.lock().unwrap(),
            vec!["connect", "discover", "disconnect"]
        );
    }
}
