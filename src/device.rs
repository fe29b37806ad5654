use std::sync::Arc;

use btleplug::api::{BDAddr, Peripheral as _};
use btleplug::platform::Peripheral;
use uuid::Uuid;

use crate::scanner::AdapterContext;
use crate::{Characteristic, Result, Service};

#[derive(Clone)]
pub struct Device {
    pub(self) _context: Arc<AdapterContext>,
    pub(crate) peripheral: Peripheral,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("peripheral", &self.peripheral)
            .finish()
    }
}

impl Device {
    pub(crate) fn new(context: Arc<AdapterContext>, peripheral: Peripheral) -> Self {
        Self {
            _context: context,
            peripheral,
        }
    }

    #[inline]
    pub fn address(&self) -> BDAddr {
        self.peripheral.address()
    }

    /// Signal strength
    #[inline]
    pub async fn rssi(&self) -> Option<i16> {
        self.peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|props| props.rssi)
    }

    /// Local name of the device
    #[inline]
    pub async fn local_name(&self) -> Option<String> {
        self.peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|props| props.local_name)
    }

    #[inline]
    pub async fn is_connected(&self) -> Result<bool> {
        Ok(self.peripheral.is_connected().await?)
    }

    /// Connect to the device. Does nothing if already connected.
    pub async fn connect(&self) -> Result<()> {
        if !self.peripheral.is_connected().await? {
            log::debug!("Connecting to device {}", self.address());
            self.peripheral.connect().await?;
        }
        Ok(())
    }

    pub async fn discover_services(&self) -> Result<()> {
        log::debug!("Discovering services for {}", self.address());
        Ok(self.peripheral.discover_services().await?)
    }

    #[inline]
    pub async fn disconnect(&self) -> Result<()> {
        Ok(self.peripheral.disconnect().await?)
    }

    /// Services found by the last [`discover_services`](Device::discover_services).
    pub fn services(&self) -> Vec<Service> {
        self.peripheral
            .services()
            .into_iter()
            .map(|service| Service {
                peripheral: self.peripheral.clone(),
                service,
            })
            .collect()
    }

    /// Characteristics found by the last [`discover_services`](Device::discover_services).
    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .map(|characteristic| Characteristic {
                peripheral: self.peripheral.clone(),
                characteristic,
            })
            .collect()
    }

    /// Get characteristic by UUID
    pub fn characteristic(&self, uuid: Uuid) -> Option<Characteristic> {
        self.characteristics()
            .into_iter()
            .find(|characteristic| characteristic.uuid() == uuid)
    }
}
