use btleplug::api::{CharPropFlags, Characteristic as BtleCharacteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use uuid::Uuid;

use crate::link::NotificationStream;
use crate::Result;

#[derive(Clone)]
pub struct Characteristic {
    pub(crate) peripheral: Peripheral,
    pub(crate) characteristic: BtleCharacteristic,
}

impl Characteristic {
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(self.peripheral.read(&self.characteristic).await?)
    }

    /// Write with response if the characteristic supports it, without otherwise.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        if self.properties().contains(CharPropFlags::WRITE) {
            self.write_request(data).await
        } else {
            self.write_command(data).await
        }
    }

    pub async fn write_request(&self, data: &[u8]) -> Result<()> {
        self.write_as(data, WriteType::WithResponse).await
    }

    pub async fn write_command(&self, data: &[u8]) -> Result<()> {
        self.write_as(data, WriteType::WithoutResponse).await
    }

    async fn write_as(&self, data: &[u8], write_type: WriteType) -> Result<()> {
        Ok(self
            .peripheral
            .write(&self.characteristic, data, write_type)
            .await?)
    }

    pub async fn subscribe(&self) -> Result<NotificationStream> {
        self.peripheral.subscribe(&self.characteristic).await?;

        let stream = self.peripheral.notifications().await?;
        let uuid = self.characteristic.uuid;

        Ok(Box::pin(stream.filter_map(move |n| async move {
            if n.uuid == uuid {
                Some(n.value)
            } else {
                None
            }
        })))
    }

    pub async fn unsubscribe(&self) -> Result<()> {
        Ok(self.peripheral.unsubscribe(&self.characteristic).await?)
    }

    pub fn uuid(&self) -> Uuid {
        self.characteristic.uuid
    }

    pub fn properties(&self) -> CharPropFlags {
        self.characteristic.properties
    }
}
