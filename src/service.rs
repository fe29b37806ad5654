use crate::link::CharacteristicInfo;
use crate::Characteristic;
use btleplug::api::Service as BtleService;
use btleplug::platform::Peripheral;
use uuid::Uuid;

pub struct Service {
    pub(crate) peripheral: Peripheral,
    pub(crate) service: BtleService,
}

impl Service {
    pub fn uuid(&self) -> Uuid {
        self.service.uuid
    }

    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.service
            .characteristics
            .iter()
            .map(|characteristic| Characteristic {
                peripheral: self.peripheral.clone(),
                characteristic: characteristic.clone(),
            })
            .collect()
    }

    /// Description of each characteristic, tagged with this service
    pub(crate) fn characteristic_infos(&self) -> impl Iterator<Item = CharacteristicInfo> + '_ {
        self.service
            .characteristics
            .iter()
            .map(move |characteristic| CharacteristicInfo {
                service: self.service.uuid,
                uuid: characteristic.uuid,
                properties: characteristic.properties,
            })
    }
}
