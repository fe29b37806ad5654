/// Advertised name of the device, used when no other name is configured.
pub const DEFAULT_DEVICE_NAME: &str = "TailorToys PowerUp";

pub mod services {
    use btleplug::api::bleuuid::uuid_from_u16;
    use uuid::Uuid;

    pub const POWERUP: Uuid = Uuid::from_u128(0x86c3810e_f171_40d9_a117_26b300768cd6);
    pub const BATTERY: Uuid = uuid_from_u16(0x180F);
}

pub mod characteristics {
    use btleplug::api::bleuuid::uuid_from_u16;
    use uuid::Uuid;

    /// Motor speed, one unsigned byte.
    pub const MOTOR_CONTROL: Uuid = Uuid::from_u128(0x86c3810e_0010_40d9_a117_26b300768cd6);
    /// Rudder angle, one signed byte.
    pub const RUDDER_CONTROL: Uuid = Uuid::from_u128(0x86c3810e_0021_40d9_a117_26b300768cd6);
    pub const BATTERY_LEVEL: Uuid = uuid_from_u16(0x2A19);
    /// Nonzero while the battery is charging.
    pub const BATTERY_CHARGING: Uuid = Uuid::from_u128(0x86c3810e_0040_40d9_a117_26b300768cd6);
}
