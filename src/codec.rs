//! Single byte payloads exchanged with the device.

use crate::error::{Error, Result};
use uuid::Uuid;

/// Highest motor speed the device accepts. 255 is not a valid speed.
pub const MAX_MOTOR_SPEED: i32 = 254;
pub const MIN_RUDDER_ANGLE: i32 = i8::MIN as i32;
pub const MAX_RUDDER_ANGLE: i32 = i8::MAX as i32;

pub fn encode_motor_speed(speed: i32) -> Result<[u8; 1]> {
    Error::check_range("Speed", speed, 0, MAX_MOTOR_SPEED)?;
    Ok([speed as u8])
}

/// Rudder angle as a two's complement byte.
pub fn encode_rudder_angle(angle: i32) -> Result<[u8; 1]> {
    Error::check_range("Angle", angle, MIN_RUDDER_ANGLE, MAX_RUDDER_ANGLE)?;
    Ok([angle as i8 as u8])
}

/// Battery level in percent. Values above 100 are passed through untouched.
pub fn decode_battery_level(uuid: Uuid, data: &[u8]) -> Result<u8> {
    data.first().copied().ok_or(Error::EmptyPayload(uuid))
}

pub fn decode_charging_status(uuid: Uuid, data: &[u8]) -> Result<bool> {
    data.first()
        .map(|byte| *byte != 0)
        .ok_or(Error::EmptyPayload(uuid))
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
