//! Async client for the TailorToys PowerUp, a BLE motor and rudder module
//! for paper planes.
//!
//! A [`Session`] finds the device by its advertised name, connects to it and
//! exposes the handful of operations the device supports: motor speed,
//! rudder angle, battery level, charging status and battery notifications.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use powerup::{ConnectConfig, Error, Session};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     pretty_env_logger::init();
//!
//!     let session = Session::btleplug();
//!     session
//!         .connect(&ConnectConfig::default().timeout(Duration::from_secs(10)))
//!         .await?;
//!
//!     println!("Battery level: {}%", session.get_battery_level().await?);
//!
//!     session.set_rudder_angle(-20).await?;
//!     session.set_motor_speed(120).await?;
//!
//!     session.disconnect().await
//! }
//!```
//!
//! The BLE stack is reached through the [`LinkClient`] and [`Link`] traits.
//! [`BtleplugClient`] is the implementation used by [`Session::btleplug`].

#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_idioms)]

pub use btleplug::api::{BDAddr, CharPropFlags};

pub use backend::BtleplugClient;
pub use characteristic::Characteristic;
pub use device::Device;
pub use error::{Error, Result};
pub use link::{CharacteristicInfo, Link, LinkClient, NameFilter, NotificationStream};
pub use scanner::{DeviceStream, ScanConfig, Scanner};
pub use service::Service;
pub use session::{
    BatteryListener, CharacteristicReport, ConnectConfig, ReadOutcome, Session,
};

mod backend;
mod characteristic;
mod device;
mod error;
mod link;
mod scanner;
mod service;
mod session;

pub mod codec;
pub mod common;
