//! Connection to a single PowerUp device.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use futures::StreamExt;
use stream_cancel::{Trigger, Valved};
use tokio::sync::RwLock;

use crate::backend::BtleplugClient;
use crate::codec;
use crate::common::characteristics::{
    BATTERY_CHARGING, BATTERY_LEVEL, MOTOR_CONTROL, RUDDER_CONTROL,
};
use crate::common::DEFAULT_DEVICE_NAME;
use crate::link::{Link, LinkClient};
use crate::{Error, Result};
use btleplug::api::CharPropFlags;
use uuid::Uuid;

/// Where to look for the device and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Advertised name, compared case-insensitively.
    name: String,
    /// How long the discovery scan may run before giving up.
    timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectConfig {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target_name(&self) -> &str {
        &self.name
    }

    pub fn scan_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Receives battery level notifications.
pub trait BatteryListener: Send + Sync + 'static {
    fn on_battery_level(&self, level: u8);
}

impl<F> BatteryListener for F
where
    F: Fn(u8) + Send + Sync + 'static,
{
    fn on_battery_level(&self, level: u8) {
        self(level)
    }
}

type Listeners = Arc<StdRwLock<Vec<Box<dyn BatteryListener>>>>;

fn dispatch(listeners: &Listeners, level: u8) {
    log::debug!("Battery level notification: {}", level);

    for listener in listeners.read().unwrap().iter() {
        if catch_unwind(AssertUnwindSafe(|| listener.on_battery_level(level))).is_err() {
            log::error!("Battery listener panicked on level {}", level);
        }
    }
}

/// A running battery notification task.
struct Notifications {
    /// Dropping this ends delivery.
    _valve: Trigger,
    /// Cleared when the task exits.
    active: Arc<AtomicBool>,
}

struct Connected<L> {
    link: L,
    listeners: Listeners,
    notifications: Option<Notifications>,
}

/// Result of reading one characteristic during [`Session::test_all_characteristics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Value(Vec<u8>),
    NotReadable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicReport {
    pub service: Uuid,
    pub uuid: Uuid,
    pub properties: CharPropFlags,
    pub outcome: ReadOutcome,
}

/// Session with a single PowerUp device.
///
/// All operations except [`connect`](Session::connect) and
/// [`disconnect`](Session::disconnect) fail with [`Error::NotConnected`]
/// without touching the link when no device is connected.
pub struct Session<C: LinkClient> {
    client: C,
    state: RwLock<Option<Connected<C::Link>>>,
}

impl Session<BtleplugClient> {
    /// Session using the first bluetooth adapter of the system.
    pub fn btleplug() -> Self {
        Session::new(BtleplugClient::new())
    }
}

impl<C: LinkClient> Session<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: RwLock::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_some()
    }

    pub async fn connect_default(&self) -> Result<()> {
        self.connect(&ConnectConfig::default()).await
    }

    /// Scan for a device named `config.name` and connect to the first match.
    ///
    /// Returns [`Error::CouldNotFind`] if nothing matched before the timeout.
    /// Errors from the link while connecting are returned as they are.
    pub async fn connect(&self, config: &ConnectConfig) -> Result<()> {
        // Close first: a connected device usually stops advertising
        let previous = self.state.write().await.take();
        if let Some(previous) = previous {
            log::info!("Closing previous connection to {}", previous.link.address());
            previous.link.close().await?;
        }

        log::info!("Searching for device: {}", config.name);

        let target = config.name.to_lowercase();
        let peer = self
            .client
            .discover(
                Box::new(move |name: &str| name.to_lowercase() == target),
                config.timeout,
            )
            .await?
            .ok_or_else(|| Error::CouldNotFind {
                name: config.name.clone(),
            })?;

        let link = self.client.open(peer).await?;

        log::info!("Connected to {} ({})", config.name, link.address());

        let displaced = self.state.write().await.replace(Connected {
            link,
            listeners: Arc::new(StdRwLock::new(Vec::new())),
            notifications: None,
        });
        if let Some(displaced) = displaced {
            log::info!("Closing concurrent connection to {}", displaced.link.address());
            displaced.link.close().await?;
        }

        Ok(())
    }

    /// Disconnect from the device. Does nothing if not connected.
    ///
    /// The session is disconnected when this returns, even if closing the
    /// link failed.
    pub async fn disconnect(&self) -> Result<()> {
        let connected = match self.state.write().await.take() {
            Some(connected) => connected,
            None => return Ok(()),
        };

        drop(connected.notifications);
        connected.link.close().await?;

        log::info!("Disconnected");

        Ok(())
    }

    /// Set motor speed, 0-254.
    pub async fn set_motor_speed(&self, speed: i32) -> Result<()> {
        let state = self.state.read().await;
        let connected = state.as_ref().ok_or(Error::NotConnected)?;

        let payload = codec::encode_motor_speed(speed)?;
        connected.link.write(MOTOR_CONTROL, &payload).await?;

        log::info!("Motor speed set to {}", speed);
        Ok(())
    }

    /// Set rudder angle, -128-127.
    pub async fn set_rudder_angle(&self, angle: i32) -> Result<()> {
        let state = self.state.read().await;
        let connected = state.as_ref().ok_or(Error::NotConnected)?;

        let payload = codec::encode_rudder_angle(angle)?;
        connected.link.write(RUDDER_CONTROL, &payload).await?;

        log::info!("Rudder angle set to {}", angle);
        Ok(())
    }

    /// Battery level in percent.
    ///
    /// The value is returned as read and is not checked against 0-100.
    pub async fn get_battery_level(&self) -> Result<u8> {
        let state = self.state.read().await;
        let connected = state.as_ref().ok_or(Error::NotConnected)?;

        let data = connected.link.read(BATTERY_LEVEL).await?;
        let level = codec::decode_battery_level(BATTERY_LEVEL, &data)?;

        if level > 100 {
            log::warn!("Battery level out of range: {}", level);
        }
        log::info!("Battery level: {}%", level);

        Ok(level)
    }

    /// `true` while the battery is charging.
    pub async fn get_charging_status(&self) -> Result<bool> {
        let state = self.state.read().await;
        let connected = state.as_ref().ok_or(Error::NotConnected)?;

        let data = connected.link.read(BATTERY_CHARGING).await?;
        let charging = codec::decode_charging_status(BATTERY_CHARGING, &data)?;

        log::info!(
            "Charging status: {}",
            if charging { "Charging" } else { "Not charging" }
        );

        Ok(charging)
    }

    /// Register `listener` for battery level notifications.
    ///
    /// The first call on a connection subscribes to the battery level
    /// characteristic; later calls only add listeners, unless the
    /// notification stream has ended, in which case it is subscribed again.
    /// Listeners are called from a background task, once per notification,
    /// until disconnect. A panicking listener does not affect the others.
    pub async fn enable_battery_notifications(
        &self,
        listener: impl BatteryListener,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let connected = state.as_mut().ok_or(Error::NotConnected)?;

        let running = connected
            .notifications
            .as_ref()
            .map_or(false, |n| n.active.load(Ordering::SeqCst));

        if !running && connected.notifications.take().is_some() {
            log::info!("Battery notification task ended, subscribing again");
        }

        let stream = if !running {
            Some(connected.link.subscribe(BATTERY_LEVEL).await?)
        } else {
            None
        };

        connected
            .listeners
            .write()
            .unwrap()
            .push(Box::new(listener));

        if let Some(stream) = stream {
            let (trigger, mut stream) = Valved::new(stream);
            let listeners = connected.listeners.clone();
            let active = Arc::new(AtomicBool::new(true));
            let task_active = active.clone();

            tokio::spawn(async move {
                while let Some(data) = stream.next().await {
                    match codec::decode_battery_level(BATTERY_LEVEL, &data) {
                        Ok(level) => dispatch(&listeners, level),
                        Err(e) => log::warn!("Ignoring battery notification: {}", e),
                    }
                }

                task_active.store(false, Ordering::SeqCst);
                log::debug!("Battery notification stream ended");
            });

            connected.notifications = Some(Notifications {
                _valve: trigger,
                active,
            });
            log::info!("Battery notifications enabled");
        }

        Ok(())
    }

    /// Read every readable characteristic of the device and log the values.
    ///
    /// A failing read is reported in its [`CharacteristicReport`] and does not
    /// stop the remaining reads.
    pub async fn test_all_characteristics(&self) -> Result<Vec<CharacteristicReport>> {
        let state = self.state.read().await;
        let connected = state.as_ref().ok_or(Error::NotConnected)?;

        let characteristics = connected.link.characteristics().await?;
        let mut reports = Vec::with_capacity(characteristics.len());
        let mut service = None;

        for info in characteristics {
            if service != Some(info.service) {
                log::info!("Testing service: {}", info.service);
                service = Some(info.service);
            }
            log::info!("Characteristic: {} Properties: {:?}", info.uuid, info.properties);

            let outcome = if !info.is_readable() {
                ReadOutcome::NotReadable
            } else {
                match connected.link.read(info.uuid).await {
                    Ok(value) => {
                        log::info!("Read value: {}", codec::to_hex(&value));
                        ReadOutcome::Value(value)
                    }
                    Err(e) => {
                        log::warn!("Error reading {}: {}", info.uuid, e);
                        ReadOutcome::Failed(e.to_string())
                    }
                }
            };

            reports.push(CharacteristicReport {
                service: info.service,
                uuid: info.uuid,
                properties: info.properties,
                outcome,
            });
        }

        Ok(reports)
    }
}
