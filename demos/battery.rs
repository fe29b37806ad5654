//! This example connects to a PowerUp, prints its battery state and
//! then listens for battery level changes for thirty seconds.
//! A device name may be given as a command line argument.

use powerup::{ConnectConfig, Error, Session};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let mut config = ConnectConfig::default();
    if let Some(name) = std::env::args().nth(1) {
        config = config.name(name);
    }

    let session = Session::btleplug();
    session.connect(&config).await?;

    println!("Battery level: {}%", session.get_battery_level().await?);
    println!("Charging: {}", session.get_charging_status().await?);

    session
        .enable_battery_notifications(|level: u8| println!("Battery level changed: {}%", level))
        .await?;

    sleep(Duration::from_secs(30)).await;

    session.disconnect().await
}
