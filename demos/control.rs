//! This example sets the motor speed and rudder angle of a PowerUp,
//! holds them for a few seconds and stops the motor again.
//!
//! Usage: control <speed 0-254> [angle -128-127]

use powerup::{Error, Session};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let speed: i32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .expect("Expected motor speed between 0 and 254");
    let angle: i32 = std::env::args()
        .nth(2)
        .map(|arg| arg.parse().expect("Expected rudder angle between -128 and 127"))
        .unwrap_or(0);

    pretty_env_logger::init();

    let session = Session::btleplug();
    session.connect_default().await?;

    session.set_rudder_angle(angle).await?;
    session.set_motor_speed(speed).await?;

    sleep(Duration::from_secs(3)).await;

    session.set_motor_speed(0).await?;
    session.set_rudder_angle(0).await?;

    session.disconnect().await
}
