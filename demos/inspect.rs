//! This example connects to a PowerUp and reads every readable characteristic.

use powerup::codec::to_hex;
use powerup::{Error, ReadOutcome, Session};

#[tokio::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let session = Session::btleplug();
    session.connect_default().await?;

    for report in session.test_all_characteristics().await? {
        let value = match report.outcome {
            ReadOutcome::Value(value) => to_hex(&value),
            ReadOutcome::NotReadable => "-".to_string(),
            ReadOutcome::Failed(e) => format!("error: {}", e),
        };
        println!(
            "{} {} {:?}: {}",
            report.service, report.uuid, report.properties, value
        );
    }

    session.disconnect().await
}
