use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected to the device")]
    NotConnected,

    #[error("{name} must be between {min} and {max}, got {value}")]
    InvalidArgument {
        name: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("Could not find device {name:?}")]
    CouldNotFind { name: String },

    #[error("Characteristic {0} not found on the device")]
    CharacteristicNotFound(Uuid),

    #[error("Characteristic {0} returned an empty payload")]
    EmptyPayload(Uuid),

    #[error("No bluetooth adapter at index {0}")]
    AdapterNotFound(usize),

    #[error(transparent)]
    Transport(#[from] btleplug::Error),
}

impl Error {
    pub(crate) fn check_range(name: &'static str, value: i32, min: i32, max: i32) -> Result<()> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Error::InvalidArgument {
                name,
                value,
                min,
                max,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_is_inclusive() {
        assert!(Error::check_range("speed", 0, 0, 254).is_ok());
        assert!(Error::check_range("speed", 254, 0, 254).is_ok());
        assert!(matches!(
            Error::check_range("speed", 255, 0, 254),
            Err(Error::InvalidArgument { value: 255, .. })
        ));
    }

    #[test]
    fn invalid_argument_message() {
        let err = Error::check_range("Angle", -129, -128, 127).unwrap_err();
        assert_eq!(err.to_string(), "Angle must be between -128 and 127, got -129");
    }
}
