use core::fmt;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures a driver reports to its session dispatcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A line could not be claimed or configured. Fatal to driver load.
    HardwareUnavailable,
    /// Another session already holds the device. The caller may retry later.
    DeviceBusy,
    /// Malformed write or ioctl argument, logged and treated as a no-op by the
    /// devices themselves. Also returned by a load given a key table entry that
    /// cannot be encoded.
    InvalidPayload,
}

impl Error {
    /// Negative errno the way a character-device file operation reports it.
    pub fn to_errno(self) -> i32 {
        match self {
            Error::HardwareUnavailable => -19, // ENODEV
            Error::DeviceBusy => -16,          // EBUSY
            Error::InvalidPayload => -22,      // EINVAL
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::HardwareUnavailable => f.write_str("hardware line unavailable"),
            Error::DeviceBusy => f.write_str("device busy"),
            Error::InvalidPayload => f.write_str("invalid payload"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn errno_mapping() {
        assert_eq!(Error::DeviceBusy.to_errno(), -16);
        assert_eq!(Error::InvalidPayload.to_errno(), -22);
        assert_eq!(Error::HardwareUnavailable.to_string(), "hardware line unavailable");
    }
}
