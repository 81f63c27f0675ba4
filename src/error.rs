use core::fmt;

/// Errors returned by the timer driver.
///
/// Every one of these is a configuration mistake; the demo programs treat
/// them as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A parameter is out of range for the counter.
    InvalidArgument,
    /// The operation is not allowed in the timer's current lifecycle state.
    InvalidState,
    /// The counter hardware cannot do what was asked.
    NotSupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::InvalidState => f.write_str("invalid timer state"),
            Error::NotSupported => f.write_str("not supported by counter"),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
