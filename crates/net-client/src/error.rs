//! Error types for connection establishment.

use std::io;

use crate::reason::DisconnectReason;

/// Errors from establishing an outbound connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("name resolution failed: {0}")]
    Resolution(String),

    #[error("no addresses found for {0}")]
    NoAddresses(String),

    #[error("connect failed: {0}")]
    Connect(#[from] io::Error),
}

/// Result alias for connect operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The disconnect reason surfaced to event subscribers when this error
    /// ends a connection attempt.
    pub fn reason(&self) -> DisconnectReason {
        match self {
            Error::Resolution(_) | Error::NoAddresses(_) => DisconnectReason::HostNotFound,
            Error::Connect(e) => DisconnectReason::from_io_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_errors_surface_as_host_not_found() {
        let e = Error::Resolution("NXDOMAIN".into());
        assert_eq!(e.reason(), DisconnectReason::HostNotFound);
        let e = Error::NoAddresses("a.example.".into());
        assert_eq!(e.reason(), DisconnectReason::HostNotFound);
    }

    #[test]
    fn connect_errors_map_through_the_io_kind() {
        let e = Error::Connect(io::ErrorKind::ConnectionRefused.into());
        assert_eq!(e.reason(), DisconnectReason::Refused);
        let e = Error::Connect(io::ErrorKind::TimedOut.into());
        assert_eq!(e.reason(), DisconnectReason::Timeout);
    }
}
