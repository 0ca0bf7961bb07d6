//! Disconnect reasons surfaced to subscribers.

use std::fmt;
use std::io;

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The hostname did not resolve to any address.
    HostNotFound,

    /// The peer refused the connection.
    Refused,

    /// The peer closed the connection.
    RemoteClosed,

    /// The connection was closed locally.
    LocalClosed,

    /// The connect attempt timed out.
    Timeout,

    /// The connection was replaced by one to a higher-priority peer.
    SwitchPeer,

    /// The peer violated the application protocol.
    ProtocolError,

    /// An operating system error ended the connection.
    SystemError,

    /// The application asked for the disconnect.
    OrderedDisconnect,
}

impl DisconnectReason {
    /// Map an I/O error to the closest reason.
    pub fn from_io_error(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => DisconnectReason::Refused,
            io::ErrorKind::TimedOut => DisconnectReason::Timeout,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => DisconnectReason::RemoteClosed,
            _ => DisconnectReason::SystemError,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DisconnectReason::HostNotFound => "host not found",
            DisconnectReason::Refused => "connection refused",
            DisconnectReason::RemoteClosed => "closed by peer",
            DisconnectReason::LocalClosed => "closed locally",
            DisconnectReason::Timeout => "timeout",
            DisconnectReason::SwitchPeer => "switching to higher priority peer",
            DisconnectReason::ProtocolError => "protocol error",
            DisconnectReason::SystemError => "system error",
            DisconnectReason::OrderedDisconnect => "ordered disconnect",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_maps_from_io_error() {
        let e = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(
            DisconnectReason::from_io_error(&e),
            DisconnectReason::Refused
        );
    }

    #[test]
    fn reset_and_eof_map_to_remote_closed() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
        ] {
            let e = io::Error::from(kind);
            assert_eq!(
                DisconnectReason::from_io_error(&e),
                DisconnectReason::RemoteClosed
            );
        }
    }

    #[test]
    fn unknown_kinds_map_to_system_error() {
        let e = io::Error::other("boom");
        assert_eq!(
            DisconnectReason::from_io_error(&e),
            DisconnectReason::SystemError
        );
    }
}
