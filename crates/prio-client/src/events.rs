//! Event types: machine events, driver inputs, and the public link events.

use bytes::Bytes;
use hfsm::TimerFire;
use net_client::{ClientEvent, DisconnectReason};
use srv_dns::{LookupDone, SrvRecord};

/// What subscribers of a [`PrioClient`](crate::PrioClient) observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The foreground connection is up at the socket level.
    Connected,

    /// The foreground connection ended. `SwitchPeer` announces a promotion
    /// to a higher-priority peer and is immediately followed by `Connected`.
    Disconnected(DisconnectReason),

    /// Bytes arrived on the foreground connection.
    Data(Bytes),
}

/// Events dispatched into the state machine.
///
/// These are already validated: the driver has applied payloads to the
/// context and filtered stale collaborator completions before dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Connect,
    Disconnect,
    DnsResultsReady,
    Connected,
    Disconnected(DisconnectReason),
    BgConnected,
    BgDisconnected(DisconnectReason),
    Timeout,
    TimeoutAt,
}

/// Everything that can arrive on the driver's input queue: commands from the
/// [`PrioClient`](crate::PrioClient) handle and completions from the
/// collaborators (TCP clients, DNS lookup, timers).
pub(crate) enum Input {
    Connect,
    Disconnect,
    Send(Bytes),
    SetService(String),
    AddStaticRecord(SrvRecord),
    SetReconnectMinTime(u64),
    SetReconnectMaxTime(u64),
    SetReconnectBackoffPercent(u64),
    SetReconnectRandomizePercent(u64),
    Fg(ClientEvent),
    Bg(ClientEvent),
    Dns(LookupDone),
    Timer(TimerFire),
    /// Sent by the last dropped handle. The collaborators hold senders to
    /// the input queue themselves, so the driver cannot rely on the queue
    /// closing.
    Shutdown,
}

impl From<TimerFire> for Input {
    fn from(fire: TimerFire) -> Self {
        Input::Timer(fire)
    }
}

impl From<LookupDone> for Input {
    fn from(done: LookupDone) -> Self {
        Input::Dns(done)
    }
}
