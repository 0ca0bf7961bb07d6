//! Prioritized auto-failover TCP client
//!
//! A TCP client that discovers its endpoints through DNS SRV records and
//! keeps itself connected to the best one available:
//!
//! 1. `connect()` resolves the configured `_service._proto.domain` label and
//!    tries the endpoints in priority order until one accepts.
//! 2. Failures back off exponentially (with jitter) and retry the SRV
//!    lookup, quietly and indefinitely, until `disconnect()`.
//! 3. While connected to anything but the highest-priority endpoint, a
//!    second client probes the primary in the background every top of the
//!    minute (plus a small random offset, so a fleet that restarted together
//!    does not probe in lockstep). When the probe succeeds the established
//!    socket is handed over in place and subscribers see exactly one
//!    `Disconnected(SwitchPeer)` followed by one `Connected`.
//!
//! The application decides what "working" means: once it has e.g.
//! authenticated, it calls [`PrioClient::mark_as_established`], which makes
//! the next reconnect start from the minimum delay instead of continuing the
//! backoff curve, and makes a reconnect retry the same endpoint first.
//!
//! Behavior lives in a hierarchical state machine driven by a single event
//! loop task; the [`PrioClient`] handle just posts inputs to it and reads
//! status snapshots, so every method here is synchronous and cheap.

mod client;
mod context;
mod driver;
mod events;
mod states;

pub use client::PrioClient;
pub use events::LinkEvent;
pub use net_client::{Connector, DisconnectReason, TokioConnector};
pub use srv_dns::{HickoryResolver, Resolve, SrvRecord, StaticResolver};
