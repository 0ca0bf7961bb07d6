//! Async TCP client primitives for the link services
//!
//! Three pieces that the prioritized client machine is built from:
//!
//! - [`TcpClient`] — an event-emitting connect/read/write/disconnect client.
//!   `disconnect()` is always silent, and [`TcpClient::take_connection_from`]
//!   implements the in-process socket handoff: the live connection (socket
//!   tasks, buffered data, peer address) moves from one client to another
//!   and the source ends up disconnected without emitting anything.
//! - [`Connector`] — the dial abstraction. [`TokioConnector`] resolves and
//!   connects over real TCP; tests script their own. Connect failures are
//!   [`Error`]s; [`Error::reason`] maps one to the [`DisconnectReason`]
//!   surfaced to event subscribers.
//! - [`ReconnectBackoff`] — the exponential reconnect delay generator with
//!   jitter.
//!
//! All client events travel through a caller-supplied queue and carry an
//! epoch, so an owner that just tore a connection down can recognize and
//! drop events the old connection had already queued.

mod backoff;
mod client;
mod connector;
mod error;
mod reason;

pub use backoff::ReconnectBackoff;
pub use client::{ClientEvent, TcpClient};
pub use connector::{Connector, NetStream, Stream, TokioConnector};
pub use error::{Error, Result};
pub use reason::DisconnectReason;
