//! Event-emitting TCP client with silent teardown and socket handoff.

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::connector::{Connector, NetStream};
use crate::reason::DisconnectReason;

const DEFAULT_RECV_BUF_LEN: usize = 4096;

/// Events a [`TcpClient`] posts to its owner's queue.
///
/// Every event carries the epoch of the connection attempt it belongs to.
/// The owner checks it with [`TcpClient::accept`] before acting — a silent
/// `disconnect()` bumps the epoch, so events the old connection had already
/// queued are recognized as stale and dropped.
pub enum ClientEvent {
    /// An async connect finished. The owner attaches the stream with
    /// [`TcpClient::attach`] and then treats the client as connected.
    Connected {
        epoch: u64,
        stream: NetStream,
        host: String,
        port: u16,
    },

    /// The connect attempt failed or the connection ended.
    Disconnected {
        epoch: u64,
        reason: DisconnectReason,
    },

    /// Bytes arrived on the connection.
    Data { epoch: u64, data: Bytes },
}

impl fmt::Debug for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Connected {
                epoch, host, port, ..
            } => f
                .debug_struct("Connected")
                .field("epoch", epoch)
                .field("host", host)
                .field("port", port)
                .finish(),
            ClientEvent::Disconnected { epoch, reason } => f
                .debug_struct("Disconnected")
                .field("epoch", epoch)
                .field("reason", reason)
                .finish(),
            ClientEvent::Data { epoch, data } => f
                .debug_struct("Data")
                .field("epoch", epoch)
                .field("len", &data.len())
                .finish(),
        }
    }
}

/// Where a connection's socket tasks deliver their events.
///
/// The route is swappable at runtime: the socket handoff re-points a live
/// connection's events at the receiving client without restarting the
/// reader or writer, which is what moves the connection between clients
/// without dropping buffered data.
struct EventSink<W> {
    route: Mutex<Route<W>>,
}

struct Route<W> {
    tx: mpsc::UnboundedSender<W>,
    wrap: fn(ClientEvent) -> W,
    epoch: u64,
}

impl<W> EventSink<W> {
    fn send(&self, make: impl FnOnce(u64) -> ClientEvent) {
        let route = self.route.lock().expect("event route lock poisoned");
        let _ = route.tx.send((route.wrap)(make(route.epoch)));
    }

    fn retarget(&self, tx: mpsc::UnboundedSender<W>, wrap: fn(ClientEvent) -> W, epoch: u64) {
        let mut route = self.route.lock().expect("event route lock poisoned");
        *route = Route { tx, wrap, epoch };
    }
}

struct Connection<W> {
    host: String,
    port: u16,
    writer_tx: mpsc::UnboundedSender<Bytes>,
    sink: Arc<EventSink<W>>,
    reader: AbortHandle,
    writer: AbortHandle,
}

impl<W> Drop for Connection<W> {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// An asynchronous TCP client.
///
/// Owns at most one connection. `connect()` runs in the background and
/// reports through the owner's event queue; `disconnect()` is always silent.
/// The `wrap` function given at construction tags this client's events, so
/// one queue can serve several clients (the prioritized machine runs its
/// foreground and background clients over a single queue).
pub struct TcpClient<W> {
    connector: Arc<dyn Connector>,
    tx: mpsc::UnboundedSender<W>,
    wrap: fn(ClientEvent) -> W,
    epoch: u64,
    connecting: Option<AbortHandle>,
    conn: Option<Connection<W>>,
    recv_buf_len: usize,
}

impl<W: Send + 'static> TcpClient<W> {
    pub fn new(
        connector: Arc<dyn Connector>,
        tx: mpsc::UnboundedSender<W>,
        wrap: fn(ClientEvent) -> W,
    ) -> Self {
        Self {
            connector,
            tx,
            wrap,
            epoch: 0,
            connecting: None,
            conn: None,
            recv_buf_len: DEFAULT_RECV_BUF_LEN,
        }
    }

    /// Begin an async connect. Any previous connection or attempt is torn
    /// down silently first. Emits `Connected` or `Disconnected(reason)`.
    pub fn connect(&mut self, host: &str, port: u16) {
        self.teardown();
        let epoch = self.epoch;
        let connector = Arc::clone(&self.connector);
        let host = host.to_string();
        let tx = self.tx.clone();
        let wrap = self.wrap;
        debug!(host = %host, port, "connecting");
        let task = tokio::spawn(async move {
            let event = match connector.connect(&host, port).await {
                Ok(stream) => ClientEvent::Connected {
                    epoch,
                    stream,
                    host,
                    port,
                },
                Err(e) => ClientEvent::Disconnected {
                    epoch,
                    reason: e.reason(),
                },
            };
            let _ = tx.send(wrap(event));
        });
        self.connecting = Some(task.abort_handle());
    }

    /// Install the stream from a `Connected` event that passed
    /// [`accept`](TcpClient::accept), spawning the socket tasks.
    pub fn attach(&mut self, stream: NetStream, host: String, port: u16) {
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
        let sink = Arc::new(EventSink {
            route: Mutex::new(Route {
                tx: self.tx.clone(),
                wrap: self.wrap,
                epoch: self.epoch,
            }),
        });
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&sink), self.recv_buf_len));
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(write_half, writer_rx));
        self.conn = Some(Connection {
            host,
            port,
            writer_tx,
            sink,
            reader: reader.abort_handle(),
            writer: writer.abort_handle(),
        });
    }

    /// Close the connection or cancel the in-flight connect. No event is
    /// emitted, and events already queued by the connection become stale.
    pub fn disconnect(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
        if self.conn.take().is_some() {
            trace!(epoch = self.epoch, "connection torn down");
        }
        self.epoch += 1;
    }

    /// Whether an event epoch belongs to the current connection attempt.
    pub fn accept(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    /// Take the live connection out of `other`.
    ///
    /// The socket tasks, their buffered data, and the peer address move to
    /// `self`; from the wire's point of view nothing happens. Events the
    /// connection emits from now on are tagged as `self`'s, and `other`
    /// becomes disconnected without emitting anything.
    pub fn take_connection_from(&mut self, other: &mut TcpClient<W>) {
        self.teardown();
        if let Some(task) = other.connecting.take() {
            task.abort();
        }
        if let Some(conn) = other.conn.take() {
            conn.sink
                .retarget(self.tx.clone(), self.wrap, self.epoch);
            debug!(host = %conn.host, port = conn.port, "connection handed off");
            self.conn = Some(conn);
        }
        other.epoch += 1;
    }

    /// Queue bytes for writing. Returns false when not connected.
    pub fn send(&self, data: Bytes) -> bool {
        match &self.conn {
            Some(conn) => conn.writer_tx.send(data).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn remote_host(&self) -> Option<&str> {
        self.conn.as_ref().map(|c| c.host.as_str())
    }

    pub fn remote_port(&self) -> Option<u16> {
        self.conn.as_ref().map(|c| c.port)
    }

    pub fn recv_buf_len(&self) -> usize {
        self.recv_buf_len
    }

    /// Read chunk size for connections attached after this call.
    pub fn set_recv_buf_len(&mut self, len: usize) {
        self.recv_buf_len = len.max(1);
    }
}

async fn read_loop<W>(
    mut read_half: ReadHalf<NetStream>,
    sink: Arc<EventSink<W>>,
    recv_buf_len: usize,
) {
    loop {
        let mut buf = BytesMut::with_capacity(recv_buf_len);
        match read_half.read_buf(&mut buf).await {
            Ok(0) => {
                sink.send(|epoch| ClientEvent::Disconnected {
                    epoch,
                    reason: DisconnectReason::RemoteClosed,
                });
                return;
            }
            Ok(_) => sink.send(|epoch| ClientEvent::Data {
                epoch,
                data: buf.freeze(),
            }),
            Err(e) => {
                let reason = DisconnectReason::from_io_error(&e);
                sink.send(|epoch| ClientEvent::Disconnected { epoch, reason });
                return;
            }
        }
    }
}

async fn write_loop(mut write_half: WriteHalf<NetStream>, mut rx: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(data) = rx.recv().await {
        if let Err(e) = write_half.write_all(&data).await {
            // The reader surfaces the close; the writer just stops.
            trace!(error = %e, "write failed");
            return;
        }
    }
}
