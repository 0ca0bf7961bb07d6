//! The public handle.

use std::sync::Arc;

use bytes::Bytes;
use hfsm::{Machine, Timers};
use net_client::{Connector, TcpClient, TokioConnector};
use srv_dns::{HickoryResolver, Resolve, ResolveError, SrvLookup, SrvRecord, service_label};
use tokio::sync::mpsc;

use crate::context::{Ctx, Shared};
use crate::driver;
use crate::events::{Input, LinkEvent};
use crate::states::State;

/// Handle to a prioritized auto-failover TCP client.
///
/// Cheap to clone; all clones drive the same connection. The machine runs on
/// its own task and stops when the last handle is dropped.
///
/// Configuration calls (`set_service`, static records, reconnect tuning) are
/// applied in order with everything else, so configuring before `connect()`
/// behaves as expected.
#[derive(Clone)]
pub struct PrioClient {
    inner: Arc<Inner>,
}

struct Inner {
    inputs: mpsc::UnboundedSender<Input>,
    shared: Arc<Shared>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.inputs.send(Input::Shutdown);
    }
}

impl PrioClient {
    /// Create a client with real TCP dialing and system DNS configuration.
    ///
    /// Must be called within a tokio runtime.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<LinkEvent>), ResolveError> {
        let resolver = HickoryResolver::from_system_conf()?;
        Ok(Self::with_backends(
            Arc::new(TokioConnector),
            Arc::new(resolver),
        ))
    }

    /// Create a client over explicit dialing and resolution backends.
    ///
    /// Must be called within a tokio runtime.
    pub fn with_backends(
        connector: Arc<dyn Connector>,
        resolver: Arc<dyn Resolve>,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new());

        let ctx = Ctx {
            fg: TcpClient::new(Arc::clone(&connector), input_tx.clone(), Input::Fg),
            bg: TcpClient::new(connector, input_tx.clone(), Input::Bg),
            dns: SrvLookup::new(resolver, input_tx.clone()),
            backoff: net_client::ReconnectBackoff::new(),
            rrs: Vec::new(),
            next_rr: 0,
            shared: Arc::clone(&shared),
            pending: Default::default(),
        };
        let machine = Machine::new(ctx, Timers::new(input_tx.clone()));
        tokio::spawn(driver::run(machine, input_rx, event_tx, Arc::clone(&shared)));

        (
            Self {
                inner: Arc::new(Inner {
                    inputs: input_tx,
                    shared,
                }),
            },
            event_rx,
        )
    }

    /// Resolve the service and start connecting. A no-op while already
    /// connecting or connected.
    pub fn connect(&self) {
        self.post(Input::Connect);
    }

    /// Return to idle. Closes the foreground connection and any background
    /// probe without emitting `Disconnected`. Idempotent.
    pub fn disconnect(&self) {
        self.post(Input::Disconnect);
    }

    /// Mark the current connection as functionally useful (e.g. after
    /// authentication). The next reconnect then starts from the minimum
    /// delay and retries the same endpoint first.
    pub fn mark_as_established(&self) {
        self.inner.shared.mark_established();
    }

    /// Whether the connection is currently marked as established.
    pub fn marked_as_established(&self) -> bool {
        self.inner.shared.marked_established()
    }

    /// True when neither connected nor connecting.
    pub fn is_idle(&self) -> bool {
        self.inner.shared.state_is(State::Disconnected)
    }

    /// True when connected to the highest-priority endpoint.
    pub fn is_primary(&self) -> bool {
        self.inner.shared.state_is(State::ConnectedHighestPrio)
    }

    /// Configure the SRV lookup as `_name._proto.domain.`.
    pub fn set_service(&self, name: &str, proto: &str, domain: &str) {
        debug_assert!(
            !name.is_empty() && !proto.is_empty() && !domain.is_empty(),
            "service name, proto and domain must be non-empty"
        );
        let label = service_label(name, proto, domain);
        self.inner.shared.set_label(label.clone());
        self.post(Input::SetService(label));
    }

    /// The full service label, empty when no service has been configured.
    pub fn service(&self) -> String {
        self.inner.shared.label()
    }

    /// Add an SRV record that is merged into every lookup result.
    pub fn add_static_srv_record(
        &self,
        ttl: u32,
        priority: u16,
        weight: u16,
        port: u16,
        target: &str,
    ) {
        self.post(Input::AddStaticRecord(SrvRecord::new(
            ttl, priority, weight, port, target,
        )));
    }

    /// Minimum reconnect delay in milliseconds.
    pub fn set_reconnect_min_time(&self, ms: u64) {
        self.post(Input::SetReconnectMinTime(ms));
    }

    /// Maximum reconnect delay in milliseconds.
    pub fn set_reconnect_max_time(&self, ms: u64) {
        self.post(Input::SetReconnectMaxTime(ms));
    }

    /// Percent to grow the reconnect delay by on every retry.
    pub fn set_reconnect_backoff_percent(&self, percent: u64) {
        self.post(Input::SetReconnectBackoffPercent(percent));
    }

    /// Percent of the reconnect delay to randomize over.
    pub fn set_reconnect_randomize_percent(&self, percent: u64) {
        self.post(Input::SetReconnectRandomizePercent(percent));
    }

    /// Queue bytes for writing on the foreground connection. Dropped when
    /// not connected.
    pub fn send(&self, data: Bytes) {
        self.post(Input::Send(data));
    }

    fn post(&self, input: Input) {
        // A send fails only after Shutdown, when nobody is listening anyway.
        let _ = self.inner.inputs.send(input);
    }
}
