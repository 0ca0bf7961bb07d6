//! The machine's context: collaborators, record cursor, and shared status.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;

use net_client::{ReconnectBackoff, TcpClient};
use srv_dns::{SrvLookup, SrvRecord};

use crate::events::{Input, LinkEvent};
use crate::states::State;

/// Status snapshot shared between the driver task and the `PrioClient`
/// handle. The driver writes after every processed input; the handle reads
/// synchronously.
pub(crate) struct Shared {
    state: AtomicU8,
    marked_established: AtomicBool,
    label: Mutex<String>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Disconnected as u8),
            marked_established: AtomicBool::new(false),
            label: Mutex::new(String::new()),
        }
    }

    pub(crate) fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn state_is(&self, state: State) -> bool {
        self.state.load(Ordering::Acquire) == state as u8
    }

    pub(crate) fn mark_established(&self) {
        self.marked_established.store(true, Ordering::Release);
    }

    pub(crate) fn clear_established(&self) {
        self.marked_established.store(false, Ordering::Release);
    }

    pub(crate) fn marked_established(&self) -> bool {
        self.marked_established.load(Ordering::Acquire)
    }

    pub(crate) fn set_label(&self, label: String) {
        *self.label.lock().expect("label lock poisoned") = label;
    }

    pub(crate) fn label(&self) -> String {
        self.label.lock().expect("label lock poisoned").clone()
    }
}

/// Mutable state the handlers operate on.
///
/// `next_rr` is the record cursor: an index into `rrs`, with `rrs.len()`
/// meaning "end". The cursor semantics drive endpoint failover: it advances
/// on unestablished disconnects, wraps from end to the head, and running off
/// the end sends the machine into the backoff wait.
pub(crate) struct Ctx {
    pub fg: TcpClient<Input>,
    pub bg: TcpClient<Input>,
    pub dns: SrvLookup<Input>,
    pub backoff: ReconnectBackoff,
    pub rrs: Vec<SrvRecord>,
    pub next_rr: usize,
    pub shared: Arc<Shared>,
    /// External emissions deferred until the current dispatch completes, so
    /// subscribers never observe a half-transitioned machine.
    pub pending: VecDeque<LinkEvent>,
}

impl Ctx {
    /// Pull the latest record set out of the lookup handle and park the
    /// cursor at the end.
    pub(crate) fn fetch_records(&mut self) {
        self.dns.resource_records(&mut self.rrs);
        self.next_rr = self.rrs.len();
    }

    /// The endpoint of the current foreground connection.
    pub(crate) fn connected_endpoint(&self) -> Option<(&str, u16)> {
        match (self.fg.remote_host(), self.fg.remote_port()) {
            (Some(host), Some(port)) => Some((host, port)),
            _ => None,
        }
    }

    /// Queue an external emission for delivery after this dispatch.
    pub(crate) fn emit(&mut self, event: LinkEvent) {
        self.pending.push_back(event);
    }

    pub(crate) fn marked_as_established(&self) -> bool {
        self.shared.marked_established()
    }
}
