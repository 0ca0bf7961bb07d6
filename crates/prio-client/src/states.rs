//! The state tree and its behavior.
//!
//! ```text
//! Top
//! ├── Disconnected
//! ├── Connecting
//! │   ├── ConnectingSrvLookup
//! │   ├── ConnectingTryConnect
//! │   └── ConnectingIdle
//! └── Connected
//!     ├── ConnectedHighestPrio
//!     └── ConnectedLowerPrio
//!         ├── ConnectedLowerPrioIdle
//!         ├── ConnectedLowerPrioSrvLookup
//!         └── ConnectedLowerPrioTryConnect
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hfsm::{Reaction, StateId, StateModel, Timers};
use metrics::counter;
use net_client::DisconnectReason;
use rand::Rng;
use tracing::{debug, info};

use crate::context::Ctx;
use crate::events::{Event, Input, LinkEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum State {
    Top,
    Disconnected,
    Connecting,
    ConnectingSrvLookup,
    ConnectingTryConnect,
    ConnectingIdle,
    Connected,
    ConnectedHighestPrio,
    ConnectedLowerPrio,
    ConnectedLowerPrioIdle,
    ConnectedLowerPrioSrvLookup,
    ConnectedLowerPrioTryConnect,
}

impl StateId for State {
    const TOP: Self = State::Top;

    fn parent(self) -> Option<Self> {
        match self {
            State::Top => None,
            State::Disconnected | State::Connecting | State::Connected => Some(State::Top),
            State::ConnectingSrvLookup
            | State::ConnectingTryConnect
            | State::ConnectingIdle => Some(State::Connecting),
            State::ConnectedHighestPrio | State::ConnectedLowerPrio => Some(State::Connected),
            State::ConnectedLowerPrioIdle
            | State::ConnectedLowerPrioSrvLookup
            | State::ConnectedLowerPrioTryConnect => Some(State::ConnectedLowerPrio),
        }
    }
}

pub(crate) struct PrioModel;

impl StateModel for PrioModel {
    type Id = State;
    type Ctx = Ctx;
    type Event = Event;
    type Wake = Input;

    fn init(id: State, ctx: &mut Ctx, _timers: &mut Timers<Input>) -> Option<State> {
        match id {
            State::Top => Some(State::Disconnected),
            // The cursor at the head of a successful lookup means we are on
            // the primary endpoint.
            State::Connected => {
                if ctx.next_rr == 0 && !ctx.dns.lookup_failed() {
                    Some(State::ConnectedHighestPrio)
                } else {
                    Some(State::ConnectedLowerPrioIdle)
                }
            }
            _ => None,
        }
    }

    fn entry(id: State, ctx: &mut Ctx, timers: &mut Timers<Input>) -> Option<State> {
        match id {
            State::Disconnected => {
                ctx.fg.disconnect();
                None
            }
            State::ConnectingSrvLookup | State::ConnectedLowerPrioSrvLookup => {
                ctx.dns.lookup();
                None
            }
            State::ConnectingTryConnect => connect_to_next(ctx),
            State::ConnectingIdle => {
                if ctx.marked_as_established() {
                    ctx.backoff.reset();
                }
                let delay = ctx.backoff.next();
                debug!(delay_ms = delay.as_millis() as u64, "waiting before next lookup");
                timers.set_timeout(delay);
                None
            }
            State::Connected => {
                ctx.emit(LinkEvent::Connected);
                None
            }
            State::ConnectedLowerPrioIdle => {
                let (at, offset) = next_top_of_minute();
                timers.set_timeout_at(at, offset);
                None
            }
            State::ConnectedLowerPrioTryConnect => {
                ctx.next_rr = 0;
                let Some(rr) = ctx.rrs.first() else {
                    return Some(State::ConnectedLowerPrioIdle);
                };
                let (target, port) = (rr.target.clone(), rr.port);
                let recv_buf_len = ctx.fg.recv_buf_len();
                ctx.bg.set_recv_buf_len(recv_buf_len);
                debug!(host = %target, port, "probing higher priority peer");
                ctx.bg.connect(&target, port);
                None
            }
            _ => None,
        }
    }

    fn exit(id: State, ctx: &mut Ctx, timers: &mut Timers<Input>) {
        match id {
            State::ConnectingSrvLookup | State::ConnectedLowerPrioSrvLookup => ctx.dns.abort(),
            State::ConnectingIdle => timers.clear_timeout(),
            State::ConnectedLowerPrioIdle => timers.clear_timeout_at(),
            State::ConnectedLowerPrioTryConnect => ctx.bg.disconnect(),
            _ => {}
        }
    }

    fn on_event(
        id: State,
        ctx: &mut Ctx,
        _timers: &mut Timers<Input>,
        event: &Event,
    ) -> Reaction<State> {
        match (id, event) {
            (State::Disconnected, Event::Connect) => {
                Reaction::Transition(State::ConnectingSrvLookup)
            }

            (State::ConnectingSrvLookup, Event::DnsResultsReady) => {
                ctx.fetch_records();
                if ctx.rrs.is_empty() {
                    Reaction::Transition(State::ConnectingIdle)
                } else {
                    Reaction::Transition(State::ConnectingTryConnect)
                }
            }

            (State::ConnectingTryConnect, Event::Connected) => {
                Reaction::Transition(State::Connected)
            }
            (State::ConnectingTryConnect, Event::Disconnected(_)) => match connect_to_next(ctx) {
                Some(next) => Reaction::Transition(next),
                None => Reaction::Handled,
            },

            (State::ConnectingIdle, Event::Timeout) => {
                Reaction::Transition(State::ConnectingSrvLookup)
            }

            (State::Connected, Event::Disconnected(reason)) => {
                info!(reason = %reason, "link lost");
                counter!("prio_client_reconnects_total").increment(1);
                ctx.emit(LinkEvent::Disconnected(*reason));
                if ctx.marked_as_established() {
                    Reaction::Transition(State::ConnectingIdle)
                } else {
                    Reaction::Transition(State::ConnectingTryConnect)
                }
            }

            (State::ConnectedLowerPrioIdle, Event::TimeoutAt) => {
                Reaction::Transition(State::ConnectedLowerPrioSrvLookup)
            }

            (State::ConnectedLowerPrioSrvLookup, Event::DnsResultsReady) => {
                ctx.fetch_records();
                let head = ctx.rrs.first().map(|rr| (rr.target.clone(), rr.port));
                match head {
                    Some((host, port))
                        if ctx.connected_endpoint() != Some((host.as_str(), port)) =>
                    {
                        Reaction::Transition(State::ConnectedLowerPrioTryConnect)
                    }
                    Some(_) => {
                        // The connected peer is the head now; Connected's
                        // init re-derives the leaf from the cursor.
                        ctx.next_rr = 0;
                        Reaction::Transition(State::Connected)
                    }
                    None => Reaction::Transition(State::Connected),
                }
            }

            (State::ConnectedLowerPrioTryConnect, Event::BgConnected) => {
                if ctx.fg.is_connected() {
                    ctx.fg.disconnect();
                    ctx.emit(LinkEvent::Disconnected(DisconnectReason::SwitchPeer));
                }
                let Ctx { fg, bg, .. } = ctx;
                fg.take_connection_from(bg);
                ctx.emit(LinkEvent::Connected);
                counter!("prio_client_peer_switches_total").increment(1);
                info!(
                    host = ctx.fg.remote_host().unwrap_or(""),
                    port = ctx.fg.remote_port().unwrap_or(0),
                    "switched to higher priority peer"
                );
                Reaction::Transition(State::Connected)
            }
            (State::ConnectedLowerPrioTryConnect, Event::BgDisconnected(_)) => {
                ctx.next_rr += 1;
                let next = ctx
                    .rrs
                    .get(ctx.next_rr)
                    .map(|rr| (rr.target.clone(), rr.port));
                match next {
                    Some((host, port))
                        if ctx.connected_endpoint() != Some((host.as_str(), port)) =>
                    {
                        debug!(host = %host, port, "probing next peer");
                        ctx.bg.connect(&host, port);
                        Reaction::Handled
                    }
                    _ => Reaction::Transition(State::ConnectedLowerPrioIdle),
                }
            }

            // Top-level defaults.
            (State::Top, Event::Disconnect) => Reaction::Transition(State::Disconnected),
            (State::Top, Event::Timeout | Event::TimeoutAt) => {
                debug_assert!(false, "timeout event reached the top state");
                Reaction::Handled
            }
            (State::Top, _) => Reaction::Handled,
            _ => Reaction::Parent,
        }
    }
}

/// Advance the record cursor and start the next foreground connect.
///
/// At the end the cursor wraps to the head; otherwise it advances — unless
/// the connection was marked as established, in which case the same endpoint
/// is retried once. Running off the end means every endpoint was tried:
/// the caller goes to the backoff wait.
fn connect_to_next(ctx: &mut Ctx) -> Option<State> {
    if ctx.next_rr >= ctx.rrs.len() {
        ctx.next_rr = 0;
    } else if !ctx.marked_as_established() {
        ctx.next_rr += 1;
    }
    if ctx.next_rr >= ctx.rrs.len() {
        return Some(State::ConnectingIdle);
    }
    ctx.shared.clear_established();
    let (target, port) = {
        let rr = &ctx.rrs[ctx.next_rr];
        (rr.target.clone(), rr.port)
    };
    counter!("prio_client_connect_attempts_total").increment(1);
    ctx.fg.connect(&target, port);
    None
}

/// The next top-of-minute wall-clock deadline plus a uniform 0..500 ms
/// offset. The jitter spreads re-probe storms across a fleet that started
/// simultaneously.
fn next_top_of_minute() -> (SystemTime, Duration) {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let next_minute = (since_epoch.as_secs() / 60 + 1) * 60;
    let at = UNIX_EPOCH + Duration::from_secs(next_minute);
    let offset = Duration::from_millis(rand::thread_rng().gen_range(0..500));
    (at, offset)
}
