//! The single event-loop task that drives the machine.
//!
//! All state transitions happen here, on one task: collaborator completions
//! and handle commands arrive on one queue, payloads are applied to the
//! context, stale completions are filtered by their epochs, and only then is
//! the clean machine event dispatched. External emissions queued by the
//! handlers are forwarded after the dispatch has fully completed.

use std::sync::Arc;

use hfsm::{Machine, TimerFire};
use net_client::ClientEvent;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::context::Shared;
use crate::events::{Event, Input, LinkEvent};
use crate::states::PrioModel;

pub(crate) async fn run(
    mut machine: Machine<PrioModel>,
    mut inputs: mpsc::UnboundedReceiver<Input>,
    events: mpsc::UnboundedSender<LinkEvent>,
    shared: Arc<Shared>,
) {
    machine.start();
    shared.set_state(machine.state());

    while let Some(input) = inputs.recv().await {
        if matches!(input, Input::Shutdown) {
            break;
        }
        apply(&mut machine, input);
        shared.set_state(machine.state());
        while let Some(event) = machine.ctx_mut().pending.pop_front() {
            if events.send(event).is_err() {
                debug!("event subscriber gone, dropping emissions");
                break;
            }
        }
    }
    trace!("all handles dropped, stopping");
}

fn apply(machine: &mut Machine<PrioModel>, input: Input) {
    match input {
        Input::Connect => machine.dispatch(&Event::Connect),
        Input::Disconnect => machine.dispatch(&Event::Disconnect),
        Input::Send(data) => {
            machine.ctx().fg.send(data);
        }
        Input::SetService(label) => machine.ctx_mut().dns.set_lookup_params(label),
        Input::AddStaticRecord(rr) => machine.ctx_mut().dns.add_static_record(rr),
        Input::SetReconnectMinTime(ms) => machine.ctx_mut().backoff.set_min_time(ms),
        Input::SetReconnectMaxTime(ms) => machine.ctx_mut().backoff.set_max_time(ms),
        Input::SetReconnectBackoffPercent(p) => machine.ctx_mut().backoff.set_backoff_percent(p),
        Input::SetReconnectRandomizePercent(p) => {
            machine.ctx_mut().backoff.set_randomize_percent(p)
        }

        Input::Dns(done) => {
            if machine.ctx_mut().dns.complete(done) {
                machine.dispatch(&Event::DnsResultsReady);
            }
        }

        Input::Timer(fire) => {
            if machine.timers().accept(fire) {
                match fire {
                    TimerFire::Timeout { .. } => machine.dispatch(&Event::Timeout),
                    TimerFire::TimeoutAt { .. } => machine.dispatch(&Event::TimeoutAt),
                }
            }
        }

        Input::Fg(event) => match event {
            ClientEvent::Connected {
                epoch,
                stream,
                host,
                port,
            } => {
                if machine.ctx().fg.accept(epoch) {
                    machine.ctx_mut().fg.attach(stream, host, port);
                    machine.dispatch(&Event::Connected);
                }
            }
            ClientEvent::Disconnected { epoch, reason } => {
                if machine.ctx().fg.accept(epoch) {
                    machine.ctx_mut().fg.disconnect();
                    machine.dispatch(&Event::Disconnected(reason));
                }
            }
            ClientEvent::Data { epoch, data } => {
                if machine.ctx().fg.accept(epoch) {
                    machine.ctx_mut().emit(LinkEvent::Data(data));
                }
            }
        },

        Input::Bg(event) => match event {
            ClientEvent::Connected {
                epoch,
                stream,
                host,
                port,
            } => {
                if machine.ctx().bg.accept(epoch) {
                    machine.ctx_mut().bg.attach(stream, host, port);
                    machine.dispatch(&Event::BgConnected);
                }
            }
            ClientEvent::Disconnected { epoch, reason } => {
                if machine.ctx().bg.accept(epoch) {
                    machine.ctx_mut().bg.disconnect();
                    machine.dispatch(&Event::BgDisconnected(reason));
                }
            }
            // The background connection is silent until it is promoted.
            ClientEvent::Data { .. } => {}
        },

        // Handled by the run loop before dispatch.
        Input::Shutdown => {}
    }
}
