//! Scripted backends for driving the client deterministically.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::{self, Future};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use net_client::{Connector, NetStream};
use srv_dns::{Resolve, ResolveError, SrvRecord, StaticResolver};
use tokio::io::DuplexStream;
use tokio::sync::Notify;
use tokio::time::Instant;

/// What a scripted endpoint does with the next connect attempt.
#[derive(Clone)]
pub enum Outcome {
    /// Hand out one end of an in-memory duplex; the other end is available
    /// via [`ScriptedConnector::take_server`].
    Accept,
    Refuse,
    /// Never resolve. Models a connect that hangs until torn down.
    Pending,
}

/// A connector serving scripted outcomes per endpoint.
///
/// Outcomes are consumed in order; the last one repeats. Unscripted
/// endpoints refuse. Every attempt is recorded with its (virtual) time.
#[derive(Default)]
pub struct ScriptedConnector {
    plan: Mutex<HashMap<(String, u16), VecDeque<Outcome>>>,
    attempts: Mutex<Vec<(String, u16, Instant)>>,
    servers: Mutex<Vec<((String, u16), DuplexStream)>>,
    notify: Notify,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, host: &str, port: u16, outcomes: impl IntoIterator<Item = Outcome>) {
        self.plan
            .lock()
            .unwrap()
            .insert((host.to_string(), port), outcomes.into_iter().collect());
    }

    /// All connect attempts so far, in order.
    pub fn attempts(&self) -> Vec<(String, u16, Instant)> {
        self.attempts.lock().unwrap().clone()
    }

    /// Wait until at least `n` connect attempts have been made.
    pub async fn wait_for_attempts(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.attempts.lock().unwrap().len() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Take the most recently accepted server half for an endpoint.
    pub fn take_server(&self, host: &str, port: u16) -> Option<DuplexStream> {
        let mut servers = self.servers.lock().unwrap();
        let idx = servers
            .iter()
            .rposition(|((h, p), _)| h == host && *p == port)?;
        Some(servers.remove(idx).1)
    }

    fn next_outcome(&self, key: &(String, u16)) -> Outcome {
        let mut plan = self.plan.lock().unwrap();
        let Some(queue) = plan.get_mut(key) else {
            return Outcome::Refuse;
        };
        match queue.len() {
            0 => Outcome::Refuse,
            1 => queue.front().cloned().unwrap(),
            _ => queue.pop_front().unwrap(),
        }
    }
}

impl Connector for ScriptedConnector {
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
    ) -> Pin<Box<dyn Future<Output = net_client::Result<NetStream>> + Send + 'a>> {
        let key = (host.to_string(), port);
        self.attempts
            .lock()
            .unwrap()
            .push((key.0.clone(), port, Instant::now()));
        self.notify.notify_waiters();

        match self.next_outcome(&key) {
            Outcome::Accept => {
                let (client, server) = tokio::io::duplex(64 * 1024);
                self.servers.lock().unwrap().push((key, server));
                Box::pin(future::ready(Ok(Box::new(client) as NetStream)))
            }
            Outcome::Refuse => Box::pin(future::ready(Err(net_client::Error::Connect(
                io::ErrorKind::ConnectionRefused.into(),
            )))),
            Outcome::Pending => Box::pin(future::pending::<net_client::Result<NetStream>>()),
        }
    }
}

/// A [`StaticResolver`] that records the (virtual) time of every lookup.
#[derive(Default)]
pub struct RecordingResolver {
    inner: StaticResolver,
    lookups: Mutex<Vec<Instant>>,
    notify: Notify,
}

impl RecordingResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enqueue_records(&self, records: Vec<SrvRecord>) {
        self.inner.enqueue_records(records);
    }

    pub fn enqueue_failure(&self, message: &str) {
        self.inner.enqueue_failure(message);
    }

    /// Times of all lookups so far.
    pub fn lookups(&self) -> Vec<Instant> {
        self.lookups.lock().unwrap().clone()
    }

    /// Wait until at least `n` lookups have been made.
    pub async fn wait_for_lookups(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.lookups.lock().unwrap().len() >= n {
                return;
            }
            notified.await;
        }
    }
}

impl Resolve for RecordingResolver {
    fn resolve_srv<'a>(
        &'a self,
        label: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SrvRecord>, ResolveError>> + Send + 'a>> {
        self.lookups.lock().unwrap().push(Instant::now());
        self.notify.notify_waiters();
        self.inner.resolve_srv(label)
    }
}

/// Shorthand for the record tuples the scenarios use.
pub fn srv(priority: u16, port: u16, target: &str) -> SrvRecord {
    SrvRecord::new(3600, priority, 0, port, target)
}
