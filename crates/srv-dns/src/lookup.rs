//! Stateful SRV lookup handle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::record::{SrvRecord, merge_records};
use crate::resolver::Resolve;

/// Completion of one lookup, as it travels through the owner's input queue.
///
/// `records` is the merged, sorted record set; `failed` is true when the
/// live answer was empty (static records may still populate `records`).
#[derive(Debug, Clone)]
pub struct LookupDone {
    pub epoch: u64,
    pub records: Vec<SrvRecord>,
    pub failed: bool,
}

/// An SRV lookup handle owned by the client machine.
///
/// `lookup()` starts one asynchronous resolution and posts a [`LookupDone`]
/// to the owner's queue on completion, success or hard failure alike.
/// `abort()` cancels the in-flight resolution and suppresses the event; a
/// completion that was already queued is rejected by
/// [`complete`](SrvLookup::complete) through its epoch.
pub struct SrvLookup<W> {
    resolver: Arc<dyn Resolve>,
    tx: mpsc::UnboundedSender<W>,
    label: String,
    statics: Vec<SrvRecord>,
    records: Vec<SrvRecord>,
    failed: bool,
    epoch: u64,
    inflight: Option<AbortHandle>,
}

impl<W: From<LookupDone> + Send + 'static> SrvLookup<W> {
    /// Create a lookup handle posting completions to `tx`.
    pub fn new(resolver: Arc<dyn Resolve>, tx: mpsc::UnboundedSender<W>) -> Self {
        Self {
            resolver,
            tx,
            label: String::new(),
            statics: Vec::new(),
            records: Vec::new(),
            failed: false,
            epoch: 0,
            inflight: None,
        }
    }

    /// Set the label to resolve, e.g. `_link._tcp.example.org.`.
    pub fn set_lookup_params(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// The configured label, empty when unset.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Add a record that is merged into every lookup result for the
    /// lifetime of this handle.
    pub fn add_static_record(&mut self, rr: SrvRecord) {
        self.statics.push(rr);
    }

    /// Start an asynchronous lookup. A no-op while one is already running.
    ///
    /// With no label configured there is nothing to query: the result is the
    /// static records alone, and that does not count as a failure.
    pub fn lookup(&mut self) {
        if self.inflight.is_some() {
            return;
        }
        self.epoch += 1;
        let epoch = self.epoch;
        let resolver = Arc::clone(&self.resolver);
        let label = self.label.clone();
        let statics = self.statics.clone();
        let tx = self.tx.clone();
        debug!(label = %self.label, "starting SRV lookup");
        let task = tokio::spawn(async move {
            let (live, failed) = if label.is_empty() {
                (Vec::new(), false)
            } else {
                match resolver.resolve_srv(&label).await {
                    Ok(records) => {
                        let failed = records.is_empty();
                        (records, failed)
                    }
                    Err(e) => {
                        debug!(label = %label, error = %e, "SRV lookup failed");
                        (Vec::new(), true)
                    }
                }
            };
            let records = merge_records(live, &statics);
            let _ = tx.send(W::from(LookupDone {
                epoch,
                records,
                failed,
            }));
        });
        self.inflight = Some(task.abort_handle());
    }

    /// Cancel the in-flight lookup, if any. No completion event is
    /// delivered for it.
    pub fn abort(&mut self) {
        if let Some(task) = self.inflight.take() {
            task.abort();
        }
        self.epoch += 1;
    }

    /// Apply a queued completion. Returns false (and changes nothing) when
    /// the completion is stale, i.e. the lookup it belongs to was aborted.
    pub fn complete(&mut self, done: LookupDone) -> bool {
        if done.epoch != self.epoch || self.inflight.is_none() {
            return false;
        }
        self.inflight = None;
        self.records = done.records;
        self.failed = done.failed;
        true
    }

    /// Copy the latest merged, sorted record set into `out`.
    pub fn resource_records(&self, out: &mut Vec<SrvRecord>) {
        out.clear();
        out.extend(self.records.iter().cloned());
    }

    /// Whether the last completed lookup was a hard failure (empty live
    /// answer).
    pub fn lookup_failed(&self) -> bool {
        self.failed
    }
}
