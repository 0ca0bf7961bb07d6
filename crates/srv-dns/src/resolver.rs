//! Resolution backends behind the `Resolve` trait.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::proto::rr::RData;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::record::SrvRecord;

/// Abstraction over SRV resolution backends.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Resolve>`). A hard failure (including an NXDOMAIN / empty
/// answer) is an `Err`; callers treat it as an empty live record set.
pub trait Resolve: Send + Sync {
    /// Resolve an SRV label into its raw (unsorted, unmerged) record list.
    fn resolve_srv<'a>(
        &'a self,
        label: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SrvRecord>>> + Send + 'a>>;
}

/// Live DNS resolution through the system resolver configuration.
pub struct HickoryResolver {
    inner: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Build a resolver from `/etc/resolv.conf` (or the platform
    /// equivalent).
    pub fn from_system_conf() -> Result<Self> {
        let inner = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| ResolveError::Init(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl Resolve for HickoryResolver {
    fn resolve_srv<'a>(
        &'a self,
        label: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SrvRecord>>> + Send + 'a>> {
        Box::pin(async move {
            let lookup = self
                .inner
                .srv_lookup(label)
                .await
                .map_err(|e| ResolveError::Lookup(e.to_string()))?;

            let mut records = Vec::new();
            for record in lookup.as_lookup().record_iter() {
                if let Some(RData::SRV(srv)) = record.data() {
                    records.push(SrvRecord::new(
                        record.ttl(),
                        srv.priority(),
                        srv.weight(),
                        srv.port(),
                        srv.target().to_utf8(),
                    ));
                }
            }
            debug!(label, records = records.len(), "SRV lookup completed");
            Ok(records)
        })
    }
}

/// Scripted resolution for tests and offline use.
///
/// Answers are served in FIFO order; the last remaining answer repeats for
/// every subsequent lookup. With no scripted answers every lookup is a hard
/// failure.
#[derive(Default)]
pub struct StaticResolver {
    answers: Mutex<VecDeque<Answer>>,
}

#[derive(Clone)]
enum Answer {
    Records(Vec<SrvRecord>),
    Failure(String),
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer.
    pub fn enqueue_records(&self, records: Vec<SrvRecord>) {
        self.answers
            .lock()
            .expect("resolver answers lock poisoned")
            .push_back(Answer::Records(records));
    }

    /// Queue a hard failure.
    pub fn enqueue_failure(&self, message: impl Into<String>) {
        self.answers
            .lock()
            .expect("resolver answers lock poisoned")
            .push_back(Answer::Failure(message.into()));
    }

    fn next_answer(&self) -> Answer {
        let mut answers = self
            .answers
            .lock()
            .expect("resolver answers lock poisoned");
        match answers.len() {
            0 => Answer::Failure("no scripted answer".into()),
            1 => answers.front().cloned().expect("front of non-empty queue"),
            _ => answers.pop_front().expect("front of non-empty queue"),
        }
    }
}

impl Resolve for StaticResolver {
    fn resolve_srv<'a>(
        &'a self,
        _label: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SrvRecord>>> + Send + 'a>> {
        let answer = self.next_answer();
        Box::pin(async move {
            match answer {
                Answer::Records(records) => Ok(records),
                Answer::Failure(message) => Err(ResolveError::Lookup(message)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_serves_answers_in_order() {
        let resolver = StaticResolver::new();
        resolver.enqueue_records(vec![SrvRecord::new(3600, 20, 0, 5220, "b")]);
        resolver.enqueue_records(vec![
            SrvRecord::new(3600, 10, 0, 5220, "a"),
            SrvRecord::new(3600, 20, 0, 5220, "b"),
        ]);

        let first = resolver.resolve_srv("_link._tcp.example.").await.unwrap();
        assert_eq!(first.len(), 1);
        let second = resolver.resolve_srv("_link._tcp.example.").await.unwrap();
        assert_eq!(second.len(), 2);
        // The last answer repeats.
        let third = resolver.resolve_srv("_link._tcp.example.").await.unwrap();
        assert_eq!(third.len(), 2);
    }

    #[tokio::test]
    async fn static_resolver_fails_without_answers() {
        let resolver = StaticResolver::new();
        let result = resolver.resolve_srv("_link._tcp.example.").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn scripted_failure_is_an_error() {
        let resolver = StaticResolver::new();
        resolver.enqueue_failure("SERVFAIL");
        let result = resolver.resolve_srv("_link._tcp.example.").await;
        assert!(matches!(result, Err(ResolveError::Lookup(_))));
    }
}
