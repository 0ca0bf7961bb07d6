//! DNS SRV resolution for service endpoint discovery
//!
//! Resolves `_service._proto.domain` labels into ordered endpoint lists.
//! Lower numeric priority wins; equal priorities keep a stable order.
//! Static records can be injected to supplement (or stand in for) the live
//! DNS answer, which keeps the retry loop productive on networks without
//! SRV support.
//!
//! Resolution itself sits behind the [`Resolve`] trait so the backend can be
//! swapped: [`HickoryResolver`] queries real DNS through the system resolver
//! configuration, [`StaticResolver`] serves scripted answers for tests and
//! offline use. [`SrvLookup`] is the stateful handle the client machine
//! drives: it owns the label, the static records, and the latest merged
//! result, and posts one completion event per lookup to the owner's queue.

mod error;
mod lookup;
mod record;
mod resolver;

pub use error::{ResolveError, Result};
pub use lookup::{LookupDone, SrvLookup};
pub use record::{SrvRecord, merge_records, service_label, sort_records};
pub use resolver::{HickoryResolver, Resolve, StaticResolver};
