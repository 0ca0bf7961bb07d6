//! SRV record type, ordering, and static-record merge.

use std::fmt;

/// One SRV record. Lower `priority` means higher precedence; `weight` is
/// carried for completeness but does not affect ordering here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
    pub ttl: u32,
}

impl SrvRecord {
    pub fn new(ttl: u32, priority: u16, weight: u16, port: u16, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            port,
            priority,
            weight,
            ttl,
        }
    }

    /// The endpoint this record points at.
    pub fn endpoint(&self) -> (&str, u16) {
        (&self.target, self.port)
    }
}

impl fmt::Display for SrvRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target
        )
    }
}

/// Build the lookup label for a service: `_name._proto.domain.` with the
/// trailing dot.
pub fn service_label(name: &str, proto: &str, domain: &str) -> String {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    format!("_{name}._{proto}.{domain}.")
}

/// Sort records by ascending priority. The sort is stable, so records with
/// equal priority keep their insertion order — that is the documented
/// tie-break policy (weight is not used for ordering).
pub fn sort_records(records: &mut [SrvRecord]) {
    records.sort_by_key(|rr| rr.priority);
}

/// Merge a live DNS answer with the configured static records and sort the
/// result.
///
/// Static records survive every lookup. A static record with TTL 0 is
/// special-cased: when the live answer produced records it gets the maximum
/// TTL (it should never age out of a working answer), and when the live
/// answer was empty it keeps TTL 0.
pub fn merge_records(live: Vec<SrvRecord>, statics: &[SrvRecord]) -> Vec<SrvRecord> {
    let live_empty = live.is_empty();
    let mut merged = live;
    for rr in statics {
        let mut rr = rr.clone();
        if rr.ttl == 0 && !live_empty {
            rr.ttl = u32::MAX;
        }
        merged.push(rr);
    }
    sort_records(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rr(priority: u16, target: &str) -> SrvRecord {
        SrvRecord::new(3600, priority, 0, 5220, target)
    }

    #[test]
    fn sorts_ascending_by_priority() {
        let mut records = vec![rr(30, "c"), rr(10, "a"), rr(20, "b")];
        sort_records(&mut records);
        let targets: Vec<_> = records.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["a", "b", "c"]);
    }

    #[test]
    fn equal_priority_keeps_insertion_order() {
        let mut records = vec![rr(10, "first"), rr(10, "second"), rr(5, "head")];
        sort_records(&mut records);
        let targets: Vec<_> = records.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["head", "first", "second"]);
    }

    #[test]
    fn merge_appends_statics_and_sorts() {
        let live = vec![rr(20, "live-b"), rr(10, "live-a")];
        let statics = vec![rr(15, "static-mid")];
        let merged = merge_records(live, &statics);
        let targets: Vec<_> = merged.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["live-a", "static-mid", "live-b"]);
    }

    #[test]
    fn zero_ttl_static_gets_max_ttl_with_live_records() {
        let live = vec![rr(10, "live")];
        let statics = vec![SrvRecord::new(0, 20, 0, 5220, "static")];
        let merged = merge_records(live, &statics);
        let stat = merged.iter().find(|r| r.target == "static").unwrap();
        assert_eq!(stat.ttl, u32::MAX);
    }

    #[test]
    fn zero_ttl_static_stays_zero_without_live_records() {
        let statics = vec![SrvRecord::new(0, 20, 0, 5220, "static")];
        let merged = merge_records(Vec::new(), &statics);
        assert_eq!(merged[0].ttl, 0);
    }

    #[test]
    fn service_label_has_underscores_and_trailing_dot() {
        assert_eq!(
            service_label("link", "tcp", "example.org"),
            "_link._tcp.example.org."
        );
    }

    #[test]
    fn service_label_keeps_an_already_qualified_domain() {
        assert_eq!(
            service_label("link", "tcp", "example.org."),
            "_link._tcp.example.org."
        );
    }

    #[test]
    fn nonzero_ttl_static_is_untouched() {
        let live = vec![rr(10, "live")];
        let statics = vec![SrvRecord::new(120, 20, 0, 5220, "static")];
        let merged = merge_records(live, &statics);
        let stat = merged.iter().find(|r| r.target == "static").unwrap();
        assert_eq!(stat.ttl, 120);
    }
}
