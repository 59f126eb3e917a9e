use crate::models::{Host, HostId, ScanRecord};
use fnv::{FnvHashMap, FnvHashSet};
use std::collections::BTreeSet;
use tracing::trace;

/// Identity of an exact duplicate record within one pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    plugin_id: String,
    host_identifier: String,
    protocol: String,
    port_number: u16,
    evidence_text: Option<String>,
}

impl DedupKey {
    fn of(record: &ScanRecord) -> Self {
        Self {
            plugin_id: record.plugin_id.clone(),
            host_identifier: record.host_identifier.clone(),
            protocol: record.protocol.clone(),
            port_number: record.port_number,
            evidence_text: record.evidence_text.clone(),
        }
    }
}

/// Outcome of one `ingest` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingested {
    pub host: HostId,
    pub duplicate: bool,
}

/// Merges records into hosts with per-protocol ports and evidence.
#[derive(Debug, Default)]
pub struct HostAggregator {
    hosts: Vec<Host>,
    host_ids: FnvHashMap<String, HostId>,
    seen: FnvHashSet<DedupKey>,
    duplicates: usize,
}

impl HostAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, record: &ScanRecord) -> Ingested {
        let host_id = match self.host_ids.get(&record.host_identifier) {
            Some(id) => *id,
            None => {
                let id = HostId(self.hosts.len());
                self.hosts.push(Host::new(&record.host_identifier));
                self.host_ids.insert(record.host_identifier.clone(), id);
                id
            }
        };

        let host = &mut self.hosts[host_id.0];
        host.merge_addresses(&record.host_addresses);

        if !self.seen.insert(DedupKey::of(record)) {
            self.duplicates += 1;
            trace!(
                plugin_id = %record.plugin_id,
                host = %record.host_identifier,
                port = record.port_number,
                "skipping duplicate record"
            );
            return Ingested {
                host: host_id,
                duplicate: true,
            };
        }

        let port = host.port_mut(&record.protocol, record.port_number);
        match &record.evidence_text {
            Some(text) => port.append_evidence(&record.plugin_id, text),
            None => port.touch_plugin(&record.plugin_id),
        }

        Ingested {
            host: host_id,
            duplicate: false,
        }
    }

    pub fn get(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(id.0)
    }

    pub fn find_hosts_by<P>(&self, predicate: P) -> Vec<(HostId, &Host)>
    where
        P: Fn(&Host) -> bool,
    {
        self.hosts
            .iter()
            .enumerate()
            .filter(|(_, host)| predicate(host))
            .map(|(i, host)| (HostId(i), host))
            .collect()
    }

    /// Every non-zero port number seen under any protocol, ascending.
    pub fn open_ports(&self) -> BTreeSet<u16> {
        self.hosts
            .iter()
            .flat_map(|host| {
                host.protocols()
                    .flat_map(move |protocol| host.ports(protocol))
                    .map(|port| port.number)
            })
            .filter(|number| *number > 0)
            .collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn duplicates_skipped(&self) -> usize {
        self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::host::Port;
    use crate::models::RiskFactor;
    use crate::utils::test_utils::record;

    fn port_of<'a>(host: &'a Host, protocol: &str, number: u16) -> &'a Port {
        host.find_ports_by(protocol, |p| p.number == number)[0]
    }

    #[test]
    fn test_exact_duplicate_does_not_repeat_evidence() {
        let mut aggregator = HostAggregator::new();
        let mut r = record("1", "SSH Weak Cipher", RiskFactor::High, "H1", "tcp", 22);
        r.evidence_text = Some("arcfour".to_string());

        let first = aggregator.ingest(&r);
        let second = aggregator.ingest(&r);

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.host, second.host);
        let port = port_of(aggregator.get(first.host).unwrap(), "tcp", 22);
        assert_eq!(port.evidence_for("1"), &["arcfour"]);
        assert_eq!(aggregator.duplicates_skipped(), 1);
    }

    #[test]
    fn test_distinct_evidence_is_kept() {
        let mut aggregator = HostAggregator::new();
        let mut r = record("1", "Banner", RiskFactor::None, "H1", "tcp", 80);
        r.evidence_text = Some("nginx".to_string());
        aggregator.ingest(&r);
        r.evidence_text = Some("apache".to_string());
        let ingested = aggregator.ingest(&r);

        let port = port_of(aggregator.get(ingested.host).unwrap(), "tcp", 80);
        assert_eq!(port.evidence_for("1"), &["nginx", "apache"]);
    }

    #[test]
    fn test_addresses_never_duplicate() {
        let mut aggregator = HostAggregator::new();
        for port in 1..=2000u16 {
            let mut r = record("1", "Open Port", RiskFactor::None, "H1", "tcp", port);
            r.host_addresses = vec!["10.0.0.5".to_string(), "h1.example.com".to_string()];
            aggregator.ingest(&r);
        }
        assert_eq!(aggregator.host_count(), 1);
        assert_eq!(aggregator.get(HostId(0)).unwrap().addresses().len(), 2);
    }

    #[test]
    fn test_host_level_findings_excluded_from_open_ports() {
        let mut aggregator = HostAggregator::new();
        aggregator.ingest(&record("1", "OS Id", RiskFactor::None, "H1", "tcp", 0));
        aggregator.ingest(&record("2", "SNMP", RiskFactor::Low, "H1", "udp", 161));
        aggregator.ingest(&record("3", "HTTP", RiskFactor::Low, "H2", "tcp", 80));

        assert_eq!(aggregator.open_ports().into_iter().collect::<Vec<_>>(), vec![80, 161]);
        let host = aggregator.get(HostId(0)).unwrap();
        assert!(port_of(host, "tcp", 0).has_plugin("1"));
    }

    #[test]
    fn test_find_hosts_by_predicate() {
        let mut aggregator = HostAggregator::new();
        aggregator.ingest(&record("1", "A", RiskFactor::Low, "H1", "tcp", 22));
        aggregator.ingest(&record("1", "A", RiskFactor::Low, "H2", "udp", 53));

        let udp_hosts = aggregator.find_hosts_by(|h| h.protocols().any(|p| p == "udp"));
        assert_eq!(udp_hosts.len(), 1);
        assert_eq!(udp_hosts[0].0, HostId(1));
        assert_eq!(udp_hosts[0].1.identifier, "H2");
    }
}
