use std::collections::BTreeMap;

/// Handle of a host inside the aggregator's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub number: u16,
    /// plugin_id -> evidence lines. A plugin without evidence still owns an
    /// (empty) entry.
    evidence: BTreeMap<String, Vec<String>>,
}

impl Port {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            evidence: BTreeMap::new(),
        }
    }

    pub fn is_host_level(&self) -> bool {
        self.number == 0
    }

    pub fn touch_plugin(&mut self, plugin_id: &str) {
        self.evidence.entry(plugin_id.to_string()).or_default();
    }

    pub fn append_evidence(&mut self, plugin_id: &str, text: &str) {
        self.evidence
            .entry(plugin_id.to_string())
            .or_default()
            .push(text.to_string());
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.evidence.contains_key(plugin_id)
    }

    pub fn evidence_for(&self, plugin_id: &str) -> &[String] {
        self.evidence
            .get(plugin_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub identifier: String,
    addresses: Vec<String>,
    ports: BTreeMap<String, BTreeMap<u16, Port>>,
}

impl Host {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            addresses: Vec::new(),
            ports: BTreeMap::new(),
        }
    }

    /// Set union; first-seen order is kept for stable output.
    pub fn merge_addresses<'a>(&mut self, addresses: impl IntoIterator<Item = &'a String>) {
        for address in addresses {
            if !self.addresses.iter().any(|known| known == address) {
                self.addresses.push(address.clone());
            }
        }
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn port_mut(&mut self, protocol: &str, number: u16) -> &mut Port {
        self.ports
            .entry(protocol.to_string())
            .or_default()
            .entry(number)
            .or_insert_with(|| Port::new(number))
    }

    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(|k| k.as_str())
    }

    pub fn ports(&self, protocol: &str) -> impl Iterator<Item = &Port> {
        self.ports
            .get(protocol)
            .into_iter()
            .flat_map(|ports| ports.values())
    }

    /// Ports under `protocol` matching `predicate`, ascending by number.
    pub fn find_ports_by<P>(&self, protocol: &str, predicate: P) -> Vec<&Port>
    where
        P: Fn(&Port) -> bool,
    {
        self.ports(protocol).filter(|port| predicate(port)).collect()
    }
}
