use crate::models::{RiskFactor, ScanRecord};

/// A record on `host` whose only address is the host identifier itself.
pub fn record(
    plugin_id: &str,
    plugin_name: &str,
    risk_factor: RiskFactor,
    host: &str,
    protocol: &str,
    port_number: u16,
) -> ScanRecord {
    ScanRecord {
        plugin_id: plugin_id.to_string(),
        plugin_name: plugin_name.to_string(),
        risk_factor,
        protocol: protocol.to_string(),
        port_number,
        host_identifier: host.to_string(),
        host_addresses: vec![host.to_string()],
        evidence_text: None,
        exploit_available: false,
        exploit_frameworks: Vec::new(),
    }
}

/// Same as `record`, with explicit addresses and optional evidence.
pub fn record_at(
    plugin_id: &str,
    plugin_name: &str,
    risk_factor: RiskFactor,
    host: &str,
    addresses: &[&str],
    protocol: &str,
    port_number: u16,
    evidence: Option<&str>,
) -> ScanRecord {
    let mut r = record(plugin_id, plugin_name, risk_factor, host, protocol, port_number);
    r.host_addresses = addresses.iter().map(|a| a.to_string()).collect();
    r.evidence_text = evidence.map(|e| e.to_string());
    r
}
