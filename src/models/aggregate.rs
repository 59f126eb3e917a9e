use crate::models::host::HostId;
use crate::models::record::ScanRecord;
use crate::models::risk::RiskFactor;
use std::fmt::Write;

/// Everything known about one plugin across the whole pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginAggregate {
    pub plugin_id: String,
    pub plugin_name: String,
    pub risk_factor: RiskFactor,
    pub exploit_available: bool,
    pub exploit_frameworks: Vec<String>,
    pub protocols: Vec<String>,
    pub hosts: Vec<HostId>,
}

impl PluginAggregate {
    pub fn from_record(record: &ScanRecord, host: HostId) -> Self {
        let mut aggregate = Self {
            plugin_id: record.plugin_id.clone(),
            plugin_name: record.plugin_name.clone(),
            risk_factor: record.risk_factor,
            exploit_available: false,
            exploit_frameworks: Vec::new(),
            protocols: Vec::new(),
            hosts: Vec::new(),
        };
        aggregate.absorb(record.exploit_available, &record.exploit_frameworks);
        aggregate.add_protocol(&record.protocol);
        aggregate.add_host(host);
        aggregate
    }

    /// Merge another aggregate of the same plugin. Identity and risk factor
    /// stay as first seen.
    pub fn merge(&mut self, other: &PluginAggregate) {
        self.absorb(other.exploit_available, &other.exploit_frameworks);
        for protocol in &other.protocols {
            self.add_protocol(protocol);
        }
        for host in &other.hosts {
            self.add_host(*host);
        }
    }

    fn absorb(&mut self, exploit_available: bool, frameworks: &[String]) {
        self.exploit_available |= exploit_available;
        for framework in frameworks {
            if !self.exploit_frameworks.contains(framework) {
                self.exploit_frameworks.push(framework.clone());
            }
        }
    }

    fn add_protocol(&mut self, protocol: &str) {
        if !self.protocols.iter().any(|p| p == protocol) {
            self.protocols.push(protocol.to_string());
        }
    }

    fn add_host(&mut self, host: HostId) {
        if !self.hosts.contains(&host) {
            self.hosts.push(host);
        }
    }

    pub fn is_exploitable(&self) -> bool {
        self.exploit_available || !self.exploit_frameworks.is_empty()
    }

    /// One line of `report_item_index.txt`.
    pub fn index_line(&self) -> String {
        let mut line = format!("[{}] {}", self.risk_factor, self.plugin_name);
        if self.exploit_available {
            line.push_str(" [EXPLOITABLE]");
        }
        if !self.exploit_frameworks.is_empty() {
            let frameworks: Vec<String> = self
                .exploit_frameworks
                .iter()
                .map(|fw| fw.to_uppercase())
                .collect();
            let _ = write!(line, " [EXPLOIT FRAMEWORKS: {}]", frameworks.join(","));
        }
        line
    }

    /// Content of `additional_info.txt`, derived from current-run data only.
    pub fn additional_info(&self) -> String {
        let mut info = String::new();
        let _ = writeln!(info, "Plugin ID: {}", self.plugin_id);
        let _ = writeln!(info, "Plugin Name: {}", self.plugin_name);
        let _ = writeln!(info, "Risk Factor: {}", self.risk_factor);
        let _ = writeln!(info, "Exploitable: {}", self.is_exploitable());
        let _ = writeln!(info, "Exploit Available: {}", self.exploit_available);
        if self.exploit_frameworks.is_empty() {
            let _ = writeln!(info, "Exploit Frameworks: none");
        } else {
            let _ = writeln!(info, "Exploit Frameworks:");
            for framework in &self.exploit_frameworks {
                let _ = writeln!(info, "  - {}", framework);
            }
        }
        let _ = writeln!(info, "Protocols: {}", self.protocols.join(", "));
        let _ = writeln!(info, "Affected Hosts: {}", self.hosts.len());
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::record;

    #[test]
    fn test_index_line_annotations() {
        let mut r = record("1", "Apache Struts RCE", RiskFactor::Critical, "h1", "tcp", 8080);
        r.exploit_available = true;
        r.exploit_frameworks = vec!["Metasploit".to_string(), "Core Impact".to_string()];
        let aggregate = PluginAggregate::from_record(&r, HostId(0));
        assert_eq!(
            aggregate.index_line(),
            "[CRITICAL] Apache Struts RCE [EXPLOITABLE] [EXPLOIT FRAMEWORKS: METASPLOIT,CORE IMPACT]"
        );

        let plain = record("2", "TLS Version 1.0", RiskFactor::Medium, "h1", "tcp", 443);
        assert_eq!(
            PluginAggregate::from_record(&plain, HostId(0)).index_line(),
            "[MEDIUM] TLS Version 1.0"
        );
    }

    #[test]
    fn test_merge_unions_without_touching_risk() {
        let first = record("1", "Weak Cipher", RiskFactor::High, "h1", "tcp", 22);
        let mut second = record("1", "Weak Cipher", RiskFactor::Low, "h2", "udp", 500);
        second.exploit_frameworks = vec!["Canvas".to_string()];

        let mut aggregate = PluginAggregate::from_record(&first, HostId(0));
        let other = PluginAggregate::from_record(&second, HostId(1));
        aggregate.merge(&other);
        aggregate.merge(&other);

        assert_eq!(aggregate.risk_factor, RiskFactor::High);
        assert_eq!(aggregate.protocols, vec!["tcp", "udp"]);
        assert_eq!(aggregate.hosts, vec![HostId(0), HostId(1)]);
        assert_eq!(aggregate.exploit_frameworks, vec!["Canvas"]);
        assert!(aggregate.is_exploitable());
    }
}
