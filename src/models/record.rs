use crate::error::{RecordError, RecordOrigin};
use crate::models::risk::RiskFactor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finding occurrence as it arrives from the scan document, before any
/// structural validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub plugin_id: Option<String>,
    pub plugin_name: Option<String>,
    pub risk_factor: Option<String>,
    pub protocol: Option<String>,
    pub port_number: Option<u16>,
    pub host_identifier: Option<String>,
    pub host_addresses: Vec<String>,
    pub evidence_text: Option<String>,
    pub exploit_available: bool,
    pub exploit_frameworks: Vec<String>,
}

/// A validated finding occurrence: one plugin hit on one host, protocol and port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub plugin_id: String,
    pub plugin_name: String,
    pub risk_factor: RiskFactor,
    pub protocol: String,
    /// 0 means the finding applies to the host rather than a port.
    pub port_number: u16,
    pub host_identifier: String,
    pub host_addresses: Vec<String>,
    pub evidence_text: Option<String>,
    pub exploit_available: bool,
    pub exploit_frameworks: Vec<String>,
}

/// One parsed input document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanDocument {
    pub targets: Vec<String>,
    pub scan_started: Option<DateTime<Utc>>,
    pub scan_finished: Option<DateTime<Utc>>,
    pub records: Vec<serde_json::Value>,
}

/// Scan-wide context gathered from every input document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSummary {
    pub targets: Vec<String>,
    pub scan_started: Option<DateTime<Utc>>,
    pub scan_finished: Option<DateTime<Utc>>,
}

impl TargetSummary {
    pub fn absorb(&mut self, document: &ScanDocument) {
        for target in document.targets.iter().flat_map(|t| t.split(',')) {
            let target = target.trim();
            if !target.is_empty() && !self.targets.iter().any(|t| t == target) {
                self.targets.push(target.to_string());
            }
        }
        if let Some(started) = document.scan_started {
            self.scan_started = Some(self.scan_started.map_or(started, |s| s.min(started)));
        }
        if let Some(finished) = document.scan_finished {
            self.scan_finished = Some(self.scan_finished.map_or(finished, |f| f.max(finished)));
        }
    }

    /// Content of `target_information.txt`.
    pub fn render(&self, responsive_hosts: usize) -> String {
        let mut text = String::from("Targets:\n");
        if self.targets.is_empty() {
            text.push_str("  (none recorded)\n");
        }
        for target in &self.targets {
            text.push_str(&format!("  {}\n", target));
        }
        if let Some(started) = self.scan_started {
            text.push_str(&format!("Scan Started: {}\n", started.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(finished) = self.scan_finished {
            text.push_str(&format!("Scan Finished: {}\n", finished.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        text.push_str(&format!("Responsive Hosts: {}\n", responsive_hosts));
        text
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawRecord {
    /// Check structurally required fields and normalize the rest.
    pub fn validate(self, origin: RecordOrigin) -> Result<ScanRecord, RecordError> {
        let plugin_id = non_empty(self.plugin_id);

        let Some(id) = plugin_id.clone() else {
            return Err(RecordError::MissingField {
                origin,
                field: "plugin_id",
                plugin_id: None,
            });
        };

        let Some(raw_risk) = non_empty(self.risk_factor) else {
            return Err(RecordError::MissingField {
                origin,
                field: "risk_factor",
                plugin_id,
            });
        };

        let risk_factor = match raw_risk.parse::<RiskFactor>() {
            Ok(risk) => risk,
            Err(message) => {
                return Err(RecordError::InvalidField {
                    origin,
                    field: "risk_factor",
                    plugin_id,
                    message,
                })
            }
        };

        let Some(protocol) = non_empty(self.protocol) else {
            return Err(RecordError::MissingField {
                origin,
                field: "protocol",
                plugin_id,
            });
        };

        let mut host_addresses: Vec<String> = Vec::new();
        for address in self.host_addresses {
            let address = address.trim().to_string();
            if !address.is_empty() && !host_addresses.contains(&address) {
                host_addresses.push(address);
            }
        }

        let Some(host_identifier) =
            non_empty(self.host_identifier).or_else(|| host_addresses.first().cloned())
        else {
            return Err(RecordError::MissingField {
                origin,
                field: "host_identifier",
                plugin_id,
            });
        };

        Ok(ScanRecord {
            plugin_name: non_empty(self.plugin_name).unwrap_or_else(|| id.clone()),
            plugin_id: id,
            risk_factor,
            protocol: protocol.to_lowercase(),
            port_number: self.port_number.unwrap_or(0),
            host_identifier,
            host_addresses,
            evidence_text: self.evidence_text.filter(|text| !text.trim().is_empty()),
            exploit_available: self.exploit_available,
            exploit_frameworks: self
                .exploit_frameworks
                .into_iter()
                .map(|fw| fw.trim().to_string())
                .filter(|fw| !fw.is_empty())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawRecord {
        RawRecord {
            plugin_id: Some("70658".to_string()),
            plugin_name: Some("SSH Server CBC Mode Ciphers Enabled".to_string()),
            risk_factor: Some("Low".to_string()),
            protocol: Some("TCP".to_string()),
            port_number: Some(22),
            host_identifier: Some("10.0.0.5".to_string()),
            host_addresses: vec!["10.0.0.5".to_string(), " 10.0.0.5 ".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_normalizes_fields() {
        let record = raw().validate(RecordOrigin::new("scan.json", 1)).unwrap();
        assert_eq!(record.risk_factor, RiskFactor::Low);
        assert_eq!(record.protocol, "tcp");
        assert_eq!(record.host_addresses, vec!["10.0.0.5".to_string()]);
        assert_eq!(record.port_number, 22);
    }

    #[test]
    fn test_missing_protocol_reports_plugin() {
        let mut record = raw();
        record.protocol = None;
        let err = record
            .validate(RecordOrigin::new("scan.json", 3))
            .unwrap_err();
        assert_eq!(err.plugin_id(), Some("70658"));
        assert!(err.to_string().contains("protocol"));
    }

    #[test]
    fn test_invalid_risk_factor_rejected() {
        let mut record = raw();
        record.risk_factor = Some("Severe".to_string());
        assert!(matches!(
            record.validate(RecordOrigin::new("scan.json", 1)),
            Err(RecordError::InvalidField { field: "risk_factor", .. })
        ));
    }

    #[test]
    fn test_target_summary_merges_documents() {
        let first: ScanDocument = serde_json::from_str(
            r#"{"targets": ["10.0.0.0/24,10.0.1.5"], "scan_started": "2024-03-01T10:00:00Z", "scan_finished": "2024-03-01T11:00:00Z"}"#,
        )
        .unwrap();
        let second: ScanDocument = serde_json::from_str(
            r#"{"targets": ["10.0.1.5", "web.example.com"], "scan_started": "2024-03-01T09:30:00Z"}"#,
        )
        .unwrap();

        let mut summary = TargetSummary::default();
        summary.absorb(&first);
        summary.absorb(&second);

        assert_eq!(summary.targets, vec!["10.0.0.0/24", "10.0.1.5", "web.example.com"]);
        let text = summary.render(2);
        assert!(text.contains("Scan Started: 2024-03-01 09:30:00 UTC"));
        assert!(text.contains("Scan Finished: 2024-03-01 11:00:00 UTC"));
        assert!(text.ends_with("Responsive Hosts: 2\n"));
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let mut record = raw();
        record.plugin_name = None;
        record.port_number = None;
        record.host_identifier = None;
        let record = record.validate(RecordOrigin::new("scan.json", 1)).unwrap();
        assert_eq!(record.plugin_name, "70658");
        assert_eq!(record.port_number, 0);
        assert_eq!(record.host_identifier, "10.0.0.5");
    }
}
