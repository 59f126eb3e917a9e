use crate::error::{DumpError, RecordError, RecordOrigin};
use crate::models::{RawRecord, ScanDocument, ScanRecord, TargetSummary};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything read from the input documents of one run.
#[derive(Debug, Default)]
pub struct LoadedInput {
    pub records: Vec<ScanRecord>,
    pub errors: Vec<RecordError>,
    pub targets: TargetSummary,
}

impl LoadedInput {
    fn push(&mut self, value: Value, origin: RecordOrigin) {
        let result = serde_json::from_value::<RawRecord>(value)
            .map_err(|source| RecordError::Decode {
                origin: origin.clone(),
                source,
            })
            .and_then(|raw| raw.validate(origin));

        match result {
            Ok(record) => self.records.push(record),
            Err(e) => {
                debug!(
                    origin = %e.origin(),
                    plugin_id = e.plugin_id().unwrap_or("unknown"),
                    "malformed record"
                );
                self.errors.push(e);
            }
        }
    }
}

/// `.jsonl` and `.ndjson` inputs hold one record per line.
fn is_line_delimited(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"))
        .unwrap_or(false)
}

fn read_input(path: &Path) -> Result<String, DumpError> {
    fs::read_to_string(path).map_err(|source| DumpError::InputRead {
        path: path.to_path_buf(),
        source,
    })
}

fn load_lines(path: &Path, content: &str, loaded: &mut LoadedInput) {
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let origin = RecordOrigin::new(path, number + 1);
        match serde_json::from_str::<Value>(line) {
            Ok(value) => loaded.push(value, origin),
            Err(source) => loaded.errors.push(RecordError::Decode { origin, source }),
        }
    }
}

fn load_document(path: &Path, content: &str, loaded: &mut LoadedInput) -> Result<(), DumpError> {
    let document: ScanDocument =
        serde_json::from_str(content).map_err(|source| DumpError::InputParse {
            path: path.to_path_buf(),
            source,
        })?;

    loaded.targets.absorb(&document);
    for (position, value) in document.records.into_iter().enumerate() {
        loaded.push(value, RecordOrigin::new(path, position + 1));
    }
    Ok(())
}

/// Read every input in order. An unreadable or unparseable document is
/// fatal; a bad record is collected and the pass continues.
pub fn load_inputs(paths: &[PathBuf]) -> Result<LoadedInput, DumpError> {
    let mut loaded = LoadedInput::default();

    for path in paths {
        let content = read_input(path)?;
        let before = loaded.records.len();
        if is_line_delimited(path) {
            load_lines(path, &content, &mut loaded);
        } else {
            load_document(path, &content, &mut loaded)?;
        }
        info!(
            path = %path.display(),
            records = loaded.records.len() - before,
            "loaded input"
        );
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskFactor;
    use tempfile::TempDir;

    #[test]
    fn test_load_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan.json");
        fs::write(
            &path,
            r#"{
                "targets": ["10.0.0.0/24"],
                "scan_started": "2024-03-01T10:00:00Z",
                "records": [
                    {"plugin_id": "1", "plugin_name": "SSH Weak Cipher", "risk_factor": "High",
                     "protocol": "tcp", "port_number": 22, "host_identifier": "10.0.0.5",
                     "host_addresses": ["10.0.0.5"]},
                    {"plugin_id": "2", "risk_factor": "Low", "host_identifier": "10.0.0.5"},
                    {"plugin_id": "3", "risk_factor": "Medium", "protocol": "udp", "port_number": "not a port"}
                ]
            }"#,
        )
        .unwrap();

        let loaded = load_inputs(&[path]).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].risk_factor, RiskFactor::High);
        assert_eq!(loaded.errors.len(), 2);
        assert!(matches!(
            &loaded.errors[0],
            RecordError::MissingField { field: "protocol", origin, .. } if origin.position == 2
        ));
        assert!(matches!(&loaded.errors[1], RecordError::Decode { .. }));
        assert_eq!(loaded.targets.targets, vec!["10.0.0.0/24"]);
    }

    #[test]
    fn test_load_line_delimited() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan.jsonl");
        fs::write(
            &path,
            "{\"plugin_id\": \"1\", \"risk_factor\": \"None\", \"protocol\": \"tcp\", \"host_addresses\": [\"10.0.0.5\"]}\n\
             \n\
             {not json\n\
             {\"plugin_id\": \"2\", \"risk_factor\": \"Critical\", \"protocol\": \"udp\", \"port_number\": 161, \"host_identifier\": \"h2\"}\n",
        )
        .unwrap();

        let loaded = load_inputs(&[path]).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].host_identifier, "10.0.0.5");
        assert_eq!(loaded.errors.len(), 1);
        assert_eq!(loaded.errors[0].origin().position, 3);
    }

    #[test]
    fn test_unparseable_document_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scan.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            load_inputs(&[path]),
            Err(DumpError::InputParse { .. })
        ));

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            load_inputs(&[missing]),
            Err(DumpError::InputRead { .. })
        ));
    }
}
