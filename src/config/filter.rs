use crate::models::{RiskFactor, ScanRecord};
use fnv::FnvHashSet;

/// Which plugins reach the finding index and the plugin tree.
#[derive(Debug, Clone, Default)]
pub struct PluginFilter {
    min_risk: RiskFactor,
    excluded: FnvHashSet<String>,
}

impl PluginFilter {
    pub fn new(min_risk: RiskFactor, excluded: &[String]) -> Self {
        Self {
            min_risk,
            excluded: excluded.iter().map(|id| id.trim().to_string()).collect(),
        }
    }

    pub fn allows(&self, record: &ScanRecord) -> bool {
        record.risk_factor >= self.min_risk && !self.excluded.contains(&record.plugin_id)
    }

    pub fn is_permissive(&self) -> bool {
        self.min_risk == RiskFactor::None && self.excluded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::record;

    #[test]
    fn test_min_risk_and_exclusions() {
        let filter = PluginFilter::new(RiskFactor::Medium, &["19506".to_string()]);
        assert!(!filter.is_permissive());
        assert!(filter.allows(&record("1", "a", RiskFactor::High, "h", "tcp", 22)));
        assert!(filter.allows(&record("1", "a", RiskFactor::Medium, "h", "tcp", 22)));
        assert!(!filter.allows(&record("1", "a", RiskFactor::Low, "h", "tcp", 22)));
        assert!(!filter.allows(&record("19506", "Scan Info", RiskFactor::Critical, "h", "tcp", 0)));
    }

    #[test]
    fn test_default_allows_everything() {
        let filter = PluginFilter::default();
        assert!(filter.is_permissive());
        assert!(filter.allows(&record("1", "a", RiskFactor::None, "h", "tcp", 0)));
    }
}
