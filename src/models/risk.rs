use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskFactor {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskFactor::None => write!(f, "NONE"),
            RiskFactor::Low => write!(f, "LOW"),
            RiskFactor::Medium => write!(f, "MEDIUM"),
            RiskFactor::High => write!(f, "HIGH"),
            RiskFactor::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for RiskFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "info" | "informational" => Ok(RiskFactor::None),
            "low" => Ok(RiskFactor::Low),
            "medium" => Ok(RiskFactor::Medium),
            "high" => Ok(RiskFactor::High),
            "critical" => Ok(RiskFactor::Critical),
            _ => Err(format!("Invalid risk factor: {}", s)),
        }
    }
}

impl RiskFactor {
    /// Triage order used for every severity-ordered output.
    pub const EMISSION_ORDER: [RiskFactor; 5] = [
        RiskFactor::Critical,
        RiskFactor::High,
        RiskFactor::Medium,
        RiskFactor::Low,
        RiskFactor::None,
    ];

    pub fn as_value(&self) -> u8 {
        match self {
            RiskFactor::Critical => 4,
            RiskFactor::High => 3,
            RiskFactor::Medium => 2,
            RiskFactor::Low => 1,
            RiskFactor::None => 0,
        }
    }

    /// Directory name under the output root.
    pub fn dir_name(&self) -> String {
        self.to_string()
    }

    /// Position of this risk factor in `EMISSION_ORDER`.
    pub fn emission_rank(&self) -> usize {
        4 - self.as_value() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<RiskFactor>(), Ok(RiskFactor::High));
        assert_eq!("Critical".parse::<RiskFactor>(), Ok(RiskFactor::Critical));
        assert_eq!("info".parse::<RiskFactor>(), Ok(RiskFactor::None));
        assert!("severe".parse::<RiskFactor>().is_err());
    }

    #[test]
    fn test_emission_rank_matches_order() {
        for (rank, risk) in RiskFactor::EMISSION_ORDER.iter().enumerate() {
            assert_eq!(risk.emission_rank(), rank);
        }
    }
}
