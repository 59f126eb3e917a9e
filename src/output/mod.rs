pub mod emitter;
pub mod persisted;

pub use emitter::{EmitSummary, ReportEmitter};

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub const TARGET_INFORMATION_FILE: &str = "target_information.txt";
pub const OPEN_PORTS_FILE: &str = "open_ports.txt";
pub const RESPONSIVE_IPS_FILE: &str = "responsive_ips.txt";
pub const FQDNS_FILE: &str = "fqdns.txt";
pub const REPORT_ITEM_INDEX_FILE: &str = "report_item_index.txt";
pub const ADDITIONAL_INFO_FILE: &str = "additional_info.txt";

/// What to do when two plugins of the same risk factor normalize to the
/// same directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Share the directory; lists merge and the last plugin's
    /// `additional_info.txt` wins.
    #[default]
    Overwrite,
    /// Emit only the first plugin into the directory.
    Reject,
    /// Give later plugins `<slug>_<plugin_id>`.
    Namespace,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overwrite" | "merge" => Ok(CollisionPolicy::Overwrite),
            "reject" => Ok(CollisionPolicy::Reject),
            "namespace" => Ok(CollisionPolicy::Namespace),
            _ => Err(format!("Invalid collision policy: {}", s)),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionPolicy::Overwrite => write!(f, "overwrite"),
            CollisionPolicy::Reject => write!(f, "reject"),
            CollisionPolicy::Namespace => write!(f, "namespace"),
        }
    }
}

/// `<protocol>_<kind>` file names inside a plugin directory.
pub fn protocol_file(protocol: &str, suffix: &str) -> String {
    format!("{}_{}", crate::utils::slug::protocol_slug(protocol), suffix)
}
