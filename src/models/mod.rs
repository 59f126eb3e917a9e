pub mod aggregate;
pub mod host;
pub mod record;
pub mod risk;

pub use aggregate::PluginAggregate;
pub use host::{Host, HostId};
pub use record::{RawRecord, ScanDocument, ScanRecord, TargetSummary};
pub use risk::RiskFactor;
