pub mod address;
pub mod aggregator;
pub mod engine;
pub mod finding_index;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
