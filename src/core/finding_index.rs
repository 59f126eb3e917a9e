use crate::models::{PluginAggregate, RiskFactor};
use fnv::FnvHashMap;
use tracing::debug;

/// Plugin aggregates bucketed by risk factor, first-seen order per bucket.
#[derive(Debug, Default)]
pub struct FindingIndex {
    buckets: [Vec<PluginAggregate>; 5],
    by_plugin: FnvHashMap<String, (RiskFactor, usize)>,
}

impl FindingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new plugin or merge into the existing aggregate for its id.
    pub fn record(&mut self, aggregate: PluginAggregate) {
        if let Some((risk, slot)) = self.by_plugin.get(&aggregate.plugin_id).copied() {
            let existing = &mut self.buckets[risk.emission_rank()][slot];
            if aggregate.risk_factor != existing.risk_factor {
                debug!(
                    plugin_id = %existing.plugin_id,
                    kept = %existing.risk_factor,
                    ignored = %aggregate.risk_factor,
                    "risk factor differs from first occurrence"
                );
            }
            existing.merge(&aggregate);
            return;
        }

        let risk = aggregate.risk_factor;
        let bucket = &mut self.buckets[risk.emission_rank()];
        self.by_plugin
            .insert(aggregate.plugin_id.clone(), (risk, bucket.len()));
        bucket.push(aggregate);
    }

    #[cfg(test)]
    pub fn get(&self, plugin_id: &str) -> Option<&PluginAggregate> {
        self.by_plugin
            .get(plugin_id)
            .map(|(risk, slot)| &self.buckets[risk.emission_rank()][*slot])
    }

    pub fn bucket(&self, risk: RiskFactor) -> &[PluginAggregate] {
        &self.buckets[risk.emission_rank()]
    }

    /// CRITICAL, HIGH, MEDIUM, LOW, NONE; first-seen within each.
    pub fn iter(&self) -> impl Iterator<Item = &PluginAggregate> {
        self.buckets.iter().flat_map(|bucket| bucket.iter())
    }

    pub fn find_by<P>(&self, predicate: P) -> Vec<&PluginAggregate>
    where
        P: Fn(&PluginAggregate) -> bool,
    {
        self.iter().filter(|aggregate| predicate(aggregate)).collect()
    }

    pub fn len(&self) -> usize {
        self.by_plugin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_plugin.is_empty()
    }
}
