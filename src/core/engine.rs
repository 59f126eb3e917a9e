use crate::config::{Config, PluginFilter};
use crate::core::aggregator::HostAggregator;
use crate::core::finding_index::FindingIndex;
use crate::error::{DumpError, RecordError};
use crate::input;
use crate::models::{PluginAggregate, RiskFactor, ScanRecord, TargetSummary};
use crate::output::{EmitSummary, ReportEmitter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Number of record errors shown in the end-of-run report.
pub const ERROR_SAMPLE_SIZE: usize = 5;

/// Hosts and plugin aggregates built from one pass over the records.
#[derive(Debug)]
pub struct Aggregation {
    pub hosts: HostAggregator,
    pub index: FindingIndex,
    /// Records kept out of the index by `min_risk` or `exclude_plugins`.
    pub filtered: usize,
}

/// Outcome of a full run.
#[derive(Debug)]
pub struct DumpReport {
    pub records_read: usize,
    pub duplicates_skipped: usize,
    pub filtered: usize,
    pub hosts: usize,
    pub plugins: usize,
    /// Plugin count per risk factor, CRITICAL first.
    pub by_risk: Vec<(RiskFactor, usize)>,
    pub exploitable: usize,
    pub record_errors: Vec<RecordError>,
    pub emit: EmitSummary,
}

impl DumpReport {
    pub fn error_samples(&self) -> impl Iterator<Item = &RecordError> {
        self.record_errors.iter().take(ERROR_SAMPLE_SIZE)
    }

    pub fn is_clean(&self) -> bool {
        self.record_errors.is_empty() && self.emit.is_clean()
    }
}

pub struct DumpEngine {
    config: Config,
    filter: PluginFilter,
}

impl DumpEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            filter: config.plugin_filter(),
            config: config.clone(),
        }
    }

    /// Fold records into hosts and the finding index. Every record reaches
    /// the hosts; only those the filter allows reach the index.
    pub fn aggregate(&self, records: &[ScanRecord]) -> Aggregation {
        let mut aggregation = Aggregation {
            hosts: HostAggregator::new(),
            index: FindingIndex::new(),
            filtered: 0,
        };

        for record in records {
            let ingested = aggregation.hosts.ingest(record);
            if ingested.duplicate {
                continue;
            }
            if !self.filter.allows(record) {
                aggregation.filtered += 1;
                continue;
            }
            aggregation
                .index
                .record(PluginAggregate::from_record(record, ingested.host));
        }

        aggregation
    }

    pub fn run(&self, inputs: &[PathBuf], output_root: &Path) -> Result<DumpReport, DumpError> {
        if !output_root.is_dir() {
            return Err(DumpError::OutputRoot(output_root.to_path_buf()));
        }

        if !self.filter.is_permissive() {
            info!(
                min_risk = %self.config.min_risk,
                excluded = self.config.exclude_plugins.len(),
                "plugin filter active"
            );
        }

        let loaded = input::load_inputs(inputs)?;
        if !loaded.errors.is_empty() {
            warn!(count = loaded.errors.len(), "malformed records skipped");
        }

        let aggregation = self.aggregate(&loaded.records);
        info!(
            hosts = aggregation.hosts.host_count(),
            plugins = aggregation.index.len(),
            duplicates = aggregation.hosts.duplicates_skipped(),
            "aggregation complete"
        );
        if aggregation.index.is_empty() {
            warn!("no findings to write");
        }

        let emit = self.emit(output_root, &aggregation, &loaded.targets)?;

        Ok(DumpReport {
            records_read: loaded.records.len() + loaded.errors.len(),
            duplicates_skipped: aggregation.hosts.duplicates_skipped(),
            filtered: aggregation.filtered,
            hosts: aggregation.hosts.host_count(),
            plugins: aggregation.index.len(),
            by_risk: RiskFactor::EMISSION_ORDER
                .iter()
                .map(|risk| (*risk, aggregation.index.bucket(*risk).len()))
                .collect(),
            exploitable: aggregation.index.find_by(|a| a.is_exploitable()).len(),
            record_errors: loaded.errors,
            emit,
        })
    }

    /// Write the plugin tree, then the root summaries.
    pub fn emit(
        &self,
        output_root: &Path,
        aggregation: &Aggregation,
        targets: &TargetSummary,
    ) -> Result<EmitSummary, DumpError> {
        let thread_count = self.config.thread_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()?;

        info!(
            plugins = aggregation.index.len(),
            threads = thread_count,
            "writing plugin directories"
        );

        let emitter = ReportEmitter::new(output_root)
            .with_plugin_outputs(self.config.plugin_outputs)
            .with_collision_policy(self.config.collision_policy);

        let summary = emitter.emit(&aggregation.index, &aggregation.hosts, &pool);
        emitter.emit_summaries(&aggregation.index, &aggregation.hosts, targets)?;
        Ok(summary)
    }
}
