use crate::core::address::{build_socket, ClassifiedAddresses};
use crate::core::aggregator::HostAggregator;
use crate::core::finding_index::FindingIndex;
use crate::error::EmitError;
use crate::models::{Host, PluginAggregate, RiskFactor, TargetSummary};
use crate::output::persisted::ListWriter;
use crate::output::{
    protocol_file, CollisionPolicy, ADDITIONAL_INFO_FILE, FQDNS_FILE, OPEN_PORTS_FILE,
    REPORT_ITEM_INDEX_FILE, RESPONSIVE_IPS_FILE, TARGET_INFORMATION_FILE,
};
use crate::utils::slug::{plugin_slug, slugify};
use fnv::FnvHashMap;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

struct PlannedPlugin<'a> {
    aggregate: &'a PluginAggregate,
    directory: PathBuf,
}

/// Outcome of emitting the plugin tree.
#[derive(Debug, Default)]
pub struct EmitSummary {
    pub emitted: usize,
    /// Plugins whose subtree failed, with the first error hit.
    pub failures: Vec<(String, EmitError)>,
    /// Every directory-name collision, whatever the policy did with it.
    pub conflicts: Vec<EmitError>,
    /// Plugins left out under `CollisionPolicy::Reject`.
    pub rejected: Vec<String>,
}

impl EmitSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.conflicts.is_empty()
    }
}

/// Lists gathered for one plugin and protocol before they hit the disk.
#[derive(Debug, Default)]
struct ProtocolListing {
    ips: Vec<String>,
    fqdns: Vec<String>,
    ports: BTreeSet<u16>,
    port_ips: BTreeMap<u16, Vec<String>>,
    port_fqdns: BTreeMap<u16, Vec<String>>,
    evidence: String,
}

fn push_unique(list: &mut Vec<String>, values: &[String]) {
    for value in values {
        if !list.contains(value) {
            list.push(value.clone());
        }
    }
}

fn evidence_header(host: &Host, addresses: &ClassifiedAddresses, port: u16) -> String {
    if addresses.is_empty() {
        return match port {
            0 => host.identifier.clone(),
            port => format!("{}:{}", host.identifier, port),
        };
    }

    addresses
        .ips
        .iter()
        .chain(addresses.fqdns.iter())
        .filter_map(|address| {
            if port == 0 {
                Some(address.clone())
            } else {
                build_socket(address, port)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// One evidence block: banner, header, banner, then the evidence lines.
fn evidence_block(header: &str, lines: &[String]) -> String {
    let banner = "=".repeat(header.chars().count());
    let body: Vec<&str> = lines.iter().map(|line| line.trim_end()).collect();
    format!("{banner}\n{header}\n{banner}\n\n{}\n\n", body.join("\n"))
}

fn index_line_risk(line: &str) -> Option<RiskFactor> {
    let (label, _) = line.strip_prefix('[')?.split_once(']')?;
    label.parse().ok()
}

/// Risk and name of an index line, without the exploit annotations.
fn index_line_key(line: &str) -> &str {
    match line.find(" [EXPLOIT") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Merge existing index lines with this run's lines, keeping severity order
/// and first-seen order within a severity. Each fresh line takes over one
/// existing line with the same key, so reruns neither duplicate plugins nor
/// keep stale annotations. Fresh lines are never merged with each other.
fn merge_index_lines(existing: Vec<String>, fresh: impl Iterator<Item = String>) -> String {
    let mut buckets: [Vec<String>; 5] = Default::default();
    let mut unsorted = Vec::new();
    let mut unclaimed: FnvHashMap<String, VecDeque<(usize, usize)>> = FnvHashMap::default();

    for line in existing {
        match index_line_risk(&line) {
            Some(risk) => {
                let rank = risk.emission_rank();
                unclaimed
                    .entry(index_line_key(&line).to_string())
                    .or_default()
                    .push_back((rank, buckets[rank].len()));
                buckets[rank].push(line);
            }
            None => unsorted.push(line),
        }
    }

    for line in fresh {
        let Some(risk) = index_line_risk(&line) else {
            unsorted.push(line);
            continue;
        };
        let claimed = unclaimed
            .get_mut(index_line_key(&line))
            .and_then(|slots| slots.pop_front());
        match claimed {
            Some((rank, slot)) => buckets[rank][slot] = line,
            None => buckets[risk.emission_rank()].push(line),
        }
    }

    let mut content = String::new();
    for line in buckets.iter().flatten().chain(unsorted.iter()) {
        content.push_str(line);
        content.push('\n');
    }
    content
}

fn ip_sort_key(address: &str) -> Option<IpAddr> {
    address
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}

pub struct ReportEmitter {
    root: PathBuf,
    writer: ListWriter,
    plugin_outputs: bool,
    policy: CollisionPolicy,
}

impl ReportEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer: ListWriter::new(),
            plugin_outputs: true,
            policy: CollisionPolicy::default(),
        }
    }

    pub fn with_plugin_outputs(mut self, enabled: bool) -> Self {
        self.plugin_outputs = enabled;
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write every plugin subtree. A failing plugin does not stop the others.
    pub fn emit(&self, index: &FindingIndex, hosts: &HostAggregator, pool: &ThreadPool) -> EmitSummary {
        let (groups, mut summary) = self.plan(index);

        // Plugins sharing a directory stay in one task, in index order.
        let results: Vec<Vec<(String, Result<(), EmitError>)>> = pool.install(|| {
            groups
                .par_iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|planned| {
                            (
                                planned.aggregate.plugin_id.clone(),
                                self.emit_plugin(planned, hosts),
                            )
                        })
                        .collect()
                })
                .collect()
        });

        for (plugin_id, result) in results.into_iter().flatten() {
            match result {
                Ok(()) => summary.emitted += 1,
                Err(e) => {
                    warn!(plugin_id = %plugin_id, error = %e, "plugin output aborted");
                    summary.failures.push((plugin_id, e));
                }
            }
        }

        summary
    }

    /// Resolve every plugin's directory, applying the collision policy.
    fn plan<'a>(&self, index: &'a FindingIndex) -> (Vec<Vec<PlannedPlugin<'a>>>, EmitSummary) {
        let mut summary = EmitSummary::default();
        let mut owners: FnvHashMap<PathBuf, &str> = FnvHashMap::default();
        let mut group_of: FnvHashMap<PathBuf, usize> = FnvHashMap::default();
        let mut groups: Vec<Vec<PlannedPlugin<'a>>> = Vec::new();

        for aggregate in index.iter() {
            let severity_dir = self.root.join(aggregate.risk_factor.dir_name());
            let slug = plugin_slug(&aggregate.plugin_name, &aggregate.plugin_id);
            let mut directory = severity_dir.join(&slug);

            if let Some(owner) = owners.get(&directory) {
                summary
                    .conflicts
                    .push(self.conflict(&directory, aggregate, owner));

                match self.policy {
                    CollisionPolicy::Overwrite => {}
                    CollisionPolicy::Reject => {
                        summary.rejected.push(aggregate.plugin_id.clone());
                        continue;
                    }
                    CollisionPolicy::Namespace => {
                        // The namespaced name may itself belong to another plugin.
                        let base = format!("{}_{}", slug, slugify(&aggregate.plugin_id));
                        let mut candidate = severity_dir.join(&base);
                        let mut attempt = 1;
                        while let Some(owner) = owners.get(&candidate) {
                            summary
                                .conflicts
                                .push(self.conflict(&candidate, aggregate, owner));
                            attempt += 1;
                            candidate = severity_dir.join(format!("{}_{}", base, attempt));
                        }
                        directory = candidate;
                    }
                }
            }

            owners
                .entry(directory.clone())
                .or_insert(aggregate.plugin_id.as_str());
            let slot = *group_of.entry(directory.clone()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(PlannedPlugin {
                aggregate,
                directory,
            });
        }

        (groups, summary)
    }

    fn conflict(&self, directory: &Path, aggregate: &PluginAggregate, owner: &str) -> EmitError {
        let conflict = EmitError::OutputConflict {
            directory: directory.to_path_buf(),
            plugin_id: aggregate.plugin_id.clone(),
            plugin_name: aggregate.plugin_name.clone(),
            existing_plugin_id: owner.to_string(),
        };
        warn!(policy = %self.policy, "{}", conflict);
        conflict
    }

    fn emit_plugin(&self, planned: &PlannedPlugin<'_>, hosts: &HostAggregator) -> Result<(), EmitError> {
        let aggregate = planned.aggregate;
        let directory = &planned.directory;

        fs::create_dir_all(directory).map_err(|source| EmitError::CreateDir {
            path: directory.clone(),
            source,
        })?;

        self.writer
            .replace(&directory.join(ADDITIONAL_INFO_FILE), &aggregate.additional_info())?;

        for protocol in &aggregate.protocols {
            let listing = self.collect_protocol(aggregate, protocol, hosts);
            self.write_protocol(directory, protocol, &listing)?;
        }

        debug!(
            plugin_id = %aggregate.plugin_id,
            directory = %directory.display(),
            "plugin written"
        );
        Ok(())
    }

    fn collect_protocol(
        &self,
        aggregate: &PluginAggregate,
        protocol: &str,
        hosts: &HostAggregator,
    ) -> ProtocolListing {
        let mut listing = ProtocolListing::default();

        for host_id in &aggregate.hosts {
            let Some(host) = hosts.get(*host_id) else {
                continue;
            };
            let ports = host.find_ports_by(protocol, |port| port.has_plugin(&aggregate.plugin_id));
            if ports.is_empty() {
                continue;
            }

            let addresses = ClassifiedAddresses::from_addresses(host.addresses());
            for address in &addresses.unrecognized {
                debug!(host = %host.identifier, address = %address, "unrecognized address excluded");
            }
            push_unique(&mut listing.ips, &addresses.ips);
            push_unique(&mut listing.fqdns, &addresses.fqdns);

            for port in ports {
                if !port.is_host_level() {
                    listing.ports.insert(port.number);
                    push_unique(listing.port_ips.entry(port.number).or_default(), &addresses.ips);
                    push_unique(
                        listing.port_fqdns.entry(port.number).or_default(),
                        &addresses.fqdns,
                    );
                }

                if self.plugin_outputs {
                    let evidence = port.evidence_for(&aggregate.plugin_id);
                    if !evidence.is_empty() {
                        let header = evidence_header(host, &addresses, port.number);
                        listing.evidence.push_str(&evidence_block(&header, evidence));
                    }
                }
            }
        }

        listing
    }

    fn write_protocol(&self, directory: &Path, protocol: &str, listing: &ProtocolListing) -> Result<(), EmitError> {
        let file = |suffix: &str| directory.join(protocol_file(protocol, suffix));

        if !listing.ips.is_empty() {
            self.writer.append(&file("ips.list"), &listing.ips)?;
        }
        if !listing.fqdns.is_empty() {
            self.writer.append(&file("fqdns.list"), &listing.fqdns)?;
        }
        for (port, ips) in &listing.port_ips {
            self.writer.append_socket_pairs(&file("ips.sockets"), ips, *port)?;
        }
        for (port, fqdns) in &listing.port_fqdns {
            self.writer
                .append_socket_pairs(&file("fqdns.sockets"), fqdns, *port)?;
        }
        if !listing.ports.is_empty() {
            self.writer.merge_ports(&file("ports.txt"), &listing.ports)?;
        }
        if !listing.evidence.is_empty() {
            self.writer
                .write_run_document(&file("plugin_outputs.txt"), &listing.evidence)?;
        }
        Ok(())
    }

    /// Root-level files: target information, open ports, address lists and
    /// the severity-ordered finding index.
    pub fn emit_summaries(
        &self,
        index: &FindingIndex,
        hosts: &HostAggregator,
        targets: &TargetSummary,
    ) -> Result<(), EmitError> {
        self.writer.replace(
            &self.root.join(TARGET_INFORMATION_FILE),
            &targets.render(hosts.host_count()),
        )?;

        let open_ports_path = self.root.join(OPEN_PORTS_FILE);
        let open_ports = hosts.open_ports();
        if open_ports.is_empty() && !open_ports_path.exists() {
            self.writer.replace(&open_ports_path, "")?;
        } else {
            self.writer.merge_ports(&open_ports_path, &open_ports)?;
        }

        let mut ips = Vec::new();
        let mut fqdns = Vec::new();
        for (_, host) in hosts.find_hosts_by(|host| !host.addresses().is_empty()) {
            let addresses = ClassifiedAddresses::from_addresses(host.addresses());
            push_unique(&mut ips, &addresses.ips);
            push_unique(&mut fqdns, &addresses.fqdns);
        }
        ips.sort_by_key(|ip| ip_sort_key(ip));
        fqdns.sort();
        self.writer.append(&self.root.join(RESPONSIVE_IPS_FILE), &ips)?;
        self.writer.append(&self.root.join(FQDNS_FILE), &fqdns)?;

        let index_path = self.root.join(REPORT_ITEM_INDEX_FILE);
        let existing = self.writer.read_lines(&index_path)?;
        let content = merge_index_lines(existing, index.iter().map(|a| a.index_line()));
        self.writer.replace(&index_path, &content)?;

        Ok(())
    }
}
