//! Result classification and output writing
//!
//! Consumes the complete set of probe results: failures feed the blacklist,
//! passes are grouped per protocol and written out as `HOST:PORT` lists.

use crate::proxy::blacklist::Blacklist;
use crate::proxy::models::{ProbeOutcome, ProbeResult, Protocol, ProxyCandidate, RunSummary};
use crate::Result;
use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Passing candidates grouped by protocol, rebuilt fresh each run
#[derive(Debug, Default)]
pub struct PassingProxySet {
    buckets: HashMap<Protocol, Vec<ProxyCandidate>>,
}

impl PassingProxySet {
    pub fn insert(&mut self, candidate: ProxyCandidate) {
        self.buckets
            .entry(candidate.protocol)
            .or_default()
            .push(candidate);
    }

    /// Bucket contents sorted by (host, port); probe completion order is
    /// nondeterministic, the output must not be
    pub fn sorted_bucket(&self, protocol: Protocol) -> Vec<&ProxyCandidate> {
        let mut bucket: Vec<&ProxyCandidate> = self
            .buckets
            .get(&protocol)
            .map(|b| b.iter().collect())
            .unwrap_or_default();
        bucket.sort_by(|a, b| a.host.cmp(&b.host).then(a.port.cmp(&b.port)));
        bucket
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(|b| b.len()).sum()
    }
}

/// Partition probe results: every failure goes to the blacklist, every
/// pass into its protocol bucket, everything into the summary counters.
pub fn classify(
    results: Vec<ProbeResult>,
    blacklist: &mut Blacklist,
    summary: &mut RunSummary,
) -> PassingProxySet {
    let mut passing = PassingProxySet::default();

    for result in results {
        summary.record(&result);
        match result.outcome {
            ProbeOutcome::Pass => passing.insert(result.candidate),
            ProbeOutcome::Fail(_) => blacklist.add(&result.candidate.id()),
        }
    }

    passing
}

/// Write one `<protocol>.txt` per tested protocol, one `HOST:PORT` per
/// line, overwriting prior contents. Protocols not tested this run keep
/// whatever file they had.
pub fn write_passing<P: AsRef<Path>>(
    passing: &PassingProxySet,
    dir: P,
    tested: &[Protocol],
) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("failed to create {:?}", dir))?;

    for &protocol in tested {
        let bucket = passing.sorted_bucket(protocol);
        let content = bucket
            .iter()
            .map(|c| c.to_simple_string())
            .collect::<Vec<_>>()
            .join("\n");

        let path = dir.join(format!("{}.txt", protocol));
        fs::write(&path, content)
            .with_context(|| format!("failed to write passing proxies to {:?}", path))?;
        info!("wrote {} {} proxies to {:?}", bucket.len(), protocol, path);
    }

    Ok(())
}
