//! Candidate intake: parsing, dedup and blacklist filtering
//!
//! Raw proxy lists are messy: duplicate entries, junk lines, missing ports.
//! Intake normalizes them into `ProxyCandidate`s, dropping malformed lines
//! with a count instead of a hard failure, and filters out anything the
//! blacklist already proved dead so no network time is spent on it.

use crate::proxy::blacklist::Blacklist;
use crate::proxy::models::{Protocol, ProxyCandidate, RunSummary};
use std::collections::HashSet;
use tracing::{debug, info};

/// Outcome of one intake pass for one protocol
#[derive(Debug, Default)]
pub struct IntakeReport {
    /// Deduplicated, non-blacklisted candidates in first-seen order
    pub candidates: Vec<ProxyCandidate>,
    /// Lines that could not be parsed
    pub parse_errors: usize,
    /// Well-formed candidates dropped because they are blacklisted
    pub skipped_blacklisted: usize,
}

pub struct Intake;

impl Intake {
    /// Parse a single raw proxy line.
    ///
    /// Supports `HOST:PORT` (protocol taken from `default_protocol`) and
    /// `protocol://HOST:PORT` (protocol taken from the scheme). Returns
    /// `None` for anything malformed.
    pub fn parse_line(line: &str, default_protocol: Protocol) -> Option<ProxyCandidate> {
        let line = line.trim();

        let (protocol, rest) = match line.split_once("://") {
            Some((scheme, rest)) => (scheme.parse::<Protocol>().ok()?, rest),
            None => (default_protocol, line),
        };

        let (host, port) = rest.split_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }

        Some(ProxyCandidate::new(protocol, host.to_string(), port))
    }

    /// Parse, dedup and blacklist-filter a sequence of raw lines.
    ///
    /// Duplicates are collapsed to the first occurrence, so the output
    /// order is deterministic for a given input. Empty lines and `#`
    /// comments are skipped without counting as parse errors.
    pub fn collect<'a, I>(lines: I, protocol: Protocol, blacklist: &Blacklist) -> IntakeReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = IntakeReport::default();
        let mut seen = HashSet::new();

        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some(candidate) = Self::parse_line(trimmed, protocol) else {
                report.parse_errors += 1;
                continue;
            };

            if !seen.insert(candidate.clone()) {
                continue;
            }

            if blacklist.contains(&candidate.id()) {
                report.skipped_blacklisted += 1;
                continue;
            }

            report.candidates.push(candidate);
        }

        debug!(
            "intake for {}: {} candidates, {} parse errors, {} blacklisted",
            protocol,
            report.candidates.len(),
            report.parse_errors,
            report.skipped_blacklisted
        );
        report
    }

    /// Run intake over one raw list per protocol, folding the skip and
    /// parse-error counts into the run summary. Returns the combined
    /// candidate sequence ready for scheduling.
    pub fn collect_all<'a, I>(
        sources: I,
        blacklist: &Blacklist,
        summary: &mut RunSummary,
    ) -> Vec<ProxyCandidate>
    where
        I: IntoIterator<Item = (Protocol, &'a str)>,
    {
        let mut candidates = Vec::new();

        for (protocol, content) in sources {
            let report = Self::collect(content.lines(), protocol, blacklist);
            info!(
                "{}: {} candidates ({} blacklisted, {} unparseable)",
                protocol,
                report.candidates.len(),
                report.skipped_blacklisted,
                report.parse_errors
            );
            summary.skipped_blacklisted += report.skipped_blacklisted;
            summary.parse_errors += report.parse_errors;
            candidates.extend(report.candidates);
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProbeResult;
    use crate::proxy::report::classify;

    fn empty_blacklist() -> Blacklist {
        let path = std::env::temp_dir().join(format!(
            "price_sieve_{}_parser_none.txt",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Blacklist::load(path).unwrap()
    }

    #[test]
    fn test_parse_bare_host_port() {
        let candidate = Intake::parse_line("192.168.1.1:8080", Protocol::Socks4).unwrap();
        assert_eq!(candidate.protocol, Protocol::Socks4);
        assert_eq!(candidate.host, "192.168.1.1");
        assert_eq!(candidate.port, 8080);
    }

    #[test]
    fn test_parse_url_scheme_overrides_default() {
        let candidate = Intake::parse_line("socks5://10.0.0.1:1080", Protocol::Http).unwrap();
        assert_eq!(candidate.protocol, Protocol::Socks5);
        assert_eq!(candidate.port, 1080);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Intake::parse_line("no-port-here", Protocol::Http).is_none());
        assert!(Intake::parse_line("1.2.3.4:notaport", Protocol::Http).is_none());
        assert!(Intake::parse_line(":8080", Protocol::Http).is_none());
        assert!(Intake::parse_line("1.2.3.4:0", Protocol::Http).is_none());
        assert!(Intake::parse_line("ftp://1.2.3.4:8080", Protocol::Http).is_none());
    }

    #[test]
    fn test_collect_dedups_preserving_order() {
        let blacklist = empty_blacklist();
        let lines = ["http://1.2.3.4:8080", "5.6.7.8:3128", "http://1.2.3.4:8080"];
        let report = Intake::collect(lines, Protocol::Http, &blacklist);

        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.candidates[0].host, "1.2.3.4");
        assert_eq!(report.candidates[1].host, "5.6.7.8");
        assert_eq!(report.parse_errors, 0);
    }

    #[test]
    fn test_collect_counts_parse_errors_and_skips_comments() {
        let blacklist = empty_blacklist();
        let lines = ["garbage", "", "# comment", "1.1.1.1:80"];
        let report = Intake::collect(lines, Protocol::Http, &blacklist);

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.parse_errors, 1);
    }

    #[test]
    fn test_collect_all_counts_skipped_across_protocols() {
        // 3 protocols with 10 candidates each, 5 pre-blacklisted per
        // protocol: only 15 may reach the scheduler, 15 are skipped
        let path = std::env::temp_dir().join(format!(
            "price_sieve_{}_parser_all.txt",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut blacklist = Blacklist::load(&path).unwrap();
        for protocol in Protocol::ALL {
            for n in 0..5 {
                blacklist.add(&format!("{}://10.0.0.{}:8080", protocol, n));
            }
        }

        let raw: String = (0..10).map(|n| format!("10.0.0.{}:8080\n", n)).collect();
        let sources = Protocol::ALL.map(|protocol| (protocol, raw.as_str()));

        let mut summary = RunSummary::default();
        let candidates = Intake::collect_all(sources, &blacklist, &mut summary);

        assert_eq!(candidates.len(), 15);
        assert_eq!(summary.skipped_blacklisted, 15);
        assert_eq!(summary.parse_errors, 0);

        // After classification the summary reports 15 checked, not 30
        let results: Vec<ProbeResult> = candidates.into_iter().map(ProbeResult::pass).collect();
        let passing = classify(results, &mut blacklist, &mut summary);
        assert_eq!(summary.total_checked(), 15);
        assert_eq!(passing.total(), 15);
    }

    #[test]
    fn test_collect_filters_blacklisted() {
        let path = std::env::temp_dir().join(format!(
            "price_sieve_{}_parser_bl.txt",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut blacklist = Blacklist::load(&path).unwrap();
        blacklist.add("http://1.2.3.4:8080");

        let lines = ["1.2.3.4:8080", "5.6.7.8:3128"];
        let report = Intake::collect(lines, Protocol::Http, &blacklist);

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].host, "5.6.7.8");
        assert_eq!(report.skipped_blacklisted, 1);
    }
}
