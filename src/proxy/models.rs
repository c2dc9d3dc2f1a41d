//! Data models for proxy candidates and probe results

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Proxy protocol enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Protocol {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl Protocol {
    /// All protocols the pipeline knows how to test
    pub const ALL: [Protocol; 3] = [Protocol::Http, Protocol::Socks4, Protocol::Socks5];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Socks4 => write!(f, "socks4"),
            Protocol::Socks5 => write!(f, "socks5"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "socks4" => Ok(Protocol::Socks4),
            "socks5" => Ok(Protocol::Socks5),
            _ => Err(format!(
                "Invalid protocol: {}. Use: http, socks4, socks5",
                s
            )),
        }
    }
}

/// A single proxy endpoint to be tested.
///
/// Identity is the full (protocol, host, port) triple; two candidates are
/// equal only when all three fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyCandidate {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl ProxyCandidate {
    pub fn new(protocol: Protocol, host: String, port: u16) -> Self {
        Self {
            protocol,
            host,
            port,
        }
    }

    /// Protocol-qualified identity, also the proxy URL and the blacklist key
    pub fn id(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// The `HOST:PORT` form used in output files
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Why a probe attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    ConnectionError,
    ConnectTimeout,
    ProxyError,
    ReadTimeout,
    SslError,
    NoPriceFound,
    BotBlocked,
    Other,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::ConnectionError => "connection error",
            FailureReason::ConnectTimeout => "connect timeout",
            FailureReason::ProxyError => "proxy error",
            FailureReason::ReadTimeout => "read timeout",
            FailureReason::SslError => "ssl error",
            FailureReason::NoPriceFound => "no price found",
            FailureReason::BotBlocked => "bot blocked",
            FailureReason::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a single probe attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    Pass,
    Fail(FailureReason),
}

impl ProbeOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ProbeOutcome::Pass)
    }
}

/// Result of exactly one probe attempt against one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub candidate: ProxyCandidate,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn pass(candidate: ProxyCandidate) -> Self {
        Self {
            candidate,
            outcome: ProbeOutcome::Pass,
        }
    }

    pub fn fail(candidate: ProxyCandidate, reason: FailureReason) -> Self {
        Self {
            candidate,
            outcome: ProbeOutcome::Fail(reason),
        }
    }
}

/// Per-protocol counters for the run summary
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub checked: usize,
    pub working: usize,
    pub failed: usize,
}

/// Aggregate statistics for one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub by_protocol: HashMap<Protocol, ProtocolStats>,
    pub failure_reasons: HashMap<FailureReason, usize>,
    pub skipped_blacklisted: usize,
    pub parse_errors: usize,
}

impl RunSummary {
    pub fn record(&mut self, result: &ProbeResult) {
        let stats = self
            .by_protocol
            .entry(result.candidate.protocol)
            .or_default();
        stats.checked += 1;
        match result.outcome {
            ProbeOutcome::Pass => stats.working += 1,
            ProbeOutcome::Fail(reason) => {
                stats.failed += 1;
                *self.failure_reasons.entry(reason).or_insert(0) += 1;
            }
        }
    }

    pub fn total_checked(&self) -> usize {
        self.by_protocol.values().map(|s| s.checked).sum()
    }

    pub fn total_working(&self) -> usize {
        self.by_protocol.values().map(|s| s.working).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let checked = self.total_checked();
        let working = self.total_working();
        let rate = if checked > 0 {
            working as f64 / checked as f64 * 100.0
        } else {
            0.0
        };

        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "PROXY CHECKING SUMMARY")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Total proxies checked: {}", checked)?;
        writeln!(f, "Working proxies: {} ({:.1}%)", working, rate)?;
        writeln!(f, "Failed proxies: {}", checked - working)?;
        writeln!(f, "Skipped (blacklisted): {}", self.skipped_blacklisted)?;
        writeln!(f, "Dropped (unparseable): {}", self.parse_errors)?;

        writeln!(f, "\nResults by protocol:")?;
        writeln!(
            f,
            "{:<10} {:<10} {:<10} {:<10}",
            "Protocol", "Checked", "Working", "Failed"
        )?;
        for protocol in Protocol::ALL {
            if let Some(stats) = self.by_protocol.get(&protocol) {
                writeln!(
                    f,
                    "{:<10} {:<10} {:<10} {:<10}",
                    protocol.to_string(),
                    stats.checked,
                    stats.working,
                    stats.failed
                )?;
            }
        }

        if !self.failure_reasons.is_empty() {
            writeln!(f, "\nFailure reasons:")?;
            let mut reasons: Vec<_> = self.failure_reasons.iter().collect();
            reasons.sort_by(|a, b| {
                b.1.cmp(a.1)
                    .then_with(|| a.0.to_string().cmp(&b.0.to_string()))
            });
            for (reason, count) in reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }
        write!(f, "{}", "=".repeat(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_identity() {
        let a = ProxyCandidate::new(Protocol::Http, "1.2.3.4".to_string(), 8080);
        let b = ProxyCandidate::new(Protocol::Http, "1.2.3.4".to_string(), 8080);
        let c = ProxyCandidate::new(Protocol::Socks5, "1.2.3.4".to_string(), 8080);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.id(), "http://1.2.3.4:8080");
        assert_eq!(a.to_simple_string(), "1.2.3.4:8080");
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("http".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("SOCKS4".parse::<Protocol>().unwrap(), Protocol::Socks4);
        assert_eq!("socks5".parse::<Protocol>().unwrap(), Protocol::Socks5);
        assert!("https".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_summary_counters() {
        let mut summary = RunSummary::default();
        let good = ProxyCandidate::new(Protocol::Http, "1.1.1.1".to_string(), 80);
        let bad = ProxyCandidate::new(Protocol::Socks5, "2.2.2.2".to_string(), 1080);

        summary.record(&ProbeResult::pass(good));
        summary.record(&ProbeResult::fail(bad, FailureReason::ConnectTimeout));

        assert_eq!(summary.total_checked(), 2);
        assert_eq!(summary.total_working(), 1);
        assert_eq!(
            summary.failure_reasons.get(&FailureReason::ConnectTimeout),
            Some(&1)
        );
    }

    #[test]
    fn test_summary_display_without_results() {
        // Must render even when nothing was checked
        let summary = RunSummary::default();
        let rendered = summary.to_string();
        assert!(rendered.contains("Total proxies checked: 0"));
    }
}
