//! Proxy validation pipeline
//!
//! This module provides:
//! - Candidate intake, dedup and blacklist filtering
//! - Anti-bot request shaping
//! - Concurrent probing with price-visibility verification
//! - Result classification and output writing

pub mod antibot;
pub mod blacklist;
pub mod checker;
pub mod models;
pub mod parser;
pub mod price;
pub mod report;

pub use antibot::{HeaderShaper, ShapedRequest};
pub use blacklist::Blacklist;
pub use checker::{CheckerConfig, ProxyChecker};
pub use models::{
    FailureReason, ProbeOutcome, ProbeResult, Protocol, ProxyCandidate, RunSummary,
};
pub use parser::{Intake, IntakeReport};
pub use price::check_price_visibility;
pub use report::{classify, write_passing, PassingProxySet};
