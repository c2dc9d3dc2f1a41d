//! Price Sieve - Amazon price-visibility proxy checker
//!
//! Validates public HTTP/SOCKS4/SOCKS5 proxies by fetching an Amazon
//! product page through each one and verifying that a genuine price is
//! visible. Proxies proven dead are blacklisted permanently so later runs
//! never waste time on them.

pub mod proxy;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
