//! Concurrent probe scheduler
//!
//! Drives every surviving candidate through exactly one fetch-and-check
//! attempt against the target product page, with bounded concurrency and a
//! generous per-attempt timeout. Slower than a typical scraper on purpose:
//! free proxies are sluggish and a short timeout produces false negatives.

use crate::proxy::antibot::HeaderShaper;
use crate::proxy::models::{FailureReason, ProbeResult, Protocol, ProxyCandidate};
use crate::proxy::price::check_price_visibility;
use crate::Result;
use futures::stream::{self, StreamExt};
use futures::Future;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Default number of concurrent probe attempts
const DEFAULT_WORKERS: usize = 32;

/// Default per-attempt timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default product page to probe
const DEFAULT_TARGET_URL: &str = "https://www.amazon.ca/dp/B09BZVX3J7";

/// How often to log progress, in completed attempts
const PROGRESS_EVERY: usize = 50;

/// Configuration for the probe scheduler
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Maximum number of attempts in flight at once
    pub workers: usize,
    /// Timeout for each fetch attempt
    pub timeout: Duration,
    /// Product page fetched through each candidate
    pub target_url: String,
    /// Optional run-level deadline; attempts still in flight past it are
    /// abandoned and counted as connect timeouts
    pub deadline: Option<Duration>,
}

/// What the run deadline allows an attempt when its slot opens
enum DeadlineBudget {
    Unlimited,
    Remaining(Duration),
    Expired,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            target_url: DEFAULT_TARGET_URL.to_string(),
            deadline: None,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_target_url(mut self, url: String) -> Self {
        self.target_url = url;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Scheduler that fans candidates out to a bounded pool of probe attempts
pub struct ProxyChecker {
    config: CheckerConfig,
    shaper: Arc<HeaderShaper>,
}

impl ProxyChecker {
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        Self {
            config,
            shaper: Arc::new(HeaderShaper::new()),
        }
    }

    /// Probe every candidate exactly once and collect the results in
    /// completion order. The output length always equals the input length;
    /// no candidate is ever dropped.
    pub async fn check_candidates(&self, candidates: Vec<ProxyCandidate>) -> Vec<ProbeResult> {
        let total = candidates.len();
        let started = Instant::now();
        let completed = Arc::new(AtomicUsize::new(0));
        info!("testing {} proxies with {} workers", total, self.config.workers);

        run_bounded(candidates, self.config.workers, |candidate| {
            let checker = self.clone();
            let completed = Arc::clone(&completed);
            async move {
                let result = match checker.deadline_budget(started) {
                    DeadlineBudget::Expired => {
                        ProbeResult::fail(candidate, FailureReason::ConnectTimeout)
                    }
                    DeadlineBudget::Remaining(left) => {
                        // In-flight attempts are abandoned at the deadline,
                        // not left to run out their own budget
                        let attempt =
                            tokio::time::timeout(left, checker.check_candidate(&candidate)).await;
                        match attempt {
                            Ok(result) => result,
                            Err(_) => {
                                ProbeResult::fail(candidate, FailureReason::ConnectTimeout)
                            }
                        }
                    }
                    DeadlineBudget::Unlimited => checker.check_candidate(&candidate).await,
                };

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_EVERY == 0 || done == total {
                    info!("progress: {}/{} checked", done, total);
                }
                result
            }
        })
        .await
    }

    /// Run one shaped fetch attempt through the candidate and classify it
    pub async fn check_candidate(&self, candidate: &ProxyCandidate) -> ProbeResult {
        let shaped = self.shaper.shape();
        tokio::time::sleep(shaped.delay).await;

        let client = match self.create_client(candidate) {
            Ok(client) => client,
            Err(e) => {
                debug!("client build failed for {}: {}", candidate, e);
                return ProbeResult::fail(candidate.clone(), FailureReason::ProxyError);
            }
        };

        // Belt over the client timeout so a stalled attempt can never hold
        // a worker slot indefinitely
        let budget = self.config.timeout * 2 + shaped.delay;
        let request = client.get(&self.config.target_url).headers(shaped.headers);

        let response = match tokio::time::timeout(budget, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let reason = map_transport_error(&e);
                debug!("fetch through {} failed: {} ({})", candidate, e, reason);
                return ProbeResult::fail(candidate.clone(), reason);
            }
            Err(_) => {
                return ProbeResult::fail(candidate.clone(), FailureReason::ConnectTimeout);
            }
        };

        let status = response.status().as_u16();
        let body = match tokio::time::timeout(budget, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                return ProbeResult::fail(candidate.clone(), map_transport_error(&e));
            }
            Err(_) => {
                return ProbeResult::fail(candidate.clone(), FailureReason::ReadTimeout);
            }
        };

        let outcome = check_price_visibility(status, &body);
        ProbeResult {
            candidate: candidate.clone(),
            outcome,
        }
    }

    /// Time left on the run deadline when an attempt's slot opens
    fn deadline_budget(&self, started: Instant) -> DeadlineBudget {
        match self.config.deadline {
            None => DeadlineBudget::Unlimited,
            Some(deadline) => match deadline.checked_sub(started.elapsed()) {
                Some(left) if !left.is_zero() => DeadlineBudget::Remaining(left),
                _ => DeadlineBudget::Expired,
            },
        }
    }

    /// Build a client tunneling all traffic through the candidate
    fn create_client(&self, candidate: &ProxyCandidate) -> Result<Client> {
        // reqwest routes socks4/socks5 schemes natively; http proxies get
        // CONNECT tunneling for the https target
        let proxy = match candidate.protocol {
            Protocol::Http => ReqwestProxy::all(format!("http://{}:{}", candidate.host, candidate.port))?,
            Protocol::Socks4 | Protocol::Socks5 => ReqwestProxy::all(candidate.id())?,
        };

        let client = Client::builder()
            .proxy(proxy)
            .timeout(self.config.timeout)
            .connect_timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }
}

impl Clone for ProxyChecker {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            shaper: Arc::clone(&self.shaper),
        }
    }
}

impl Default for ProxyChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a transport-level error onto the failure taxonomy
fn map_transport_error(e: &reqwest::Error) -> FailureReason {
    if e.is_timeout() {
        return if e.is_connect() {
            FailureReason::ConnectTimeout
        } else {
            FailureReason::ReadTimeout
        };
    }
    if e.is_connect() {
        return FailureReason::ConnectionError;
    }

    // reqwest folds proxy negotiation and TLS failures into opaque error
    // chains; sniff the rendered chain for the known families
    let mut rendered = e.to_string().to_lowercase();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        rendered.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }

    if rendered.contains("certificate")
        || rendered.contains("handshake")
        || rendered.contains("tls")
        || rendered.contains("ssl")
    {
        FailureReason::SslError
    } else if rendered.contains("proxy") || rendered.contains("socks") {
        FailureReason::ProxyError
    } else {
        FailureReason::Other
    }
}

/// Drive `f` over `items` with at most `limit` futures in flight
async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let semaphore = Arc::new(Semaphore::new(limit));

    stream::iter(items)
        .map(|item| {
            let sem = Arc::clone(&semaphore);
            let fut = f(item);
            async move {
                // Acquire only fails if the semaphore is closed, which
                // cannot happen while we hold the Arc
                let _permit = sem.acquire().await.expect("semaphore closed unexpectedly");
                fut.await
            }
        })
        .buffer_unordered(limit)
        .collect::<Vec<_>>()
        .await
}
