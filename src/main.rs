use anyhow::Result;
use clap::Parser;
use price_sieve::proxy::{
    classify, write_passing, Blacklist, CheckerConfig, Intake, Protocol, ProxyChecker, RunSummary,
};
use rand::seq::SliceRandom;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Finds public proxies that can load an Amazon product page with a
/// visible price
#[derive(Parser)]
#[command(name = "price-sieve")]
#[command(about = "Tests proxies for Amazon price visibility through anti-bot defenses")]
struct Cli {
    /// Directory containing raw proxy lists, one <protocol>.txt per protocol
    #[arg(short, long, default_value = "proxies/proxies")]
    input_dir: PathBuf,

    /// Directory for passing-proxy output files
    #[arg(short, long, default_value = "proxies/passing_proxies")]
    output_dir: PathBuf,

    /// Blacklist file of permanently failed proxies
    #[arg(short, long, default_value = "proxies/failed_proxies.txt")]
    blacklist: PathBuf,

    /// Protocols to test
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_values_t = [Protocol::Http, Protocol::Socks4, Protocol::Socks5]
    )]
    types: Vec<Protocol>,

    /// Number of concurrent probe attempts
    #[arg(short, long, default_value = "32")]
    workers: usize,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Product page URL to probe through each proxy
    #[arg(long, default_value = "https://www.amazon.ca/dp/B09BZVX3J7")]
    url: String,

    /// Optional run deadline in seconds; attempts past it are abandoned
    #[arg(long)]
    deadline: Option<u64>,

    /// Keep candidates in input order instead of shuffling
    #[arg(long)]
    no_shuffle: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.workers >= 4096 {
        warn!("it is not recommended to use more than 4096 workers");
    }

    let mut blacklist = Blacklist::load(&cli.blacklist)?;
    info!("loaded {} blacklisted proxies", blacklist.len());

    let mut summary = RunSummary::default();
    let mut sources: Vec<(Protocol, String)> = Vec::new();
    let mut tested: Vec<Protocol> = Vec::new();

    for &protocol in &cli.types {
        if tested.contains(&protocol) {
            continue;
        }
        let path = cli.input_dir.join(format!("{}.txt", protocol));
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                tested.push(protocol);
                sources.push((protocol, content));
            }
            Err(e) => {
                warn!("skipping {}: cannot read {:?}: {}", protocol, path, e);
            }
        }
    }

    let mut candidates = Intake::collect_all(
        sources.iter().map(|(protocol, content)| (*protocol, content.as_str())),
        &blacklist,
        &mut summary,
    );

    if candidates.is_empty() {
        println!("{}", summary);
        warn!("no candidates to test");
        return Ok(());
    }

    // Spread slow hosts across the run instead of clustering by source
    if !cli.no_shuffle {
        candidates.shuffle(&mut rand::thread_rng());
    }

    let mut config = CheckerConfig::new()
        .with_workers(cli.workers)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_target_url(cli.url.clone());
    if let Some(deadline) = cli.deadline {
        config = config.with_deadline(Duration::from_secs(deadline));
    }

    let checker = ProxyChecker::with_config(config);
    let results = checker.check_candidates(candidates).await;

    let passing = classify(results, &mut blacklist, &mut summary);

    // Persistence failures are fatal; the blacklist additions must not be
    // silently lost
    let appended = blacklist.flush()?;
    info!("added {} new proxies to blacklist", appended);
    write_passing(&passing, &cli.output_dir, &tested)?;

    println!("{}", summary);
    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "price_sieve=info",
        1 => "price_sieve=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}
