//! geobatch CLI — geocode address files against the Census batch geocoder.
//!
//! Usage:
//! ```bash
//! # Geocode a file of "id","address","city","state","zip" lines
//! geobatch geocode --input addresses.csv
//!
//! # Same, with FIPS geography for the 2020 vintage
//! geobatch geocode --input addresses.csv --geography 2020
//!
//! # List benchmark and vintage labels
//! geobatch benchmarks
//! ```
//!
//! Matches are printed to stdout as JSON lines; logs go to stderr
//! (`RUST_LOG` controls the level, default `info`).

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use geobatch_core::codec::{self, COMMA};
use geobatch_core::{Benchmark, GeocodeAddress, Geocoder, GeocoderConfig, Geography, MAX_BATCH_SIZE};
use geobatch_http::{CensusHttpClient, HttpClientConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "geocode" => cmd_geocode(&args[2..]).await,
        "benchmarks" => {
            cmd_benchmarks();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("geobatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("geobatch {}", env!("CARGO_PKG_VERSION"));
    println!("Batch geocode addresses with the US Census geocoder\n");
    println!("USAGE:");
    println!("    geobatch <COMMAND>\n");
    println!("COMMANDS:");
    println!("    geocode     Geocode an address file");
    println!("    benchmarks  List benchmark and geography labels");
    println!("    version     Print version");
    println!("    help        Print this help\n");
    println!("GEOCODE FLAGS:");
    println!("    --input <FILE>        Lines of id,address,city,state,zip  [required]");
    println!("    --benchmark <LABEL>   current | 2021 | 2020  (default: current)");
    println!("    --geography <LABEL>   Enable FIPS output for a vintage (see `benchmarks`)");
    println!("    --batch-size <N>      Records per submission (default: {MAX_BATCH_SIZE})");
    println!("    --timeout-ms <MS>     Per-attempt timeout and retry delay (default: 60000)");
    println!("    --url <URL>           Geocoder base URL");
    println!("    --no-cache            Do not record matches or misses");
}

async fn cmd_geocode(args: &[String]) -> Result<()> {
    let input = parse_flag(args, "--input").context("--input is required")?;

    let mut config = GeocoderConfig::from_labels(
        parse_flag(args, "--benchmark").as_deref(),
        parse_flag(args, "--geography").as_deref(),
    );
    if let Some(ms) = parse_flag(args, "--timeout-ms") {
        let ms: u64 = ms.parse().with_context(|| format!("invalid --timeout-ms '{ms}'"))?;
        config = config.timeout(Duration::from_millis(ms));
    }
    let batch_size = match parse_flag(args, "--batch-size") {
        Some(n) => {
            let n: usize = n.parse().with_context(|| format!("invalid --batch-size '{n}'"))?;
            if n == 0 || n > MAX_BATCH_SIZE {
                bail!("--batch-size must be between 1 and {MAX_BATCH_SIZE}");
            }
            n
        }
        None => MAX_BATCH_SIZE,
    };

    let mut http = HttpClientConfig::default();
    if let Some(url) = parse_flag(args, "--url") {
        http.base_url = url;
    }
    let client = Arc::new(CensusHttpClient::new(http)?);

    let text = std::fs::read_to_string(&input).with_context(|| format!("reading {input}"))?;
    let mut geocoder = Geocoder::new(client, config);
    geocoder.use_cache(!args.iter().any(|a| a == "--no-cache"));

    let mut ids = Vec::new();
    for (id, address) in read_requests(&text) {
        match id {
            Some(id) => {
                geocoder.add(id.clone(), address, None);
                ids.push(id);
            }
            None => ids.push(geocoder.add_unique(address, None)),
        }
    }
    tracing::info!(requests = ids.len(), input = %input, "queued addresses");

    let mut matched = 0usize;
    while geocoder.has_geocode_batch() {
        for response in geocoder.geocode(Some(batch_size)).await? {
            println!("{}", serde_json::to_string(&response)?);
            matched += 1;
        }
    }

    let unmatched = ids.len().saturating_sub(matched);
    if geocoder.is_caching() {
        let missed = ids.iter().filter(|id| geocoder.no_match(id)).count();
        eprintln!(
            "Geocoded {} addresses: {matched} matched, {missed} no match, {} other",
            ids.len(),
            unmatched.saturating_sub(missed)
        );
    } else {
        // misses are not recorded without the cache
        eprintln!(
            "Geocoded {} addresses: {matched} matched, {unmatched} not matched",
            ids.len()
        );
    }
    Ok(())
}

/// Parse an input file in request wire order (id, address, city, state,
/// zip). Blank parts become `None`; an empty id asks for a generated one.
fn read_requests(text: &str) -> Vec<(Option<String>, GeocodeAddress)> {
    codec::decode(text, COMMA)
        .into_iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            let part = |i: usize| {
                row.get(i)
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| codec::unescape(s))
            };
            let address = GeocodeAddress {
                address: part(1),
                city: part(2),
                state: part(3),
                zip: part(4),
            };
            (part(0), address)
        })
        .collect()
}

fn cmd_benchmarks() {
    println!("Benchmarks (--benchmark):\n");
    for b in Benchmark::ALL {
        println!("  {:<8} code {}", b.label(), b.code());
    }
    println!();
    println!("Geography vintages (--geography):\n");
    for g in Geography::ALL {
        println!("  {:<8} code {}", g.label(), g.code());
    }
    println!();
    println!("Unknown labels fall back to \"current\".");
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
