//! callgate CLI：单次调用、限流状态查询与缓存清理的命令行工具
//!
//! Usage:
//!   callgate-cli call <endpoint> --resource <label> [--region <r>] [--query k=v]...
//!   callgate-cli limits --resource <label> [--key <name>]
//!   callgate-cli clear-cache

use anyhow::{anyhow, bail, Context};
use callgate::{CallPipeline, CallRequest, Settings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "limits" => cmd_limits(&args[2..]),
        "clear-cache" => cmd_clear_cache(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("callgate-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"callgate-cli: rate-limited API call tool

USAGE:
    callgate-cli <COMMAND> [OPTIONS]

COMMANDS:
    call <endpoint> --resource <label>   Perform one GET call and print the body
        [--region <r>] [--query k=v]... [--key <name>]
    limits --resource <label>            Print the rate-limit state for a resource
        [--key <name>]
    clear-cache                          Empty the cache store
    version                              Show version information
    help                                 Show this help message

GLOBAL OPTIONS:
    --settings <file.yaml>               Settings file (defaults to env only)

ENVIRONMENT:
    CALLGATE_API_KEY, CALLGATE_REGION, CALLGATE_HTTP_TIMEOUT_SECS,
    CALLGATE_FIXTURE_DIR, CALLGATE_CACHE_DIR, CALLGATE_CACHE_RATE_LIMITS,
    CALLGATE_CACHE_CALLS_TTL, RUST_LOG"#
    );
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn flag_values<'a>(args: &'a [String], name: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|w| w[0] == name)
        .map(|w| w[1].as_str())
        .collect()
}

/// `open_store` loads the persisted snapshots even when neither cache toggle is set.
fn load_pipeline(args: &[String], open_store: bool) -> anyhow::Result<CallPipeline> {
    let mut settings = match flag(args, "--settings") {
        Some(path) => Settings::from_file(PathBuf::from(path))
            .with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    }
    .with_env_overrides();
    if open_store {
        settings.cache_rate_limits = true;
    }
    Ok(CallPipeline::builder(settings).build()?)
}

async fn cmd_call(args: &[String]) -> anyhow::Result<()> {
    let endpoint = args
        .first()
        .filter(|a| a.starts_with('/'))
        .ok_or_else(|| anyhow!("call expects an endpoint starting with '/'"))?;
    let resource = flag(args, "--resource").ok_or_else(|| anyhow!("--resource is required"))?;

    let mut request = CallRequest::get(endpoint.as_str(), resource);
    if let Some(region) = flag(args, "--region") {
        request = request.in_region(region);
    }
    if let Some(key) = flag(args, "--key") {
        request = request.using_key(key);
    }
    for pair in flag_values(args, "--query") {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("--query expects name=value, got '{pair}'");
        };
        request = request.with_query(name, value);
    }

    let pipeline = load_pipeline(args, false)?;
    let result = pipeline.call(request).await?;
    match result.json() {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", result.raw_body),
    }
    Ok(())
}

fn cmd_limits(args: &[String]) -> anyhow::Result<()> {
    let resource = flag(args, "--resource").ok_or_else(|| anyhow!("--resource is required"))?;
    let pipeline = load_pipeline(args, true)?;
    let status = pipeline.current_limits(flag(args, "--key"), resource)?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn cmd_clear_cache(args: &[String]) -> anyhow::Result<()> {
    let pipeline = load_pipeline(args, true)?;
    pipeline.clear_cache()?;
    println!("Cache cleared.");
    Ok(())
}
