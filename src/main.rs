//! mimic: submit to and retrieve from an HTTP/2 relay while presenting a
//! browser TLS fingerprint.

use std::ops::ControlFlow;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mimic::{ExchangeClient, FingerprintProfile, Timeouts};

#[derive(Parser, Debug)]
#[command(name = "mimic")]
#[command(about = "HTTP/2 relay client with browser TLS fingerprint emulation")]
#[command(version)]
struct Args {
    /// Relay base URL; `/send` and `/recv` are appended
    #[arg(long, default_value = "https://127.0.0.1/potato_h2")]
    base: String,

    /// Identity sent in X-Client-Id
    #[arg(long, default_value = "node1")]
    client_id: String,

    /// Payload to submit
    #[arg(long)]
    send: Option<String>,

    /// Retrieve one payload
    #[arg(long)]
    recv: bool,

    /// Extra trusted CA certificate(s), PEM or DER
    #[arg(long)]
    cafile: Option<String>,

    /// Fingerprint profile
    #[arg(long, default_value = mimic::DEFAULT_PROFILE)]
    profile: String,

    /// Verify the relay certificate against this name instead of the URL host
    #[arg(long)]
    server_name: Option<String>,

    /// Connect and request timeout in seconds
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,

    /// Keep retrieving and print every payload
    #[arg(long)]
    follow: bool,

    /// Seconds between retrieves with --follow
    #[arg(long, default_value_t = 0.8)]
    interval: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid --{} {}", name, value))
}

fn build_client(args: &Args) -> Result<ExchangeClient> {
    let profile = FingerprintProfile::lookup(&args.profile).with_context(|| {
        format!(
            "available profiles: {}",
            FingerprintProfile::names().collect::<Vec<_>>().join(", ")
        )
    })?;
    let mut builder = ExchangeClient::builder()
        .profile(profile)
        .timeouts(Timeouts::uniform(seconds("timeout", args.timeout)?));
    if let Some(path) = &args.cafile {
        builder = builder.ca_file(path);
    }
    if let Some(name) = &args.server_name {
        builder = builder.server_name(name);
    }
    builder.build().context("failed to build client")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .with_writer(std::io::stderr)
        .init();

    let client = build_client(&args)?;

    if let Some(payload) = &args.send {
        match client.submit(&args.base, &args.client_id, payload.clone()).await {
            Ok(exchange) => println!("{} {}", exchange.status(), exchange.text()),
            Err(e) => {
                println!("send error: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if args.recv {
        match client.retrieve(&args.base, &args.client_id).await {
            Ok(exchange) => println!("{} {}", exchange.status(), exchange.text()),
            Err(e) => {
                println!("recv error: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if args.follow {
        let interval = seconds("interval", args.interval)?;
        tracing::info!(base = %args.base, ?interval, "following relay");
        let poll = client.poll(&args.base, &args.client_id, interval, |payload| {
            println!("{}", String::from_utf8_lossy(&payload));
            ControlFlow::Continue(())
        });
        tokio::select! {
            result = poll => {
                if let Err(e) = result {
                    println!("recv error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
