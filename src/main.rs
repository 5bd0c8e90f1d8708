//! Command-line front end for the DNS codec.
//!
//! Sends one query to an upstream server and prints the decoded response, or
//! decodes a response that was captured to a file earlier.
//!
//! # Usage
//!
//! ```bash
//! # A record lookup against the default server (8.8.8.8:53)
//! dns-wire example.com
//!
//! # Any other type by number or in TYPE<n> notation
//! dns-wire example.com TYPE16 --server 1.1.1.1:53
//!
//! # Decode a captured response
//! dns-wire --packet-file response.bin
//! ```
//!
//! Diagnostics go to stderr and are controlled by `--log-level` or `RUST_LOG`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use dns_wire::dns::{DnsPacket, QueryType};
use dns_wire::resolver::resolve;

#[derive(Parser)]
#[command(name = "dns-wire")]
#[command(version)]
#[command(about = "Query a DNS server over UDP and decode the response")]
struct Cli {
    /// Domain name to resolve
    #[arg(required_unless_present = "packet_file")]
    domain: Option<String>,

    /// Record type to query: A, TYPE<n> or a type number
    #[arg(default_value = "A")]
    record_type: QueryType,

    /// Upstream DNS server address
    #[arg(short, long, env = "DNS_SERVER", default_value = "8.8.8.8:53")]
    server: SocketAddr,

    /// Decode a captured DNS message from FILE instead of querying
    #[arg(long, value_name = "FILE", conflicts_with = "domain")]
    packet_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .ok();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let packet = match (&cli.packet_file, &cli.domain) {
        (Some(path), _) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            debug!(path = %path.display(), bytes = bytes.len(), "loaded captured packet");

            DnsPacket::from_bytes(&bytes)
                .with_context(|| format!("Failed to decode {}", path.display()))?
        }
        (None, Some(domain)) => {
            info!(server = %cli.server, %domain, qtype = %cli.record_type, "querying");
            println!(
                ";; Querying {} for {} records of {}",
                cli.server, cli.record_type, domain
            );
            println!();

            resolve(domain, cli.record_type, cli.server)
                .with_context(|| format!("Error resolving {}", domain))?
        }
        (None, None) => anyhow::bail!("Either a domain name or --packet-file is required"),
    };

    print!("{}", packet);
    Ok(())
}
