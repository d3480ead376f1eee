use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lan_probe_rs::config::{Layout, ScanConfig, DEFAULT_CONCURRENCY};
use lan_probe_rs::types::ScanResults;
use lan_probe_rs::{logging, ports, scanner, targets};

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser};
use colored::Colorize;

/// lan-probe-rs: find live hosts with ARP, ICMP and TCP probes at once.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-probe-rs",
    version,
    about = "Multi-method host discovery: ARP, ICMP and TCP probes aggregated into a liveness score.",
    long_about = None
)]
#[command(group(ArgGroup::new("targets").required(true).args(["ip", "range", "list"])))]
struct Cli {
    /// Single IP address to scan.
    #[arg(short = 'i', long)]
    ip: Option<String>,

    /// IP range in CIDR notation (e.g., 192.168.1.0/24).
    #[arg(short = 'r', long)]
    range: Option<String>,

    /// File with one IP or CIDR per line (`#` starts a comment line).
    #[arg(short = 'l', long)]
    list: Option<PathBuf>,

    /// Write tab-separated results to this path.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Write the full run as pretty JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Show which probe methods answered for each host.
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,

    /// Number of hosts scanned concurrently.
    #[arg(short = 't', long, default_value_t = DEFAULT_CONCURRENCY)]
    threads: usize,

    /// Per-probe timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 2000)]
    timeout_ms: u64,

    /// Per-probe timeout in whole seconds; overrides `--timeout-ms`.
    #[arg(short = 'T', long = "timeout", conflicts_with = "timeout_ms")]
    timeout_secs: Option<u64>,

    /// TCP ports to probe, e.g. `22,80,8000-8010`. Defaults to 18 common ports.
    #[arg(short = 'p', long, conflicts_with = "ports_file")]
    ports: Option<String>,

    /// File with TCP ports to probe (one port or range per line).
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,
}

impl Cli {
    fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_millis(self.timeout_ms))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging();

    let addresses = load_targets(&cli)?;
    if addresses.is_empty() {
        bail!("no valid IPs to scan");
    }

    let ports = match (&cli.ports, &cli.ports_file) {
        (Some(list), _) => ports::parse_ports_str(list)?,
        (None, Some(path)) => ports::load_ports_file(path)?,
        (None, None) => ports::default_ports(),
    };

    let config = ScanConfig {
        timeout: cli.timeout(),
        concurrency: cli.threads,
        ports,
        layout: Layout::from_verbose(cli.verbose),
        output: cli.output.clone(),
    };
    config.validate()?;

    print_banner();
    println!();

    let results = scanner::scan_targets(&addresses, &config, std::io::stdout()).await?;

    if let Some(path) = cli.json.as_deref() {
        if let Err(e) = write_results_json(path, &results) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON results to {}", path.display());
        }
    }

    Ok(())
}

fn load_targets(cli: &Cli) -> Result<Vec<String>> {
    if let Some(ip) = cli.ip.as_deref() {
        return targets::parse_target(ip);
    }
    if let Some(range) = cli.range.as_deref() {
        return targets::parse_target(range);
    }
    if let Some(path) = cli.list.as_deref() {
        return targets::load_targets_from_path(path);
    }
    Ok(Vec::new())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ██╗      █████╗ ███╗   ██╗    ██████╗ ██████╗  ██████╗ ██████╗ ███████╗
 ██║     ██╔══██╗████╗  ██║    ██╔══██╗██╔══██╗██╔═══██╗██╔══██╗██╔════╝
 ██║     ███████║██╔██╗ ██║    ██████╔╝██████╔╝██║   ██║██████╔╝█████╗
 ██║     ██╔══██║██║╚██╗██║    ██╔═══╝ ██╔══██╗██║   ██║██╔══██╗██╔══╝
 ███████╗██║  ██║██║ ╚████║    ██║     ██║  ██║╚██████╔╝██████╔╝███████╗
 ╚══════╝╚═╝  ╚═╝╚═╝  ╚═══╝    ╚═╝     ╚═╝  ╚═╝ ╚═════╝ ╚═════╝ ╚══════╝"#
            .red()
            .bold()
    );
    println!("{}", "        Multi-Method Host Discovery".yellow());
    println!("{}", "        [ ARP | ICMP | TCP ]".cyan());
}

fn write_results_json(path: &Path, results: &ScanResults) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_in_seconds_or_millis() {
        let secs = Cli::try_parse_from(["lan-probe-rs", "-i", "10.0.0.1", "-T", "3"]).unwrap();
        assert_eq!(secs.timeout(), Duration::from_secs(3));

        let millis = Cli::try_parse_from(["lan-probe-rs", "-i", "10.0.0.1", "--timeout-ms", "750"]).unwrap();
        assert_eq!(millis.timeout(), Duration::from_millis(750));

        let default = Cli::try_parse_from(["lan-probe-rs", "-r", "10.0.0.0/30"]).unwrap();
        assert_eq!(default.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn both_timeout_forms_conflict() {
        let both = Cli::try_parse_from(["lan-probe-rs", "-i", "10.0.0.1", "-T", "3", "--timeout-ms", "10"]);
        assert!(both.is_err());
    }
}
