use crate::config::{ScanConfig, MAX_CONCURRENCY};
use crate::host::HostScanner;
use crate::probe::{self, Probe};
use crate::sink::{ResultSink, SinkReport};
use crate::types::{HostResult, ScanResults};
use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{self, JoinSet};
use tracing::info;

/// Position of an address in the caller's list, carried through the scan.
#[derive(Debug, Clone)]
struct ScanJob {
    index: usize,
    address: String,
}

/// Scan every address with the standard ARP/PING/TCP probe set, render rows as
/// hosts complete, and return the results in input order.
///
/// - At most `config.concurrency` hosts are scanned at once (`Semaphore`).
/// - Every probe of a host runs concurrently, outside that limit.
/// - Rows reach `display` (and the TSV file) in completion order.
pub async fn scan_targets<W>(
    addresses: &[String],
    config: &ScanConfig,
    display: W,
) -> Result<ScanResults>
where
    W: Write + Send + 'static,
{
    config.validate()?;
    let probes = probe::standard_probes(&config.ports);
    scan_targets_with_probes(addresses, config, probes, display).await
}

/// Same as [`scan_targets`] with a caller-supplied probe set.
pub async fn scan_targets_with_probes<W>(
    addresses: &[String],
    config: &ScanConfig,
    probes: Vec<Arc<dyn Probe>>,
    display: W,
) -> Result<ScanResults>
where
    W: Write + Send + 'static,
{
    config.validate_run()?;
    let started_at = now_iso_like();
    info!(
        hosts = addresses.len(),
        probes = probes.len(),
        concurrency = config.concurrency,
        "scan started"
    );

    let scanner = HostScanner::new(probes, config.timeout);
    let sink = ResultSink::new(
        display,
        config.layout,
        addresses.len(),
        config.output.as_deref(),
    );
    let report = scan_all(addresses, config.concurrency, scanner, sink).await?;

    info!(up = report.summary.up, down = report.summary.down, "scan finished");
    Ok(ScanResults {
        started_at,
        finished_at: now_iso_like(),
        concurrency: config.concurrency,
        timeout_ms: config.timeout.as_millis() as u64,
        summary: report.summary,
        output_file: report.saved_to.map(|p| p.display().to_string()),
        warnings: report.warnings,
        hosts: report.results,
    })
}

/// Bounded fan-out of host scans feeding a single sink task.
///
/// A slot is released as soon as its host scan returns, before the sink has
/// seen the result. Returns once every address has been scanned and the sink
/// has drained the channel.
pub async fn scan_all<W>(
    addresses: &[String],
    concurrency: usize,
    scanner: HostScanner,
    sink: ResultSink<W>,
) -> Result<SinkReport>
where
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<(usize, HostResult)>(addresses.len().max(1));
    let consumer = task::spawn_blocking(move || sink.drain(rx));

    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, MAX_CONCURRENCY)));
    let mut set = JoinSet::new();

    for (index, address) in addresses.iter().enumerate() {
        let job = ScanJob {
            index,
            address: address.clone(),
        };
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .context("scan admission gate closed")?;
        let scanner = scanner.clone();
        let tx = tx.clone();

        set.spawn(async move {
            let result = scanner.scan(&job.address).await;
            drop(permit);
            tx.send((job.index, result))
                .await
                .context("result sink stopped before the scan finished")
        });
    }
    drop(tx);

    let mut scan_failure = None;
    while let Some(res) = set.join_next().await {
        let outcome = res.context("host scan task failed").and_then(|sent| sent);
        if let Err(e) = outcome {
            scan_failure.get_or_insert(e);
        }
    }

    // A sink failure explains any failed send, so it is reported first.
    let report = consumer.await.context("result sink task failed")??;
    match scan_failure {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
