//! Live table and TSV output for completed host scans.
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::Layout;
use crate::types::{HostResult, RunSummary};

const COMPACT_TOP: &str = "┌─────────────────┬────────┬───────┐";
const COMPACT_MID: &str = "├─────────────────┼────────┼───────┤";
const COMPACT_BOTTOM: &str = "└─────────────────┴────────┴───────┘";
const DETAILED_TOP: &str = "┌─────────────────┬────────┬───────┬──────────────────────────────────────────────────────────────────┐";
const DETAILED_MID: &str = "├─────────────────┼────────┼───────┼──────────────────────────────────────────────────────────────────┤";
const DETAILED_BOTTOM: &str = "└─────────────────┴────────┴───────┴──────────────────────────────────────────────────────────────────┘";

/// Everything the sink knows once the stream has ended.
#[derive(Debug, Clone)]
pub struct SinkReport {
    /// Results in input order.
    pub results: Vec<HostResult>,
    pub summary: RunSummary,
    /// TSV file that received every row, if persistence stayed healthy.
    pub saved_to: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Single consumer of `(index, result)` pairs.
///
/// Rows are rendered in arrival order; results are stored at their original
/// index for the final report. Display and file failures are warnings: the
/// broken output is dropped and the run goes on.
pub struct ResultSink<W: Write> {
    display: W,
    display_failed: bool,
    layout: Layout,
    file: Option<(PathBuf, File)>,
    results: Vec<Option<HostResult>>,
    warnings: Vec<String>,
}

impl<W: Write> ResultSink<W> {
    /// Prepare a sink for `expected` results. A TSV file that cannot be
    /// created is reported as a warning and persistence is skipped.
    pub fn new(display: W, layout: Layout, expected: usize, output: Option<&Path>) -> Self {
        let mut warnings = Vec::new();
        let file = output.and_then(|path| match File::create(path) {
            Ok(f) => Some((path.to_path_buf(), f)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot create output file");
                warnings.push(format!("Cannot create output file: {}", path.display()));
                None
            }
        });
        Self {
            display,
            display_failed: false,
            layout,
            file,
            results: vec![None; expected],
            warnings,
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Write one display line. The first failure disables the display.
    fn show(&mut self, line: impl std::fmt::Display) {
        if self.display_failed {
            return;
        }
        let res = writeln!(self.display, "{line}").and_then(|()| self.display.flush());
        if let Err(e) = res {
            warn!(error = %e, "display output failed, continuing without it");
            self.warnings.push(format!("Display output failed: {e}"));
            self.display_failed = true;
        }
    }

    /// Surface setup warnings and print the table header.
    pub fn begin(&mut self) {
        let setup: Vec<String> = self.warnings.clone();
        for w in setup {
            self.show(format!("✗ {w}").red());
        }
        match self.layout {
            Layout::Compact => {
                self.show(COMPACT_TOP);
                self.show(format!("│ {:<15} │ {:<6} │ {:<5} │", "IP", "STATUS", "SCORE").cyan());
                self.show(COMPACT_MID);
            }
            Layout::Detailed => {
                self.show(DETAILED_TOP);
                self.show(
                    format!(
                        "│ {:<15} │ {:<6} │ {:<5} │ {:<64} │",
                        "IP", "STATUS", "SCORE", "METHODS"
                    )
                    .cyan(),
                );
                self.show(DETAILED_MID);
            }
        }
    }

    /// Render one completed host and store it at `index`.
    pub fn record(&mut self, index: usize, result: HostResult) -> Result<()> {
        if index >= self.results.len() {
            bail!("result index {index} out of range");
        }

        let status = if result.is_up {
            format!("{:<6}", "UP").green()
        } else {
            format!("{:<6}", "DOWN").red()
        };
        let score = result.score_label();

        let (row, line) = match self.layout {
            Layout::Compact => (
                format!("│ {:<15} │ {} │ {:<5} │", result.address, status, score),
                format!("{}\t{}\t{}", result.address, result.status_label(), score),
            ),
            Layout::Detailed => {
                let methods = result.methods_label();
                (
                    format!(
                        "│ {:<15} │ {} │ {:<5} │ {:<64} │",
                        result.address, status, score, methods
                    ),
                    format!(
                        "{}\t{}\t{}\t{}",
                        result.address,
                        result.status_label(),
                        score,
                        methods
                    ),
                )
            }
        };
        self.show(row);
        self.persist(&line);

        self.results[index] = Some(result);
        Ok(())
    }

    /// Append one TSV line straight to the file so finished rows survive an
    /// interrupted run.
    fn persist(&mut self, line: &str) {
        let Some((path, file)) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = file.write_all(format!("{line}\n").as_bytes()) {
            warn!(path = %path.display(), error = %e, "writing results file failed");
            self.warnings
                .push(format!("Cannot write output file: {}", path.display()));
            self.file = None;
        }
    }

    /// Consume the stream until every sender is gone, then finish.
    ///
    /// Blocks the calling thread; run it on the blocking pool.
    pub fn drain(mut self, mut rx: mpsc::Receiver<(usize, HostResult)>) -> Result<SinkReport> {
        self.begin();
        while let Some((index, result)) = rx.blocking_recv() {
            self.record(index, result)?;
        }
        self.finish()
    }

    /// Close the table and the file, fold the summary.
    pub fn finish(mut self) -> Result<SinkReport> {
        let bottom = match self.layout {
            Layout::Compact => COMPACT_BOTTOM,
            Layout::Detailed => DETAILED_BOTTOM,
        };
        self.show(bottom);

        let saved_to = self.file.take().map(|(path, _file)| path);
        if let Some(path) = &saved_to {
            self.show("");
            self.show(format!("✓ Results saved to: {}", path.display()).yellow());
        }

        let slots = std::mem::take(&mut self.results);
        let results = slots
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.with_context(|| format!("no result recorded for target #{i}")))
            .collect::<Result<Vec<_>>>()?;
        let summary = RunSummary::from_results(&results);

        self.show("");
        self.show(format!("● UP: {}", summary.up).green());
        self.show(format!("● DOWN: {}", summary.down).red());

        Ok(SinkReport {
            results,
            summary,
            saved_to,
            warnings: self.warnings,
        })
    }
}
