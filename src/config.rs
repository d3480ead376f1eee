use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::ports;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// One host at a time unless the operator asks for more.
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 5_000;

/// Row layout of the live table and the TSV file, fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// address, status, score
    #[default]
    Compact,
    /// compact columns plus the list of methods that answered
    Detailed,
}

impl Layout {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Layout::Detailed
        } else {
            Layout::Compact
        }
    }
}

/// Run-scoped settings handed to every task at creation time.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Deadline applied to every probe.
    pub timeout: Duration,
    /// Maximum number of hosts scanned at once.
    pub concurrency: usize,
    pub ports: Vec<u16>,
    pub layout: Layout,
    /// TSV results file.
    pub output: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            ports: ports::default_ports(),
            layout: Layout::Compact,
            output: None,
        }
    }
}

impl ScanConfig {
    /// Full check for a run with the standard probe set.
    pub fn validate(&self) -> Result<()> {
        self.validate_run()?;
        if self.ports.is_empty() {
            bail!("at least one TCP port is required");
        }
        Ok(())
    }

    /// Settings every run needs, whatever probes it uses.
    pub fn validate_run(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            bail!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            );
        }
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }
        Ok(())
    }

    /// ARP + PING + one probe per TCP port.
    pub fn probes_per_host(&self) -> usize {
        2 + self.ports.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ScanConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.probes_per_host(), 20);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let cfg = ScanConfig {
            concurrency: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_ports_rejected() {
        let cfg = ScanConfig {
            ports: Vec::new(),
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(cfg.validate_run().is_ok());
    }

    #[test]
    fn layout_from_flag() {
        assert_eq!(Layout::from_verbose(true), Layout::Detailed);
        assert_eq!(Layout::from_verbose(false), Layout::Compact);
    }
}
