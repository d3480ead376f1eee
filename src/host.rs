use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, warn};

use crate::probe::Probe;
use crate::types::{HostResult, ProbeOutcome};

/// Runs every configured probe against one address and scores the answers.
///
/// Probes for a host run fully concurrently; the outer scan limit does not
/// apply to them.
#[derive(Clone)]
pub struct HostScanner {
    probes: Arc<Vec<Arc<dyn Probe>>>,
    deadline: Duration,
}

impl HostScanner {
    pub fn new(probes: Vec<Arc<dyn Probe>>, deadline: Duration) -> Self {
        Self {
            probes: Arc::new(probes),
            deadline,
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Probe `address` with every method and wait for all of them.
    ///
    /// Outcomes are recorded in completion order. Wall time is bounded by the
    /// deadline since each probe is cut off when it elapses.
    pub async fn scan(&self, address: &str) -> HostResult {
        let mut set = JoinSet::new();
        for probe in self.probes.iter() {
            let probe = Arc::clone(probe);
            let address = address.to_string();
            let deadline = self.deadline;
            set.spawn(async move {
                let method = probe.method();
                let success = time::timeout(deadline, probe.probe(&address, deadline))
                    .await
                    .unwrap_or(false);
                ProbeOutcome { method, success }
            });
        }

        let mut outcomes = Vec::with_capacity(self.probes.len());
        while let Some(res) = set.join_next().await {
            match res {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(address, error = %e, "probe task died"),
            }
        }

        if outcomes.len() < self.probes.len() {
            self.fill_missing(&mut outcomes);
        }

        let result = HostResult::from_outcomes(address, outcomes);
        debug!(
            address,
            score = result.score,
            total = result.total_probes,
            "host scanned"
        );
        result
    }

    /// Record a failed outcome for every probe whose task never reported.
    fn fill_missing(&self, outcomes: &mut Vec<ProbeOutcome>) {
        let mut reported: Vec<String> = outcomes.iter().map(|o| o.method.clone()).collect();
        for probe in self.probes.iter() {
            let method = probe.method();
            match reported.iter().position(|m| *m == method) {
                Some(pos) => {
                    reported.swap_remove(pos);
                }
                None => outcomes.push(ProbeOutcome {
                    method,
                    success: false,
                }),
            }
        }
    }
}
