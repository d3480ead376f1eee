use serde::{Deserialize, Serialize};

/// Outcome of a single probe method against a single address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub method: String,
    pub success: bool,
}

/// Aggregated verdict for one scanned address.
///
/// Built only through [`HostResult::from_outcomes`], which derives the score,
/// liveness and success list from the probe outcomes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostResult {
    pub address: String,
    pub is_up: bool,
    pub score: usize,
    pub total_probes: usize,
    pub probes: Vec<ProbeOutcome>,
    pub success_methods: Vec<String>,
}

impl HostResult {
    /// Aggregate outcomes (in the order they completed) into a result.
    pub fn from_outcomes(address: impl Into<String>, probes: Vec<ProbeOutcome>) -> Self {
        let success_methods: Vec<String> = probes
            .iter()
            .filter(|p| p.success)
            .map(|p| p.method.clone())
            .collect();
        let score = success_methods.len();
        Self {
            address: address.into(),
            is_up: score > 0,
            score,
            total_probes: probes.len(),
            probes,
            success_methods,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_up {
            "UP"
        } else {
            "DOWN"
        }
    }

    /// `score/total`, e.g. `2/20`.
    pub fn score_label(&self) -> String {
        format!("{}/{}", self.score, self.total_probes)
    }

    pub fn methods_label(&self) -> String {
        self.success_methods.join(",")
    }
}

/// UP/DOWN tally over a finished run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub up: usize,
    pub down: usize,
}

impl RunSummary {
    pub fn from_results(results: &[HostResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            if r.is_up {
                acc.up += 1;
            } else {
                acc.down += 1;
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.up + self.down
    }
}

/// Materialized run: hosts are in input order, not completion order.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanResults {
    pub started_at: String,
    pub finished_at: String,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub summary: RunSummary,
    pub output_file: Option<String>,
    pub warnings: Vec<String>,
    pub hosts: Vec<HostResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(method: &str, success: bool) -> ProbeOutcome {
        ProbeOutcome {
            method: method.to_string(),
            success,
        }
    }

    #[test]
    fn aggregate_counts_successes() {
        let r = HostResult::from_outcomes(
            "10.0.0.5",
            vec![
                outcome("PING", true),
                outcome("ARP", false),
                outcome("TCP:443", false),
                outcome("TCP:80", true),
            ],
        );
        assert_eq!(r.score, 2);
        assert_eq!(r.total_probes, 4);
        assert!(r.is_up);
        assert_eq!(r.success_methods, vec!["PING", "TCP:80"]);
        assert_eq!(r.score_label(), "2/4");
        assert_eq!(r.methods_label(), "PING,TCP:80");
    }

    #[test]
    fn all_failed_is_down() {
        let r = HostResult::from_outcomes("10.0.0.9", vec![outcome("ARP", false), outcome("PING", false)]);
        assert_eq!(r.score, 0);
        assert!(!r.is_up);
        assert_eq!(r.status_label(), "DOWN");
        assert!(r.success_methods.is_empty());
    }

    #[test]
    fn summary_folds_liveness() {
        let up = HostResult::from_outcomes("a", vec![outcome("PING", true)]);
        let down = HostResult::from_outcomes("b", vec![outcome("PING", false)]);
        let s = RunSummary::from_results(&[up.clone(), down, up]);
        assert_eq!(s, RunSummary { up: 2, down: 1 });
        assert_eq!(s.total(), 3);
    }
}
