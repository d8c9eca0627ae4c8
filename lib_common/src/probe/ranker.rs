//! # Ranker
//!
//! Turns the unordered results of a probing round into a `RankedList`:
//! reachable results first, fastest first, and input order whenever two
//! results compare equal. Because the input index is part of the sort key,
//! the output never depends on the order in which probes completed.

use serde::Serialize;

use super::prober::probe_all;
use super::target::{ProbeError, ProbeOptions, ProbeResult, ProbeTarget};

/// The chosen target of a round. `best` is `None` only when nothing answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub best: Option<ProbeTarget>,
}

/// Probe results in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RankedList {
    entries: Vec<ProbeResult>,
}

/// Orders the results of one round.
pub fn rank(mut results: Vec<ProbeResult>) -> RankedList {
    results.sort_by_key(|r| (!r.reachable, r.latency_ms.unwrap_or(0), r.index));
    RankedList { entries: results }
}

impl RankedList {
    pub fn entries(&self) -> &[ProbeResult] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ProbeResult> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reachable_count(&self) -> usize {
        self.entries.iter().take_while(|r| r.reachable).count()
    }

    /// The first `n` entries, for reports.
    pub fn top(&self, n: usize) -> &[ProbeResult] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// The head of the list if it is reachable.
    pub fn best(&self) -> Option<&ProbeResult> {
        self.entries.first().filter(|r| r.reachable)
    }

    pub fn selection(&self) -> Selection {
        Selection {
            best: self.best().map(|r| r.target.clone()),
        }
    }

    /// Like [`best`](Self::best), but reports an empty selection as a round failure.
    pub fn require_best(&self) -> Result<&ProbeResult, ProbeError> {
        self.best().ok_or(ProbeError::NoReachableTargets {
            probed: self.entries.len(),
        })
    }
}

/// Runs one full round: probe every target, then rank the results.
pub async fn run_round(targets: &[ProbeTarget], options: &ProbeOptions) -> RankedList {
    rank(probe_all(targets, options).await)
}

/// One-shot selection of the fastest reachable target.
pub async fn select_best(targets: &[ProbeTarget], options: &ProbeOptions) -> Result<ProbeTarget, ProbeError> {
    let ranked = run_round(targets, options).await;
    ranked.require_best().map(|r| r.target.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::target::ProbeFailure;

    fn target(i: usize) -> ProbeTarget {
        ProbeTarget::new(format!("t{}", i + 1), "10.0.0.1", 443)
    }

    fn up(i: usize, latency: u64) -> ProbeResult {
        ProbeResult::reachable(i, target(i), latency)
    }

    fn down(i: usize) -> ProbeResult {
        ProbeResult::unreachable(i, target(i), ProbeFailure::Timeout)
    }

    fn names(list: &RankedList) -> Vec<&str> {
        list.entries().iter().map(|r| r.target.name.as_str()).collect()
    }

    #[test]
    fn five_targets_three_reachable() {
        // t1=50ms, t2=10ms, t3=30ms, t4 and t5 unreachable; completion order scrambled
        let results = vec![down(4), up(2, 30), up(0, 50), down(3), up(1, 10)];
        let ranked = rank(results);

        assert_eq!(names(&ranked), ["t2", "t3", "t1", "t4", "t5"]);
        assert_eq!(ranked.reachable_count(), 3);
        assert_eq!(ranked.selection().best, Some(target(1)));
        assert_eq!(ranked.require_best().unwrap().latency_ms, Some(10));
    }

    #[test]
    fn nothing_reachable_is_a_round_failure() {
        let ranked = rank(vec![down(2), down(0), down(3), down(1)]);

        assert_eq!(names(&ranked), ["t1", "t2", "t3", "t4"]);
        assert_eq!(ranked.selection().best, None);
        assert_eq!(
            ranked.require_best().unwrap_err(),
            ProbeError::NoReachableTargets { probed: 4 }
        );
    }

    #[test]
    fn equal_latencies_keep_input_order() {
        let ranked = rank(vec![up(3, 20), up(1, 20), up(2, 5), up(0, 20)]);
        assert_eq!(names(&ranked), ["t3", "t1", "t2", "t4"]);
    }

    #[test]
    fn permutations_rank_identically() {
        let base = vec![up(0, 40), down(1), up(2, 15), up(3, 40), down(4), up(5, 0)];
        let expected = rank(base.clone());

        let mut rotated = base.clone();
        for _ in 0..base.len() {
            rotated.rotate_left(1);
            assert_eq!(rank(rotated.clone()), expected);
        }
        let mut reversed = base;
        reversed.reverse();
        assert_eq!(rank(reversed), expected);
    }

    #[test]
    fn ordering_invariant_holds() {
        let ranked = rank(vec![up(0, 9), down(1), up(2, 3), down(3), up(4, 9), up(5, 1)]);
        let entries = ranked.entries();

        let split = ranked.reachable_count();
        assert!(entries[..split].iter().all(|r| r.reachable));
        assert!(entries[split..].iter().all(|r| !r.reachable));
        assert!(entries[..split].windows(2).all(|w| w[0].latency_ms <= w[1].latency_ms));
    }

    #[test]
    fn empty_round_has_no_selection() {
        let ranked = rank(Vec::new());
        assert!(ranked.is_empty());
        assert_eq!(ranked.selection(), Selection { best: None });
        assert!(ranked.require_best().is_err());
    }

    #[test]
    fn top_is_clamped() {
        let ranked = rank(vec![up(0, 1), up(1, 2)]);
        assert_eq!(ranked.top(10).len(), 2);
        assert_eq!(ranked.top(1)[0].target.name, "t1");
    }

    #[tokio::test]
    async fn select_best_on_unreachable_input_fails() {
        let targets = vec![ProbeTarget::new("a", "", 0), ProbeTarget::new("b", "127.0.0.1", 0)];
        let err = select_best(&targets, &ProbeOptions::default()).await.unwrap_err();
        assert_eq!(err, ProbeError::NoReachableTargets { probed: 2 });
    }

    #[tokio::test]
    async fn select_best_picks_the_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port() as i64;
        let targets = vec![
            ProbeTarget::new("broken", "", 0),
            ProbeTarget::new("alive", "127.0.0.1", port),
        ];
        let best = select_best(&targets, &ProbeOptions::default()).await.unwrap();
        assert_eq!(best.name, "alive");
    }
}
