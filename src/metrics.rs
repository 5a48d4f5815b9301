//! Engine counters with Prometheus text exposition

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for every engine operation
pub struct EngineMetrics {
    start_time: Instant,

    pub commands_handled: AtomicU64,
    pub commands_rejected: AtomicU64,

    pub wagers_proposed: AtomicU64,
    pub wagers_accepted: AtomicU64,
    pub wagers_expired: AtomicU64,
    pub wagers_superseded: AtomicU64,

    pub games_started: AtomicU64,
    pub games_finished: AtomicU64,
    pub penalties_applied: AtomicU64,
    pub penalties_failed: AtomicU64,

    pub giveaway_entries: AtomicU64,
    pub giveaway_draws: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            commands_handled: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            wagers_proposed: AtomicU64::new(0),
            wagers_accepted: AtomicU64::new(0),
            wagers_expired: AtomicU64::new(0),
            wagers_superseded: AtomicU64::new(0),
            games_started: AtomicU64::new(0),
            games_finished: AtomicU64::new(0),
            penalties_applied: AtomicU64::new(0),
            penalties_failed: AtomicU64::new(0),
            giveaway_entries: AtomicU64::new(0),
            giveaway_draws: AtomicU64::new(0),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Render all counters in the Prometheus text format
    pub fn to_prometheus_format(&self) -> String {
        let counters: [(&str, &str, &AtomicU64); 12] = [
            ("commands_handled_total", "Chat commands that produced a reply", &self.commands_handled),
            ("commands_rejected_total", "Chat commands answered with an error", &self.commands_rejected),
            ("wagers_proposed_total", "Wagers recorded as pending", &self.wagers_proposed),
            ("wagers_accepted_total", "Wagers settled by acceptance", &self.wagers_accepted),
            ("wagers_expired_total", "Wagers removed by the expiry timer", &self.wagers_expired),
            ("wagers_superseded_total", "Pending wagers replaced by a newer proposal", &self.wagers_superseded),
            ("roulette_games_started_total", "Elimination games started", &self.games_started),
            ("roulette_games_finished_total", "Elimination games played to the end", &self.games_finished),
            ("penalties_applied_total", "Penalties accepted by the moderation service", &self.penalties_applied),
            ("penalties_failed_total", "Penalties that could not be applied", &self.penalties_failed),
            ("giveaway_entries_total", "Participants entered into the giveaway", &self.giveaway_entries),
            ("giveaway_draws_total", "Giveaway winners drawn", &self.giveaway_draws),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP chatplay_{name} {help}\n# TYPE chatplay_{name} counter\nchatplay_{name} {}\n\n",
                value.load(Ordering::SeqCst)
            ));
        }

        output.push_str(&format!(
            "# HELP chatplay_uptime_seconds Process uptime\n# TYPE chatplay_uptime_seconds gauge\nchatplay_uptime_seconds {}\n",
            self.uptime().as_secs()
        ));

        output
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_output_contains_counters() {
        let metrics = EngineMetrics::new();
        EngineMetrics::incr(&metrics.wagers_proposed);
        EngineMetrics::incr(&metrics.wagers_proposed);
        EngineMetrics::incr(&metrics.penalties_failed);

        let text = metrics.to_prometheus_format();
        assert!(text.contains("chatplay_wagers_proposed_total 2"));
        assert!(text.contains("chatplay_penalties_failed_total 1"));
        assert!(text.contains("# TYPE chatplay_giveaway_draws_total counter"));
    }
}
