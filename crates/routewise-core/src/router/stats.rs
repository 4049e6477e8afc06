//! Running routing statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{DecisionTier, RouterDecision};
use crate::route::Route;

/// Cumulative counters over every decision since creation or the last reset.
///
/// Averages are kept as incremental means, so no history is retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterStats {
    pub total: u64,
    pub bypassed: u64,
    pub by_route: BTreeMap<Route, u64>,
    pub by_tier: BTreeMap<DecisionTier, u64>,
    pub avg_latency_ms: f64,
    pub avg_confidence: f64,
    pub since: DateTime<Utc>,
}

impl Default for RouterStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterStats {
    pub fn new() -> Self {
        Self {
            total: 0,
            bypassed: 0,
            by_route: Route::ALL.iter().map(|r| (*r, 0)).collect(),
            by_tier: BTreeMap::new(),
            avg_latency_ms: 0.0,
            avg_confidence: 0.0,
            since: Utc::now(),
        }
    }

    pub(crate) fn record(&mut self, decision: &RouterDecision) {
        self.total += 1;
        if decision.bypassed {
            self.bypassed += 1;
        }
        *self.by_route.entry(decision.route).or_insert(0) += 1;
        *self.by_tier.entry(decision.tier).or_insert(0) += 1;

        let n = self.total as f64;
        self.avg_latency_ms += (decision.latency_ms as f64 - self.avg_latency_ms) / n;
        self.avg_confidence += (decision.confidence - self.avg_confidence) / n;
    }

    pub fn route_count(&self, route: Route) -> u64 {
        self.by_route.get(&route).copied().unwrap_or(0)
    }

    pub fn tier_count(&self, tier: DecisionTier) -> u64 {
        self.by_tier.get(&tier).copied().unwrap_or(0)
    }

    /// Fraction of decisions that skipped classification
    pub fn bypass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.bypassed as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(route: Route, confidence: f64, latency_ms: u64, bypassed: bool) -> RouterDecision {
        RouterDecision {
            route,
            confidence,
            reasoning: String::new(),
            complexity_signals: Vec::new(),
            bypassed,
            latency_ms,
            tier: if bypassed {
                DecisionTier::Bypass
            } else {
                DecisionTier::Heuristic
            },
        }
    }

    #[test]
    fn test_new_stats_are_zeroed() {
        let stats = RouterStats::new();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.bypass_rate(), 0.0);
        for route in Route::ALL {
            assert_eq!(stats.route_count(route), 0);
        }
    }

    #[test]
    fn test_incremental_means_match_arithmetic_mean() {
        let replay = [
            decision(Route::Fast, 0.95, 0, true),
            decision(Route::Deep, 0.75, 120, false),
            decision(Route::Standard, 0.5, 340, false),
            decision(Route::Creative, 0.75, 95, false),
            decision(Route::Fast, 0.95, 1, true),
            decision(Route::Research, 0.8, 410, false),
            decision(Route::Standard, 0.6, 7, false),
        ];
        let mut stats = RouterStats::new();
        for d in &replay {
            stats.record(d);
        }

        let n = replay.len() as f64;
        let mean_latency = replay.iter().map(|d| d.latency_ms as f64).sum::<f64>() / n;
        let mean_confidence = replay.iter().map(|d| d.confidence).sum::<f64>() / n;
        assert!((stats.avg_latency_ms - mean_latency).abs() < 1e-9);
        assert!((stats.avg_confidence - mean_confidence).abs() < 1e-9);

        assert_eq!(stats.total, 7);
        assert_eq!(stats.bypassed, 2);
        assert_eq!(stats.route_count(Route::Fast), 2);
        assert_eq!(stats.route_count(Route::Standard), 2);
        assert_eq!(stats.route_count(Route::Deep), 1);
        assert_eq!(stats.tier_count(DecisionTier::Bypass), 2);
        assert_eq!(stats.tier_count(DecisionTier::Classifier), 0);
        assert!((stats.bypass_rate() - 2.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_stats_serialize_route_keys() {
        let mut stats = RouterStats::new();
        stats.record(&decision(Route::Deep, 0.7, 10, false));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["by_route"]["deep"], 1);
        assert_eq!(json["by_tier"]["heuristic"], 1);
    }
}
