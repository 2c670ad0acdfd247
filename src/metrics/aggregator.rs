//! Pure window statistics over probe records. Nothing here touches a store.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::db::models::{AlertBreakdown, AlertFiring, AlertRule, ProbeRecord, Target, TargetMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    pub traffic_tps: f64,
    pub error_rate_percent: f64,
    pub latency_p99_ms: i64,
}

/// Records per second of window; 0 for an empty or inverted window.
pub fn traffic_rate(count: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    if seconds <= 0.0 {
        return 0.0;
    }
    count as f64 / seconds
}

pub fn error_rate(records: &[ProbeRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let failed = records.iter().filter(|r| !r.is_success).count();
    failed as f64 / records.len() as f64 * 100.0
}

/// Nearest-rank 99th percentile of successful latencies.
pub fn latency_p99(records: &[ProbeRecord]) -> i64 {
    let mut latencies: Vec<i64> = records
        .iter()
        .filter(|r| r.is_success)
        .map(|r| r.latency_ms)
        .collect();
    if latencies.is_empty() {
        return 0;
    }
    latencies.sort_unstable();
    let n = latencies.len();
    let rank = (n as f64 * 0.99).ceil() as usize;
    latencies[rank.saturating_sub(1).min(n - 1)]
}

pub fn aggregate(records: &[ProbeRecord], start: DateTime<Utc>, end: DateTime<Utc>) -> WindowStats {
    WindowStats {
        traffic_tps: traffic_rate(records.len(), start, end),
        error_rate_percent: error_rate(records),
        latency_p99_ms: latency_p99(records),
    }
}

/// One entry per target that has records in the window, busiest first.
/// Records of targets missing from `targets` are ignored.
pub fn breakdown_by_target(
    records: &[ProbeRecord],
    targets: &[Target],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<TargetMetrics> {
    let by_id: HashMap<i32, &Target> = targets.iter().map(|t| (t.id, t)).collect();

    let mut grouped: BTreeMap<i32, Vec<ProbeRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.target_id).or_default().push(record.clone());
    }

    let mut breakdown: Vec<TargetMetrics> = grouped
        .into_iter()
        .filter_map(|(target_id, records)| {
            let target = by_id.get(&target_id)?;
            let stats = aggregate(&records, start, end);
            Some(TargetMetrics {
                target_id,
                target_name: target.name.clone(),
                environment: target.environment.clone().unwrap_or_default(),
                traffic_tps: stats.traffic_tps,
                error_rate_percent: stats.error_rate_percent,
                latency_p99_ms: stats.latency_p99_ms,
            })
        })
        .collect();

    // Stable sort keeps ascending target id among equal rates.
    breakdown.sort_by(|a, b| b.traffic_tps.total_cmp(&a.traffic_tps));
    breakdown
}

/// Unresolved firings counted per rule name, largest count first.
pub fn alert_breakdown(firings: &[(AlertFiring, AlertRule)]) -> Vec<AlertBreakdown> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, rule) in firings {
        *counts.entry(rule.name.as_str()).or_default() += 1;
    }
    let mut breakdown: Vec<AlertBreakdown> = counts
        .into_iter()
        .map(|(name, count)| AlertBreakdown {
            alert_name: name.to_string(),
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AlertKind, ComparisonOperator, RuleScope};
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
    }

    fn rec(target_id: i32, ok: bool, latency_ms: i64) -> ProbeRecord {
        ProbeRecord {
            target_id,
            timestamp: start(),
            is_success: ok,
            status_code: if ok { 200 } else { 0 },
            latency_ms,
            response_body: None,
            error_message: None,
        }
    }

    fn target(id: i32, env: Option<&str>) -> Target {
        Target {
            id,
            name: format!("svc-{id}"),
            url: "http://localhost".into(),
            method: "GET".into(),
            headers: None,
            body: None,
            check_interval_seconds: 60,
            timeout_seconds: 5,
            is_active: true,
            environment: env.map(str::to_string),
        }
    }

    #[test]
    fn p99_of_ten_values_is_the_largest() {
        let records: Vec<_> = (1..=10).map(|i| rec(1, true, i * 10)).collect();
        assert_eq!(latency_p99(&records), 100);
    }

    #[test]
    fn p99_ignores_failures_and_handles_small_sets() {
        assert_eq!(latency_p99(&[]), 0);
        assert_eq!(latency_p99(&[rec(1, false, 900)]), 0);
        assert_eq!(latency_p99(&[rec(1, true, 42), rec(1, false, 900)]), 42);

        // ceil(200 * 0.99) - 1 = 197
        let records: Vec<_> = (1..=200).rev().map(|i| rec(1, true, i)).collect();
        assert_eq!(latency_p99(&records), 198);
    }

    #[test]
    fn one_failure_in_four_is_twenty_five_percent() {
        let records = vec![rec(1, true, 1), rec(1, true, 1), rec(1, false, 1), rec(1, true, 1)];
        assert_eq!(error_rate(&records), 25.0);
        assert_eq!(error_rate(&[]), 0.0);
    }

    #[test]
    fn zero_or_negative_window_has_no_traffic() {
        assert_eq!(traffic_rate(100, start(), start()), 0.0);
        assert_eq!(traffic_rate(100, start(), start() - Duration::seconds(5)), 0.0);
        assert_eq!(traffic_rate(120, start(), start() + Duration::minutes(1)), 2.0);
    }

    #[test]
    fn breakdown_sorted_by_traffic() {
        let records = vec![
            rec(1, true, 10),
            rec(2, true, 10),
            rec(2, false, 10),
            rec(2, true, 30),
            rec(99, true, 10),
        ];
        let targets = vec![target(1, Some("prod")), target(2, None)];
        let end = start() + Duration::seconds(10);

        let breakdown = breakdown_by_target(&records, &targets, start(), end);

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].target_id, 2);
        assert!((breakdown[0].traffic_tps - 0.3).abs() < 1e-9);
        assert!((breakdown[0].error_rate_percent - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(breakdown[0].latency_p99_ms, 30);
        assert_eq!(breakdown[0].environment, "");
        assert_eq!(breakdown[1].target_name, "svc-1");
        assert_eq!(breakdown[1].environment, "prod");
    }

    #[test]
    fn alerts_grouped_by_rule_name() {
        let rule = |id: i32, name: &str| AlertRule {
            id,
            name: name.into(),
            kind: AlertKind::Latency,
            operator: ComparisonOperator::GreaterThan,
            threshold: 1.0,
            scope: RuleScope::Target(1),
            is_active: true,
        };
        let firing = |rule_id| AlertFiring::new(rule_id, start(), "m".into());
        let firings = vec![
            (firing(1), rule(1, "slow")),
            (firing(2), rule(2, "down")),
            (firing(1), rule(1, "slow")),
            (firing(3), rule(3, "broken")),
        ];

        let breakdown = alert_breakdown(&firings);
        let flat: Vec<(&str, usize)> = breakdown
            .iter()
            .map(|b| (b.alert_name.as_str(), b.count))
            .collect();
        assert_eq!(flat, vec![("slow", 2), ("broken", 1), ("down", 1)]);
    }
}
