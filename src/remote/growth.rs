// ABOUTME: Vulnerability count snapshots and the monthly growth-rate trend derived from them.
// ABOUTME: Pure over the snapshot series so it can be tested without the API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sev| sev.as_str() == s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body of the counts endpoint. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VulnCounts {
    #[serde(default)]
    pub items: Vec<CountSnapshot>,
}

impl VulnCounts {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CountSnapshot {
    #[serde(rename = "vulnCounts", default)]
    pub vuln_counts: Vec<SeverityCount>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeverityCount {
    pub severity: String,
    #[serde(default)]
    pub count: u64,
}

pub type GrowthRates = BTreeMap<Severity, f64>;

/// Per severity: average absolute day-over-day change scaled to 30 days,
/// as a fraction of the latest count. `None` for an empty series.
pub fn growth_rates(snapshots: &[CountSnapshot]) -> Option<GrowthRates> {
    let first = snapshots.first()?;

    let mut previous: BTreeMap<Severity, u64> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
    for entry in &first.vuln_counts {
        if let Some(sev) = Severity::parse(&entry.severity) {
            previous.insert(sev, entry.count);
        }
    }

    let mut changes: BTreeMap<Severity, f64> = Severity::ALL.iter().map(|s| (*s, 0.0)).collect();
    for snapshot in snapshots {
        for entry in &snapshot.vuln_counts {
            let Some(sev) = Severity::parse(&entry.severity) else {
                continue;
            };
            let prev = previous.entry(sev).or_default();
            *changes.entry(sev).or_default() += entry.count.abs_diff(*prev) as f64;
            *prev = entry.count;
        }
    }

    let days = snapshots.len() as f64;
    let rates = changes
        .into_iter()
        .map(|(sev, total)| {
            let monthly = total / days * DAYS_PER_MONTH;
            let latest = previous.get(&sev).copied().unwrap_or(0);
            let ratio = if latest > 0 { monthly / latest as f64 } else { 0.0 };
            (sev, ratio)
        })
        .collect();
    Some(rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(counts: &[(&str, u64)]) -> CountSnapshot {
        CountSnapshot {
            vuln_counts: counts
                .iter()
                .map(|(s, c)| SeverityCount {
                    severity: s.to_string(),
                    count: *c,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_series_has_no_rates() {
        assert!(growth_rates(&[]).is_none());
    }

    #[test]
    fn rates_scale_average_change_to_latest_count() {
        let series = [
            snapshot(&[("CRITICAL", 2), ("HIGH", 10)]),
            snapshot(&[("CRITICAL", 4), ("HIGH", 10)]),
            snapshot(&[("CRITICAL", 3), ("HIGH", 10)]),
        ];
        let rates = growth_rates(&series).unwrap();
        // |4-2| + |3-4| = 3 over 3 days -> 1/day -> 30/month, latest 3
        assert!((rates[&Severity::Critical] - 10.0).abs() < 1e-9);
        assert_eq!(rates[&Severity::High], 0.0);
        assert_eq!(rates[&Severity::Low], 0.0);
        assert_eq!(rates.len(), 5);
    }

    #[test]
    fn zero_latest_count_yields_zero() {
        let series = [snapshot(&[("LOW", 5)]), snapshot(&[("LOW", 0)])];
        let rates = growth_rates(&series).unwrap();
        assert_eq!(rates[&Severity::Low], 0.0);
    }

    #[test]
    fn unrecognized_severities_are_ignored() {
        let series = [snapshot(&[("NEGLIGIBLE", 5), ("MEDIUM", 1)])];
        let rates = growth_rates(&series).unwrap();
        assert_eq!(rates[&Severity::Medium], 0.0);
    }
}
