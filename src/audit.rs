//! Independent validation of a finished dataset. Everything here re-derives
//! the pipeline's invariants from the persisted rows alone; it shares no
//! state with the build and never repairs anything, it only reports.

use std::collections::{BTreeMap, HashSet};

use chrono::Datelike;

use crate::policy::PolicyVersion;
use crate::schema::record::DatasetRow;

/// Outcome of one invariant check.
#[derive(Debug)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// The three hard invariants: every effective date strictly after its
/// state's cutoff, no duplicate EINs, no states outside the policy table.
pub fn invariant_checks(rows: &[DatasetRow], policy: &PolicyVersion) -> Vec<Check> {
    vec![
        mandate_check(rows, policy),
        uniqueness_check(rows),
        state_check(rows, policy),
    ]
}

fn mandate_check(rows: &[DatasetRow], policy: &PolicyVersion) -> Check {
    let mut violations = 0usize;
    for row in rows {
        match policy.cutoff(&row.state) {
            // equality violates the strictly-after rule
            Some(cutoff) if row.plan_effective_date > cutoff => {}
            _ => violations += 1,
        }
    }
    Check {
        name: "effective dates strictly after cutoff",
        passed: violations == 0,
        detail: format!("{violations} of {} rows violate the cutoff", rows.len()),
    }
}

fn uniqueness_check(rows: &[DatasetRow]) -> Check {
    let mut seen = HashSet::with_capacity(rows.len());
    let duplicates = rows.iter().filter(|r| !seen.insert(r.ein.as_str())).count();
    Check {
        name: "EIN uniqueness",
        passed: duplicates == 0,
        detail: format!("{} rows, {} duplicate EINs", rows.len(), duplicates),
    }
}

fn state_check(rows: &[DatasetRow], policy: &PolicyVersion) -> Check {
    let unexpected: HashSet<&str> = rows
        .iter()
        .map(|r| r.state.as_str())
        .filter(|s| !policy.contains(s))
        .collect();
    Check {
        name: "only mandate states present",
        passed: unexpected.is_empty(),
        detail: if unexpected.is_empty() {
            "all states are configured mandate states".to_string()
        } else {
            let mut list: Vec<&str> = unexpected.into_iter().collect();
            list.sort_unstable();
            format!("unexpected states: {}", list.join(", "))
        },
    }
}

/// Null / blank share per nullable-ish column.
#[derive(Debug)]
pub struct NullStat {
    pub column: &'static str,
    pub nulls: usize,
    pub share: f64,
}

pub fn null_profile(rows: &[DatasetRow]) -> Vec<NullStat> {
    let total = rows.len();
    let stat = |column: &'static str, nulls: usize| NullStat {
        column,
        nulls,
        share: if total == 0 { 0.0 } else { nulls as f64 / total as f64 },
    };
    vec![
        stat("FIRM_NAME", rows.iter().filter(|r| r.firm_name.is_none()).count()),
        stat("PLAN_NAME", rows.iter().filter(|r| r.plan_name.is_empty()).count()),
        stat("CITY", rows.iter().filter(|r| r.city.is_empty()).count()),
        stat(
            "EMPLOYEE_COUNT",
            rows.iter().filter(|r| r.employee_count.is_none()).count(),
        ),
        stat(
            "EMPLOYER_CONTRIBUTION",
            rows.iter().filter(|r| r.employer_contribution.is_none()).count(),
        ),
    ]
}

/// Record counts per originating batch.
pub fn source_breakdown(rows: &[DatasetRow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.source.clone()).or_insert(0) += 1;
    }
    counts
}

/// Record counts per plan-effective year.
pub fn year_histogram(rows: &[DatasetRow]) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.plan_effective_date.year()).or_insert(0) += 1;
    }
    counts
}

/// Distribution sketch of the employee counts, for eyeballing whether the
/// headcount column is sane (a handful of huge plans is normal; thousands
/// of zeros is not).
#[derive(Debug)]
pub struct HeadcountSummary {
    pub n: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    pub zeros: usize,
    pub over_10k: usize,
}

pub fn headcount_summary(rows: &[DatasetRow]) -> Option<HeadcountSummary> {
    let mut values: Vec<f64> = rows.iter().filter_map(|r| r.employee_count).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("headcounts are finite"));

    let n = values.len();
    Some(HeadcountSummary {
        n,
        min: values[0],
        q1: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q3: quantile(&values, 0.75),
        max: values[n - 1],
        mean: values.iter().sum::<f64>() / n as f64,
        zeros: values.iter().filter(|&&v| v == 0.0).count(),
        over_10k: values.iter().filter(|&&v| v > 10_000.0).count(),
    })
}

/// Linear interpolation between closest ranks, over a pre-sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let weight = position - low as f64;
        sorted[low] * (1.0 - weight) + sorted[high] * weight
    }
}
