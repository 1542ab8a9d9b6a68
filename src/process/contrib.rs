//! Employer-contribution join. Schedule H (large plans) and Schedule I
//! (small plans) carry an employer-contribution amount keyed by sponsor EIN.
//! Those files are folded into one EIN → value map, then left-joined onto
//! the deduplicated pool. Most short-form filers submit neither schedule,
//! so low match rates are expected and reported, not treated as failure.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::ingest::RawBatch;
use crate::schema::record::{normalize_ein, CanonicalRecord, DatasetRow};

/// Immutable EIN → contribution map, built once per run and shared read-only
/// across policy versions.
#[derive(Debug, Default)]
pub struct ContributionMap {
    values: HashMap<String, f64>,
}

impl ContributionMap {
    /// Fold (EIN, value) pairs in iteration order; a later pair for the same
    /// EIN replaces the earlier one. Positional last-seen, deliberately not
    /// a max or a mean, so input order must be pinned by the caller.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, f64)>) -> Self {
        let mut values = HashMap::new();
        for (ein, value) in pairs {
            values.insert(ein, value);
        }
        ContributionMap { values }
    }

    pub fn get(&self, ein: &str) -> Option<f64> {
        self.values.get(ein).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Match bookkeeping from one join, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinStats {
    pub matched: usize,
    pub total: usize,
}

impl JoinStats {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64
        }
    }
}

/// Pull (EIN, contribution) pairs out of one schedule file, in row order.
///
/// Schedule exports are not one of the two declared filing layouts, so
/// column resolution here is the looser published rule: the EIN column is
/// the first whose name contains both `SPONS` and `EIN` (falling back to
/// the first containing `EIN`), and the contribution column is the first
/// containing both `EMPLR` and `CONTRIB`. A file resolving neither is
/// skipped with a warning rather than failing the run.
pub fn extract_pairs(batch: &RawBatch) -> Vec<(String, f64)> {
    let Some((ein_idx, contrib_idx)) = resolve_schedule_columns(batch) else {
        warn!(batch = %batch.label, "no EIN/contribution columns; skipping schedule file");
        return Vec::new();
    };

    let mut pairs = Vec::new();
    let mut unparsable = 0usize;
    for row in &batch.rows {
        let Some(ein) = row.get(ein_idx).and_then(normalize_ein) else {
            unparsable += 1;
            continue;
        };
        // unparsable or non-finite amounts are discarded, never zeroed
        match row.get(contrib_idx).map(str::trim).and_then(|v| v.parse::<f64>().ok()) {
            Some(value) if value.is_finite() => pairs.push((ein, value)),
            _ => unparsable += 1,
        }
    }

    debug!(
        batch = %batch.label,
        pairs = pairs.len(),
        unparsable,
        "extracted contribution pairs"
    );
    pairs
}

fn resolve_schedule_columns(batch: &RawBatch) -> Option<(usize, usize)> {
    let upper: Vec<String> = batch
        .headers
        .iter()
        .map(|h| h.to_ascii_uppercase())
        .collect();

    let ein_idx = upper
        .iter()
        .position(|h| h.contains("SPONS") && h.contains("EIN"))
        .or_else(|| upper.iter().position(|h| h.contains("EIN")))?;
    let contrib_idx = upper
        .iter()
        .position(|h| h.contains("EMPLR") && h.contains("CONTRIB"))?;

    Some((ein_idx, contrib_idx))
}

/// Left-join the contribution map onto a deduplicated pool. Records without
/// a match keep an explicit None, never a default of zero.
pub fn left_join(
    records: Vec<CanonicalRecord>,
    contributions: &ContributionMap,
) -> (Vec<DatasetRow>, JoinStats) {
    let total = records.len();
    let mut matched = 0usize;

    let rows: Vec<DatasetRow> = records
        .into_iter()
        .map(|record| {
            let value = contributions.get(&record.ein);
            if value.is_some() {
                matched += 1;
            }
            DatasetRow::from_record(record, value)
        })
        .collect();

    (rows, JoinStats { matched, total })
}
