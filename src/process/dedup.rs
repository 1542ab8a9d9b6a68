//! One record per EIN, most recent plan effective date wins. Not an
//! aggregate: the surviving record is taken whole, and recency is the only
//! tie-break signal. The stable sort means records sharing a date resolve
//! to whichever came first in the pre-sort pool, so the pool's assembly
//! order must itself be deterministic (see the discovery ordering).

use std::collections::HashSet;
use tracing::debug;

use crate::schema::record::CanonicalRecord;

/// Sort by effective date descending (stable) and keep the first record
/// seen per EIN.
pub fn latest_per_ein(mut records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let input = records.len();
    records.sort_by(|a, b| b.effective_date.cmp(&a.effective_date));

    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    records.retain(|record| seen.insert(record.ein.clone()));

    debug!(input, unique = records.len(), "deduplicated by EIN");
    records
}
