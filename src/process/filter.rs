//! Mandate filter: state membership, then strict cutoff comparison. Pure:
//! the same pool and policy always yield the same output set, which is what
//! lets both policy versions share one canonical pool.

use tracing::debug;

use crate::policy::PolicyVersion;
use crate::schema::record::CanonicalRecord;

/// Keep records whose state has a cutoff entry and whose effective date is
/// strictly after it. A date equal to the cutoff fails the mandate test; a
/// state absent from the table is dropped, never passed through.
pub fn apply(pool: &[CanonicalRecord], policy: &PolicyVersion) -> Vec<CanonicalRecord> {
    let kept: Vec<CanonicalRecord> = pool
        .iter()
        .filter(|record| {
            policy
                .cutoff(&record.state)
                .is_some_and(|cutoff| record.effective_date > cutoff)
        })
        .cloned()
        .collect();

    debug!(
        policy = policy.name,
        input = pool.len(),
        kept = kept.len(),
        "applied mandate filter"
    );
    kept
}
