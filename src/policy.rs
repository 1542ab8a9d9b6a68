//! Mandate cutoff tables. Each policy version maps a state code to the date
//! after which a plan's effective date must fall to count as post-mandate.
//! The pipeline takes a version as a pure parameter and never branches on
//! which one it is; the tables are the only difference between builds.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// One named cutoff table. `BTreeMap` keeps state iteration order stable so
/// summaries and logs come out in the same order every run.
#[derive(Debug, Clone)]
pub struct PolicyVersion {
    pub name: &'static str,
    cutoffs: BTreeMap<&'static str, NaiveDate>,
}

impl PolicyVersion {
    fn new(name: &'static str, entries: &[(&'static str, (i32, u32, u32))]) -> Self {
        let cutoffs = entries
            .iter()
            .map(|&(st, (y, m, d))| {
                let date = NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap_or_else(|| panic!("invalid cutoff date for {st} in {name}"));
                (st, date)
            })
            .collect();
        PolicyVersion { name, cutoffs }
    }

    /// Cutoff for a state, or `None` when the state has no mandate entry.
    /// Callers must treat `None` as "drop the record", never as a pass.
    pub fn cutoff(&self, state: &str) -> Option<NaiveDate> {
        self.cutoffs.get(state).copied()
    }

    pub fn states(&self) -> impl Iterator<Item = (&'static str, NaiveDate)> + '_ {
        self.cutoffs.iter().map(|(&st, &d)| (st, d))
    }

    pub fn contains(&self, state: &str) -> bool {
        self.cutoffs.contains_key(state)
    }
}

/// Legislation / first-regulation dates. The broader reading of "mandate in
/// effect": counts firms that adopted once the requirement was on the books.
pub static V1_INCLUSIVE: Lazy<PolicyVersion> = Lazy::new(|| {
    PolicyVersion::new(
        "v1-inclusive",
        &[
            ("OR", (2017, 11, 1)),
            ("IL", (2018, 5, 1)),
            ("CA", (2018, 11, 1)),
            ("CT", (2022, 4, 1)),
            ("MD", (2022, 9, 1)),
            ("CO", (2023, 1, 1)),
            ("VA", (2023, 7, 1)),
            ("ME", (2024, 1, 1)),
            ("DE", (2024, 1, 1)),
            ("NJ", (2024, 3, 1)),
        ],
    )
});

/// Program launch dates. Narrower and more defensible: counts only firms
/// that adopted after the state program was actually accepting enrollments.
pub static V2_CONSERVATIVE: Lazy<PolicyVersion> = Lazy::new(|| {
    PolicyVersion::new(
        "v2-conservative",
        &[
            ("OR", (2017, 11, 1)),
            ("IL", (2018, 11, 1)),
            ("CA", (2019, 7, 1)),
            ("CT", (2022, 4, 1)),
            ("MD", (2022, 9, 1)),
            ("CO", (2023, 1, 1)),
            ("VA", (2023, 7, 1)),
            ("ME", (2024, 1, 1)),
            ("DE", (2024, 7, 1)),
            ("NJ", (2024, 6, 30)),
        ],
    )
});

pub fn all_versions() -> Vec<&'static PolicyVersion> {
    vec![&V1_INCLUSIVE, &V2_CONSERVATIVE]
}

pub fn find_version(name: &str) -> Option<&'static PolicyVersion> {
    all_versions().into_iter().find(|v| v.name == name)
}

/// Display names for reports. Cosmetic only; filtering never consults this.
pub fn program_name(state: &str) -> &'static str {
    match state {
        "OR" => "OregonSaves",
        "IL" => "Secure Choice",
        "CA" => "CalSavers",
        "CT" => "MyCTSavings",
        "MD" => "MarylandSaves",
        "CO" => "SecureSavings",
        "VA" => "RetirePath",
        "ME" => "Maine Retirement Savings",
        "DE" => "EARNS",
        "NJ" => "RetireReady NJ",
        _ => "",
    }
}
