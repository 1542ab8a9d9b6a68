//! Canonical record types. `CanonicalRecord` is the layout-independent row
//! the pipeline operates on; `DatasetRow` is the persisted shape with the
//! joined contribution value. Serde field names match the published dataset
//! columns exactly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::layout::strip_float_suffix;

/// One normalized filing row. An instance only exists with a valid EIN and a
/// parsed effective date; rows failing either are dropped at the adapter
/// boundary, so downstream stages never see a null key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// 9-digit zero-padded sponsor EIN, the dedup key.
    pub ein: String,
    /// None when the source cell was blank or a serialized "nan".
    pub sponsor_name: Option<String>,
    pub plan_name: String,
    /// Two-letter state code, upper-cased.
    pub state: String,
    pub city: String,
    pub effective_date: NaiveDate,
    pub participants: Option<f64>,
    /// Originating batch, e.g. `Form5500SF_2023`.
    pub source: String,
}

/// Persisted dataset row: a canonical record plus the left-joined employer
/// contribution. Column names follow the published CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(rename = "EIN")]
    pub ein: String,
    #[serde(rename = "FIRM_NAME")]
    pub firm_name: Option<String>,
    #[serde(rename = "PLAN_NAME")]
    pub plan_name: String,
    #[serde(rename = "STATE")]
    pub state: String,
    #[serde(rename = "CITY")]
    pub city: String,
    #[serde(rename = "PLAN_EFFECTIVE_DATE")]
    pub plan_effective_date: NaiveDate,
    #[serde(rename = "EMPLOYEE_COUNT")]
    pub employee_count: Option<f64>,
    #[serde(rename = "SOURCE")]
    pub source: String,
    #[serde(rename = "EMPLOYER_CONTRIBUTION")]
    pub employer_contribution: Option<f64>,
}

impl DatasetRow {
    pub fn from_record(record: CanonicalRecord, contribution: Option<f64>) -> Self {
        DatasetRow {
            ein: record.ein,
            firm_name: record.sponsor_name,
            plan_name: record.plan_name,
            state: record.state,
            city: record.city,
            plan_effective_date: record.effective_date,
            employee_count: record.participants,
            source: record.source,
            employer_contribution: contribution,
        }
    }
}

/// Normalize a raw EIN cell: trim, strip the ".0" float artifact, require
/// digits only, left-pad with zeros to 9 characters. Anything else is
/// unusable as a dedup key and returns None.
pub fn normalize_ein(raw: &str) -> Option<String> {
    let value = strip_float_suffix(raw.trim());
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{value:0>9}"))
}
