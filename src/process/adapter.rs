//! Schema adapter: raw filing batch → canonical records. All knowledge of
//! the two source layouts stops here; downstream stages only ever see
//! [`CanonicalRecord`]s.
//!
//! Stage order matters and mirrors the published methodology: benefit-type
//! filter, entity-type filter, EIN normalization, date parsing. A missing
//! required column aborts the whole batch; a row that fails normalization
//! drops silently and is only visible in the aggregate counts.

use chrono::NaiveDate;
use tracing::debug;

use crate::error::PipelineError;
use crate::ingest::RawBatch;
use crate::schema::layout::{Layout, PLAN_TYPE_TOKEN};
use crate::schema::record::{normalize_ein, CanonicalRecord};

struct ResolvedColumns {
    pension: usize,
    date: usize,
    state: usize,
    ein: usize,
    entity: Option<usize>,
    name: Option<usize>,
    city: Option<usize>,
    plan_name: Option<usize>,
    participants: Option<usize>,
}

impl ResolvedColumns {
    /// Resolve the layout's columns against the batch header. Pension code,
    /// effective date, state, and EIN are required; the rest degrade to
    /// empty/None values when a year's export lacks them.
    fn resolve(batch: &RawBatch, layout: &Layout) -> Result<Self, PipelineError> {
        Ok(ResolvedColumns {
            pension: batch.require_column(layout.pension_col)?,
            date: batch.require_column(layout.date_col)?,
            state: batch.require_column(layout.state_col)?,
            ein: batch.require_column(layout.ein_col)?,
            entity: batch.column(layout.entity_col),
            name: batch.column(layout.name_col),
            city: batch.column(layout.city_col),
            plan_name: batch.column(layout.plan_name_col),
            participants: batch.column(layout.participants_col),
        })
    }
}

/// Normalize one raw batch into canonical records. Row order of the output
/// is not part of the contract; callers must not rely on it.
pub fn canonicalize(batch: &RawBatch, layout: &Layout) -> Result<Vec<CanonicalRecord>, PipelineError> {
    let cols = ResolvedColumns::resolve(batch, layout)?;

    let mut records = Vec::new();
    let mut non_plan_type = 0usize;
    let mut non_single_employer = 0usize;
    let mut bad_ein = 0usize;
    let mut bad_date = 0usize;

    for row in &batch.rows {
        let cell = |idx: usize| row.get(idx).unwrap_or("");

        // 1) 401(k) feature code, substring match on the benefit-code cell
        if !cell(cols.pension).contains(PLAN_TYPE_TOKEN) {
            non_plan_type += 1;
            continue;
        }

        // 2) single-employer entity code, when the column exists at all
        if let Some(entity) = cols.entity {
            if !layout.is_single_employer(cell(entity)) {
                non_single_employer += 1;
                continue;
            }
        }

        // 3) EIN: trim, strip float artifact, zero-pad; unusable → drop
        let Some(ein) = normalize_ein(cell(cols.ein)) else {
            bad_ein += 1;
            continue;
        };

        // 4) effective date; unparsable → drop, counted only here
        let Some(effective_date) = parse_effective_date(cell(cols.date)) else {
            bad_date += 1;
            continue;
        };

        let state = cell(cols.state).trim().to_ascii_uppercase();

        records.push(CanonicalRecord {
            ein,
            sponsor_name: cols.name.and_then(|i| clean_sponsor_name(cell(i))),
            plan_name: cols.plan_name.map(|i| cell(i).trim().to_string()).unwrap_or_default(),
            state,
            city: cols.city.map(|i| cell(i).trim().to_string()).unwrap_or_default(),
            effective_date,
            participants: cols.participants.and_then(|i| cell(i).trim().parse::<f64>().ok()),
            source: batch.label.clone(),
        });
    }

    debug!(
        batch = %batch.label,
        total = batch.len(),
        kept = records.len(),
        non_plan_type,
        non_single_employer,
        bad_ein,
        bad_date,
        "canonicalized batch"
    );

    Ok(records)
}

/// EFAST2 date cells are ISO `YYYY-MM-DD`; older extracts occasionally use
/// `MM/DD/YYYY`. Anything else fails the row.
fn parse_effective_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .ok()
}

/// Blank sponsor names and the "nan" artifact of float-coerced text columns
/// both mean "unknown".
fn clean_sponsor_name(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::layout::{FORM_5500, FORM_5500_SF};

    const F5500_HEADER: &str = "SPONS_DFE_EIN,TYPE_PENSION_BNFT_CODE,TYPE_PLAN_ENTITY_CD,\
PLAN_EFF_DATE,SPONS_DFE_MAIL_US_STATE,SPONSOR_DFE_NAME,SPONS_DFE_MAIL_US_CITY,PLAN_NAME,\
TOT_PARTCP_BOY_CNT";

    fn batch(rows: &[&str]) -> RawBatch {
        let content = format!("{F5500_HEADER}\n{}\n", rows.join("\n"));
        RawBatch::from_csv_str("Form5500_2023", &content).unwrap()
    }

    #[test]
    fn keeps_only_401k_single_employer_rows() {
        let b = batch(&[
            "123456789,2E2J,2,2023-06-01,CA,Acme Inc,Fresno,Acme 401k,12",
            "223456789,2E,2,2023-06-01,CA,No 401k,Fresno,Pension,40",
            "323456789,2J,3,2023-06-01,CA,Multi,Fresno,MEP,80",
        ]);
        let records = canonicalize(&b, &FORM_5500).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ein, "123456789");
        assert_eq!(records[0].sponsor_name.as_deref(), Some("Acme Inc"));
        assert_eq!(records[0].participants, Some(12.0));
        assert_eq!(records[0].source, "Form5500_2023");
    }

    #[test]
    fn entity_float_artifact_passes_the_filter() {
        let b = batch(&[
            "123456789,2J,2.0,2023-06-01,CA,A,X,P,1",
            "223456789,2J,2,2023-06-01,CA,B,X,P,1",
        ]);
        assert_eq!(canonicalize(&b, &FORM_5500).unwrap().len(), 2);
    }

    #[test]
    fn ein_is_normalized_and_unusable_eins_drop() {
        let b = batch(&[
            "1234.0,2J,2,2023-06-01,CA,A,X,P,1",
            "not-an-ein,2J,2,2023-06-01,CA,B,X,P,1",
        ]);
        let records = canonicalize(&b, &FORM_5500).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ein, "000001234");
    }

    #[test]
    fn unparsable_dates_drop_silently() {
        let b = batch(&[
            "123456789,2J,2,2023-06-01,CA,A,X,P,1",
            "223456789,2J,2,06/15/2023,CA,B,X,P,1",
            "323456789,2J,2,sometime,CA,C,X,P,1",
            "423456789,2J,2,,CA,D,X,P,1",
        ]);
        let records = canonicalize(&b, &FORM_5500).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].effective_date,
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap()
        );
    }

    #[test]
    fn state_is_upper_cased_and_name_artifacts_become_none() {
        let b = batch(&[
            "123456789,2J,2,2023-06-01,ca,nan,X,P,",
            "223456789,2J,2,2023-06-01, Or ,,X,P,n/a",
        ]);
        let records = canonicalize(&b, &FORM_5500).unwrap();
        assert_eq!(records[0].state, "CA");
        assert_eq!(records[0].sponsor_name, None);
        assert_eq!(records[0].participants, None);
        assert_eq!(records[1].state, "OR");
        assert_eq!(records[1].sponsor_name, None);
        assert_eq!(records[1].participants, None);
    }

    #[test]
    fn missing_required_column_aborts_the_batch() {
        // no TYPE_PENSION_BNFT_CODE column at all
        let b = RawBatch::from_csv_str(
            "Form5500_2019",
            "SPONS_DFE_EIN,PLAN_EFF_DATE,SPONS_DFE_MAIL_US_STATE\n123456789,2023-06-01,CA\n",
        )
        .unwrap();
        assert!(matches!(
            canonicalize(&b, &FORM_5500),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn missing_optional_columns_degrade_to_empty_fields() {
        let b = RawBatch::from_csv_str(
            "Form5500SF_2020",
            "SF_SPONS_EIN,SF_TYPE_PENSION_BNFT_CODE,SF_PLAN_EFF_DATE,SF_SPONS_US_STATE\n\
123456789,2J,2020-03-02,IL\n",
        )
        .unwrap();
        let records = canonicalize(&b, &FORM_5500_SF).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sponsor_name, None);
        assert_eq!(records[0].plan_name, "");
        assert_eq!(records[0].city, "");
        assert_eq!(records[0].participants, None);
    }

    #[test]
    fn sf_layout_uses_its_own_entity_code() {
        let content = "SF_SPONS_EIN,SF_TYPE_PENSION_BNFT_CODE,SF_PLAN_ENTITY_CD,SF_PLAN_EFF_DATE,SF_SPONS_US_STATE\n\
123456789,2J,1,2020-03-02,IL\n\
223456789,2J,2,2020-03-02,IL\n";
        let b = RawBatch::from_csv_str("Form5500SF_2020", content).unwrap();
        let records = canonicalize(&b, &FORM_5500_SF).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ein, "123456789");
    }
}
