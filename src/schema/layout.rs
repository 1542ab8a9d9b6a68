//! The two known filing layouts. EFAST2 publishes the long Form 5500 and the
//! short-form 5500-SF as separate bulk files with different column names and,
//! annoyingly, different entity-code values for "single employer" (2 on the
//! long form, 1 on the short form). Everything layout-specific lives here so
//! the rest of the pipeline only sees canonical records.

/// Pension benefit feature code identifying a 401(k) plan. Matched as a
/// case-sensitive substring of the benefit-code cell, which concatenates
/// multiple two-character feature codes.
pub const PLAN_TYPE_TOKEN: &str = "2J";

/// Column roles for one source layout plus its single-employer entity codes
/// and the on-disk naming of its yearly bulk files.
#[derive(Debug)]
pub struct Layout {
    /// Short tag used in provenance labels, e.g. `Form5500_2021`.
    pub name: &'static str,
    /// Subdirectory of the data dir holding this layout's yearly files.
    pub folder: &'static str,
    /// Yearly files match `{file_stem}{year}` case-insensitively.
    pub file_stem: &'static str,

    pub pension_col: &'static str,
    pub entity_col: &'static str,
    pub date_col: &'static str,
    pub state_col: &'static str,
    pub ein_col: &'static str,
    pub name_col: &'static str,
    pub city_col: &'static str,
    pub plan_name_col: &'static str,
    pub participants_col: &'static str,

    /// Entity codes denoting a single-employer plan in this layout. The raw
    /// cell may carry a float artifact ("2.0" for "2"); both spellings are
    /// listed and comparison strips the suffix from both sides.
    pub single_employer_codes: &'static [&'static str],
}

impl Layout {
    /// True when a raw entity-type cell denotes a single-employer plan.
    /// "2" and "2.0" are the same code.
    pub fn is_single_employer(&self, raw: &str) -> bool {
        let value = strip_float_suffix(raw.trim());
        self.single_employer_codes
            .iter()
            .any(|code| strip_float_suffix(code) == value)
    }

    pub fn label(&self, year: i32) -> String {
        format!("{}_{}", self.name, year)
    }
}

/// Drop a trailing ".0" left over from numeric columns round-tripping
/// through a float representation upstream. A known quirk of the bulk
/// exports; applies to entity codes and EINs alike.
pub fn strip_float_suffix(value: &str) -> &str {
    value.strip_suffix(".0").unwrap_or(value)
}

pub static FORM_5500: Layout = Layout {
    name: "Form5500",
    folder: "form5500",
    file_stem: "f_5500_",
    pension_col: "TYPE_PENSION_BNFT_CODE",
    entity_col: "TYPE_PLAN_ENTITY_CD",
    date_col: "PLAN_EFF_DATE",
    state_col: "SPONS_DFE_MAIL_US_STATE",
    ein_col: "SPONS_DFE_EIN",
    name_col: "SPONSOR_DFE_NAME",
    city_col: "SPONS_DFE_MAIL_US_CITY",
    plan_name_col: "PLAN_NAME",
    participants_col: "TOT_PARTCP_BOY_CNT",
    single_employer_codes: &["2", "2.0"],
};

pub static FORM_5500_SF: Layout = Layout {
    name: "Form5500SF",
    folder: "form5500sf",
    file_stem: "f_5500_sf_",
    pension_col: "SF_TYPE_PENSION_BNFT_CODE",
    entity_col: "SF_PLAN_ENTITY_CD",
    date_col: "SF_PLAN_EFF_DATE",
    state_col: "SF_SPONS_US_STATE",
    ein_col: "SF_SPONS_EIN",
    name_col: "SF_SPONSOR_NAME",
    city_col: "SF_SPONS_US_CITY",
    plan_name_col: "SF_PLAN_NAME",
    participants_col: "SF_TOT_PARTCP_BOY_CNT",
    single_employer_codes: &["1", "1.0"],
};

/// Both layouts, in the order batches are processed within a year.
pub fn all_layouts() -> [&'static Layout; 2] {
    [&FORM_5500, &FORM_5500_SF]
}
