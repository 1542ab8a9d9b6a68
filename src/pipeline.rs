//! Orchestration. One run: discover batches in pinned order, normalize them
//! all into a single canonical pool, build the contribution map once, then
//! produce each policy version independently from the same two read-only
//! inputs. The only thing that differs between versions is the cutoff table
//! handed to the filter.

use rayon::prelude::*;
use serde::Serialize;
use std::{ops::RangeInclusive, path::PathBuf};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::ingest::{filing_sources, schedule_sources, FilingSource, RawBatch, ScheduleSource};
use crate::policy::PolicyVersion;
use crate::process::{canonicalize, contrib, filter, latest_per_ein, ContributionMap, JoinStats};
use crate::report;
use crate::schema::record::{CanonicalRecord, DatasetRow};

pub struct RunConfig {
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
    pub years: RangeInclusive<i32>,
    pub versions: Vec<&'static PolicyVersion>,
}

/// One finished policy-version build: frozen after the join, persisted once.
pub struct Dataset {
    pub version: &'static str,
    pub rows: Vec<DatasetRow>,
    pub join_stats: JoinStats,
}

/// Per-version result counts for the run manifest and the final log line.
#[derive(Debug, Serialize)]
pub struct VersionSummary {
    pub version: String,
    pub records: usize,
    pub contribution_matched: usize,
    pub contribution_match_rate: f64,
}

/// Normalize every discovered batch and concatenate the survivors.
///
/// Batches are independent, so normalization fans out on the rayon pool;
/// the indexed collect reassembles results in discovery order, which keeps
/// the dedup tie-break deterministic. A batch that fails column resolution
/// is logged and skipped; an unreadable file fails the run.
pub fn build_canonical_pool(sources: &[FilingSource]) -> Result<Vec<CanonicalRecord>, PipelineError> {
    let per_batch: Vec<Result<Vec<CanonicalRecord>, PipelineError>> = sources
        .par_iter()
        .map(|source| {
            let label = source.label();
            let batch = RawBatch::load(&source.path, &label)?;
            info!(batch = %label, rows = batch.len(), "loaded");
            canonicalize(&batch, source.layout)
        })
        .collect();

    let mut pool = Vec::new();
    for (source, outcome) in sources.iter().zip(per_batch) {
        match outcome {
            Ok(records) => {
                info!(batch = %source.label(), kept = records.len(), "normalized");
                pool.extend(records);
            }
            Err(PipelineError::MissingColumn { batch, column }) => {
                warn!(%batch, %column, "required column missing; batch skipped");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(pool)
}

/// Fold every schedule file into one EIN → contribution map, in pinned
/// order so the last-seen rule is reproducible.
pub fn build_contribution_map(sources: &[ScheduleSource]) -> Result<ContributionMap, PipelineError> {
    let mut pairs = Vec::new();
    for source in sources {
        let batch = RawBatch::load(&source.path, &source.label)?;
        pairs.extend(contrib::extract_pairs(&batch));
    }
    Ok(ContributionMap::from_pairs(pairs))
}

/// Build one policy version from the shared pool and contribution map.
/// Pure with respect to its inputs; no state carries over between versions.
pub fn run_version(
    pool: &[CanonicalRecord],
    contributions: &ContributionMap,
    policy: &'static PolicyVersion,
) -> Dataset {
    let filtered = filter::apply(pool, policy);
    let deduped = latest_per_ein(filtered);
    let (rows, join_stats) = contrib::left_join(deduped, contributions);

    info!(
        policy = policy.name,
        records = rows.len(),
        matched = join_stats.matched,
        match_rate = format!("{:.1}%", join_stats.rate() * 100.0),
        "version built"
    );

    Dataset {
        version: policy.name,
        rows,
        join_stats,
    }
}

/// Drive the whole run. Fails with [`PipelineError::EmptyResult`] before
/// writing anything when no batch survives normalization.
pub fn run(config: &RunConfig) -> Result<Vec<VersionSummary>, PipelineError> {
    let sources = filing_sources(&config.data_dir, config.years.clone());
    info!(batches = sources.len(), "discovered filing batches");

    let pool = build_canonical_pool(&sources)?;
    if pool.is_empty() {
        return Err(PipelineError::EmptyResult);
    }
    info!(records = pool.len(), "canonical pool assembled");

    let schedules = schedule_sources(&config.data_dir, config.years.clone());
    let contributions = build_contribution_map(&schedules)?;
    info!(
        files = schedules.len(),
        eins = contributions.len(),
        "contribution map built"
    );

    let mut summaries = Vec::new();
    for &policy in &config.versions {
        let dataset = run_version(&pool, &contributions, policy);
        report::write_version(&config.out_dir, policy, &dataset)?;
        summaries.push(VersionSummary {
            version: dataset.version.to_string(),
            records: dataset.rows.len(),
            contribution_matched: dataset.join_stats.matched,
            contribution_match_rate: dataset.join_stats.rate(),
        });
    }

    report::write_methodology(&config.out_dir, &config.versions, &summaries)?;
    report::write_manifest(&config.out_dir, &summaries)?;
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{V1_INCLUSIVE, V2_CONSERVATIVE};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const F5500_HEADER: &str = "SPONS_DFE_EIN,TYPE_PENSION_BNFT_CODE,TYPE_PLAN_ENTITY_CD,\
PLAN_EFF_DATE,SPONS_DFE_MAIL_US_STATE,SPONSOR_DFE_NAME,SPONS_DFE_MAIL_US_CITY,PLAN_NAME,\
TOT_PARTCP_BOY_CNT";
    const SF_HEADER: &str = "SF_SPONS_EIN,SF_TYPE_PENSION_BNFT_CODE,SF_PLAN_ENTITY_CD,\
SF_PLAN_EFF_DATE,SF_SPONS_US_STATE,SF_SPONSOR_NAME,SF_SPONS_US_CITY,SF_PLAN_NAME,\
SF_TOT_PARTCP_BOY_CNT";

    fn write_fixture(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture_tree(tmp: &TempDir) -> PathBuf {
        let data = tmp.path().join("raw");

        // CA cutoff: v1 2018-11-01, v2 2019-07-01. The 2019-03-01 record
        // passes only v1; the 2023 records pass both.
        write_fixture(
            &data,
            "form5500/f_5500_2023_all.csv",
            &format!(
                "{F5500_HEADER}\n\
93000001,2E2J,2,2023-06-01,CA,Acme Inc,Fresno,Acme 401k,120\n\
93000001,2J,2,2023-01-01,CA,Acme Inc,Fresno,Acme 401k (old),110\n\
93000002,2J,2,2019-03-01,CA,Beta LLC,Davis,Beta Plan,15\n\
93000003,2J,1,2023-06-01,CA,Joint Board,LA,MEP,900\n\
93000004,2J,2,2023-06-01,TX,Lone Star,Austin,TX Plan,50\n"
            ),
        );
        write_fixture(
            &data,
            "form5500sf/f_5500_sf_2023_all.csv",
            &format!(
                "{SF_HEADER}\n\
93000005,2J,1.0,2023-09-15,OR,Cascade Co,Bend,Cascade 401k,8\n\
93000006,3H,1,2023-09-15,OR,No401k,Bend,Other,9\n"
            ),
        );
        write_fixture(
            &data,
            "schedule_h/sch_h_2022_latest.csv",
            "ACK_ID,SPONS_DFE_EIN,TOT_EMPLR_CONTRIB_AMT\nx,93000001,500\n",
        );
        write_fixture(
            &data,
            "schedule_i/sch_i_2023_latest.csv",
            "ACK_ID,SPONS_DFE_EIN,EMPLR_CONTRIB_AMT\nx,93000001,900\ny,93000005,75.25\n",
        );
        data
    }

    fn config(data: PathBuf, out: PathBuf) -> RunConfig {
        RunConfig {
            data_dir: data,
            out_dir: out,
            years: 2017..=2024,
            versions: vec![&V1_INCLUSIVE, &V2_CONSERVATIVE],
        }
    }

    fn read_rows(path: &Path) -> Vec<DatasetRow> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.deserialize().collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn end_to_end_builds_both_versions() {
        let tmp = TempDir::new().unwrap();
        let data = fixture_tree(&tmp);
        let out = tmp.path().join("out");

        let summaries = run(&config(data, out.clone())).unwrap();
        assert_eq!(summaries.len(), 2);

        let v1 = read_rows(&out.join("v1-inclusive/state_auto_ira_401k_dataset.csv"));
        // v1: Acme (dedup to 2023-06-01), Beta, Cascade. TX and the MEP and
        // the non-401k SF row never make it.
        let eins: Vec<&str> = v1.iter().map(|r| r.ein.as_str()).collect();
        assert_eq!(eins, vec!["093000005", "093000001", "093000002"]);

        let acme = v1.iter().find(|r| r.ein == "093000001").unwrap();
        assert_eq!(
            acme.plan_effective_date,
            chrono::NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
        );
        // Schedule I (2023) folded after Schedule H (2022): last wins
        assert_eq!(acme.employer_contribution, Some(900.0));

        let cascade = v1.iter().find(|r| r.ein == "093000005").unwrap();
        assert_eq!(cascade.employer_contribution, Some(75.25));
        assert_eq!(cascade.source, "Form5500SF_2023");

        let beta = v1.iter().find(|r| r.ein == "093000002").unwrap();
        assert_eq!(beta.employer_contribution, None);

        // v2's later CA cutoff excludes Beta but keeps the 2023 adopters
        let v2 = read_rows(&out.join("v2-conservative/state_auto_ira_401k_dataset.csv"));
        let v2_eins: Vec<&str> = v2.iter().map(|r| r.ein.as_str()).collect();
        assert_eq!(v2_eins, vec!["093000005", "093000001"]);

        assert!(out.join("METHODOLOGY.md").exists());
        assert!(out.join("run_manifest.json").exists());
        assert!(out.join("v1-inclusive/summary_statistics.csv").exists());
    }

    #[test]
    fn reruns_are_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let data = fixture_tree(&tmp);
        let out_a = tmp.path().join("a");
        let out_b = tmp.path().join("b");

        run(&config(data.clone(), out_a.clone())).unwrap();
        run(&config(data, out_b.clone())).unwrap();

        for version in ["v1-inclusive", "v2-conservative"] {
            let rel = format!("{version}/state_auto_ira_401k_dataset.csv");
            assert_eq!(
                fs::read(out_a.join(&rel)).unwrap(),
                fs::read(out_b.join(&rel)).unwrap(),
                "{rel} differs between runs"
            );
        }
    }

    #[test]
    fn batch_missing_required_column_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let data = fixture_tree(&tmp);
        // 2019 long form lacks the benefit-code column entirely
        write_fixture(
            &data,
            "form5500/f_5500_2019_all.csv",
            "SPONS_DFE_EIN,PLAN_EFF_DATE,SPONS_DFE_MAIL_US_STATE\n93000009,2019-06-01,CA\n",
        );
        let out = tmp.path().join("out");

        let summaries = run(&config(data, out.clone())).unwrap();
        let v1 = &summaries[0];
        assert_eq!(v1.records, 3);
        let rows = read_rows(&out.join("v1-inclusive/state_auto_ira_401k_dataset.csv"));
        assert!(rows.iter().all(|r| r.ein != "093000009"));
    }

    #[test]
    fn run_with_no_survivors_fails_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("raw");
        // the only batch on disk is rejected at column resolution
        write_fixture(
            &data,
            "form5500/f_5500_2020_all.csv",
            "WRONG,COLUMNS\n1,2\n",
        );
        let out = tmp.path().join("out");

        let err = run(&config(data, out.clone())).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResult));
        assert!(!out.join("v1-inclusive/state_auto_ira_401k_dataset.csv").exists());
        assert!(!out.join("METHODOLOGY.md").exists());
    }

    #[test]
    fn versions_share_the_pool_but_not_state() {
        let tmp = TempDir::new().unwrap();
        let data = fixture_tree(&tmp);
        let sources = filing_sources(&data, 2017..=2024);
        let pool = build_canonical_pool(&sources).unwrap();
        let contributions =
            build_contribution_map(&schedule_sources(&data, 2017..=2024)).unwrap();

        // building v2 first must not change what v1 produces
        let v2_first = run_version(&pool, &contributions, &V2_CONSERVATIVE);
        let v1 = run_version(&pool, &contributions, &V1_INCLUSIVE);
        let v2_again = run_version(&pool, &contributions, &V2_CONSERVATIVE);

        assert_eq!(v2_first.rows, v2_again.rows);
        assert_eq!(v1.rows.len(), 3);
    }
}
