//! Output formatting: the per-version dataset and summary CSVs, the shared
//! methodology note, and a small JSON manifest of the run. None of this
//! feeds back into the pipeline; everything here is derived from a finished
//! [`Dataset`].

use chrono::{Local, Utc};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};
use tracing::info;

use crate::error::PipelineError;
use crate::pipeline::{Dataset, VersionSummary};
use crate::policy::{program_name, PolicyVersion};
use crate::schema::record::DatasetRow;

pub const DATASET_FILE: &str = "state_auto_ira_401k_dataset.csv";

/// Per-state roll-up row of the summary CSV. Column names follow the
/// published deliverable.
#[derive(Debug, Serialize)]
struct SummaryRow {
    #[serde(rename = "State")]
    state: &'static str,
    #[serde(rename = "Program")]
    program: &'static str,
    #[serde(rename = "Mandate_Date")]
    mandate_date: String,
    #[serde(rename = "Firms")]
    firms: usize,
    #[serde(rename = "Avg_Employees")]
    avg_employees: Option<f64>,
    #[serde(rename = "Avg_Employer_Contribution")]
    avg_contribution: Option<f64>,
}

/// Write one version's dataset and summary under `<out_dir>/<version>/`.
pub fn write_version(
    out_dir: &Path,
    policy: &PolicyVersion,
    dataset: &Dataset,
) -> Result<(), PipelineError> {
    let version_dir = out_dir.join(policy.name);
    fs::create_dir_all(&version_dir)?;

    let dataset_path = version_dir.join(DATASET_FILE);
    let mut writer = csv::Writer::from_path(&dataset_path)?;
    for row in &dataset.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(
        path = %dataset_path.display(),
        rows = dataset.rows.len(),
        "wrote dataset"
    );

    write_summary(&version_dir, policy, &dataset.rows)?;
    Ok(())
}

fn write_summary(
    version_dir: &Path,
    policy: &PolicyVersion,
    rows: &[DatasetRow],
) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(version_dir.join("summary_statistics.csv"))?;
    for (state, cutoff) in policy.states() {
        let state_rows: Vec<&DatasetRow> = rows.iter().filter(|r| r.state == state).collect();
        writer.serialize(SummaryRow {
            state,
            program: program_name(state),
            mandate_date: cutoff.to_string(),
            firms: state_rows.len(),
            avg_employees: round1(mean(state_rows.iter().filter_map(|r| r.employee_count))),
            avg_contribution: round2(mean(
                state_rows.iter().filter_map(|r| r.employer_contribution),
            )),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Shared methodology note, mirroring the dataset's published write-up.
pub fn write_methodology(
    out_dir: &Path,
    versions: &[&PolicyVersion],
    summaries: &[VersionSummary],
) -> Result<(), PipelineError> {
    fs::create_dir_all(out_dir)?;
    let mut f = File::create(out_dir.join("METHODOLOGY.md"))?;

    writeln!(f, "# Methodology: State Auto-IRA 401(k) Dataset\n")?;
    writeln!(f, "Generated: {}\n", Local::now().format("%Y-%m-%d %H:%M"))?;
    writeln!(f, "## Data Source")?;
    writeln!(f, "DOL Form 5500 bulk datasets from the EFAST2 system.\n")?;
    writeln!(f, "## Filtering Criteria")?;
    writeln!(f, "1. Pension benefit code contains '2J' (401(k) plans)")?;
    writeln!(
        f,
        "2. Single-employer plans (Form 5500: entity code 2, Form 5500-SF: entity code 1)"
    )?;
    writeln!(f, "3. Sponsor state is one of the mandate states")?;
    writeln!(f, "4. Plan effective date is strictly after the state's cutoff date")?;
    writeln!(f, "5. Deduplicated by EIN, most recent plan effective date kept\n")?;

    for policy in versions {
        writeln!(f, "## Cutoff Dates: {}", policy.name)?;
        writeln!(f, "| State | Program | Cutoff Date |")?;
        writeln!(f, "|-------|---------|-------------|")?;
        for (state, cutoff) in policy.states() {
            writeln!(f, "| {state} | {} | {cutoff} |", program_name(state))?;
        }
        writeln!(f)?;
    }

    writeln!(f, "## Results")?;
    for summary in summaries {
        writeln!(
            f,
            "- {}: {} unique firms, contribution match rate {:.1}%",
            summary.version,
            summary.records,
            summary.contribution_match_rate * 100.0
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct Manifest<'a> {
    generated_utc: String,
    versions: &'a [VersionSummary],
}

/// Machine-readable run record for downstream tooling.
pub fn write_manifest(out_dir: &Path, summaries: &[VersionSummary]) -> Result<(), PipelineError> {
    let manifest = Manifest {
        generated_utc: Utc::now().to_rfc3339(),
        versions: summaries,
    };
    let json = serde_json::to_string_pretty(&manifest).expect("manifest serializes");
    fs::write(out_dir.join("run_manifest.json"), json)?;
    Ok(())
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

fn round1(value: Option<f64>) -> Option<f64> {
    value.map(|v| (v * 10.0).round() / 10.0)
}

fn round2(value: Option<f64>) -> Option<f64> {
    value.map(|v| (v * 100.0).round() / 100.0)
}
