//! Standalone audit of a finished dataset CSV. Re-derives the pipeline's
//! invariants from the persisted file alone and prints a pass/fail report;
//! exits non-zero when an invariant check fails. Observational only; it
//! never modifies the dataset.

use anyhow::{Context, Result};
use autoira::{audit, policy, schema::record::DatasetRow};
use std::{env, path::Path, process::exit};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <DATASET_CSV> [POLICY_VERSION]", args[0]);
        eprintln!("POLICY_VERSION defaults to v1-inclusive");
        exit(2);
    }
    let version = args.get(2).map(String::as_str).unwrap_or("v1-inclusive");

    match run_audit(Path::new(&args[1]), version) {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(err) => {
            eprintln!("Error: {err:#}");
            exit(1);
        }
    }
}

fn run_audit(path: &Path, version_name: &str) -> Result<bool> {
    let policy = policy::find_version(version_name)
        .with_context(|| format!("unknown policy version `{version_name}`"))?;

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening dataset {}", path.display()))?;
    let rows: Vec<DatasetRow> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .context("parsing dataset rows")?;

    println!("=== AUDIT: {} ===", path.display());
    println!("rows: {} | policy: {}", rows.len(), policy.name);

    println!("\n--- invariants ---");
    let checks = audit::invariant_checks(&rows, policy);
    for check in &checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("  {status}  {} ({})", check.name, check.detail);
    }

    println!("\n--- null profile ---");
    for stat in audit::null_profile(&rows) {
        let status = if stat.share < 0.05 {
            "OK"
        } else if stat.share < 0.5 {
            "WARN"
        } else {
            "HIGH"
        };
        println!(
            "  {status:>4}  {:<22} {:>8} nulls ({:.1}%)",
            stat.column,
            stat.nulls,
            stat.share * 100.0
        );
    }

    println!("\n--- source breakdown ---");
    for (source, count) in audit::source_breakdown(&rows) {
        println!("  {source:<16} {count:>8}");
    }

    if let Some(h) = audit::headcount_summary(&rows) {
        println!("\n--- employee counts ({} rows with data) ---", h.n);
        println!(
            "  min {:.0} | q1 {:.0} | median {:.0} | q3 {:.0} | max {:.0} | mean {:.1}",
            h.min, h.q1, h.median, h.q3, h.max, h.mean
        );
        println!("  zero: {} | over 10k: {}", h.zeros, h.over_10k);
    }

    println!("\n--- plan effective year ---");
    for (year, count) in audit::year_histogram(&rows) {
        let bar = "#".repeat((count / 500).min(60));
        println!("  {year}: {count:>8}  {bar}");
    }

    let all_passed = checks.iter().all(|c| c.passed);
    println!(
        "\nResult: {}",
        if all_passed { "PASS" } else { "FAIL" }
    );
    Ok(all_passed)
}
