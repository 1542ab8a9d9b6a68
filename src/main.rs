use anyhow::{bail, Result};
use autoira::{
    pipeline::{run, RunConfig},
    policy,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the state auto-IRA 401(k) adoption dataset from EFAST2 Form 5500
/// bulk filings.
#[derive(Parser, Debug)]
#[command(name = "autoira", version, about)]
struct Cli {
    /// Root directory holding form5500/, form5500sf/, schedule_h/, schedule_i/
    #[arg(long, env = "AUTOIRA_DATA_DIR", default_value = "form5500-raw-data")]
    data_dir: PathBuf,

    /// Output directory; one subdirectory is written per policy version
    #[arg(long, env = "AUTOIRA_OUT_DIR", default_value = "data")]
    out_dir: PathBuf,

    /// First filing year to ingest
    #[arg(long, default_value_t = 2017)]
    first_year: i32,

    /// Last filing year to ingest
    #[arg(long, default_value_t = 2024)]
    last_year: i32,

    /// Build only the named policy version instead of all of them
    #[arg(long)]
    version: Option<String>,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    if cli.first_year > cli.last_year {
        bail!("--first-year {} is after --last-year {}", cli.first_year, cli.last_year);
    }

    // ─── 2) resolve policy versions ──────────────────────────────────
    let versions = match &cli.version {
        Some(name) => match policy::find_version(name) {
            Some(version) => vec![version],
            None => {
                let known: Vec<&str> = policy::all_versions().iter().map(|v| v.name).collect();
                bail!("unknown policy version `{name}` (known: {})", known.join(", "));
            }
        },
        None => policy::all_versions(),
    };

    info!(
        data_dir = %cli.data_dir.display(),
        out_dir = %cli.out_dir.display(),
        years = format!("{}..={}", cli.first_year, cli.last_year),
        versions = ?versions.iter().map(|v| v.name).collect::<Vec<_>>(),
        "startup"
    );

    // ─── 3) run the pipeline ─────────────────────────────────────────
    let summaries = run(&RunConfig {
        data_dir: cli.data_dir,
        out_dir: cli.out_dir,
        years: cli.first_year..=cli.last_year,
        versions,
    })?;

    // ─── 4) final accounting ─────────────────────────────────────────
    for summary in &summaries {
        info!(
            version = %summary.version,
            firms = summary.records,
            contribution_match = format!(
                "{}/{} ({:.1}%)",
                summary.contribution_matched,
                summary.records,
                summary.contribution_match_rate * 100.0
            ),
            "done"
        );
    }
    Ok(())
}
