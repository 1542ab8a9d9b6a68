//! Input discovery. The bulk exports sit under one data directory:
//!
//! ```text
//! <data_dir>/form5500/f_5500_2021_all.csv
//! <data_dir>/form5500sf/f_5500_sf_2021_all.csv
//! <data_dir>/schedule_h/sch_h_2021_latest.csv
//! <data_dir>/schedule_i/sch_i_2021_latest.csv
//! ```
//!
//! Directory enumeration order is not portable, and the contribution join's
//! last-seen rule makes processing order observable, so discovery pins it:
//! years ascending, long form before short form within a year, Schedule H
//! before Schedule I, and lexicographic filenames when several match.

use glob::glob;
use std::{
    ops::RangeInclusive,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::schema::layout::{all_layouts, Layout};

/// One yearly filing batch to normalize.
#[derive(Debug)]
pub struct FilingSource {
    pub layout: &'static Layout,
    pub year: i32,
    pub path: PathBuf,
}

impl FilingSource {
    pub fn label(&self) -> String {
        self.layout.label(self.year)
    }
}

/// One contribution-schedule file to fold into the EIN → contribution map.
#[derive(Debug)]
pub struct ScheduleSource {
    pub label: String,
    pub path: PathBuf,
}

/// Every filing batch present on disk for the year range, in pinned order.
/// Years with no matching file are simply absent.
pub fn filing_sources(data_dir: &Path, years: RangeInclusive<i32>) -> Vec<FilingSource> {
    let mut sources = Vec::new();
    for year in years {
        for layout in all_layouts() {
            let stem = format!("{}{}", layout.file_stem, year);
            if let Some(path) = find_csv(&data_dir.join(layout.folder), &stem) {
                sources.push(FilingSource { layout, year, path });
            }
        }
    }
    debug!(count = sources.len(), "discovered filing batches");
    sources
}

/// Schedule H/I files for the year range, in pinned order. Iteration order
/// here decides which duplicate contribution value survives, so it must stay
/// reproducible.
pub fn schedule_sources(data_dir: &Path, years: RangeInclusive<i32>) -> Vec<ScheduleSource> {
    const SCHEDULES: &[(&str, &str, &str)] = &[
        ("ScheduleH", "schedule_h", "sch_h_"),
        ("ScheduleI", "schedule_i", "sch_i_"),
    ];

    let mut sources = Vec::new();
    for year in years {
        for &(name, folder, stem) in SCHEDULES {
            let pattern = format!("{stem}{year}");
            if let Some(path) = find_csv(&data_dir.join(folder), &pattern) {
                sources.push(ScheduleSource {
                    label: format!("{name}_{year}"),
                    path,
                });
            }
        }
    }
    debug!(count = sources.len(), "discovered schedule files");
    sources
}

/// First CSV in `dir` whose lower-cased file name contains `pattern`,
/// lexicographically smallest when several match. Returns None for a
/// missing directory, since absent years are expected rather than an error.
fn find_csv(dir: &Path, pattern: &str) -> Option<PathBuf> {
    let needle = pattern.to_lowercase();
    let glob_pattern = format!("{}/*", dir.display());

    let mut matches: Vec<PathBuf> = glob(&glob_pattern)
        .ok()?
        .filter_map(Result::ok)
        .filter(|path| {
            path.file_name()
                .and_then(|f| f.to_str())
                .map(str::to_lowercase)
                .is_some_and(|f| f.ends_with(".csv") && f.contains(&needle))
        })
        .collect();

    matches.sort();
    matches.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "HEADER\n").unwrap();
    }

    #[test]
    fn filing_order_is_year_then_layout() {
        let tmp = TempDir::new().unwrap();
        let f5500 = tmp.path().join("form5500");
        let f5500sf = tmp.path().join("form5500sf");
        fs::create_dir_all(&f5500).unwrap();
        fs::create_dir_all(&f5500sf).unwrap();
        touch(&f5500sf, "F_5500_SF_2018_All.CSV");
        touch(&f5500, "f_5500_2018_all.csv");
        touch(&f5500, "f_5500_2017_all.csv");

        let labels: Vec<String> = filing_sources(tmp.path(), 2017..=2019)
            .iter()
            .map(FilingSource::label)
            .collect();
        assert_eq!(
            labels,
            vec!["Form5500_2017", "Form5500_2018", "Form5500SF_2018"]
        );
    }

    #[test]
    fn short_form_file_does_not_match_long_form_stem() {
        // "f_5500_sf_2018" contains "f_5500_" but lives in its own folder,
        // so stems only ever scan their layout's directory.
        let tmp = TempDir::new().unwrap();
        let f5500sf = tmp.path().join("form5500sf");
        fs::create_dir_all(&f5500sf).unwrap();
        touch(&f5500sf, "f_5500_sf_2018_all.csv");

        let sources = filing_sources(tmp.path(), 2018..=2018);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].layout.name, "Form5500SF");
    }

    #[test]
    fn ambiguous_matches_resolve_lexicographically() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("schedule_h");
        fs::create_dir_all(&dir).unwrap();
        touch(&dir, "sch_h_2020_latest.csv");
        touch(&dir, "sch_h_2020_all.csv");

        let sources = schedule_sources(tmp.path(), 2020..=2020);
        assert_eq!(sources.len(), 1);
        assert!(sources[0]
            .path
            .to_string_lossy()
            .ends_with("sch_h_2020_all.csv"));
    }

    #[test]
    fn missing_directories_yield_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(filing_sources(tmp.path(), 2017..=2024).is_empty());
        assert!(schedule_sources(tmp.path(), 2017..=2024).is_empty());
    }
}
