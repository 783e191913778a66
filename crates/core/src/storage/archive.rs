use crate::domain::legacy::normalize_record;
use crate::domain::RiskIndexRecord;
use crate::history::alerts::Alert;
use crate::storage::error::ArchiveReadError;
use crate::storage::write_atomic;
use anyhow::Context;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const LATEST_FILE: &str = "latest.json";
const ALERTS_FILE: &str = "alerts.json";

/// Date-keyed directory of daily records: one `YYYY-MM-DD.json` per calendar day.
///
/// Sorting the file names lexically gives chronological order.
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    /// Opens the archive, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create archive dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Opens an archive that must already exist.
    pub fn open_existing(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        anyhow::ensure!(dir.is_dir(), "archive dir {} does not exist", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// All archived dates, ascending.
    pub fn dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to list archive dir {}", self.dir.display()))
            }
        };

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to read archive dir entry")?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(date) = parse_record_file_name(name) {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// The record for `date`, `None` if there is none. Unreadable documents surface as an
    /// [`ArchiveReadError`].
    pub fn get(&self, date: NaiveDate) -> anyhow::Result<Option<RiskIndexRecord>> {
        let path = self.record_path(date);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(path, "read", e.to_string())),
        };
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| read_error(path.clone(), "parse", e.to_string()))?;
        let record = normalize_record(value, date)
            .map_err(|e| read_error(path.clone(), "normalize", format!("{e:#}")))?;
        Ok(Some(record))
    }

    /// Most recent readable record strictly before `date`. Unreadable documents are logged
    /// and skipped.
    pub fn previous(&self, date: NaiveDate) -> anyhow::Result<Option<RiskIndexRecord>> {
        for d in self.dates()?.into_iter().rev().filter(|d| *d < date) {
            if let Some(record) = self.get_lenient(d) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Up to `limit` readable records, newest first.
    pub fn history(&self, limit: usize) -> anyhow::Result<Vec<RiskIndexRecord>> {
        let dates = self.dates()?;
        Ok(self.collect_newest_first(dates.into_iter().rev(), limit))
    }

    /// Up to `limit` readable records strictly before `date`, oldest first.
    pub fn window_before(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> anyhow::Result<Vec<RiskIndexRecord>> {
        let dates = self.dates()?;
        let before = dates.into_iter().rev().filter(|d| *d < date);
        let mut out = self.collect_newest_first(before, limit);
        out.reverse();
        Ok(out)
    }

    /// Every readable record strictly before `date`, oldest first.
    pub fn all_before(&self, date: NaiveDate) -> anyhow::Result<Vec<RiskIndexRecord>> {
        self.window_before(date, usize::MAX)
    }

    pub fn latest(&self) -> anyhow::Result<Option<RiskIndexRecord>> {
        Ok(self.history(1)?.into_iter().next())
    }

    /// Writes the record under its date, replacing any previous document for that day.
    pub fn put(&self, record: &RiskIndexRecord) -> anyhow::Result<PathBuf> {
        let path = self.record_path(record.date);
        write_atomic(&path, &record.to_json_pretty()?)?;
        tracing::debug!(path = %path.display(), date = %record.date, "archive record written");
        Ok(path)
    }

    pub fn write_latest(&self, record: &RiskIndexRecord) -> anyhow::Result<()> {
        write_atomic(&self.dir.join(LATEST_FILE), &record.to_json_pretty()?)
    }

    /// The merged alert history, newest first. A missing or unreadable file reads as empty.
    pub fn alert_history(&self) -> Vec<Alert> {
        let path = self.dir.join(ALERTS_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "alert history unreadable; starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Alert>>(&text) {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "alert history invalid; starting empty");
                Vec::new()
            }
        }
    }

    pub fn write_alert_history(&self, alerts: &[Alert]) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(alerts).context("serialize alert history failed")?;
        write_atomic(&self.dir.join(ALERTS_FILE), &json)
    }

    fn get_lenient(&self, date: NaiveDate) -> Option<RiskIndexRecord> {
        match self.get(date) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(%date, error = %err, "skipping unreadable archive record");
                None
            }
        }
    }

    fn collect_newest_first(
        &self,
        dates: impl Iterator<Item = NaiveDate>,
        limit: usize,
    ) -> Vec<RiskIndexRecord> {
        let mut out = Vec::new();
        for d in dates {
            if out.len() >= limit {
                break;
            }
            if let Some(record) = self.get_lenient(d) {
                out.push(record);
            }
        }
        out
    }
}

fn parse_record_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(".json")?;
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

fn read_error(path: PathBuf, stage: &'static str, detail: String) -> anyhow::Error {
    anyhow::Error::new(ArchiveReadError {
        path,
        stage,
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;
    use crate::history::tests::record;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    fn seeded(days: &[(u32, u32)]) -> (tempfile::TempDir, Archive) {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Archive::open(tmp.path()).unwrap();
        for (day, score) in days {
            archive.put(&record(d(*day), *score, RiskLevel::Medium)).unwrap();
        }
        (tmp, archive)
    }

    #[test]
    fn round_trips_a_record() {
        let (_tmp, archive) = seeded(&[(4, 42)]);
        let got = archive.get(d(4)).unwrap().unwrap();
        assert_eq!(got, record(d(4), 42, RiskLevel::Medium));
        assert!(archive.get(d(5)).unwrap().is_none());
    }

    #[test]
    fn dates_ignore_non_record_files() {
        let (tmp, archive) = seeded(&[(6, 40), (4, 41)]);
        std::fs::write(tmp.path().join("latest.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        assert_eq!(archive.dates().unwrap(), vec![d(4), d(6)]);
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let (_tmp, archive) = seeded(&[(1, 40), (2, 41), (3, 42)]);
        let h = archive.history(2).unwrap();
        assert_eq!(h.iter().map(|r| r.date).collect::<Vec<_>>(), vec![d(3), d(2)]);
        assert_eq!(archive.latest().unwrap().unwrap().date, d(3));
    }

    #[test]
    fn window_before_excludes_the_day_itself() {
        let (_tmp, archive) = seeded(&[(1, 40), (2, 41), (3, 42)]);
        let w = archive.window_before(d(3), 10).unwrap();
        assert_eq!(w.iter().map(|r| r.date).collect::<Vec<_>>(), vec![d(1), d(2)]);
    }

    #[test]
    fn all_before_reads_the_whole_archive() {
        let days: Vec<(u32, u32)> = (1..=31).map(|day| (day, 40)).collect();
        let (_tmp, archive) = seeded(&days);
        let all = archive.all_before(d(31)).unwrap();
        assert_eq!(all.len(), 30);
        assert_eq!(all.first().unwrap().date, d(1));
        assert_eq!(all.last().unwrap().date, d(30));
    }

    #[test]
    fn corrupt_record_is_an_error_on_get_and_skipped_elsewhere() {
        let (tmp, archive) = seeded(&[(1, 40), (3, 42)]);
        std::fs::write(tmp.path().join("2026-05-02.json"), "{not json").unwrap();

        let err = archive.get(d(2)).unwrap_err();
        let diag = err.downcast_ref::<ArchiveReadError>().unwrap();
        assert_eq!(diag.stage, "parse");

        assert_eq!(archive.previous(d(3)).unwrap().unwrap().date, d(1));
        assert_eq!(archive.history(10).unwrap().len(), 2);
    }

    #[test]
    fn previous_on_empty_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = Archive::open(tmp.path().join("nested")).unwrap();
        assert!(archive.previous(d(1)).unwrap().is_none());
    }

    #[test]
    fn reads_legacy_documents() {
        let (tmp, archive) = seeded(&[]);
        std::fs::write(
            tmp.path().join("2026-05-07.json"),
            r#"{"date":"2026-05-07","marketRisk":{"score":66,"light":"red"}}"#,
        )
        .unwrap();
        let r = archive.get(d(7)).unwrap().unwrap();
        assert_eq!(r.score, 66);
        assert_eq!(r.level, RiskLevel::High);
    }

    #[test]
    fn alert_history_round_trip_and_corruption() {
        let (tmp, archive) = seeded(&[]);
        assert!(archive.alert_history().is_empty());
        let alerts = vec![Alert::ThresholdLow { date: d(1), score: 10 }];
        archive.write_alert_history(&alerts).unwrap();
        assert_eq!(archive.alert_history(), alerts);

        std::fs::write(tmp.path().join("alerts.json"), "[oops").unwrap();
        assert!(archive.alert_history().is_empty());
    }
}
