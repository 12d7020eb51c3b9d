//! Best time-trial times, kept as `track;laps=milliseconds` lines.
//!
//! Persistence is best-effort: an unreadable file counts as empty and a
//! failed write is logged, never propagated to the race.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighscoreOutcome {
    /// No record existed for this track and lap count.
    FirstRecord,
    /// The new time beat `previous`.
    NewRecord { previous: u64 },
    /// The standing record `best` was not beaten.
    NotBeaten { best: u64 },
}

impl HighscoreOutcome {
    pub fn is_record(self) -> bool {
        !matches!(self, HighscoreOutcome::NotBeaten { .. })
    }
}

#[derive(Debug, Clone)]
pub struct HighscoreStore {
    path: PathBuf,
    records: Vec<(String, u64)>,
}

fn record_key(track: &str, laps: u32) -> String {
    format!("{track};{laps}")
}

impl HighscoreStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = read_records(&path);
        Self { path, records }
    }

    /// Re-reads the file, picking up records written since `open`.
    pub fn reload(&mut self) {
        self.records = read_records(&self.path);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn best(&self, track: &str, laps: u32) -> Option<u64> {
        let key = record_key(track, laps);
        self.records
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, ms)| *ms)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, u64)> {
        self.records.iter().map(|(key, ms)| (key.as_str(), *ms))
    }

    /// Compares `ms` against the stored record without touching the file.
    pub fn compare(&self, track: &str, laps: u32, ms: u64) -> HighscoreOutcome {
        match self.best(track, laps) {
            None => HighscoreOutcome::FirstRecord,
            Some(best) if ms < best => HighscoreOutcome::NewRecord { previous: best },
            Some(best) => HighscoreOutcome::NotBeaten { best },
        }
    }

    /// Records `ms` if it is strictly better than the stored time (or none
    /// is stored) and rewrites the file.
    pub fn submit(&mut self, track: &str, laps: u32, ms: u64) -> HighscoreOutcome {
        let outcome = self.compare(track, laps, ms);
        if !outcome.is_record() {
            return outcome;
        }

        let key = record_key(track, laps);
        match self.records.iter_mut().find(|(candidate, _)| *candidate == key) {
            Some(record) => record.1 = ms,
            None => self.records.push((key, ms)),
        }

        if let Err(err) = self.write() {
            tracing::warn!(path = %self.path.display(), %err, "failed to save highscore");
        }
        outcome
    }

    fn write(&self) -> std::io::Result<()> {
        let mut text = String::new();
        for (key, ms) in &self.records {
            text.push_str(&format!("{key}={ms}\n"));
        }
        fs::write(&self.path, text)
    }
}

fn read_records(path: &Path) -> Vec<(String, u64)> {
    match fs::read_to_string(path) {
        Ok(text) => parse_records(&text),
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "no highscore file, starting empty");
            Vec::new()
        }
    }
}

fn parse_records(text: &str) -> Vec<(String, u64)> {
    let mut records: Vec<(String, u64)> = Vec::new();
    for line in text.lines() {
        let Some((key, value)) = line.trim().rsplit_once('=') else {
            continue;
        };
        let Some((track, laps)) = key.rsplit_once(';') else {
            continue;
        };
        let (Ok(laps), Ok(ms)) = (laps.trim().parse::<u32>(), value.trim().parse::<u64>()) else {
            continue;
        };
        if track.is_empty() {
            continue;
        }

        let key = record_key(track, laps);
        match records.iter_mut().find(|(candidate, _)| *candidate == key) {
            Some(record) => record.1 = ms,
            None => records.push((key, ms)),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn missing_file_is_no_record() {
        let store = HighscoreStore::open(testing::temp_path("missing-highscores"));
        assert_eq!(store.best("oval", 3), None);
    }

    #[test]
    fn only_strictly_better_times_overwrite() {
        let path = testing::temp_path("monotonic-highscores");
        let mut store = HighscoreStore::open(&path);

        assert_eq!(store.submit("oval", 3, 90_000), HighscoreOutcome::FirstRecord);
        assert_eq!(
            store.submit("oval", 3, 95_000),
            HighscoreOutcome::NotBeaten { best: 90_000 }
        );
        assert_eq!(
            store.submit("oval", 3, 90_000),
            HighscoreOutcome::NotBeaten { best: 90_000 }
        );
        assert_eq!(
            store.submit("oval", 3, 88_500),
            HighscoreOutcome::NewRecord { previous: 90_000 }
        );

        let reopened = HighscoreStore::open(&path);
        assert_eq!(reopened.best("oval", 3), Some(88_500));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn records_are_keyed_by_track_and_laps() {
        let path = testing::temp_path("keyed-highscores");
        let mut store = HighscoreStore::open(&path);
        store.submit("oval", 3, 60_000);
        store.submit("oval", 5, 100_000);
        store.submit("alps", 3, 70_000);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "oval;3=60000\noval;5=100000\nalps;3=70000\n");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn reload_sees_records_written_after_open() {
        let path = testing::temp_path("reloaded-highscores");
        let mut store = HighscoreStore::open(&path);
        assert_eq!(store.compare("oval", 3, 80_000), HighscoreOutcome::FirstRecord);

        let mut other = HighscoreStore::open(&path);
        other.submit("oval", 3, 75_000);

        store.reload();
        assert_eq!(
            store.compare("oval", 3, 80_000),
            HighscoreOutcome::NotBeaten { best: 75_000 }
        );
        let _ = fs::remove_file(&path);

        store.reload();
        assert_eq!(store.best("oval", 3), None);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let records = parse_records(
            "oval;3=61000\ngarbage\n;2=5\nalps;x=9\nalps;2=notanumber\n\ncoast;4 = 72000\n",
        );
        assert_eq!(
            records,
            vec![("oval;3".to_string(), 61_000), ("coast;4".to_string(), 72_000)]
        );
    }
}
