use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use serde_json::to_string_pretty;

use crate::models::GradeEvent;

/// Identity keys of the grade events that were already reported, kept in a JSON file.
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SeenStore { path: path.into() }
    }

    /// `None` when nothing was ever stored (missing or empty file).
    pub fn load(&self) -> Result<Option<BTreeSet<String>>> {
        let has_content = fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
        if !has_content {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read seen events from {}", self.path.display()))?;
        let keys = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse seen events in {}", self.path.display()))?;
        Ok(Some(keys))
    }

    pub fn save(&self, keys: &BTreeSet<String>) -> Result<()> {
        fs::write(&self.path, to_string_pretty(keys)?)
            .with_context(|| format!("Failed to write seen events to {}", self.path.display()))
    }

    /// Returns the events not reported before and records them as seen.
    ///
    /// On the very first run every current event is recorded and nothing is
    /// returned, so an existing feed is not replayed as new grades.
    pub fn diff_events(&self, events: &[GradeEvent]) -> Result<Vec<GradeEvent>> {
        let previous = self.load()?;
        let first_run = previous.is_none();
        let mut seen = previous.unwrap_or_default();

        let new_events: Vec<GradeEvent> = events
            .iter()
            .filter(|e| !seen.contains(&e.identity_key))
            .cloned()
            .collect();
        seen.extend(new_events.iter().map(|e| e.identity_key.clone()));
        self.save(&seen)?;

        if first_run {
            info!("First run: recorded {} grade events as seen", new_events.len());
            return Ok(Vec::new());
        }
        Ok(new_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(subject: &str, grade: &str, timestamp: &str) -> GradeEvent {
        GradeEvent::new(
            "Іванов Іван Іванович".into(),
            subject.into(),
            grade.into(),
            "Поточна".into(),
            timestamp.into(),
            false,
        )
    }

    #[test]
    fn first_run_records_without_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("seen.json"));

        let new = store.diff_events(&[event("Алгебра", "10", "19.12.2025 10:06")]).unwrap();
        assert!(new.is_empty());
        assert_eq!(store.load().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn reports_only_unseen_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("seen.json"));
        store.diff_events(&[event("Алгебра", "10", "19.12.2025 10:06")]).unwrap();

        let new = store
            .diff_events(&[
                event("Алгебра", "10", "20.12.2025 08:00"),
                event("Фізика", "9", "20.12.2025 08:00"),
            ])
            .unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].subject, "Фізика");

        assert!(store.diff_events(&[event("Фізика", "9", "21.12.2025 08:00")]).unwrap().is_empty());
    }

    #[test]
    fn empty_file_counts_as_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "").unwrap();
        let store = SeenStore::new(&path);
        assert!(store.load().unwrap().is_none());
        assert!(store.diff_events(&[event("Алгебра", "7", "")]).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "{not json").unwrap();
        assert!(SeenStore::new(path).diff_events(&[]).is_err());
    }
}
