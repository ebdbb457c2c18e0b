use async_trait::async_trait;
use contracts::domain::a001_kpi::aggregate::Timeframe;
use contracts::shared::indicators::{HistoryBucket, RecordSet};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::DataSourceAdapter;
use crate::shared::error::DataSourceError;

/// Adapter reading JSON snapshots from a directory:
///
/// - `<source>.json`: current records (required)
/// - `<source>.<timeframe>.previous.json`, else `<source>.previous.json`
/// - `<source>.<timeframe>.history.json`, else `<source>.history.json`
///
/// Files are re-read on every fetch.
#[derive(Debug, Clone)]
pub struct JsonDirDataSource {
    dir: PathBuf,
}

impl JsonDirDataSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Source names become file names, so only `[A-Za-z0-9_-]` is accepted.
    fn check_name(source: &str) -> Result<(), DataSourceError> {
        let valid = !source.is_empty()
            && source
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(DataSourceError::UnknownSource(source.to_string()))
        }
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        source: &str,
        file_name: &str,
    ) -> Result<Option<T>, DataSourceError> {
        let path = self.dir.join(file_name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DataSourceError::Unreadable {
                    source_id: source.to_string(),
                    reason: format!("{}: {}", path.display(), e),
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DataSourceError::Unreadable {
                source_id: source.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })
    }

    /// Timeframe-specific file first, then the generic one.
    async fn read_optional<T: DeserializeOwned>(
        &self,
        source: &str,
        timeframe: Timeframe,
        kind: &str,
    ) -> Result<Option<T>, DataSourceError> {
        Self::check_name(source)?;
        let specific = format!("{}.{}.{}.json", source, timeframe.as_str(), kind);
        if let Some(found) = self.read_json(source, &specific).await? {
            return Ok(Some(found));
        }
        self.read_json(source, &format!("{}.{}.json", source, kind))
            .await
    }
}

#[async_trait]
impl DataSourceAdapter for JsonDirDataSource {
    async fn fetch_records(&self, source: &str) -> Result<RecordSet, DataSourceError> {
        Self::check_name(source)?;
        self.read_json(source, &format!("{}.json", source))
            .await?
            .ok_or_else(|| DataSourceError::UnknownSource(source.to_string()))
    }

    async fn fetch_previous_period(
        &self,
        source: &str,
        timeframe: Timeframe,
    ) -> Result<Option<RecordSet>, DataSourceError> {
        self.read_optional(source, timeframe, "previous").await
    }

    async fn fetch_history(
        &self,
        source: &str,
        timeframe: Timeframe,
    ) -> Result<Option<Vec<HistoryBucket>>, DataSourceError> {
        self.read_optional(source, timeframe, "history").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use contracts::shared::kpi_filter::FieldValue;
    use std::fs;

    #[tokio::test]
    async fn test_reads_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("deals.json"),
            r#"[
                {"stage": "closed-won", "value": 100000, "closed_on": "2026-02-15"},
                {"stage": "proposal", "value": 50000, "won": false, "note": null}
            ]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("deals.previous.json"),
            r#"[{"stage": "closed-won", "value": 1}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("deals.monthly.history.json"),
            r#"[{"label": "2026-09", "records": []}, {"label": "2026-10", "records": [{"value": 3}]}]"#,
        )
        .unwrap();

        let adapter = JsonDirDataSource::new(dir.path());
        let records = adapter.fetch_records("deals").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["value"], FieldValue::Number(100000.0));
        assert_eq!(
            records[0]["closed_on"],
            FieldValue::Date(NaiveDate::from_ymd_opt(2026, 2, 15).unwrap())
        );
        assert_eq!(records[1]["won"], FieldValue::Bool(false));
        assert_eq!(records[1]["note"], FieldValue::Null);

        let previous = adapter
            .fetch_previous_period("deals", Timeframe::Weekly)
            .await
            .unwrap();
        assert_eq!(previous.map(|r| r.len()), Some(1));

        let history = adapter
            .fetch_history("deals", Timeframe::Monthly)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].label, "2026-10");
        assert!(adapter
            .fetch_history("deals", Timeframe::Yearly)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("team.json"), "{ not json").unwrap();
        let adapter = JsonDirDataSource::new(dir.path());

        assert!(matches!(
            adapter.fetch_records("leads").await,
            Err(DataSourceError::UnknownSource(_))
        ));
        assert!(matches!(
            adapter.fetch_records("team").await,
            Err(DataSourceError::Unreadable { .. })
        ));
        assert!(matches!(
            adapter.fetch_records("../etc/passwd").await,
            Err(DataSourceError::UnknownSource(_))
        ));
    }
}
