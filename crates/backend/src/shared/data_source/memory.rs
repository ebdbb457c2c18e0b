use async_trait::async_trait;
use contracts::domain::a001_kpi::aggregate::Timeframe;
use contracts::shared::indicators::{HistoryBucket, RecordSet};
use std::collections::HashMap;
use std::sync::RwLock;

use super::DataSourceAdapter;
use crate::shared::error::DataSourceError;

#[derive(Debug, Clone, Default)]
struct SourceData {
    records: RecordSet,
    previous: Option<RecordSet>,
    history: Option<Vec<HistoryBucket>>,
}

/// Adapter over snapshots held in memory. Snapshots can be replaced while
/// the engine is running; the next fetch sees the new data.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    sources: RwLock<HashMap<String, SourceData>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, source: &str, records: RecordSet) -> Self {
        self.set_records(source, records);
        self
    }

    pub fn set_records(&self, source: &str, records: RecordSet) {
        self.update(source, |data| data.records = records);
    }

    pub fn set_previous(&self, source: &str, records: RecordSet) {
        self.update(source, |data| data.previous = Some(records));
    }

    pub fn set_history(&self, source: &str, history: Vec<HistoryBucket>) {
        self.update(source, |data| data.history = Some(history));
    }

    pub fn remove(&self, source: &str) {
        if let Ok(mut sources) = self.sources.write() {
            sources.remove(source);
        }
    }

    fn update(&self, source: &str, apply: impl FnOnce(&mut SourceData)) {
        match self.sources.write() {
            Ok(mut sources) => apply(sources.entry(source.to_string()).or_default()),
            Err(_) => tracing::error!("in-memory data source lock poisoned; `{}` not updated", source),
        }
    }

    fn read<T>(
        &self,
        source: &str,
        pick: impl FnOnce(&SourceData) -> T,
    ) -> Result<T, DataSourceError> {
        let sources = self.sources.read().map_err(|_| DataSourceError::Unreadable {
            source_id: source.to_string(),
            reason: "lock poisoned".to_string(),
        })?;
        sources
            .get(source)
            .map(pick)
            .ok_or_else(|| DataSourceError::UnknownSource(source.to_string()))
    }
}

#[async_trait]
impl DataSourceAdapter for InMemoryDataSource {
    async fn fetch_records(&self, source: &str) -> Result<RecordSet, DataSourceError> {
        self.read(source, |data| data.records.clone())
    }

    async fn fetch_previous_period(
        &self,
        source: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<RecordSet>, DataSourceError> {
        self.read(source, |data| data.previous.clone())
    }

    async fn fetch_history(
        &self,
        source: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<Vec<HistoryBucket>>, DataSourceError> {
        self.read(source, |data| data.history.clone())
    }
}
