use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::model::{MeetingRecord, RecordFilter};

/// Durable storage of completed meetings
#[async_trait::async_trait]
pub trait MeetingStore: Send + Sync {
    /// Store a record, newest first; a record with the same id is replaced
    async fn save(&self, record: MeetingRecord) -> Result<()>;

    /// Replace transcript and summary; returns false for unknown ids
    async fn update(&self, id: &str, transcript: &str, summary: &str) -> Result<bool>;

    /// Remove a record; returns false for unknown ids
    async fn delete(&self, id: &str) -> Result<bool>;

    /// All records, newest first
    async fn list(&self) -> Result<Vec<MeetingRecord>>;

    async fn get(&self, id: &str) -> Result<Option<MeetingRecord>> {
        Ok(self.list().await?.into_iter().find(|r| r.id == id))
    }

    async fn find(&self, filter: &RecordFilter) -> Result<Vec<MeetingRecord>> {
        let mut records = self.list().await?;
        records.retain(|r| filter.matches(r));
        Ok(records)
    }
}

fn insert_newest_first(records: &mut Vec<MeetingRecord>, record: MeetingRecord) {
    records.retain(|r| r.id != record.id);
    records.insert(0, record);
}

fn remove_record(records: &mut Vec<MeetingRecord>, id: &str) -> bool {
    let before = records.len();
    records.retain(|r| r.id != id);
    records.len() != before
}

fn apply_update(records: &mut [MeetingRecord], id: &str, transcript: &str, summary: &str) -> bool {
    match records.iter_mut().find(|r| r.id == id) {
        Some(record) => {
            record.transcript = transcript.to_string();
            record.summary = summary.to_string();
            true
        }
        None => false,
    }
}

/// In-process store, used by tests and the demo
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<MeetingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MeetingStore for MemoryStore {
    async fn save(&self, record: MeetingRecord) -> Result<()> {
        insert_newest_first(&mut self.records.lock(), record);
        Ok(())
    }

    async fn update(&self, id: &str, transcript: &str, summary: &str) -> Result<bool> {
        Ok(apply_update(&mut self.records.lock(), id, transcript, summary))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(remove_record(&mut self.records.lock(), id))
    }

    async fn list(&self) -> Result<Vec<MeetingRecord>> {
        Ok(self.records.lock().clone())
    }
}

/// All records in one JSON array file
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash never leaves a half-written file behind.
pub struct JsonFileStore {
    path: PathBuf,
    records: tokio::sync::Mutex<Vec<MeetingRecord>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read meetings file: {:?}", path))?;
            match serde_json::from_str(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Ignoring unreadable meetings file {:?}: {}", path, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!(
            "Meeting store opened: {:?} ({} meetings)",
            path,
            records.len()
        );

        Ok(Self {
            path,
            records: tokio::sync::Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[MeetingRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create storage directory")?;
            }
        }

        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {:?}", self.path))?;

        debug!("Persisted {} meetings to {:?}", records.len(), self.path);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MeetingStore for JsonFileStore {
    async fn save(&self, record: MeetingRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        insert_newest_first(&mut records, record);
        self.persist(&records).await
    }

    async fn update(&self, id: &str, transcript: &str, summary: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        if !apply_update(&mut records, id, transcript, summary) {
            return Ok(false);
        }
        self.persist(&records).await?;
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        if !remove_record(&mut records, id) {
            return Ok(false);
        }
        self.persist(&records).await?;
        info!("Deleted meeting {} from {:?}", id, self.path);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<MeetingRecord>> {
        Ok(self.records.lock().await.clone())
    }
}
