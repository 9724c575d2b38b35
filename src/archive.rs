//! Durable game archive
//!
//! The only external collaborator of the coordination core. Ended games are
//! stored here keyed by room code; the live registries consult the archive as
//! a fallback when a code has no in-memory state (process restart, retired
//! finished room).

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::lobby::room::RoomSnapshot;

/// Durable record for one room code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveRecord {
    /// False for a game that was registered but never concluded (its live
    /// state may have been lost to a restart).
    pub ended: bool,
    /// Present once the game ended.
    pub snapshot: Option<RoomSnapshot>,
}

/// Returned by `create` when the code is already registered; the controller
/// treats it as a collision and retries code generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("room code already archived")]
pub struct AlreadyExists;

/// Narrow load/store contract with the durable store.
///
/// Injectable so tests run against an isolated in-memory archive; a
/// relational store plugs in behind the same seam.
#[async_trait]
pub trait GameArchive: Send + Sync {
    /// `None` if the code was never created.
    async fn lookup(&self, code: &str) -> Option<ArchiveRecord>;

    /// Durably register a new room code at creation time.
    async fn create(&self, code: &str) -> Result<(), AlreadyExists>;

    /// Mark the code ended and store its membership snapshot.
    async fn finalize(&self, code: &str, snapshot: RoomSnapshot);
}

/// Process-local archive backed by a map.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    records: Mutex<HashMap<String, ArchiveRecord>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameArchive for MemoryArchive {
    async fn lookup(&self, code: &str) -> Option<ArchiveRecord> {
        self.records.lock().await.get(code).cloned()
    }

    async fn create(&self, code: &str) -> Result<(), AlreadyExists> {
        let mut records = self.records.lock().await;
        if records.contains_key(code) {
            return Err(AlreadyExists);
        }
        records.insert(code.to_string(), ArchiveRecord::default());
        Ok(())
    }

    async fn finalize(&self, code: &str, snapshot: RoomSnapshot) {
        let mut records = self.records.lock().await;
        let record = records.entry(code.to_string()).or_default();
        record.ended = true;
        record.snapshot = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_of_unknown_code_is_none() {
        let archive = MemoryArchive::new();
        assert_eq!(archive.lookup("AB12").await, None);
    }

    #[tokio::test]
    async fn create_registers_an_unfinished_record() {
        let archive = MemoryArchive::new();
        archive.create("AB12").await.unwrap();

        let record = archive.lookup("AB12").await.unwrap();
        assert!(!record.ended);
        assert_eq!(record.snapshot, None);
    }

    #[tokio::test]
    async fn create_of_existing_code_is_a_collision() {
        let archive = MemoryArchive::new();
        archive.create("AB12").await.unwrap();
        assert_eq!(archive.create("AB12").await, Err(AlreadyExists));
    }

    #[tokio::test]
    async fn finalize_marks_ended_and_stores_snapshot() {
        let archive = MemoryArchive::new();
        archive.create("AB12").await.unwrap();

        let snapshot = RoomSnapshot {
            players: vec!["alice".to_string()],
            spectators: vec![],
        };
        archive.finalize("AB12", snapshot.clone()).await;

        let record = archive.lookup("AB12").await.unwrap();
        assert!(record.ended);
        assert_eq!(record.snapshot, Some(snapshot));
    }
}
