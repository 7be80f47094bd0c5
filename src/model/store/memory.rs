use std::collections::HashMap;
use std::sync::Arc;

use rocket::tokio::sync::Mutex;

use super::{BallotLog, KeyRegistry, StoreError};
use crate::model::{
    db::ballot_log::{BallotLogEntry, NewBallotLogEntry},
    key::PublicKeyDescriptor,
    voter::VoterId,
};

/// A volatile store holding both the key registry and the ballot log.
///
/// Clones share the same underlying data. Appends happen under a single
/// lock, so a batch is always observed either fully or not at all.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    keys: Mutex<HashMap<VoterId, PublicKeyDescriptor>>,
    log: Mutex<Vec<BallotLogEntry>>,
}

impl MemoryStore {
    /// Every entry in the log, in sequence order.
    pub async fn all_entries(&self) -> Vec<BallotLogEntry> {
        self.inner.log.lock().await.clone()
    }
}

#[rocket::async_trait]
impl KeyRegistry for MemoryStore {
    async fn register(
        &self,
        voter_id: &VoterId,
        descriptor: &PublicKeyDescriptor,
    ) -> Result<(), StoreError> {
        self.inner
            .keys
            .lock()
            .await
            .insert(voter_id.clone(), descriptor.clone());
        Ok(())
    }

    async fn lookup(&self, voter_id: &VoterId) -> Result<Option<PublicKeyDescriptor>, StoreError> {
        Ok(self.inner.keys.lock().await.get(voter_id).cloned())
    }
}

#[rocket::async_trait]
impl BallotLog for MemoryStore {
    async fn append(&self, entries: Vec<NewBallotLogEntry>) -> Result<Vec<u64>, StoreError> {
        let mut log = self.inner.log.lock().await;
        // Sequence numbers start at 1, like the database counter.
        let first = log.len() as u64 + 1;
        let sequences = (first..first + entries.len() as u64).collect::<Vec<_>>();
        log.extend(
            sequences
                .iter()
                .zip(entries)
                .map(|(sequence, entry)| BallotLogEntry::new(*sequence, entry)),
        );
        Ok(sequences)
    }

    async fn entries_for(
        &self,
        voter_id: &VoterId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<BallotLogEntry>, StoreError> {
        let log = self.inner.log.lock().await;
        let page = log
            .iter()
            .filter(|entry| &entry.voter_id == voter_id)
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(page)
    }

    async fn count_for(&self, voter_id: &VoterId) -> Result<u64, StoreError> {
        let log = self.inner.log.lock().await;
        Ok(log.iter().filter(|entry| &entry.voter_id == voter_id).count() as u64)
    }
}
