//! The storage boundary: the key registry and the append-only ballot log.
//!
//! Everything behind these traits may block on I/O; everything in front of
//! them is pure computation.

use std::sync::Arc;

use thiserror::Error;

use crate::model::{
    db::ballot_log::{BallotLogEntry, NewBallotLogEntry},
    key::PublicKeyDescriptor,
    voter::VoterId,
};

mod locks;
mod memory;

pub use locks::{VoterGuard, VoterLocks};
pub use memory::MemoryStore;

/// Storage-layer failures. None of these leave a batch partially appended.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error("Counter `{0}` does not exist")]
    MissingCounter(&'static str),
    #[error("Gave up committing after {0} conflicting attempts")]
    Contention(u32),
}

/// Maps each voter to their current public key.
#[rocket::async_trait]
pub trait KeyRegistry: Send + Sync {
    /// Store `descriptor` as the voter's key, replacing any previous one.
    async fn register(
        &self,
        voter_id: &VoterId,
        descriptor: &PublicKeyDescriptor,
    ) -> Result<(), StoreError>;

    /// The voter's current key, if one was ever registered.
    async fn lookup(&self, voter_id: &VoterId) -> Result<Option<PublicKeyDescriptor>, StoreError>;
}

/// The durable, append-only log of admitted ballots.
#[rocket::async_trait]
pub trait BallotLog: Send + Sync {
    /// Append every entry, or none of them. Returns the assigned sequence
    /// numbers in the same order as `entries`.
    ///
    /// Concurrent appends touching the same voter are serialised.
    async fn append(&self, entries: Vec<NewBallotLogEntry>) -> Result<Vec<u64>, StoreError>;

    /// A page of the voter's entries in sequence order.
    async fn entries_for(
        &self,
        voter_id: &VoterId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<BallotLogEntry>, StoreError>;

    /// Total number of entries for the voter.
    async fn count_for(&self, voter_id: &VoterId) -> Result<u64, StoreError>;
}

/// The storage backends the server runs against, held in managed state.
#[derive(Clone)]
pub struct Stores {
    pub registry: Arc<dyn KeyRegistry>,
    pub log: Arc<dyn BallotLog>,
}

impl Stores {
    /// Use a single backend for both the registry and the log.
    pub fn shared<S>(store: S) -> Self
    where
        S: KeyRegistry + BallotLog + 'static,
    {
        let store = Arc::new(store);
        Self {
            registry: store.clone(),
            log: store,
        }
    }
}
