use std::time::Duration;

use log::{debug, error, warn};
use mongodb::{
    bson::doc,
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR},
    options::{FindOptions, ReplaceOptions},
    Client, ClientSession,
};
use rocket::{futures::TryStreamExt, tokio::time::sleep};

use super::{
    collection::{ensure_indexes_exist, Coll},
    counter::{ensure_ballot_sequence_counter_exists, Counter, BALLOT_SEQUENCE_COUNTER_ID},
};
use crate::model::{
    db::{
        ballot_log::{BallotLogEntry, NewBallotLogEntry},
        key_record::KeyRegistryRecord,
    },
    key::PublicKeyDescriptor,
    store::{BallotLog, KeyRegistry, StoreError, VoterLocks},
    voter::VoterId,
};

/// How many times a commit is attempted when transactions keep conflicting.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Pause before a retry, multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// MongoDB-backed key registry and ballot log.
///
/// Appends run in a multi-document transaction, which requires the server
/// to be a replica set member or behind a mongos.
pub struct MongoStore {
    client: Client,
    keys: Coll<KeyRegistryRecord>,
    ballots: Coll<BallotLogEntry>,
    counters: Coll<Counter>,
    locks: VoterLocks,
}

impl MongoStore {
    /// Open the store on the named database, creating the indexes and
    /// counters it relies on.
    pub async fn open(client: Client, db_name: &str) -> Result<Self, DbError> {
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        let counters = Coll::from_db(&db);
        ensure_ballot_sequence_counter_exists(&counters).await?;

        Ok(Self {
            keys: Coll::from_db(&db),
            ballots: Coll::from_db(&db),
            counters,
            client,
            locks: VoterLocks::default(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// One transactional attempt at appending the batch.
    async fn try_append(&self, entries: &[NewBallotLogEntry]) -> Result<Vec<u64>, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        match self.insert_entries(entries, &mut session).await {
            Ok(sequences) => {
                session.commit_transaction().await?;
                Ok(sequences)
            }
            Err(err) => {
                // The transaction would also be aborted when the session is
                // dropped, but an explicit abort releases its locks sooner.
                if let Err(abort_err) = session.abort_transaction().await {
                    debug!("Abort after failed append also failed: {abort_err}");
                }
                Err(err)
            }
        }
    }

    async fn insert_entries(
        &self,
        entries: &[NewBallotLogEntry],
        session: &mut ClientSession,
    ) -> Result<Vec<u64>, StoreError> {
        let count = entries.len() as u64;
        let first =
            Counter::reserve(&self.counters, BALLOT_SEQUENCE_COUNTER_ID, count, session).await?;

        let documents = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| BallotLogEntry::new(first + i as u64, entry.clone()))
            .collect::<Vec<_>>();
        self.ballots
            .insert_many_with_session(&documents, None, session)
            .await?;

        Ok(documents.iter().map(|entry| entry.sequence).collect())
    }
}

/// Whether the server says the whole transaction may be retried.
fn is_transient(err: &StoreError) -> bool {
    matches!(err, StoreError::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

#[rocket::async_trait]
impl KeyRegistry for MongoStore {
    async fn register(
        &self,
        voter_id: &VoterId,
        descriptor: &PublicKeyDescriptor,
    ) -> Result<(), StoreError> {
        let record = KeyRegistryRecord::new(voter_id.clone(), descriptor.clone());
        let options = ReplaceOptions::builder().upsert(true).build();
        self.keys
            .replace_one(doc! { "_id": voter_id }, &record, options)
            .await?;
        Ok(())
    }

    async fn lookup(&self, voter_id: &VoterId) -> Result<Option<PublicKeyDescriptor>, StoreError> {
        let record = self.keys.find_one(doc! { "_id": voter_id }, None).await?;
        Ok(record.map(|record| record.ssi_public_jwk))
    }
}

#[rocket::async_trait]
impl BallotLog for MongoStore {
    async fn append(&self, entries: Vec<NewBallotLogEntry>) -> Result<Vec<u64>, StoreError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.locks.acquire(entries.iter().map(|e| &e.voter_id)).await;
        let mut attempt = 1;
        loop {
            match self.try_append(&entries).await {
                Ok(sequences) => return Ok(sequences),
                Err(err) if is_transient(&err) => {
                    if attempt >= MAX_COMMIT_ATTEMPTS {
                        error!("Ballot append still conflicting after {attempt} attempts: {err}");
                        return Err(StoreError::Contention(attempt));
                    }
                    warn!("Ballot append conflicted (attempt {attempt}), retrying: {err}");
                    sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn entries_for(
        &self,
        voter_id: &VoterId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<BallotLogEntry>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let entries = self
            .ballots
            .find(doc! { "voter_id": voter_id }, options)
            .await?
            .try_collect()
            .await?;
        Ok(entries)
    }

    async fn count_for(&self, voter_id: &VoterId) -> Result<u64, StoreError> {
        let count = self
            .ballots
            .count_documents(doc! { "voter_id": voter_id }, None)
            .await?;
        Ok(count)
    }
}
