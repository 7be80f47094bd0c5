use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{ballot_log::BallotLogEntry, key_record::KeyRegistryRecord};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for KeyRegistryRecord {
    const NAME: &'static str = "ssi_keys";
}

impl MongoCollection for BallotLogEntry {
    const NAME: &'static str = "offline_ballots";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // Key records are keyed by voter ID already; ballots are listed per voter.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "_id": 1})
        .options(IndexOptions::builder().name("voter_sequence".to_string()).build())
        .build();
    Coll::<BallotLogEntry>::from_db(db)
        .create_index(ballot_index, None)
        .await?;

    Ok(())
}
