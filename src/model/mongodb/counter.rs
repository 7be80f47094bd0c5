use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::model::{mongodb::Coll, store::StoreError};

/// ID of the counter that numbers ballot log entries.
pub const BALLOT_SEQUENCE_COUNTER_ID: &str = "ballot_sequence";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u64,
}

impl Counter {
    /// Create a new `Counter` starting at the given value.
    pub fn new(id: impl Into<String>, start: u64) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically reserve `count` consecutive values of the counter with the
    /// given ID, as part of the session's transaction. Returns the first value.
    pub async fn reserve(
        counters: &Coll<Counter>,
        id: &'static str,
        count: u64,
        session: &mut ClientSession,
    ) -> Result<u64, StoreError> {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        let update = doc! {
            "$inc": { "next": count }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update_with_session(doc! { "_id": id }, update, options, session)
            .await?
            .ok_or(StoreError::MissingCounter(id))?;
        Ok(counter.next)
    }
}

/// Create the ballot sequence counter, starting at 1, unless it already exists.
///
/// This operation is idempotent.
pub async fn ensure_ballot_sequence_counter_exists(counters: &Coll<Counter>) -> Result<(), DbError> {
    debug!("Ensuring ballot sequence counter exists");
    let update = doc! {
        "$setOnInsert": { "next": 1_i64 }
    };
    let options = UpdateOptions::builder().upsert(true).build();
    counters
        .update_one(doc! { "_id": BALLOT_SEQUENCE_COUNTER_ID }, update, options)
        .await?;
    Ok(())
}
