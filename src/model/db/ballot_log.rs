use std::ops::{Deref, DerefMut};

use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::voter::VoterId;

/// Core ballot log data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotLogEntryCore {
    /// The voter who signed the ballot.
    pub voter_id: VoterId,
    /// Canonical encoding of the ballot: exactly the bytes that were verified.
    pub ballot: String,
    /// The signature as submitted, standard base64.
    pub signature: String,
    /// When the batch containing this ballot was admitted.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub admitted_at: DateTime<Utc>,
}

impl BallotLogEntryCore {
    pub fn new(voter_id: VoterId, ballot: String, signature: String, admitted_at: DateTime<Utc>) -> Self {
        Self {
            voter_id,
            ballot,
            signature,
            // Stored timestamps only keep millisecond precision.
            admitted_at: admitted_at.trunc_subsecs(3),
        }
    }
}

/// A ballot log entry before it has been assigned a sequence number.
pub type NewBallotLogEntry = BallotLogEntryCore;

/// A ballot log entry from the database, with its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotLogEntry {
    #[serde(rename = "_id")]
    pub sequence: u64,
    #[serde(flatten)]
    pub entry: BallotLogEntryCore,
}

impl BallotLogEntry {
    pub fn new(sequence: u64, entry: NewBallotLogEntry) -> Self {
        Self { sequence, entry }
    }
}

impl Deref for BallotLogEntry {
    type Target = BallotLogEntryCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

impl DerefMut for BallotLogEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl BallotLogEntryCore {
        pub fn example(voter_id: VoterId, ballot: &str) -> Self {
            Self::new(voter_id, ballot.to_string(), "c2ln".to_string(), Utc::now())
        }
    }
}
