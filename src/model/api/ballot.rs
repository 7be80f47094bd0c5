use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{db::ballot_log::BallotLogEntry, voter::VoterId};

/// A ballot log entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedBallot {
    pub sequence: u64,
    pub voter_id: VoterId,
    /// Canonical encoding of the ballot.
    pub ballot: String,
    pub signature: String,
    pub admitted_at: DateTime<Utc>,
}

impl From<BallotLogEntry> for AdmittedBallot {
    fn from(entry: BallotLogEntry) -> Self {
        Self {
            sequence: entry.sequence,
            voter_id: entry.entry.voter_id,
            ballot: entry.entry.ballot,
            signature: entry.entry.signature,
            admitted_at: entry.entry.admitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;
    use crate::model::db::ballot_log::BallotLogEntryCore;

    #[test]
    fn timestamps_are_rfc3339() {
        let mut entry = BallotLogEntry::new(
            7,
            BallotLogEntryCore::example(VoterId::example(), r#"{"choice":"A"}"#),
        );
        entry.admitted_at = DateTime::parse_from_rfc3339("2025-10-09T08:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);

        let json = serde_json::to_value(AdmittedBallot::from(entry)).unwrap();
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["voter_id"], "V1");
        assert_eq!(json["ballot"], r#"{"choice":"A"}"#);
        assert_eq!(json["admitted_at"], "2025-10-09T08:00:00.123Z");
    }
}
