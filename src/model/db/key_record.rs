use serde::{Deserialize, Serialize};

use crate::model::{key::PublicKeyDescriptor, voter::VoterId};

/// A voter's registered key, as stored in the database.
/// There is at most one record per voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRegistryRecord {
    #[serde(rename = "_id")]
    pub voter_id: VoterId,
    pub ssi_public_jwk: PublicKeyDescriptor,
}

impl KeyRegistryRecord {
    pub fn new(voter_id: VoterId, ssi_public_jwk: PublicKeyDescriptor) -> Self {
        Self {
            voter_id,
            ssi_public_jwk,
        }
    }
}
