use serde::{Deserialize, Serialize};

use crate::model::{key::PublicKeyDescriptor, voter::VoterId};

/// Body of a key registration request, and the response to a key lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterKey {
    pub voter_id: VoterId,
    pub ssi_public_jwk: PublicKeyDescriptor,
}

impl VoterKey {
    pub fn new(voter_id: VoterId, ssi_public_jwk: PublicKeyDescriptor) -> Self {
        Self {
            voter_id,
            ssi_public_jwk,
        }
    }
}

/// Acknowledgement for requests with nothing else to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
