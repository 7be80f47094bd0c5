//! Batch admission: verify every signature of a submission, then append the
//! whole batch to the ballot log or nothing at all.

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::Config,
    model::{
        ballot::{encode_to_string, Ballot},
        db::ballot_log::NewBallotLogEntry,
        key::{KeyError, PublicKeyDescriptor, VerificationKey},
        signature::{decode_signature, verify_encoded},
        store::{BallotLog, KeyRegistry, StoreError},
        voter::VoterId,
    },
};

/// A ballot together with the voter's signature over its canonical encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBallot {
    pub ballot: Ballot,
    /// Standard base64 of the signature bytes.
    pub signature: String,
}

/// A batch of signed ballots from one voter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub voter_id: VoterId,
    /// Key to verify with instead of the registered one.
    #[serde(rename = "ssi_public_jwk", default, skip_serializing_if = "Option::is_none")]
    pub inline_key: Option<PublicKeyDescriptor>,
    pub ballots: Vec<SignedBallot>,
}

/// Outcome of a fully admitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResult {
    pub admitted_count: usize,
}

/// Why a batch was refused. Nothing from a refused batch is stored.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("No SSI key registered for voter {0} and none supplied")]
    NoRegisteredKey(VoterId),
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    /// `position` is 1-indexed.
    #[error("Signature of ballot {position} was rejected")]
    SignatureRejected { position: usize },
    #[error("Batch of {size} ballots exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("Batch contains no ballots")]
    EmptyBatch,
    #[error("Inline keys are not accepted; register the key first")]
    InlineKeyForbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs submissions against a key registry and a ballot log.
pub struct AdmissionController<'a> {
    config: &'a Config,
    registry: &'a dyn KeyRegistry,
    log: &'a dyn BallotLog,
}

impl<'a> AdmissionController<'a> {
    pub fn new(config: &'a Config, registry: &'a dyn KeyRegistry, log: &'a dyn BallotLog) -> Self {
        Self {
            config,
            registry,
            log,
        }
    }

    /// Verify and admit a batch.
    ///
    /// Storage is only written once every ballot has verified, and then the
    /// whole batch is appended in one atomic step.
    pub async fn submit(&self, submission: Submission) -> Result<AdmissionResult, AdmissionError> {
        let Submission {
            voter_id,
            inline_key,
            ballots,
        } = submission;

        self.check_shape(inline_key.is_some(), ballots.len())?;
        let key = self.resolve_key(&voter_id, inline_key).await?;

        let verified = verify_batch(&key, &ballots).map_err(|err| {
            warn!("Rejected batch of {} from voter {voter_id}: {err}", ballots.len());
            err
        })?;

        let admitted_at = Utc::now();
        let entries = verified
            .into_iter()
            .map(|(ballot, signature)| {
                NewBallotLogEntry::new(voter_id.clone(), ballot, signature, admitted_at)
            })
            .collect::<Vec<_>>();
        let sequences = self.log.append(entries).await?;

        info!(
            "Admitted {} ballot(s) from voter {voter_id} as entries {:?}",
            sequences.len(),
            sequences
        );
        Ok(AdmissionResult {
            admitted_count: sequences.len(),
        })
    }

    /// Checks that need neither storage nor cryptography.
    fn check_shape(&self, has_inline_key: bool, size: usize) -> Result<(), AdmissionError> {
        if size == 0 {
            return Err(AdmissionError::EmptyBatch);
        }
        let limit = self.config.max_batch_size();
        if size > limit {
            return Err(AdmissionError::BatchTooLarge { size, limit });
        }
        if has_inline_key && !self.config.accept_inline_keys() {
            return Err(AdmissionError::InlineKeyForbidden);
        }
        Ok(())
    }

    /// The inline key if given, else the registered one, imported.
    async fn resolve_key(
        &self,
        voter_id: &VoterId,
        inline_key: Option<PublicKeyDescriptor>,
    ) -> Result<VerificationKey, AdmissionError> {
        let descriptor = match inline_key {
            Some(descriptor) => {
                debug!("Verifying batch from voter {voter_id} with inline key");
                descriptor
            }
            None => {
                debug!("Verifying batch from voter {voter_id} with registered key");
                self.registry
                    .lookup(voter_id)
                    .await?
                    .ok_or_else(|| AdmissionError::NoRegisteredKey(voter_id.clone()))?
            }
        };
        Ok(descriptor.import()?)
    }
}

/// Check every ballot in order, stopping at the first bad signature.
/// Returns the canonical text and trimmed signature of each ballot.
fn verify_batch(
    key: &VerificationKey,
    ballots: &[SignedBallot],
) -> Result<Vec<(String, String)>, AdmissionError> {
    ballots
        .iter()
        .enumerate()
        .map(|(i, signed)| {
            let encoded = encode_to_string(&signed.ballot);
            let valid = decode_signature(&signed.signature)
                .map(|signature| verify_encoded(key, encoded.as_bytes(), &signature))
                .unwrap_or(false);
            if valid {
                Ok((encoded, signed.signature.trim().to_string()))
            } else {
                Err(AdmissionError::SignatureRejected { position: i + 1 })
            }
        })
        .collect()
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use p256::ecdsa::SigningKey;

    use super::*;
    use crate::model::signature::examples::sign;

    impl SignedBallot {
        pub fn example(key: &SigningKey, choice: &str) -> Self {
            let ballot = Ballot::example(choice);
            Self {
                signature: sign(key, &ballot),
                ballot,
            }
        }
    }

    impl Submission {
        /// A submission relying on the registered key.
        pub fn example(voter_id: VoterId, ballots: Vec<SignedBallot>) -> Self {
            Self {
                voter_id,
                inline_key: None,
                ballots,
            }
        }
    }
}
