//! ECDSA P-256 / SHA-256 signature checks over canonical ballot bytes.

use data_encoding::BASE64;
use p256::ecdsa::{signature::DigestVerifier, Signature};
use sha2::{Digest, Sha256};

use crate::model::{
    ballot::{encode, Ballot},
    key::VerificationKey,
};

/// Byte length of a fixed-width `r || s` signature, as produced by WebCrypto.
const FIXED_SIGNATURE_LEN: usize = 64;

/// Decode the standard base64 transport form of a signature.
pub fn decode_signature(encoded: &str) -> Option<Vec<u8>> {
    BASE64.decode(encoded.trim().as_bytes()).ok()
}

/// Check `signature` over the canonical encoding of `ballot`.
///
/// Never fails: any malformed or mismatched signature is simply `false`.
pub fn verify(key: &VerificationKey, ballot: &Ballot, signature: &[u8]) -> bool {
    verify_encoded(key, &encode(ballot), signature)
}

/// Check `signature` over already-encoded ballot bytes.
pub(crate) fn verify_encoded(key: &VerificationKey, encoded: &[u8], signature: &[u8]) -> bool {
    let Some(signature) = parse_signature(signature) else {
        return false;
    };
    let digest = Sha256::new_with_prefix(encoded);
    key.0.verify_digest(digest, &signature).is_ok()
}

/// Accept both fixed-width and DER signatures.
fn parse_signature(bytes: &[u8]) -> Option<Signature> {
    if bytes.len() == FIXED_SIGNATURE_LEN {
        Signature::from_slice(bytes).ok()
    } else {
        Signature::from_der(bytes).ok()
    }
}
