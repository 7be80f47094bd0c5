//! Import of voter-held public keys.
//!
//! Keys travel in the JWK-style shape produced by WebCrypto:
//! `{kty: "EC", crv: "P-256", x: <base64url>, y: <base64url>}`.

use std::fmt::{Display, Formatter};

use data_encoding::BASE64URL_NOPAD;
use p256::{ecdsa::VerifyingKey, EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only key type accepted.
pub const KEY_TYPE: &str = "EC";

/// Accepted names for the P-256 curve.
pub const CURVE_NAMES: [&str; 2] = ["P-256", "secp256r1"];

/// Byte length of a P-256 affine coordinate.
const COORDINATE_LEN: usize = 32;

/// Failure to turn a [`PublicKeyDescriptor`] into a [`VerificationKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Unsupported key type {kty:?} on curve {crv:?}; expected an EC key on P-256")]
    UnsupportedKeyType { kty: String, crv: String },
    #[error("Malformed {coordinate} coordinate: {reason}")]
    MalformedCoordinate {
        coordinate: Coordinate,
        reason: String,
    },
}

/// Which half of the point a [`KeyError::MalformedCoordinate`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    X,
    Y,
    /// Both decoded, but together they are not a point on the curve.
    Point,
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
            Self::Point => write!(f, "(x, y)"),
        }
    }
}

/// A public key as described by the voter.
///
/// Missing fields deserialize as empty strings, so that an incomplete
/// descriptor is reported by [`PublicKeyDescriptor::import`] rather than
/// as a body parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyDescriptor {
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub crv: String,
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
}

impl PublicKeyDescriptor {
    /// Validate the descriptor and build a key that can check signatures.
    ///
    /// Performs no I/O.
    pub fn import(&self) -> Result<VerificationKey, KeyError> {
        if self.kty != KEY_TYPE || !CURVE_NAMES.contains(&self.crv.as_str()) {
            return Err(KeyError::UnsupportedKeyType {
                kty: self.kty.clone(),
                crv: self.crv.clone(),
            });
        }

        let x = decode_coordinate(&self.x, Coordinate::X)?;
        let y = decode_coordinate(&self.y, Coordinate::Y)?;
        let point = EncodedPoint::from_affine_coordinates(&x, &y, false);

        VerifyingKey::from_encoded_point(&point)
            .map(VerificationKey)
            .map_err(|_| KeyError::MalformedCoordinate {
                coordinate: Coordinate::Point,
                reason: "not a point on P-256".to_string(),
            })
    }

    /// Describe an existing key, using unpadded base64url coordinates.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        // An uncompressed encoding of a valid key always carries both coordinates.
        let x = point.x().map(|x| BASE64URL_NOPAD.encode(x)).unwrap_or_default();
        let y = point.y().map(|y| BASE64URL_NOPAD.encode(y)).unwrap_or_default();
        Self {
            kty: KEY_TYPE.to_string(),
            crv: CURVE_NAMES[0].to_string(),
            x,
            y,
        }
    }
}

/// Decode one base64url big-endian coordinate into a fixed-width field element.
/// Padding is optional, and leading zero bytes may be omitted or added.
fn decode_coordinate(encoded: &str, coordinate: Coordinate) -> Result<FieldBytes, KeyError> {
    let malformed = |reason: String| KeyError::MalformedCoordinate { coordinate, reason };

    let raw = BASE64URL_NOPAD
        .decode(encoded.trim_end_matches('=').as_bytes())
        .map_err(|e| malformed(format!("invalid base64url: {e}")))?;

    let first_significant = raw.iter().position(|b| *b != 0).unwrap_or(raw.len());
    let significant = &raw[first_significant..];
    if significant.len() > COORDINATE_LEN {
        return Err(malformed(format!(
            "{} bytes exceeds the {COORDINATE_LEN} byte field size",
            significant.len()
        )));
    }

    let mut bytes = FieldBytes::default();
    bytes[COORDINATE_LEN - significant.len()..].copy_from_slice(significant);
    Ok(bytes)
}

/// An imported public key, ready to check signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey(pub(crate) VerifyingKey);

impl VerificationKey {
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use p256::ecdsa::SigningKey;

    use super::*;

    /// A fixed signing key, so test failures are reproducible.
    pub fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[0x42; 32]).unwrap()
    }

    /// A second fixed key, distinct from [`signing_key`].
    pub fn other_signing_key() -> SigningKey {
        SigningKey::from_slice(&[0x17; 32]).unwrap()
    }

    impl PublicKeyDescriptor {
        pub fn example() -> Self {
            Self::from_verifying_key(signing_key().verifying_key())
        }

        pub fn other_example() -> Self {
            Self::from_verifying_key(other_signing_key().verifying_key())
        }
    }
}
