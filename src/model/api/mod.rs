//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Ballots are returned as their canonical text, exactly as verified.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod ballot;
pub mod error;
pub mod key;
pub mod pagination;
