mod canonical;
mod content;

pub use canonical::{encode, encode_to_string};
pub use content::{Ballot, BallotValue};
