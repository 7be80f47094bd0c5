mod collection;
mod counter;
mod store;

pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_ballot_sequence_counter_exists, Counter, BALLOT_SEQUENCE_COUNTER_ID};
pub use store::MongoStore;
