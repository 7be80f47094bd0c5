pub mod ballot_log;
pub mod key_record;
