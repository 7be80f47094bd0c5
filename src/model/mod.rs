pub mod admission;
pub mod api;
pub mod ballot;
pub mod db;
pub mod key;
pub mod mongodb;
pub mod signature;
pub mod store;
pub mod voter;
