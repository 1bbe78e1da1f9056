pub mod config_cmd;
pub mod ingest;
pub mod search;
pub mod tools;
