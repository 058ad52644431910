pub mod ingest;
pub mod remote;
pub mod staging;
pub mod sweeper;
