pub mod commands;
pub mod fsm;
pub mod ingest;
pub mod poller;
pub mod replies;

pub use ingest::{IngestSettings, Ingestor};
