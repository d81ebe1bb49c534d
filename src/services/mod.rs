pub mod status;
pub mod watcher;
pub mod worker;

pub use status::{Stage, StatusLog, StatusRecord, StatusSink, StatusTable, StatusUpdate};
pub use watcher::{DispatchSummary, IngestionService, ServiceHandle};
pub use worker::{IncomingDocument, IngestionWorker, WorkerOutcome};
