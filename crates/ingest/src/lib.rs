//! Sensor batch ingestion: link resolution, classification and the
//! raw/canonical/summary writes that follow.

pub mod error;
pub mod ingestor;
pub mod memory;
pub mod metrics;
pub mod ports;
pub mod request;

pub use error::{ErrorKind, IngestError, StoreError};
pub use ingestor::Ingestor;
pub use memory::MemoryStore;
pub use metrics::{IngestMetrics, MetricsSnapshot, RoundTimer};
pub use ports::{EventStore, HistoryQuery, MachineCommit, MachineUpdate, Page, SensorDirectory};
pub use request::IngestRequest;
