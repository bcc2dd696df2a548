#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod health;
pub mod records;

pub use error::{VigilError, VigilResult};
pub use health::{HealthSnapshot, HealthStatus};
pub use records::{EventKind, EventRecord, MetricKind, MetricRecord, Severity};
