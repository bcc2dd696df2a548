mod audit;
mod cancellation;
mod core;
mod handle;
mod state;
mod ticker;
mod types;

pub use audit::AuditTrail;
pub use cancellation::CancellationToken;
pub use core::Supervisor;
pub use handle::SupervisorHandle;
pub use state::SupervisorState;
pub use ticker::{IntervalTicker, ManualTicker, ManualTickerHandle, Ticker};
pub use types::*;

#[cfg(all(test, unix))]
mod tests;
