//! Round execution protocol
//!
//! Every round of a race runs inside its own driver: a fresh tokio task that
//! owns the driver state for exactly one round. The orchestrator talks to it
//! with a strict request/response exchange:
//!
//! 1. A new driver is created by the [`DriverFactory`]
//! 2. [`RoundExecution::start`] spawns it and sends `StartBenchmark`
//! 3. The caller blocks until the driver answers over a single-use channel
//! 4. The task is joined; the driver is never reused for another round
//!
//! The only legal answers are `BenchmarkComplete` and `BenchmarkFailure`.
//! [`RoundResult::try_from`] turns anything else into a protocol violation.
//!
//! # Example
//!
//! ```ignore
//! use race_control_core::driver::{RoundExecution, RoundResult, StartBenchmark};
//!
//! let mut execution = RoundExecution::new(0, factory.create());
//! let reply = execution.start(StartBenchmark { config, track, meta_info }).await?;
//! match RoundResult::try_from(reply)? {
//!     RoundResult::Complete { metrics } => store.bulk_add(metrics).await?,
//!     RoundResult::Failure { message, .. } => eprintln!("{message}"),
//! }
//! ```

mod execution;
mod message;

pub use execution::{Driver, DriverFactory, RoundExecution, RoundState};
pub use message::{DriverMessage, RoundResult, StartBenchmark};
