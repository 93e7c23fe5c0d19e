//! Measurement core for the catheter element bench.
//!
//! Routes one transducer element at a time through the relay matrix, reduces
//! scope captures and analyzer sweeps to features, and grades them against
//! per-class threshold tables.

pub mod bench_interface;
pub mod config;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;
pub mod workflow;

pub use config::BenchConfig;
pub use prelude::{MeasureError, MeasureResult, ProcessingStage, TestKind};
pub use processing::{ChannelClass, ChannelRouter, RelaySelector};
pub use workflow::{Bench, CancellationToken, RunResults, TestOrchestrator, TestOutcome};
