pub mod cancel;
pub mod orchestrator;
pub mod results;

pub use cancel::CancellationToken;
pub use orchestrator::{test_file_base, Bench, TestOrchestrator};
pub use results::{ChannelOutcomes, RunResults, TestOutcome};
