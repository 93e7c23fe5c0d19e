use crate::workflow::config::TesterConfig;
use anyhow::Context;
use cathcore::bench_interface::{NetworkAnalyzer, Oscilloscope, RelayTransport};
use cathcore::{Bench, CancellationToken, ChannelClass, RunResults, TestKind, TestOrchestrator};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelSelection {
    Single(usize),
    All,
}

/// What one invocation of the tester measures.
#[derive(Clone, Debug)]
pub struct RunPlan {
    pub class: ChannelClass,
    pub selection: ChannelSelection,
    pub tests: BTreeSet<TestKind>,
    pub output_base: PathBuf,
}

#[derive(Clone)]
pub struct Runner {
    config: TesterConfig,
}

impl Runner {
    pub fn new(config: TesterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    pub fn execute<S, V, R>(
        &self,
        bench: Bench<S, V, R>,
        plan: &RunPlan,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RunResults>
    where
        S: Oscilloscope,
        V: NetworkAnalyzer,
        R: RelayTransport,
    {
        if let Some(parent) = plan.output_base.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }

        let mut orchestrator = TestOrchestrator::new(self.config.bench.clone(), bench)
            .context("validating bench config")?;

        match plan.selection {
            ChannelSelection::Single(channel) => {
                let outcomes = orchestrator
                    .run_channel(channel, plan.class, &plan.tests, &plan.output_base)
                    .with_context(|| format!("running channel {}", channel))?;
                Ok(RunResults::single(plan.class, channel, outcomes))
            }
            ChannelSelection::All => orchestrator
                .run_all(plan.class, &plan.tests, &plan.output_base, cancel)
                .with_context(|| format!("running every {} channel", plan.class)),
        }
    }
}
