use anyhow::{bail, Context};
use cathcore::bench_interface::{NetworkAnalyzer, Oscilloscope, RelayTransport};
use cathcore::{Bench, CancellationToken, ChannelClass, TestKind};
use clap::Parser;
use generator::profile::simulated_bench;
use hal::{ScpiScope, SerialRelay, VnwaAnalyzer};
use log::{info, warn};
use std::path::PathBuf;
use std::thread;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::TesterConfig;
use workflow::runner::{ChannelSelection, RunPlan, Runner};

mod generator;
mod hal;
mod report;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Catheter element bench driver")]
struct Args {
    /// Load a tester config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Array size of the catheter under test (32, 64 or 96)
    #[arg(long, default_value = "64")]
    class: ChannelClass,
    /// Test a single channel
    #[arg(long, conflicts_with = "all")]
    channel: Option<usize>,
    /// Test every channel in ascending order
    #[arg(long, default_value_t = false)]
    all: bool,
    /// Comma-separated tests: pulse-echo, impedance, dongle
    #[arg(long, value_delimiter = ',', default_value = "pulse-echo,impedance,dongle")]
    tests: Vec<TestKind>,
    /// Prefix for Touchstone files and the JSON report
    #[arg(long, default_value = "data/run_")]
    output: PathBuf,
    /// Use the synthetic bench instead of hardware
    #[arg(long, default_value_t = false)]
    simulate: bool,
    /// Serial port of the relay controller
    #[arg(long)]
    relay_port: Option<String>,
    /// host:port of the scope's SCPI socket
    #[arg(long)]
    scope_addr: Option<String>,
    /// Print the default config as YAML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

fn hardware_bench(
    config: &TesterConfig,
) -> anyhow::Result<Bench<ScpiScope, VnwaAnalyzer, SerialRelay>> {
    let hardware = &config.hardware;
    Ok(Bench {
        relay: SerialRelay::open(&hardware.relay).context("opening relay controller")?,
        scope: ScpiScope::connect(&hardware.scope).context("connecting oscilloscope")?,
        analyzer: VnwaAnalyzer::new(hardware.vnwa.clone()),
    })
}

fn run_and_report<S, V, R>(
    runner: &Runner,
    bench: Bench<S, V, R>,
    plan: &RunPlan,
    cancel: &CancellationToken,
) -> anyhow::Result<()>
where
    S: Oscilloscope,
    V: NetworkAnalyzer,
    R: RelayTransport,
{
    let results = runner.execute(bench, plan, cancel)?;
    let summary = report::summarize(&results, &runner.config().bench.thresholds);
    let path = report::write_json(&results, &summary, &plan.output_base)?;
    print!("{}", report::render_summary(&results, &summary));
    println!("Report written to {}", path.display());
    Ok(())
}

/// Trips `cancel` on Ctrl+C so the run stops after the current channel.
fn watch_for_interrupt(cancel: CancellationToken) -> anyhow::Result<()> {
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    thread::spawn(move || {
        runtime.block_on(async {
            match signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Ctrl+C received, stopping after the current channel");
                    cancel.cancel();
                }
                Err(err) => warn!("awaiting Ctrl+C failed: {}", err),
            }
        })
    });
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.dump_config {
        print!("{}", TesterConfig::default().to_yaml()?);
        return Ok(());
    }

    let mut config = if let Some(path) = &args.config {
        TesterConfig::load(path)?
    } else {
        TesterConfig::default()
    };
    if let Some(port) = args.relay_port {
        config.hardware.relay.port = Some(port);
    }
    if let Some(address) = args.scope_addr {
        config.hardware.scope.address = address;
    }

    let selection = match (args.channel, args.all) {
        (Some(channel), _) => ChannelSelection::Single(channel),
        (None, true) => ChannelSelection::All,
        (None, false) => bail!("pass --channel <N> or --all"),
    };
    let plan = RunPlan {
        class: args.class,
        selection,
        tests: args.tests.into_iter().collect(),
        output_base: args.output,
    };
    info!(
        "testing {} ({:?}) with {:?}",
        plan.class, plan.selection, plan.tests
    );

    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone())?;

    let runner = Runner::new(config);
    if args.simulate {
        let config = runner.config();
        let bench = simulated_bench(&config.simulation, plan.class, &config.bench.thresholds);
        run_and_report(&runner, bench, &plan, &cancel)
    } else {
        let bench = hardware_bench(runner.config())?;
        run_and_report(&runner, bench, &plan, &cancel)
    }
}
