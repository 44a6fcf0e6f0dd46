mod cli;
mod output;
mod simulate;

use anyhow::{Context, Result};
use cardtap_core::TagHandle;
use cardtap_hardware::TagSource;
use cardtap_hardware::devices::{AnyChannelFactory, AnyTagSource};
use cardtap_hardware::mock::MockTagSource;
use cardtap_reader::{CompletedReading, ReaderConfig, ReadingDispatcher, ReadingOrchestrator};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts, OutputFormat};
use crate::simulate::SimulatedTag;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let config = load_config(&cli.global)?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Watch { reader } => {
            let config = ReaderConfig {
                reader_name: reader.or(config.reader_name),
                ..config
            };
            watch(config, cli.global.format).await
        }
        Command::Simulate { scenario } => {
            simulate(SimulatedTag::for_scenario(scenario), &config, cli.global.format).await
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (or defaults) with command line overrides applied.
fn load_config(global: &GlobalOpts) -> Result<ReaderConfig> {
    let mut config = match &global.config {
        Some(path) => ReaderConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ReaderConfig::default(),
    };

    if let Some(priority) = global.priority {
        config.detection_priority = priority.into();
    }
    Ok(config)
}

/// Present one simulated tag through the full dispatch pipeline.
async fn simulate(sim: SimulatedTag, config: &ReaderConfig, format: OutputFormat) -> Result<()> {
    let (source, mut handle) = MockTagSource::with_name("Simulated Reader");
    handle.add_tag(sim.uid.clone(), sim.technologies);
    handle.present_tag(&sim.uid).await?;

    let mut source = AnyTagSource::Mock(source);
    let tag: TagHandle = source.next_tag().await?;

    let orchestrator = Arc::new(
        ReadingOrchestrator::new(AnyChannelFactory::Mock(sim.factory))
            .with_priority(config.detection_priority),
    );
    let (mut dispatcher, results) = ReadingDispatcher::new(orchestrator, config.result_buffer);

    dispatcher.dispatch(tag);
    dispatcher.wait_idle().await;
    dispatcher.shutdown().await;

    let mut sink = |reading: CompletedReading| output::print(&reading, format);
    results.forward_to(&mut sink).await;
    Ok(())
}

#[cfg(feature = "hardware-pcsc")]
async fn watch(config: ReaderConfig, format: OutputFormat) -> Result<()> {
    use cardtap_hardware::pcsc_reader::{PcscChannelFactory, PcscTagSource};
    use tokio_util::sync::CancellationToken;

    let source = PcscTagSource::open(config.reader_name.as_deref(), config.poll_interval())
        .context("opening PC/SC reader")?;
    let factory = PcscChannelFactory::new(source.context(), source.reader().to_owned());
    tracing::info!(reader = %source.reader_name(), priority = %config.detection_priority, "Reader ready");

    let orchestrator = Arc::new(
        ReadingOrchestrator::new(AnyChannelFactory::Pcsc(factory))
            .with_priority(config.detection_priority),
    );
    let (mut dispatcher, results) = ReadingDispatcher::new(orchestrator, config.result_buffer);

    let printer = tokio::spawn(async move {
        let mut sink = |reading: CompletedReading| output::print(&reading, format);
        results.forward_to(&mut sink).await
    });

    let stop = CancellationToken::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut source = AnyTagSource::Pcsc(source);
    let outcome = dispatcher.run(&mut source, &stop).await;
    dispatcher.shutdown().await;

    let printed = printer.await?;
    tracing::info!(readings = printed, "Stopped");
    outcome.context("tag source failed")
}

#[cfg(not(feature = "hardware-pcsc"))]
async fn watch(_config: ReaderConfig, _format: OutputFormat) -> Result<()> {
    anyhow::bail!("this build has no reader support; rebuild with `--features hardware-pcsc`")
}
