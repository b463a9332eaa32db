use airq_emulator::config::{Cli, DeviceSpec};
use airq_emulator::mqtt::MqttBus;
use airq_emulator::{DeviceSession, ReadingSynthesizer, RunReport, StopSignal, SynthesizerConfig};
use anyhow::bail;
use clap::Parser;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let specs = cli.device_specs()?;

    info!("Starting air quality emulator");
    info!(
        "Broker: {}:{}, Devices: {}, Interval: {}s, Cycles: {}",
        cli.broker,
        cli.port,
        specs.len(),
        cli.interval_secs,
        if cli.cycles == 0 { "unbounded".to_string() } else { cli.cycles.to_string() }
    );
    if cli.shares_topics() {
        warn!("Several devices share topic base {}; presence signals will collide", cli.topic_base);
    }

    let stop = StopSignal::new();
    let signal = stop.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupted, stopping devices");
        signal.trigger();
    });

    let total = specs.len();
    let handles: Vec<_> = specs
        .into_iter()
        .map(|spec| tokio::spawn(run_device(spec, cli.cycles, stop.clone())))
        .collect();

    let mut failed = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!("Device failed: {:#}", e);
                failed += 1;
            }
            Err(e) => {
                error!("Device task panicked: {}", e);
                failed += 1;
            }
        }
    }

    if failed == total {
        bail!("all {} devices failed", total);
    }
    info!("Emulation finished");
    Ok(())
}

async fn run_device(spec: DeviceSpec, cycles: u64, stop: StopSignal) -> anyhow::Result<RunReport> {
    let synth = match spec.seed {
        Some(seed) => ReadingSynthesizer::seeded(&spec.device_id, SynthesizerConfig::default(), seed)?,
        None => ReadingSynthesizer::from_entropy(&spec.device_id, SynthesizerConfig::default())?,
    };
    info!(device_id = %spec.device_id, client_id = %spec.broker.client_id, "Connecting to {}", spec.broker.addr());

    let bus = MqttBus::new(&spec.broker, Some(&spec.session.online_topic()));
    let mut session = DeviceSession::new(spec.session, synth, bus)?.with_stop_signal(stop);

    if let Err(e) = session.start().await {
        session.stop().await;
        return Err(e.into());
    }

    let result = if cycles == 0 {
        session.run_until_stopped().await
    } else {
        session.run_cycles(cycles).await
    };
    session.stop().await;

    let report = result?;
    info!(
        device_id = %spec.device_id,
        cycles = report.cycles_completed,
        published = report.messages_published,
        failed = report.failed_publishes(),
        "Device finished"
    );
    Ok(report)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
