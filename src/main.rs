use anyhow::Context as _;
use clap::Parser as _;
use log::{error, info};
use tokio::sync::mpsc;

mod bluez;
mod cli;
mod config;
mod connector;
mod daemon;
mod effects;
mod hue;
mod manager;
mod messages;
mod mpd;
mod notify;

use crate::config::{AppConfig, Settings};
use crate::effects::{EffectDispatcher, LightControl};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let file_config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let settings = Settings::resolve(&cli, file_config)?;

    // Fork before the runtime spins up any threads.
    if !settings.stay {
        daemon::detach()?;
    }
    daemon::init_logging(settings.stay, settings.verbose)?;
    let _pid_lock = if settings.stay {
        None
    } else {
        Some(
            daemon::PidLock::acquire(&settings.pidfile, settings.lock_timeout)
                .inspect_err(|err| error!("Exiting: {:#}", err))?,
        )
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    if let Err(err) = runtime.block_on(run(settings)) {
        error!("Exiting: {:#}", err);
        return Err(err);
    }
    Ok(())
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let connection = zbus::Connection::system()
        .await
        .context("could not connect to the system bus")?;
    let device =
        bluez::BluezDevice::find(&connection, &settings.adapter, settings.peripheral).await?;

    let lighting = match &settings.hue {
        Some(hue_settings) => {
            Some(Box::new(hue::HueClient::connect(hue_settings).await?) as Box<dyn LightControl>)
        }
        None => None,
    };
    let effects = EffectDispatcher::new(
        lighting,
        Box::new(mpd::MpdClient::new(&settings.mpd_host, settings.mpd_port)),
        notify::NotificationGate::new(
            &settings.webhook,
            Box::new(notify::HttpSender::new(&settings.webhook)?),
        ),
        settings.playlist.clone(),
    );

    let (tx, rx) = mpsc::channel(32);
    let listener = device.listen(tx).await?;

    let connector = connector::SpeculativeConnector::new(
        Box::new(device.connector()),
        settings.retry_interval,
    );
    let mut core = manager::Manager::new(settings.audio_interface.clone(), connector, effects);

    info!(
        "Watching {} on {} for {}",
        settings.peripheral, settings.audio_interface, settings.playlist
    );
    let result = core.run_loop(rx, daemon::shutdown_signal()).await;

    listener.abort();
    info!("Speaker was {} at exit", core.state());
    result
}
