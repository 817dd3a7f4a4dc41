use std::path::{Path, PathBuf};
use std::time::Duration;

use mac_address::MacAddress;
use serde_derive::Deserialize;

use crate::cli::Cli;

pub const DEFAULT_ADAPTER: &str = "hci0";
pub const DEFAULT_AUDIO_INTERFACE: &str = "org.bluez.Device1";
pub const DEFAULT_PIDFILE: &str = "/var/run/speaker-watch.pid";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("could not parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("no speaker address given (--btaddr or [peripheral] address)")]
    MissingAddress,
    #[error("no playlist given (--playlist or [playback] playlist)")]
    MissingPlaylist,
    #[error("lighting needs a bridge, a user and a light; only got {0}")]
    PartialLighting(String),
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub peripheral: Option<PeripheralConfig>,
    pub playback: Option<PlaybackConfig>,
    pub lighting: Option<LightingConfig>,
    pub webhook: Option<WebhookConfig>,
    pub daemon: Option<DaemonConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct PeripheralConfig {
    pub address: Option<MacAddress>,
    pub adapter: Option<String>,
    pub audio_interface: Option<String>,
    pub retry_interval_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct PlaybackConfig {
    pub playlist: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct LightingConfig {
    pub bridge: Option<String>,
    pub username: Option<String>,
    pub light: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct WebhookConfig {
    pub key: Option<String>,
    pub boot: Option<String>,
    pub play: Option<String>,
    pub stop: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DaemonConfig {
    pub pidfile: Option<PathBuf>,
    pub lock_timeout_seconds: Option<u64>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        toml::de::from_str(&contents).map_err(|err| ConfigError::Parse(path.to_path_buf(), err))
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub peripheral: MacAddress,
    pub adapter: String,
    pub audio_interface: String,
    pub retry_interval: Duration,
    pub playlist: String,
    pub mpd_host: String,
    pub mpd_port: u16,
    pub hue: Option<HueSettings>,
    pub webhook: WebhookSettings,
    pub pidfile: PathBuf,
    pub lock_timeout: Duration,
    pub stay: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HueSettings {
    pub bridge: String,
    pub username: String,
    pub light: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookEvents {
    pub boot: Option<String>,
    pub play: Option<String>,
    pub stop: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub key: Option<String>,
    pub events: WebhookEvents,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Settings {
    /// Merge command line flags over the (optional) config file.
    pub fn resolve(cli: &Cli, file: AppConfig) -> Result<Self, ConfigError> {
        let peripheral = file.peripheral.unwrap_or_default();
        let playback = file.playback.unwrap_or_default();
        let lighting = file.lighting.unwrap_or_default();
        let webhook = file.webhook.unwrap_or_default();
        let daemon = file.daemon.unwrap_or_default();

        let address = cli
            .btaddr
            .or(peripheral.address)
            .ok_or(ConfigError::MissingAddress)?;
        let playlist = cli
            .playlist
            .clone()
            .or(playback.playlist)
            .ok_or(ConfigError::MissingPlaylist)?;

        let hue = resolve_lighting(
            cli.hue.clone().or(lighting.bridge),
            cli.hue_user.clone().or(lighting.username),
            cli.light.clone().or(lighting.light),
        )?;

        Ok(Settings {
            peripheral: address,
            adapter: cli
                .adapter
                .clone()
                .or(peripheral.adapter)
                .unwrap_or_else(|| DEFAULT_ADAPTER.to_string()),
            audio_interface: cli
                .audio_interface
                .clone()
                .or(peripheral.audio_interface)
                .unwrap_or_else(|| DEFAULT_AUDIO_INTERFACE.to_string()),
            retry_interval: Duration::from_millis(
                peripheral.retry_interval_ms.unwrap_or(500).max(1),
            ),
            playlist,
            mpd_host: cli
                .mpd_host
                .clone()
                .or(playback.host)
                .unwrap_or_else(|| "localhost".to_string()),
            mpd_port: cli.mpd_port.or(playback.port).unwrap_or(6600),
            hue,
            webhook: WebhookSettings {
                key: cli.iftttkey.clone().or(webhook.key),
                events: WebhookEvents {
                    boot: cli.iftttevent_boot.clone().or(webhook.boot),
                    play: cli.iftttevent_play.clone().or(webhook.play),
                    stop: cli.iftttevent_stop.clone().or(webhook.stop),
                },
                timeout: Duration::from_secs(webhook.timeout_seconds.unwrap_or(5)),
                connect_timeout: Duration::from_secs(
                    webhook.connect_timeout_seconds.unwrap_or(2),
                ),
            },
            pidfile: cli
                .pidfile
                .clone()
                .or(daemon.pidfile)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PIDFILE)),
            lock_timeout: Duration::from_secs(daemon.lock_timeout_seconds.unwrap_or(15)),
            stay: cli.stay,
            verbose: cli.verbose,
        })
    }
}

fn resolve_lighting(
    bridge: Option<String>,
    username: Option<String>,
    light: Option<String>,
) -> Result<Option<HueSettings>, ConfigError> {
    match (bridge, username, light) {
        (Some(bridge), Some(username), Some(light)) => Ok(Some(HueSettings {
            bridge,
            username,
            light,
        })),
        (None, None, None) => Ok(None),
        (bridge, username, light) => {
            let given = [
                bridge.map(|_| "bridge"),
                username.map(|_| "user"),
                light.map(|_| "light"),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
            Err(ConfigError::PartialLighting(given))
        }
    }
}
