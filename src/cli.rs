use std::path::PathBuf;

use clap::Parser;
use mac_address::MacAddress;

/// Watch for a paired bluetooth speaker; start the music and the lights when it shows up.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Cli {
    /// Do not detach from the terminal
    #[arg(long)]
    pub stay: bool,

    /// Bluetooth address of the speaker (already paired)
    #[arg(long)]
    pub btaddr: Option<MacAddress>,

    /// MPD playlist to load when the speaker connects
    #[arg(long)]
    pub playlist: Option<String>,

    /// Hue bridge address
    #[arg(long)]
    pub hue: Option<String>,

    /// Hue light id or name
    #[arg(long)]
    pub light: Option<String>,

    /// Hue bridge API username
    #[arg(long = "hue-user")]
    pub hue_user: Option<String>,

    /// IFTTT Maker key
    #[arg(long)]
    pub iftttkey: Option<String>,

    /// IFTTT Maker event fired on startup
    #[arg(long = "iftttevent-boot")]
    pub iftttevent_boot: Option<String>,

    /// IFTTT Maker event fired when playback starts
    #[arg(long = "iftttevent-play")]
    pub iftttevent_play: Option<String>,

    /// IFTTT Maker event fired when playback stops
    #[arg(long = "iftttevent-stop")]
    pub iftttevent_stop: Option<String>,

    /// PID file used to keep a single detached instance
    #[arg(long)]
    pub pidfile: Option<PathBuf>,

    /// Optional TOML config file; flags take precedence over it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bluetooth adapter the speaker is paired with
    #[arg(long)]
    pub adapter: Option<String>,

    /// D-Bus interface whose connection changes count as the speaker arriving/leaving
    #[arg(long = "audio-interface")]
    pub audio_interface: Option<String>,

    #[arg(long = "mpd-host")]
    pub mpd_host: Option<String>,

    #[arg(long = "mpd-port")]
    pub mpd_port: Option<u16>,

    /// Log speculative connect attempts and other debug output
    #[arg(short, long)]
    pub verbose: bool,
}
