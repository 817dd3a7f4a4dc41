use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::net::TcpStream;

use crate::effects::PlaybackControl;

const SESSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("mpd connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected mpd greeting {0:?}")]
    Greeting(String),
    #[error("mpd rejected {command:?}: {response}")]
    Ack { command: String, response: String },
    #[error("mpd closed the connection")]
    Closed,
    #[error("mpd did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    Clear,
    Load(String),
    Shuffle,
    Play,
    Stop,
}

impl PlaybackCommand {
    fn to_line(&self) -> String {
        match self {
            PlaybackCommand::Clear => "clear\n".to_string(),
            PlaybackCommand::Load(name) => format!("load {}\n", quote(name)),
            PlaybackCommand::Shuffle => "shuffle\n".to_string(),
            PlaybackCommand::Play => "play\n".to_string(),
            PlaybackCommand::Stop => "stop\n".to_string(),
        }
    }
}

fn quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// One connection per dispatch, like a short-lived `mpc` invocation.
#[derive(Debug, Clone)]
pub struct MpdClient {
    address: String,
}

impl MpdClient {
    pub fn new(host: &str, port: u16) -> Self {
        MpdClient {
            address: format!("{}:{}", host, port),
        }
    }

    async fn session(&self, commands: &[PlaybackCommand]) -> Result<(), PlaybackError> {
        let stream = TcpStream::connect(&self.address).await?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let greeting = lines.next_line().await?.ok_or(PlaybackError::Closed)?;
        if !greeting.starts_with("OK MPD ") {
            return Err(PlaybackError::Greeting(greeting));
        }

        for command in commands {
            let line = command.to_line();
            debug!("mpd <- {}", line.trim_end());
            writer.write_all(line.as_bytes()).await?;
            loop {
                let response = lines.next_line().await?.ok_or(PlaybackError::Closed)?;
                if response == "OK" {
                    break;
                }
                if response.starts_with("ACK ") {
                    return Err(PlaybackError::Ack {
                        command: line.trim_end().to_string(),
                        response,
                    });
                }
            }
        }

        writer.write_all(b"close\n").await?;
        Ok(())
    }
}

#[async_trait]
impl PlaybackControl for MpdClient {
    async fn run(&self, commands: &[PlaybackCommand]) -> Result<(), PlaybackError> {
        tokio::time::timeout(SESSION_TIMEOUT, self.session(commands))
            .await
            .map_err(|_| PlaybackError::Timeout(SESSION_TIMEOUT))?
    }
}
