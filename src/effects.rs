use async_trait::async_trait;
use log::warn;

use crate::hue::{LightError, LightState};
use crate::messages::NotificationEvent;
use crate::mpd::{PlaybackCommand, PlaybackError};
use crate::notify::NotificationGate;

#[async_trait]
pub trait LightControl: Send + Sync {
    async fn set_light(&self, state: &LightState) -> Result<(), LightError>;
}

#[async_trait]
pub trait PlaybackControl: Send + Sync {
    /// Run the commands over a single connection, in order, stopping at the first rejection.
    async fn run(&self, commands: &[PlaybackCommand]) -> Result<(), PlaybackError>;
}

/// Drives lights, music and webhooks when the speaker comes and goes.
///
/// Every step is isolated: a failing light or player is logged and the
/// remaining steps still run.
pub struct EffectDispatcher {
    lighting: Option<Box<dyn LightControl>>,
    playback: Box<dyn PlaybackControl>,
    notifier: NotificationGate,
    playlist: String,
}

impl EffectDispatcher {
    pub fn new(
        lighting: Option<Box<dyn LightControl>>,
        playback: Box<dyn PlaybackControl>,
        notifier: NotificationGate,
        playlist: String,
    ) -> Self {
        EffectDispatcher {
            lighting,
            playback,
            notifier,
            playlist,
        }
    }

    /// Lights on, fresh shuffled playlist, play, then the `Play` webhook.
    pub async fn became_present(&self) {
        self.set_light(LightState::active()).await;
        self.playback(&[
            PlaybackCommand::Clear,
            PlaybackCommand::Load(self.playlist.clone()),
            PlaybackCommand::Shuffle,
            PlaybackCommand::Play,
        ])
        .await;
        self.notify(NotificationEvent::Play).await;
    }

    /// Lights off and stop. The `Stop` webhook is left to the caller so it
    /// can restart the connector in between.
    pub async fn became_absent(&self) {
        self.set_light(LightState::off()).await;
        self.playback(&[PlaybackCommand::Stop]).await;
    }

    pub async fn notify(&self, event: NotificationEvent) {
        self.notifier.notify(event).await;
    }

    async fn set_light(&self, state: LightState) {
        if let Some(lighting) = &self.lighting {
            if let Err(err) = lighting.set_light(&state).await {
                warn!("Failed to switch light (on: {}): {}", state.on, err);
            }
        }
    }

    async fn playback(&self, commands: &[PlaybackCommand]) {
        if let Err(err) = self.playback.run(commands).await {
            warn!("Failed to control playback: {}", err);
        }
    }
}
