use std::future::Future;

use anyhow::Context as _;
use log::{debug, info};
use tokio::sync::mpsc;

use crate::connector::SpeculativeConnector;
use crate::effects::EffectDispatcher;
use crate::messages::{LinkEvent, LinkKind, NotificationEvent, PresenceState};

/// Presence state machine. Owns the speaker state and the speculative connector,
/// and is the only thing that changes either.
pub struct Manager {
    state: PresenceState,
    audio_interface: String,
    connector: SpeculativeConnector,
    effects: EffectDispatcher,
}

impl Manager {
    /// Starts out `Absent` with the connector already scheduled. Needs a
    /// running tokio runtime.
    pub fn new(
        audio_interface: String,
        mut connector: SpeculativeConnector,
        effects: EffectDispatcher,
    ) -> Self {
        connector.start();
        Manager {
            state: PresenceState::Absent,
            audio_interface,
            connector,
            effects,
        }
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    #[cfg(test)]
    pub fn connector_running(&self) -> bool {
        self.connector.is_running()
    }

    /// Apply one link event. Returns true if it caused a transition.
    pub async fn handle_event(&mut self, event: LinkEvent) -> bool {
        if event.interface != self.audio_interface {
            debug!("Ignoring {:?} on {}", event.kind, event.interface);
            return false;
        }

        match (self.state, event.kind) {
            (PresenceState::Absent, LinkKind::Established) => {
                self.state = PresenceState::Present;
                self.connector.stop();
                info!("Speaker connected - playing sound");
                self.effects.became_present().await;
                true
            }
            (PresenceState::Present, LinkKind::Lost) => {
                self.state = PresenceState::Absent;
                info!("Speaker went AWOL, stopping sound");
                self.effects.became_absent().await;
                self.connector.start();
                self.effects.notify(NotificationEvent::Stop).await;
                true
            }
            (state, kind) => {
                debug!("Duplicate {:?} while {}, ignoring", kind, state);
                false
            }
        }
    }

    /// Announce boot, then process link events and connect attempts until the
    /// shutdown future resolves. A connect error bluez should never produce,
    /// or the signal source going away, ends the loop with an error.
    pub async fn run_loop(
        &mut self,
        mut events: mpsc::Receiver<LinkEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()> {
        tokio::pin!(shutdown);

        self.effects.notify(NotificationEvent::Boot).await;

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutting down while speaker is {}", self.state);
                    return Ok(());
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event).await;
                    }
                    None => anyhow::bail!("bluetooth signal source closed"),
                },
                _ = self.connector.tick() => {
                    self.connector
                        .attempt()
                        .await
                        .context("speculative connect hit an unrecoverable error")?;
                }
            }
        }
    }
}
