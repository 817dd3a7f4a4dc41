use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresenceState {
    #[default]
    Absent,
    Present,
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceState::Absent => write!(f, "absent"),
            PresenceState::Present => write!(f, "present"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    Established,
    Lost,
}

/// A connection change reported for the watched peripheral, tagged with the
/// D-Bus interface whose `Connected` property changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEvent {
    pub kind: LinkKind,
    pub interface: String,
}

impl LinkEvent {
    pub fn established(interface: impl Into<String>) -> Self {
        LinkEvent {
            kind: LinkKind::Established,
            interface: interface.into(),
        }
    }

    pub fn lost(interface: impl Into<String>) -> Self {
        LinkEvent {
            kind: LinkKind::Lost,
            interface: interface.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationEvent {
    Boot,
    Play,
    Stop,
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::Boot => write!(f, "boot"),
            NotificationEvent::Play => write!(f, "play"),
            NotificationEvent::Stop => write!(f, "stop"),
        }
    }
}
