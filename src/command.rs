//! The protocol's flat command-code table.

/// TCP command codes understood by this client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    HeartbeatRequest = 0x01,
    HeartbeatResponse = 0x02,

    Ping = 0x03,
    Pong = 0x04,

    WriteEvents = 0x82,
    WriteEventsCompleted = 0x83,

    DeleteStream = 0x8A,
    DeleteStreamCompleted = 0x8B,

    Read = 0xB0,
    ReadEventCompleted = 0xB1,
    ReadStreamEventsForward = 0xB2,
    ReadStreamEventsForwardCompleted = 0xB3,
    ReadStreamEventsBackward = 0xB4,
    ReadStreamEventsBackwardCompleted = 0xB5,
    ReadAllEventsForward = 0xB6,
    ReadAllEventsForwardCompleted = 0xB7,
    ReadAllEventsBackward = 0xB8,
    ReadAllEventsBackwardCompleted = 0xB9,

    SubscribeToStream = 0xC0,
    SubscriptionConfirmation = 0xC1,
    StreamEventAppeared = 0xC2,
    UnsubscribeFromStream = 0xC3,
    SubscriptionDropped = 0xC4,

    BadRequest = 0xF0,
    NotHandled = 0xF1,
    Authenticate = 0xF2,
    Authenticated = 0xF3,
    NotAuthenticated = 0xF4,
}

impl Command {
    /// Look up a known command by its wire code.
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => Self::HeartbeatRequest,
            0x02 => Self::HeartbeatResponse,
            0x03 => Self::Ping,
            0x04 => Self::Pong,
            0x82 => Self::WriteEvents,
            0x83 => Self::WriteEventsCompleted,
            0x8A => Self::DeleteStream,
            0x8B => Self::DeleteStreamCompleted,
            0xB0 => Self::Read,
            0xB1 => Self::ReadEventCompleted,
            0xB2 => Self::ReadStreamEventsForward,
            0xB3 => Self::ReadStreamEventsForwardCompleted,
            0xB4 => Self::ReadStreamEventsBackward,
            0xB5 => Self::ReadStreamEventsBackwardCompleted,
            0xB6 => Self::ReadAllEventsForward,
            0xB7 => Self::ReadAllEventsForwardCompleted,
            0xB8 => Self::ReadAllEventsBackward,
            0xB9 => Self::ReadAllEventsBackwardCompleted,
            0xC0 => Self::SubscribeToStream,
            0xC1 => Self::SubscriptionConfirmation,
            0xC2 => Self::StreamEventAppeared,
            0xC3 => Self::UnsubscribeFromStream,
            0xC4 => Self::SubscriptionDropped,
            0xF0 => Self::BadRequest,
            0xF1 => Self::NotHandled,
            0xF2 => Self::Authenticate,
            0xF3 => Self::Authenticated,
            0xF4 => Self::NotAuthenticated,
            _ => return None,
        })
    }

    /// Human-readable name for a wire code, for log lines.
    #[must_use]
    pub fn describe(code: u8) -> String {
        Self::from_u8(code).map_or_else(|| format!("0x{code:02X}"), |command| format!("{command:?}"))
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self { command as Self }
}
