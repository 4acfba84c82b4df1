use crate::{
    error::{Result, WireError},
    message::{Message, Reader},
};

/// Packet type tag, the first byte of every packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Named command request carrying a message
    CmdRequest,
    /// Response to a command request carrying a message
    CmdResponse,
    /// The daemon does not know the requested command
    CmdUnknown,
    /// Named request to receive an event stream
    EventRegister,
    /// Named request to stop an event stream
    EventUnregister,
    /// Event (un)registration succeeded
    EventConfirm,
    /// The daemon does not know the requested event
    EventUnknown,
    /// Named event carrying a message
    Event,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::CmdRequest,
            1 => Self::CmdResponse,
            2 => Self::CmdUnknown,
            3 => Self::EventRegister,
            4 => Self::EventUnregister,
            5 => Self::EventConfirm,
            6 => Self::EventUnknown,
            7 => Self::Event,
            other => return Err(WireError::UnknownPacketType(other)),
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::CmdRequest => 0,
            Self::CmdResponse => 1,
            Self::CmdUnknown => 2,
            Self::EventRegister => 3,
            Self::EventUnregister => 4,
            Self::EventConfirm => 5,
            Self::EventUnknown => 6,
            Self::Event => 7,
        }
    }

    /// Whether a name follows the type byte
    pub fn is_named(self) -> bool {
        matches!(
            self,
            Self::CmdRequest | Self::EventRegister | Self::EventUnregister | Self::Event
        )
    }

    /// Whether a message follows the (optional) name
    pub fn has_message(self) -> bool {
        matches!(self, Self::CmdRequest | Self::CmdResponse | Self::Event)
    }
}

/// One unit of the control protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind:    PacketType,
    pub name:    Option<String>,
    pub message: Message,
}

impl Packet {
    /// Command request for `command`
    pub fn request<S: Into<String>>(command: S, message: Message) -> Self {
        Self {
            kind: PacketType::CmdRequest,
            name: Some(command.into()),
            message,
        }
    }

    pub fn response(message: Message) -> Self {
        Self {
            kind: PacketType::CmdResponse,
            name: None,
            message,
        }
    }

    /// Packet without name or message, e.g. `CmdUnknown`
    pub fn bare(kind: PacketType) -> Self {
        Self {
            kind,
            name: None,
            message: Message::new(),
        }
    }

    /// Serializes the packet body (without the length prefix)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![self.kind.as_u8()];

        if self.kind.is_named() {
            let name = self.name.as_deref().unwrap_or_default();
            if name.is_empty() || name.len() > u8::MAX as usize {
                return Err(WireError::InvalidName(name.to_string()));
            }
            buf.push(name.len() as u8);
            buf.extend_from_slice(name.as_bytes());
        }

        if self.kind.has_message() {
            buf.extend_from_slice(&self.message.encode()?);
        }

        Ok(buf)
    }

    /// Parses a packet body (without the length prefix)
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader { data, pos: 0 };
        let tag = reader
            .next_tag()
            .ok_or(WireError::Truncated("packet type"))?;
        let kind = PacketType::from_u8(tag)?;

        let name = if kind.is_named() {
            Some(reader.name()?)
        } else {
            None
        };

        let message = if kind.has_message() {
            Message::decode(reader.rest())?
        } else if !reader.rest().is_empty() {
            return Err(WireError::Malformed(format!(
                "unexpected payload after {kind:?} packet"
            )));
        } else {
            Message::new()
        };

        Ok(Self {
            kind,
            name,
            message,
        })
    }
}
