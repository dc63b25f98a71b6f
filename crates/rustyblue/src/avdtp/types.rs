//! AVDTP PDU framing types: signal identifiers, message types, and the
//! per-stream-endpoint state machine.

use thiserror::Error;

/// AVDTP error response codes (Core Spec Vol 1, AVDTP §8.20.6.2) that this
/// stack actually emits.
pub mod error_code {
    pub const BAD_LENGTH: u8 = 0x11;
    pub const BAD_ACP_SEID: u8 = 0x12;
    pub const SEP_IN_USE: u8 = 0x13;
    pub const BAD_PAYLOAD_FORMAT: u8 = 0x18;
    pub const BAD_STATE: u8 = 0x31;
}

/// Errors raised while driving an AVDTP signaling exchange or a stream
/// endpoint through its state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvdtpError {
    #[error("malformed signaling PDU: {0}")]
    MalformedPdu(&'static str),
    #[error("unknown signal identifier {0}")]
    UnknownSignal(u8),
    #[error("stream endpoint {0} not found")]
    UnknownSeid(u8),
    #[error("operation {operation:?} invalid in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: StreamState,
    },
    #[error("peer rejected the request: error code 0x{0:02x}")]
    PeerRejected(u8),
}

impl AvdtpError {
    /// Maps this error to the AVDTP error code sent back to the peer.
    pub fn to_error_code(&self) -> u8 {
        match self {
            Self::MalformedPdu(_) => error_code::BAD_LENGTH,
            Self::UnknownSignal(_) => error_code::BAD_LENGTH,
            Self::UnknownSeid(_) => error_code::BAD_ACP_SEID,
            Self::InvalidState { .. } => error_code::BAD_STATE,
            Self::PeerRejected(code) => *code,
        }
    }
}

/// AVDTP signal identifiers (Core Spec Vol 1, AVDTP §8.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignalIdentifier {
    Discover = 0x01,
    GetCapabilities = 0x02,
    SetConfiguration = 0x03,
    GetConfiguration = 0x04,
    Reconfigure = 0x05,
    Open = 0x06,
    Start = 0x07,
    Close = 0x08,
    Suspend = 0x09,
    Abort = 0x0A,
    SecurityControl = 0x0B,
    GetAllCapabilities = 0x0C,
    DelayReport = 0x0D,
}

impl SignalIdentifier {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => Self::Discover,
            0x02 => Self::GetCapabilities,
            0x03 => Self::SetConfiguration,
            0x04 => Self::GetConfiguration,
            0x05 => Self::Reconfigure,
            0x06 => Self::Open,
            0x07 => Self::Start,
            0x08 => Self::Close,
            0x09 => Self::Suspend,
            0x0A => Self::Abort,
            0x0B => Self::SecurityControl,
            0x0C => Self::GetAllCapabilities,
            0x0D => Self::DelayReport,
            _ => return None,
        })
    }
}

/// The 2-bit Message Type field of the AVDTP signaling header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Command = 0b00,
    GeneralReject = 0b01,
    ResponseAccept = 0b10,
    ResponseReject = 0b11,
}

impl MessageType {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0b00 => Self::Command,
            0b01 => Self::GeneralReject,
            0b10 => Self::ResponseAccept,
            _ => Self::ResponseReject,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// A Stream Endpoint Identifier, 6 bits wide on the wire.
pub type Seid = u8;

/// Per-endpoint lifecycle state (Core Spec Vol 1, AVDTP §9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Configured,
    Open,
    Streaming,
    Closing,
    Aborting,
}

impl StreamState {
    /// Returns `true` if `operation` is a legal transition trigger from
    /// this state, per the state diagram in AVDTP §9.1.
    pub fn allows(self, operation: &'static str) -> bool {
        use StreamState::*;
        matches!(
            (self, operation),
            (Idle, "set_configuration")
                | (Configured, "open")
                | (Configured, "abort")
                | (Open, "start")
                | (Open, "close")
                | (Open, "abort")
                | (Open, "reconfigure")
                | (Streaming, "suspend")
                | (Streaming, "close")
                | (Streaming, "abort")
                | (Closing, "abort")
        )
    }
}

/// Media type carried by a stream endpoint (AVDTP §8.20.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Video,
    Multimedia,
}

/// Endpoint direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsepRole {
    Source,
    Sink,
}

/// Media codec type byte carried in the Media Codec Service Capability
/// (AVDTP §8.21.5). Codecs other than SBC are never decoded — their
/// capability bytes pass through opaquely, since this stack only
/// implements SBC encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    Sbc,
    Mpeg12Audio,
    Mpeg24Aac,
    Other(u8),
}

impl CodecType {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x00 => Self::Sbc,
            0x01 => Self::Mpeg12Audio,
            0x02 => Self::Mpeg24Aac,
            other => Self::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Sbc => 0x00,
            Self::Mpeg12Audio => 0x01,
            Self::Mpeg24Aac => 0x02,
            Self::Other(b) => b,
        }
    }
}

/// A local or remote stream endpoint: its identity, role, codec, and
/// current state. `capabilities` holds the raw codec-specific
/// information elements advertised via `GET_CAPABILITIES`;
/// `raw_configuration` holds whatever was actually accepted by
/// `SET_CONFIGURATION`, which for non-SBC codecs (e.g. AAC) stays opaque
/// bytes this stack never interprets.
#[derive(Debug, Clone)]
pub struct StreamEndpoint {
    pub seid: Seid,
    pub media_type: MediaType,
    pub role: TsepRole,
    pub codec_type: CodecType,
    pub in_use: bool,
    pub state: StreamState,
    pub capabilities: Vec<u8>,
    pub raw_configuration: Option<Vec<u8>>,
}

impl StreamEndpoint {
    pub fn new(
        seid: Seid,
        media_type: MediaType,
        role: TsepRole,
        codec_type: CodecType,
        capabilities: Vec<u8>,
    ) -> Self {
        Self {
            seid,
            media_type,
            role,
            codec_type,
            in_use: false,
            state: StreamState::Idle,
            capabilities,
            raw_configuration: None,
        }
    }

    /// Validates and applies a state transition, or returns
    /// [`AvdtpError::InvalidState`] if `operation` isn't legal from the
    /// current state.
    pub fn transition(&mut self, operation: &'static str, next: StreamState) -> Result<(), AvdtpError> {
        if !self.state.allows(operation) {
            return Err(AvdtpError::InvalidState {
                operation,
                state: self.state,
            });
        }
        self.state = next;
        Ok(())
    }
}
