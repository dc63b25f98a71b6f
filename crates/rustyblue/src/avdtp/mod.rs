//! Audio/Video Distribution Transport Protocol: stream endpoint discovery
//! and configuration, the stream state machine, and the RTP/SBC media
//! path used by A2DP.

mod codec;
mod engine;
mod rtp;
mod session;
mod types;

pub use codec::{
    decode_discover_entry, decode_media_codec_capability, encode_discover_entry,
    encode_media_codec_capability, iter_service_capabilities, AvdtpHeader,
    SERVICE_CATEGORY_MEDIA_CODEC, SERVICE_CATEGORY_MEDIA_TRANSPORT,
};
pub use engine::{AvdtpEngine, AvdtpEngineConfig, ConnectionHandle, AVDTP_PSM};
pub use rtp::{pack_media_payload, RtpHeader, SbcMediaHeader};
pub use session::AvdtpSession;
pub use types::{
    error_code, AvdtpError, CodecType, MediaType, Seid, SignalIdentifier, StreamEndpoint,
    StreamState, TsepRole,
};
