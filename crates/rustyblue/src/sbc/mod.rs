//! SBC (Subband Codec) encoder for A2DP media transport.
//!
//! The encoder runs fixed-point arithmetic end to end — polyphase
//! analysis filterbank, scale factor extraction, loudness/SNR bit
//! allocation, quantization and CRC-8 frame packing — so behavior is
//! reproducible across platforms without relying on floating point.

mod bitalloc;
mod encoder;
mod filterbank;
mod tables;
mod types;

pub use encoder::{SbcEncoder, SbcFrameHeader};
pub use types::{
    AllocationMethod, BlockCount, ChannelMode, SamplingFrequency, SbcCapabilities, SbcConfig,
    SbcError, SubBands,
};
