//! Configuration and capability types for the SBC codec.

use thiserror::Error;

/// Errors an SBC encode can fail with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SbcError {
    #[error("PCM input buffer too small for one frame")]
    InputTooSmall,
    #[error("bitpool {0} out of range for this configuration")]
    InvalidBitpool(u8),
}

/// Sampling frequency, encoded as the header's 2-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SamplingFrequency {
    Freq16000 = 0,
    Freq32000 = 1,
    #[default]
    Freq44100 = 2,
    Freq48000 = 3,
}

impl SamplingFrequency {
    pub const fn hz(self) -> u32 {
        match self {
            Self::Freq16000 => 16_000,
            Self::Freq32000 => 32_000,
            Self::Freq44100 => 44_100,
            Self::Freq48000 => 48_000,
        }
    }

    pub(crate) const fn header_bits(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_header_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Freq16000,
            1 => Self::Freq32000,
            2 => Self::Freq44100,
            _ => Self::Freq48000,
        }
    }
}

/// Channel mode, encoded as the header's 2-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ChannelMode {
    Mono = 0,
    DualChannel = 1,
    Stereo = 2,
    #[default]
    JointStereo = 3,
}

impl ChannelMode {
    pub const fn channels(self) -> u8 {
        match self {
            Self::Mono => 1,
            _ => 2,
        }
    }

    pub(crate) const fn header_bits(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_header_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Mono,
            1 => Self::DualChannel,
            2 => Self::Stereo,
            _ => Self::JointStereo,
        }
    }
}

/// Number of blocks per frame, encoded as the header's 2-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BlockCount {
    Blocks4 = 0,
    Blocks8 = 1,
    Blocks12 = 2,
    #[default]
    Blocks16 = 3,
}

impl BlockCount {
    pub const fn count(self) -> usize {
        match self {
            Self::Blocks4 => 4,
            Self::Blocks8 => 8,
            Self::Blocks12 => 12,
            Self::Blocks16 => 16,
        }
    }

    pub(crate) const fn header_bits(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_header_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Blocks4,
            1 => Self::Blocks8,
            2 => Self::Blocks12,
            _ => Self::Blocks16,
        }
    }
}

/// Number of subbands, encoded as the header's 1-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SubBands {
    Sub4 = 0,
    #[default]
    Sub8 = 1,
}

impl SubBands {
    pub const fn count(self) -> usize {
        match self {
            Self::Sub4 => 4,
            Self::Sub8 => 8,
        }
    }

    pub(crate) const fn header_bits(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_header_bits(bit: u8) -> Self {
        if bit & 1 == 1 {
            Self::Sub8
        } else {
            Self::Sub4
        }
    }
}

/// Bit allocation method, encoded as the header's 1-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AllocationMethod {
    Snr = 0,
    #[default]
    Loudness = 1,
}

impl AllocationMethod {
    pub(crate) const fn header_bits(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_header_bits(bit: u8) -> Self {
        if bit & 1 == 1 {
            Self::Loudness
        } else {
            Self::Snr
        }
    }
}

/// SBC stream configuration, negotiated via AVDTP `SET_CONFIGURATION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbcConfig {
    pub sampling_frequency: SamplingFrequency,
    pub channel_mode: ChannelMode,
    pub block_count: BlockCount,
    pub subbands: SubBands,
    pub allocation_method: AllocationMethod,
    pub bitpool: u8,
}

impl Default for SbcConfig {
    fn default() -> Self {
        Self {
            sampling_frequency: SamplingFrequency::Freq44100,
            channel_mode: ChannelMode::JointStereo,
            block_count: BlockCount::Blocks16,
            subbands: SubBands::Sub8,
            allocation_method: AllocationMethod::Loudness,
            bitpool: 53,
        }
    }
}

impl SbcConfig {
    pub fn is_valid(&self) -> bool {
        self.bitpool >= 2 && self.bitpool <= self.max_bitpool()
    }

    pub fn max_bitpool(&self) -> u8 {
        let subbands = self.subbands.count() as u16;
        let factor = match self.channel_mode {
            ChannelMode::Mono | ChannelMode::DualChannel => 16,
            ChannelMode::Stereo | ChannelMode::JointStereo => 32,
        };
        (factor * subbands).min(250) as u8
    }

    pub const fn channels(&self) -> u8 {
        self.channel_mode.channels()
    }

    pub const fn samples_per_frame(&self) -> usize {
        self.block_count.count() * self.subbands.count()
    }

    /// Byte length of one encoded frame at this configuration, per the A2DP
    /// `Frame_Length` formula.
    pub fn frame_length(&self) -> usize {
        let subbands = self.subbands.count();
        let blocks = self.block_count.count();
        let channels = self.channels() as usize;
        let bitpool = self.bitpool as usize;

        let scale_factor_bytes = match self.channel_mode {
            ChannelMode::JointStereo => (subbands + 2 * subbands * 4) / 8 + 1,
            _ => (channels * subbands * 4) / 8,
        };

        let audio_bits = match self.channel_mode {
            ChannelMode::Mono | ChannelMode::DualChannel => channels * blocks * bitpool,
            ChannelMode::Stereo | ChannelMode::JointStereo => blocks * bitpool,
        };

        4 + scale_factor_bytes + (audio_bits + 7) / 8
    }
}

/// The four SBC codec-specific capability bytes exchanged in AVDTP
/// `SET_CONFIGURATION`/`GET_CAPABILITIES`: octet0 packs sampling frequency
/// and channel mode nibbles, octet1 packs block count/subbands/allocation,
/// octets 2-3 are the min/max bitpool bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbcCapabilities {
    pub sampling_frequencies: u8,
    pub channel_modes: u8,
    pub block_counts: u8,
    pub subbands: u8,
    pub allocation_methods: u8,
    pub min_bitpool: u8,
    pub max_bitpool: u8,
}

impl SbcCapabilities {
    pub const SAMPLING_FREQ_16000: u8 = 1 << 3;
    pub const SAMPLING_FREQ_32000: u8 = 1 << 2;
    pub const SAMPLING_FREQ_44100: u8 = 1 << 1;
    pub const SAMPLING_FREQ_48000: u8 = 1 << 0;

    pub const CHANNEL_MODE_MONO: u8 = 1 << 3;
    pub const CHANNEL_MODE_DUAL: u8 = 1 << 2;
    pub const CHANNEL_MODE_STEREO: u8 = 1 << 1;
    pub const CHANNEL_MODE_JOINT_STEREO: u8 = 1 << 0;

    pub const BLOCKS_4: u8 = 1 << 3;
    pub const BLOCKS_8: u8 = 1 << 2;
    pub const BLOCKS_12: u8 = 1 << 1;
    pub const BLOCKS_16: u8 = 1 << 0;

    pub const SUBBANDS_4: u8 = 1 << 1;
    pub const SUBBANDS_8: u8 = 1 << 0;

    pub const ALLOCATION_SNR: u8 = 1 << 1;
    pub const ALLOCATION_LOUDNESS: u8 = 1 << 0;

    pub fn encode(&self) -> [u8; 4] {
        [
            (self.sampling_frequencies << 4) | self.channel_modes,
            (self.block_counts << 4) | (self.subbands << 2) | self.allocation_methods,
            self.min_bitpool,
            self.max_bitpool,
        ]
    }

    pub fn decode(bytes: &[u8; 4]) -> Self {
        Self {
            sampling_frequencies: bytes[0] >> 4,
            channel_modes: bytes[0] & 0x0F,
            block_counts: bytes[1] >> 4,
            subbands: (bytes[1] >> 2) & 0x03,
            allocation_methods: bytes[1] & 0x03,
            min_bitpool: bytes[2],
            max_bitpool: bytes[3],
        }
    }

    /// A permissive capability set advertising every mode this encoder
    /// implements, for a source endpoint's `GET_CAPABILITIES` response.
    pub fn full_support() -> Self {
        Self {
            sampling_frequencies: Self::SAMPLING_FREQ_16000
                | Self::SAMPLING_FREQ_32000
                | Self::SAMPLING_FREQ_44100
                | Self::SAMPLING_FREQ_48000,
            channel_modes: Self::CHANNEL_MODE_MONO
                | Self::CHANNEL_MODE_DUAL
                | Self::CHANNEL_MODE_STEREO
                | Self::CHANNEL_MODE_JOINT_STEREO,
            block_counts: Self::BLOCKS_4 | Self::BLOCKS_8 | Self::BLOCKS_12 | Self::BLOCKS_16,
            subbands: Self::SUBBANDS_4 | Self::SUBBANDS_8,
            allocation_methods: Self::ALLOCATION_SNR | Self::ALLOCATION_LOUDNESS,
            min_bitpool: 2,
            max_bitpool: 250,
        }
    }
}
