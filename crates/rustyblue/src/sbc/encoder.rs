//! Scale factor computation, joint-stereo decision, quantization and
//! frame assembly — the stages downstream of the analysis filterbank.

use super::bitalloc;
use super::filterbank::AnalysisFilterbank;
use super::tables::SCALE_FACTOR_LEVELS;
use super::types::{ChannelMode, SbcConfig, SbcError};

const MAX_SUBBANDS: usize = 8;
const MAX_CHANNELS: usize = 2;
const SYNCWORD: u8 = 0x9C;
const CRC_POLY: u8 = 0x1D;

/// Decoded SBC frame header, as carried in the first 4 bytes of every
/// encoded frame (and reusable to validate a received RTP payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbcFrameHeader {
    pub config: SbcConfig,
    pub crc_check: u8,
}

impl SbcFrameHeader {
    pub fn decode(bytes: &[u8; 4]) -> Option<Self> {
        if bytes[0] != SYNCWORD {
            return None;
        }
        use super::types::{AllocationMethod, BlockCount, ChannelMode, SamplingFrequency, SubBands};
        let config = SbcConfig {
            sampling_frequency: SamplingFrequency::from_header_bits(bytes[1] >> 6),
            block_count: BlockCount::from_header_bits(bytes[1] >> 4),
            channel_mode: ChannelMode::from_header_bits(bytes[1] >> 2),
            allocation_method: AllocationMethod::from_header_bits(bytes[1] >> 1),
            subbands: SubBands::from_header_bits(bytes[1]),
            bitpool: bytes[2],
        };
        Some(Self {
            config,
            crc_check: bytes[3],
        })
    }
}

/// Stateful SBC encoder: owns the analysis filterbank's history across
/// frames so callers just feed it consecutive PCM chunks.
pub struct SbcEncoder {
    config: SbcConfig,
    filterbank: AnalysisFilterbank,
}

impl SbcEncoder {
    pub fn new(config: SbcConfig) -> Result<Self, SbcError> {
        if !config.is_valid() {
            return Err(SbcError::InvalidBitpool(config.bitpool));
        }
        Ok(Self {
            filterbank: AnalysisFilterbank::new(config.subbands),
            config,
        })
    }

    pub fn config(&self) -> &SbcConfig {
        &self.config
    }

    pub fn samples_per_frame(&self) -> usize {
        self.config.samples_per_frame()
    }

    pub fn reset(&mut self) {
        self.filterbank.reset();
    }

    /// Encodes one frame of interleaved PCM (`samples_per_frame() *
    /// channels()` samples) and returns the encoded frame bytes.
    pub fn encode_frame(&mut self, pcm: &[i16]) -> Result<Vec<u8>, SbcError> {
        let needed = self.samples_per_frame() * self.config.channels() as usize;
        if pcm.len() < needed {
            return Err(SbcError::InputTooSmall);
        }

        let subbands = self.filterbank.process(pcm, &self.config);
        let scale_factors = calc_scale_factors(&subbands, &self.config);

        let (subbands, scale_factors, join_flags) = if self.config.channel_mode == ChannelMode::JointStereo {
            joint_stereo_process(subbands, scale_factors, &self.config)
        } else {
            (subbands, scale_factors, 0u8)
        };

        let bits = bitalloc::allocate(&scale_factors, &self.config, join_flags);
        let quantized = quantize(&subbands, &bits, &scale_factors, &self.config);

        Ok(pack_frame(&self.config, join_flags, &scale_factors, &bits, &quantized))
    }
}

fn calc_scale_factors(
    subbands: &[Vec<[i32; MAX_SUBBANDS]>],
    config: &SbcConfig,
) -> [[u8; MAX_SUBBANDS]; MAX_CHANNELS] {
    let mut scale_factors = [[0u8; MAX_SUBBANDS]; MAX_CHANNELS];
    for (ch, channel_blocks) in subbands.iter().enumerate() {
        for sb in 0..config.subbands.count() {
            let max_val = channel_blocks.iter().map(|b| b[sb].abs()).max().unwrap_or(0);
            scale_factors[ch][sb] = scale_factor_for(max_val);
        }
    }
    scale_factors
}

fn scale_factor_for(max_val: i32) -> u8 {
    if max_val == 0 {
        return 0;
    }
    let bits_needed = 32 - max_val.leading_zeros();
    let sf = if bits_needed > 1 { bits_needed - 1 } else { 0 };
    sf.min(15) as u8
}

/// Joint stereo mode (A2DP SBC spec, 12.6.3 step 2): for each subband below
/// the top one, compare the scale factors the sum/difference signal would
/// need against the ones left/right already need, and transmit whichever
/// pair costs fewer bits.
fn joint_stereo_process(
    mut subbands: Vec<Vec<[i32; MAX_SUBBANDS]>>,
    mut scale_factors: [[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    config: &SbcConfig,
) -> (Vec<Vec<[i32; MAX_SUBBANDS]>>, [[u8; MAX_SUBBANDS]; MAX_CHANNELS], u8) {
    let num_subbands = config.subbands.count();
    let num_blocks = config.block_count.count();
    let join_limit = if num_subbands == 8 { num_subbands - 1 } else { num_subbands };
    let mut join_flags = 0u8;

    for sb in 0..join_limit {
        let mut max_sum = 0i32;
        let mut max_diff = 0i32;
        for blk in 0..num_blocks {
            let left = subbands[0][blk][sb];
            let right = subbands[1][blk][sb];
            max_sum = max_sum.max(((left + right) >> 1).abs());
            max_diff = max_diff.max(((left - right) >> 1).abs());
        }
        let scf_sum = scale_factor_for(max_sum);
        let scf_diff = scale_factor_for(max_diff);

        if scf_sum as u32 + scf_diff as u32 >= scale_factors[0][sb] as u32 + scale_factors[1][sb] as u32 {
            continue;
        }

        join_flags |= 1 << (num_subbands - 1 - sb);
        for blk in 0..num_blocks {
            let left = subbands[0][blk][sb];
            let right = subbands[1][blk][sb];
            subbands[0][blk][sb] = (left + right) >> 1;
            subbands[1][blk][sb] = (left - right) >> 1;
        }
        scale_factors[0][sb] = scf_sum;
        scale_factors[1][sb] = scf_diff;
    }

    (subbands, scale_factors, join_flags)
}

fn quantize(
    subbands: &[Vec<[i32; MAX_SUBBANDS]>],
    bits: &[[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    scale_factors: &[[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    config: &SbcConfig,
) -> Vec<Vec<[u16; MAX_SUBBANDS]>> {
    let num_subbands = config.subbands.count();
    let num_blocks = config.block_count.count();
    let mut quantized = vec![vec![[0u16; MAX_SUBBANDS]; num_blocks]; subbands.len()];

    for (ch, channel_blocks) in subbands.iter().enumerate() {
        for sb in 0..num_subbands {
            let bit_count = bits[ch][sb];
            if bit_count == 0 {
                continue;
            }
            let level = SCALE_FACTOR_LEVELS[scale_factors[ch][sb] as usize];
            for (blk, block) in channel_blocks.iter().enumerate() {
                quantized[ch][blk][sb] = quantize_sample(block[sb], bit_count, level);
            }
        }
    }

    quantized
}

fn quantize_sample(sample: i32, bits: u8, level: i32) -> u16 {
    let levels = (1u32 << bits) - 1;
    let normalized = ((sample as i64) << 15) / (level as i64);
    let offset = normalized + 32768;
    let value = (offset * levels as i64) >> 16;
    value.clamp(0, levels as i64) as u16
}

fn pack_frame(
    config: &SbcConfig,
    join_flags: u8,
    scale_factors: &[[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    bits: &[[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    samples: &[Vec<[u16; MAX_SUBBANDS]>],
) -> Vec<u8> {
    let mut output = Vec::with_capacity(config.frame_length());
    let mut writer = BitWriter::new();

    output.push(SYNCWORD);
    output.push(
        (config.sampling_frequency.header_bits() << 6)
            | (config.block_count.header_bits() << 4)
            | (config.channel_mode.header_bits() << 2)
            | (config.allocation_method.header_bits() << 1)
            | config.subbands.header_bits(),
    );
    output.push(config.bitpool);
    output.push(0); // CRC, patched in below

    let num_subbands = config.subbands.count();
    let num_blocks = config.block_count.count();
    let num_channels = config.channels() as usize;

    if config.channel_mode == ChannelMode::JointStereo {
        writer.write(&mut output, join_flags as u32, num_subbands as u8);
    }

    for ch in 0..num_channels {
        for sb in 0..num_subbands {
            writer.write(&mut output, scale_factors[ch][sb] as u32, 4);
        }
    }

    for blk in 0..num_blocks {
        for ch in 0..num_channels {
            for sb in 0..num_subbands {
                let bit_count = bits[ch][sb];
                if bit_count > 0 {
                    writer.write(&mut output, samples[ch][blk][sb] as u32, bit_count);
                }
            }
        }
    }
    writer.flush(&mut output);

    output[3] = crc8(&output);
    output
}

/// MSB-first bit packer used when assembling the frame body; appends
/// complete bytes directly to the output vector as they fill.
struct BitWriter {
    buffer: u32,
    bits_buffered: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            buffer: 0,
            bits_buffered: 0,
        }
    }

    fn write(&mut self, output: &mut Vec<u8>, value: u32, num_bits: u8) {
        self.buffer = (self.buffer << num_bits) | (value & ((1u32 << num_bits) - 1));
        self.bits_buffered += num_bits;
        while self.bits_buffered >= 8 {
            self.bits_buffered -= 8;
            output.push(((self.buffer >> self.bits_buffered) & 0xFF) as u8);
        }
    }

    fn flush(&mut self, output: &mut Vec<u8>) {
        if self.bits_buffered > 0 {
            let padding = 8 - self.bits_buffered;
            output.push(((self.buffer << padding) & 0xFF) as u8);
        }
        self.buffer = 0;
        self.bits_buffered = 0;
    }
}

fn crc8(frame: &[u8]) -> u8 {
    let mut crc: u8 = 0x0F;
    for (i, &byte) in frame.iter().enumerate() {
        if i == 0 || i == 3 {
            continue;
        }
        for bit in 0..8 {
            let msb = (crc >> 7) & 1;
            crc <<= 1;
            if ((byte >> (7 - bit)) & 1) ^ msb == 1 {
                crc ^= CRC_POLY;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_silence_with_valid_syncword() {
        let config = SbcConfig::default();
        let mut encoder = SbcEncoder::new(config).unwrap();
        let pcm = vec![0i16; encoder.samples_per_frame() * config.channels() as usize];
        let frame = encoder.encode_frame(&pcm).unwrap();
        assert_eq!(frame[0], SYNCWORD);
        assert_eq!(frame[2], config.bitpool);
    }

    #[test]
    fn rejects_short_input() {
        let config = SbcConfig::default();
        let mut encoder = SbcEncoder::new(config).unwrap();
        let pcm = vec![0i16; 4];
        assert_eq!(encoder.encode_frame(&pcm), Err(SbcError::InputTooSmall));
    }

    #[test]
    fn rejects_invalid_bitpool() {
        let config = SbcConfig {
            bitpool: 255,
            ..Default::default()
        };
        assert!(SbcEncoder::new(config).is_err());
    }

    #[test]
    fn header_round_trips_through_decode() {
        let config = SbcConfig::default();
        let mut encoder = SbcEncoder::new(config).unwrap();
        let pcm = vec![1000i16; encoder.samples_per_frame() * config.channels() as usize];
        let frame = encoder.encode_frame(&pcm).unwrap();

        let header_bytes: [u8; 4] = frame[0..4].try_into().unwrap();
        let header = SbcFrameHeader::decode(&header_bytes).unwrap();
        assert_eq!(header.config.bitpool, config.bitpool);
        assert_eq!(header.config.sampling_frequency, config.sampling_frequency);
    }

    #[test]
    fn consecutive_frames_encode_without_panicking() {
        let config = SbcConfig::default();
        let mut encoder = SbcEncoder::new(config).unwrap();
        let pcm: Vec<i16> = (0..encoder.samples_per_frame() * config.channels() as usize)
            .map(|i| ((i * 37) % 2000) as i16 - 1000)
            .collect();
        for _ in 0..10 {
            encoder.encode_frame(&pcm).unwrap();
        }
    }
}
