//! Loudness/SNR bit allocation: turns per-subband scale factors into a
//! bit budget for the quantizer, spending the configured bitpool on the
//! subbands with the highest perceptual bitneed first.

use super::types::{AllocationMethod, ChannelMode, SbcConfig};
use super::tables::{LOUDNESS_OFFSET_4, LOUDNESS_OFFSET_8};

const MAX_SUBBANDS: usize = 8;
const MAX_CHANNELS: usize = 2;

pub fn allocate(
    scale_factors: &[[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    config: &SbcConfig,
    join_flags: u8,
) -> [[u8; MAX_SUBBANDS]; MAX_CHANNELS] {
    let bitneed = match config.allocation_method {
        AllocationMethod::Snr => snr_bitneed(scale_factors, config),
        AllocationMethod::Loudness => loudness_bitneed(scale_factors, config),
    };
    distribute(&bitneed, config, join_flags)
}

fn snr_bitneed(
    scale_factors: &[[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    config: &SbcConfig,
) -> [[i32; MAX_SUBBANDS]; MAX_CHANNELS] {
    let mut bitneed = [[0i32; MAX_SUBBANDS]; MAX_CHANNELS];
    for ch in 0..config.channels() as usize {
        for sb in 0..config.subbands.count() {
            bitneed[ch][sb] = scale_factors[ch][sb] as i32;
        }
    }
    bitneed
}

fn loudness_bitneed(
    scale_factors: &[[u8; MAX_SUBBANDS]; MAX_CHANNELS],
    config: &SbcConfig,
) -> [[i32; MAX_SUBBANDS]; MAX_CHANNELS] {
    let num_subbands = config.subbands.count();
    let freq_idx = config.sampling_frequency as usize;
    let mut bitneed = [[0i32; MAX_SUBBANDS]; MAX_CHANNELS];

    for ch in 0..config.channels() as usize {
        for sb in 0..num_subbands {
            let sf = scale_factors[ch][sb] as i32;
            if sf == 0 {
                bitneed[ch][sb] = -5;
                continue;
            }
            let offset = if num_subbands == 8 {
                LOUDNESS_OFFSET_8[freq_idx][sb] as i32
            } else {
                LOUDNESS_OFFSET_4[freq_idx][sb] as i32
            };
            bitneed[ch][sb] = if sf > offset {
                sf - offset
            } else {
                (sf - offset) / 2
            };
        }
    }
    bitneed
}

fn distribute(
    bitneed: &[[i32; MAX_SUBBANDS]; MAX_CHANNELS],
    config: &SbcConfig,
    join_flags: u8,
) -> [[u8; MAX_SUBBANDS]; MAX_CHANNELS] {
    let num_subbands = config.subbands.count();
    let num_channels = config.channels() as usize;
    let mut bits = [[0u8; MAX_SUBBANDS]; MAX_CHANNELS];
    let mut remaining = config.bitpool as i32;

    let max_bitneed = bitneed
        .iter()
        .take(num_channels)
        .flat_map(|ch| ch.iter().take(num_subbands))
        .copied()
        .max()
        .unwrap_or(0);

    let mut slice = max_bitneed + 1;
    while slice > 0 && remaining > 0 {
        slice -= 1;
        let mut used = 0;
        for ch in 0..num_channels {
            for sb in 0..num_subbands {
                if bitneed[ch][sb] == slice + 1 {
                    used += 2;
                } else if bitneed[ch][sb] > slice && bits[ch][sb] > 0 {
                    used += 1;
                }
            }
        }
        if used > remaining {
            continue;
        }
        for ch in 0..num_channels {
            for sb in 0..num_subbands {
                if bitneed[ch][sb] == slice + 1 {
                    bits[ch][sb] = 2;
                } else if bitneed[ch][sb] > slice && bits[ch][sb] > 0 {
                    bits[ch][sb] += 1;
                }
            }
        }
        remaining -= used;
    }

    loop {
        let mut allocated = false;
        'outer: for ch in 0..num_channels {
            for sb in 0..num_subbands {
                if remaining <= 0 {
                    break 'outer;
                }
                if bits[ch][sb] >= 16 || bitneed[ch][sb] <= 0 {
                    continue;
                }
                if bits[ch][sb] == 0 {
                    if remaining >= 2 {
                        bits[ch][sb] = 2;
                        remaining -= 2;
                        allocated = true;
                    }
                } else {
                    bits[ch][sb] += 1;
                    remaining -= 1;
                    allocated = true;
                }
            }
        }
        if !allocated || remaining <= 0 {
            break;
        }
    }

    if config.channel_mode == ChannelMode::JointStereo && num_channels == 2 {
        for sb in 0..num_subbands {
            if (join_flags >> (num_subbands - 1 - sb)) & 1 == 1 {
                let max_bits = bits[0][sb].max(bits[1][sb]);
                bits[0][sb] = max_bits;
                bits[1][sb] = max_bits;
            }
        }
    }

    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loudness_allocates_something_for_live_signal() {
        let config = SbcConfig {
            allocation_method: AllocationMethod::Loudness,
            bitpool: 50,
            ..Default::default()
        };
        let scale_factors = [[5u8; MAX_SUBBANDS]; MAX_CHANNELS];
        let bits = allocate(&scale_factors, &config, 0);
        let total: u32 = bits.iter().flatten().map(|&b| b as u32).sum();
        assert!(total > 0);
    }

    #[test]
    fn silent_subbands_get_minimal_allocation() {
        let config = SbcConfig {
            allocation_method: AllocationMethod::Loudness,
            bitpool: 50,
            ..Default::default()
        };
        let scale_factors = [[0u8; MAX_SUBBANDS]; MAX_CHANNELS];
        let bits = allocate(&scale_factors, &config, 0);
        let total: u32 = bits.iter().flatten().map(|&b| b as u32).sum();
        assert!(total < 100);
    }

    #[test]
    fn no_subband_exceeds_16_bits() {
        let config = SbcConfig {
            bitpool: 200,
            ..Default::default()
        };
        let scale_factors = [[15u8; MAX_SUBBANDS]; MAX_CHANNELS];
        let bits = allocate(&scale_factors, &config, 0);
        assert!(bits.iter().flatten().all(|&b| b <= 16));
    }

    #[test]
    fn joined_subbands_share_the_same_bit_count() {
        let config = SbcConfig {
            channel_mode: ChannelMode::JointStereo,
            bitpool: 53,
            ..Default::default()
        };
        let scale_factors = [[6u8; MAX_SUBBANDS]; MAX_CHANNELS];
        let join_flags = 0b1111_1110;
        let bits = allocate(&scale_factors, &config, join_flags);
        for sb in 0..7 {
            if (join_flags >> (7 - sb)) & 1 == 1 {
                assert_eq!(bits[0][sb], bits[1][sb]);
            }
        }
    }
}
