//! Polyphase analysis filterbank: windows PCM history by the prototype
//! filter, then matrixes it through the cosine modulation table to
//! produce one subband sample per block per channel.

use super::tables::{COS_TABLE_4, COS_TABLE_8, PROTO_4_40, PROTO_8_80};
use super::types::{SbcConfig, SubBands};

const MAX_SUBBANDS: usize = 8;
const MAX_CHANNELS: usize = 2;
const FILTER_DEPTH: usize = 10;

/// Per-channel sliding window of the last 10 subband-widths of PCM
/// history, carried across `process()` calls so frame boundaries don't
/// introduce filter discontinuities.
pub struct AnalysisFilterbank {
    history: [[i32; MAX_SUBBANDS * FILTER_DEPTH]; MAX_CHANNELS],
}

impl AnalysisFilterbank {
    pub fn new(_subbands: SubBands) -> Self {
        Self {
            history: [[0; MAX_SUBBANDS * FILTER_DEPTH]; MAX_CHANNELS],
        }
    }

    pub fn reset(&mut self) {
        for channel in &mut self.history {
            channel.fill(0);
        }
    }

    /// Runs interleaved PCM through the filterbank, returning
    /// `subbands[channel][block][subband]`.
    pub fn process(&mut self, pcm: &[i16], config: &SbcConfig) -> Vec<Vec<[i32; MAX_SUBBANDS]>> {
        let num_subbands = config.subbands.count();
        let num_blocks = config.block_count.count();
        let num_channels = config.channels() as usize;

        let mut output = vec![vec![[0i32; MAX_SUBBANDS]; num_blocks]; num_channels];

        for block in 0..num_blocks {
            for channel in 0..num_channels {
                self.shift_in(pcm, block, channel, num_subbands, num_channels);
                output[channel][block] = self.compute_subbands(channel, num_subbands);
            }
        }

        output
    }

    fn shift_in(&mut self, pcm: &[i16], block: usize, channel: usize, subbands: usize, channels: usize) {
        let pcm_start = (block * subbands * channels) + channel;
        let history_len = subbands * FILTER_DEPTH;

        for i in (subbands..history_len).rev() {
            self.history[channel][i] = self.history[channel][i - subbands];
        }
        for i in 0..subbands {
            let pcm_idx = pcm_start + (subbands - 1 - i) * channels;
            self.history[channel][i] = pcm[pcm_idx] as i32;
        }
    }

    fn compute_subbands(&self, channel: usize, subbands: usize) -> [i32; MAX_SUBBANDS] {
        const SHUFFLE_4: [usize; 4] = [0, 2, 1, 3];
        const SHUFFLE_8: [usize; 8] = [0, 4, 1, 7, 2, 6, 3, 5];
        let shuffle: &[usize] = if subbands == 8 { &SHUFFLE_8 } else { &SHUFFLE_4 };

        // Window stage: accumulate the raw (unshifted) products per output
        // index, then round-and-shift once per index rather than once per
        // tap, so the rounding offset actually affects the result.
        let mut acc = [0i64; MAX_SUBBANDS * 2];
        for j in 0..FILTER_DEPTH {
            for i in 0..subbands {
                let idx = j * subbands + i;
                let proto = if subbands == 8 {
                    PROTO_8_80[idx] as i64
                } else {
                    PROTO_4_40[idx] as i64
                };
                let z_idx = shuffle[i] + (j % 2) * subbands;
                acc[z_idx] += self.history[channel][idx] as i64 * proto;
            }
        }

        let mut z = [0i64; MAX_SUBBANDS * 2];
        for i in 0..(subbands * 2) {
            z[i] = (acc[i] + (1i64 << 14)) >> 15;
        }

        let mut sb = [0i32; MAX_SUBBANDS];
        for k in 0..subbands {
            let mut sum = 0i64;
            for i in 0..(subbands * 2) {
                let cos_idx = i % subbands;
                let cos = if subbands == 8 {
                    COS_TABLE_8[k][cos_idx] as i64
                } else {
                    COS_TABLE_4[k][cos_idx] as i64
                };
                sum += z[i] * cos;
            }
            let dct = (sum + (1i64 << 12)) >> 13;
            sb[k] = dct.clamp(i16::MIN as i64, i16::MAX as i64) as i32;
        }
        sb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_in_silence_out() {
        let config = SbcConfig::default();
        let mut filter = AnalysisFilterbank::new(config.subbands);
        let samples = config.samples_per_frame() * config.channels() as usize;
        let pcm = vec![0i16; samples];

        let output = filter.process(&pcm, &config);
        for channel in &output {
            for block in channel {
                for &sample in block {
                    assert!(sample.abs() < 100);
                }
            }
        }
    }

    #[test]
    fn high_frequency_energy_favors_top_subband() {
        let config = SbcConfig::default();
        let mut filter = AnalysisFilterbank::new(config.subbands);
        let samples = config.samples_per_frame() * config.channels() as usize;
        let pcm: Vec<i16> = (0..samples)
            .map(|i| if i % 2 == 0 { 1000 } else { -1000 })
            .collect();

        let output = filter.process(&pcm, &config);
        let low: i64 = output[0].iter().map(|b| b[0].abs() as i64).sum();
        let high: i64 = output[0].iter().map(|b| b[7].abs() as i64).sum();
        assert!(high >= low);
    }

    #[test]
    fn reset_clears_history() {
        let mut filter = AnalysisFilterbank::new(SubBands::Sub8);
        filter.history[0][0] = 1234;
        filter.reset();
        assert!(filter.history[0].iter().all(|&v| v == 0));
    }
}
