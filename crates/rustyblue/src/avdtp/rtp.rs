//! RTP media framing for A2DP (RFC 3550 header plus the SBC media
//! payload header, AVDTP §A.2).

use byteorder::{BigEndian, ByteOrder};

const RTP_VERSION: u8 = 2;

/// A minimal RTP header: AVDTP media streams don't use CSRC lists or
/// header extensions, so those fields aren't modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    pub const LEN: usize = 12;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = RTP_VERSION << 6;
        out[1] = ((self.marker as u8) << 7) | (self.payload_type & 0x7F);
        BigEndian::write_u16(&mut out[2..4], self.sequence_number);
        BigEndian::write_u32(&mut out[4..8], self.timestamp);
        BigEndian::write_u32(&mut out[8..12], self.ssrc);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() < Self::LEN {
            return None;
        }
        let version = bytes[0] >> 6;
        if version != RTP_VERSION {
            return None;
        }
        let csrc_count = (bytes[0] & 0x0F) as usize;
        let header = Self {
            marker: bytes[1] & 0x80 != 0,
            payload_type: bytes[1] & 0x7F,
            sequence_number: BigEndian::read_u16(&bytes[2..4]),
            timestamp: BigEndian::read_u32(&bytes[4..8]),
            ssrc: BigEndian::read_u32(&bytes[8..12]),
        };
        let rest_start = Self::LEN + csrc_count * 4;
        if bytes.len() < rest_start {
            return None;
        }
        Some((header, &bytes[rest_start..]))
    }
}

/// SBC media payload header (AVDTP §A.2): a single byte carrying the
/// number of SBC frames packed into this RTP payload, plus fragmentation
/// flags this stack never sets (every A2DP frame fits in one RTP packet
/// at the bitpools this encoder produces).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbcMediaHeader {
    pub fragmented: bool,
    pub is_first_fragment: bool,
    pub is_last_fragment: bool,
    pub frame_count: u8,
}

impl SbcMediaHeader {
    pub fn single(frame_count: u8) -> Self {
        Self {
            fragmented: false,
            is_first_fragment: false,
            is_last_fragment: false,
            frame_count,
        }
    }

    pub fn encode(&self) -> u8 {
        ((self.fragmented as u8) << 7)
            | ((self.is_first_fragment as u8) << 6)
            | ((self.is_last_fragment as u8) << 5)
            | (self.frame_count & 0x0F)
    }

    pub fn decode(byte: u8) -> Self {
        Self {
            fragmented: byte & 0x80 != 0,
            is_first_fragment: byte & 0x40 != 0,
            is_last_fragment: byte & 0x20 != 0,
            frame_count: byte & 0x0F,
        }
    }
}

/// Packs one or more SBC frames (already encoded) into a single RTP
/// payload for transmission over the AVDTP media L2CAP channel.
pub fn pack_media_payload(rtp: &RtpHeader, sbc_frames: &[Vec<u8>]) -> Vec<u8> {
    let header = SbcMediaHeader::single(sbc_frames.len() as u8);
    let total_sbc: usize = sbc_frames.iter().map(|f| f.len()).sum();
    let mut out = Vec::with_capacity(RtpHeader::LEN + 1 + total_sbc);
    out.extend_from_slice(&rtp.encode());
    out.push(header.encode());
    for frame in sbc_frames {
        out.extend_from_slice(frame);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtp_header_round_trips() {
        let header = RtpHeader {
            marker: true,
            payload_type: 96,
            sequence_number: 0xBEEF,
            timestamp: 0xDEADBEEF,
            ssrc: 0x1234_5678,
        };
        let encoded = header.encode();
        let (decoded, rest) = RtpHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert!(rest.is_empty());
    }

    #[test]
    fn sequence_numbers_increase_across_frames() {
        let mut seq = 0u16;
        let mut prev = None;
        for _ in 0..5 {
            let header = RtpHeader {
                marker: false,
                payload_type: 96,
                sequence_number: seq,
                timestamp: 0,
                ssrc: 1,
            };
            if let Some(p) = prev {
                assert!(header.sequence_number.wrapping_sub(p) == 1);
            }
            prev = Some(seq);
            seq = seq.wrapping_add(1);
        }
    }

    #[test]
    fn sbc_media_header_round_trips() {
        let header = SbcMediaHeader::single(3);
        let byte = header.encode();
        let decoded = SbcMediaHeader::decode(byte);
        assert_eq!(decoded, header);
    }

    #[test]
    fn pack_media_payload_concatenates_frames_in_order() {
        let rtp = RtpHeader {
            marker: false,
            payload_type: 96,
            sequence_number: 1,
            timestamp: 0,
            ssrc: 1,
        };
        let frames = vec![vec![0xAA, 0xBB], vec![0xCC]];
        let payload = pack_media_payload(&rtp, &frames);
        assert_eq!(&payload[RtpHeader::LEN + 1..], &[0xAA, 0xBB, 0xCC]);
    }
}
