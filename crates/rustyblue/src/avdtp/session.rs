//! Per-connection AVDTP session: the endpoint tables, the active
//! signaling exchange, and the negotiated SBC stream parameters once a
//! configuration has been accepted.

use crate::sbc::SbcConfig;

use super::types::{Seid, StreamEndpoint, StreamState};

/// One AVDTP-over-L2CAP connection's state: local endpoints this process
/// registered, remote endpoints learned from `Discover`, which pair is
/// active, and the RTP counters for the media path once streaming.
pub struct AvdtpSession {
    pub local_endpoints: Vec<StreamEndpoint>,
    pub remote_endpoints: Vec<StreamEndpoint>,
    pub active_local_seid: Option<Seid>,
    pub active_remote_seid: Option<Seid>,
    pub negotiated_sbc: Option<SbcConfig>,
    pub rtp_sequence_number: u16,
    pub rtp_timestamp: u32,
    pub reported_delay: u16,
}

impl AvdtpSession {
    pub fn new(local_endpoints: Vec<StreamEndpoint>) -> Self {
        Self {
            local_endpoints,
            remote_endpoints: Vec::new(),
            active_local_seid: None,
            active_remote_seid: None,
            negotiated_sbc: None,
            rtp_sequence_number: 0,
            rtp_timestamp: 0,
            reported_delay: 0,
        }
    }

    pub fn local_endpoint_mut(&mut self, seid: Seid) -> Option<&mut StreamEndpoint> {
        self.local_endpoints.iter_mut().find(|e| e.seid == seid)
    }

    pub fn local_endpoint(&self, seid: Seid) -> Option<&StreamEndpoint> {
        self.local_endpoints.iter().find(|e| e.seid == seid)
    }

    pub fn active_state(&self) -> StreamState {
        self.active_local_seid
            .and_then(|seid| self.local_endpoint(seid))
            .map(|e| e.state)
            .unwrap_or(StreamState::Idle)
    }

    /// Advances and returns the sequence number/timestamp for the next
    /// RTP media packet; called once per encoded SBC frame emitted.
    pub fn next_rtp_counters(&mut self, samples_per_frame: u32) -> (u16, u32) {
        let seq = self.rtp_sequence_number;
        let ts = self.rtp_timestamp;
        self.rtp_sequence_number = self.rtp_sequence_number.wrapping_add(1);
        self.rtp_timestamp = self.rtp_timestamp.wrapping_add(samples_per_frame);
        (seq, ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avdtp::types::{CodecType, MediaType, TsepRole};

    fn sample_endpoint(seid: Seid) -> StreamEndpoint {
        StreamEndpoint::new(seid, MediaType::Audio, TsepRole::Source, CodecType::Sbc, vec![])
    }

    #[test]
    fn rtp_counters_monotonically_increase() {
        let mut session = AvdtpSession::new(vec![sample_endpoint(1)]);
        let (seq0, ts0) = session.next_rtp_counters(128);
        let (seq1, ts1) = session.next_rtp_counters(128);
        assert_eq!(seq1, seq0.wrapping_add(1));
        assert_eq!(ts1, ts0 + 128);
    }

    #[test]
    fn active_state_defaults_to_idle_without_an_active_endpoint() {
        let session = AvdtpSession::new(vec![sample_endpoint(1)]);
        assert_eq!(session.active_state(), StreamState::Idle);
    }
}
