//! AVDTP signaling + media engine: drives the acceptor side of Discover/
//! SetConfiguration/Open/Start/Suspend/Close/Abort against the local
//! endpoint table, and builds the matching initiator commands.

use std::collections::HashMap;

use crate::sbc::{SbcCapabilities, SbcConfig, SbcEncoder};

use super::codec::{
    decode_discover_entry, decode_media_codec_capability, encode_discover_entry,
    encode_media_codec_capability, iter_service_capabilities, AvdtpHeader,
    SERVICE_CATEGORY_MEDIA_CODEC, SERVICE_CATEGORY_MEDIA_TRANSPORT,
};
use super::rtp::{pack_media_payload, RtpHeader};
use super::session::AvdtpSession;
use super::types::{
    error_code, AvdtpError, CodecType, MediaType, Seid, SignalIdentifier, StreamEndpoint,
    StreamState, TsepRole,
};

/// AVDTP PSM (Core Spec Vol 3 Part A, Appendix B); the signaling and
/// media channels both connect to this PSM, as two independent L2CAP
/// channels.
pub const AVDTP_PSM: u16 = 0x0019;

/// Connection-level identifier. Opaque to this module; whatever the
/// L2CAP/HCI layer uses to name a connection.
pub type ConnectionHandle = u16;

/// Engine-wide tunables, negotiated once at construction and applied to
/// every session.
#[derive(Debug, Clone)]
pub struct AvdtpEngineConfig {
    pub signaling_psm: u16,
    pub media_psm: u16,
    pub preferred_sbc_config: SbcConfig,
    pub rtp_payload_type: u8,
}

impl Default for AvdtpEngineConfig {
    fn default() -> Self {
        Self {
            signaling_psm: AVDTP_PSM,
            media_psm: AVDTP_PSM,
            preferred_sbc_config: SbcConfig::default(),
            rtp_payload_type: 96,
        }
    }
}

/// Drives one or more AVDTP sessions, one per connected peer.
pub struct AvdtpEngine {
    config: AvdtpEngineConfig,
    local_endpoints: Vec<StreamEndpoint>,
    sessions: HashMap<ConnectionHandle, AvdtpSession>,
    next_transaction_label: u8,
}

impl AvdtpEngine {
    pub fn new(config: AvdtpEngineConfig, local_endpoints: Vec<StreamEndpoint>) -> Self {
        Self {
            config,
            local_endpoints,
            sessions: HashMap::new(),
            next_transaction_label: 0,
        }
    }

    fn next_label(&mut self) -> u8 {
        let label = self.next_transaction_label;
        self.next_transaction_label = (self.next_transaction_label + 1) % 16;
        label
    }

    pub fn session(&self, connection: ConnectionHandle) -> Option<&AvdtpSession> {
        self.sessions.get(&connection)
    }

    pub fn open_session(&mut self, connection: ConnectionHandle) {
        self.sessions
            .entry(connection)
            .or_insert_with(|| AvdtpSession::new(self.local_endpoints.clone()));
    }

    pub fn close_session(&mut self, connection: ConnectionHandle) {
        self.sessions.remove(&connection);
    }

    // ---- Initiator: command builders ----

    pub fn build_discover_command(&mut self) -> Vec<u8> {
        let header = AvdtpHeader::command(self.next_label(), SignalIdentifier::Discover);
        header.encode().to_vec()
    }

    pub fn build_get_all_capabilities_command(&mut self, remote_seid: Seid) -> Vec<u8> {
        let header = AvdtpHeader::command(self.next_label(), SignalIdentifier::GetAllCapabilities);
        let mut out = header.encode().to_vec();
        out.push(remote_seid << 2);
        out
    }

    /// Builds a `SET_CONFIGURATION` command naming the local source
    /// endpoint and remote sink endpoint, carrying a Media Transport
    /// capability and a Media Codec/SBC capability for `sbc_config`.
    pub fn build_set_configuration_command(
        &mut self,
        local_seid: Seid,
        remote_seid: Seid,
        sbc_config: &SbcConfig,
    ) -> Vec<u8> {
        let header = AvdtpHeader::command(self.next_label(), SignalIdentifier::SetConfiguration);
        let mut out = header.encode().to_vec();
        out.push(remote_seid << 2);
        out.push(local_seid << 2);
        out.push(SERVICE_CATEGORY_MEDIA_TRANSPORT);
        out.push(0);
        out.extend_from_slice(&encode_media_codec_capability(
            0,
            CodecType::Sbc.to_u8(),
            &sbc_capability_info(sbc_config),
        ));
        out
    }

    pub fn build_open_command(&mut self, remote_seid: Seid) -> Vec<u8> {
        let header = AvdtpHeader::command(self.next_label(), SignalIdentifier::Open);
        let mut out = header.encode().to_vec();
        out.push(remote_seid << 2);
        out
    }

    pub fn build_start_command(&mut self, remote_seid: Seid) -> Vec<u8> {
        let header = AvdtpHeader::command(self.next_label(), SignalIdentifier::Start);
        let mut out = header.encode().to_vec();
        out.push(remote_seid << 2);
        out
    }

    pub fn build_suspend_command(&mut self, remote_seid: Seid) -> Vec<u8> {
        let header = AvdtpHeader::command(self.next_label(), SignalIdentifier::Suspend);
        let mut out = header.encode().to_vec();
        out.push(remote_seid << 2);
        out
    }

    pub fn build_close_command(&mut self, remote_seid: Seid) -> Vec<u8> {
        let header = AvdtpHeader::command(self.next_label(), SignalIdentifier::Close);
        let mut out = header.encode().to_vec();
        out.push(remote_seid << 2);
        out
    }

    /// Parses a `DISCOVER` response's list of remote endpoint summaries.
    pub fn parse_discover_response(&mut self, connection: ConnectionHandle, body: &[u8]) {
        self.open_session(connection);
        let session = self.sessions.get_mut(&connection).unwrap();
        session.remote_endpoints.clear();
        for chunk in body.chunks_exact(2) {
            let bytes: [u8; 2] = [chunk[0], chunk[1]];
            let (seid, in_use, media_type_bits, is_source) = decode_discover_entry(&bytes);
            let media_type = if media_type_bits == 0 { MediaType::Audio } else { MediaType::Video };
            let role = if is_source { TsepRole::Source } else { TsepRole::Sink };
            let mut endpoint = StreamEndpoint::new(seid, media_type, role, CodecType::Sbc, Vec::new());
            endpoint.in_use = in_use;
            session.remote_endpoints.push(endpoint);
        }
    }

    // ---- Acceptor: inbound command dispatch ----

    /// Processes an inbound signaling command and returns the response
    /// bytes to send back, mutating the session's endpoint/stream state
    /// as the command dictates.
    pub fn handle_command(
        &mut self,
        connection: ConnectionHandle,
        bytes: &[u8],
    ) -> Result<Vec<u8>, AvdtpError> {
        self.open_session(connection);
        let (header, body) = AvdtpHeader::decode(bytes)?;
        let label = header.transaction_label;

        let result = match header.signal_identifier {
            SignalIdentifier::Discover => Ok(self.respond_discover()),
            SignalIdentifier::GetCapabilities | SignalIdentifier::GetAllCapabilities => {
                self.respond_capabilities(body)
            }
            SignalIdentifier::SetConfiguration => self.respond_set_configuration(connection, body),
            SignalIdentifier::Open => self.respond_open(connection, body),
            SignalIdentifier::Start => self.respond_start(connection, body),
            SignalIdentifier::Suspend => self.respond_suspend(connection, body),
            SignalIdentifier::Close => self.respond_close(connection, body),
            SignalIdentifier::Abort => self.respond_abort(connection, body),
            other => Err(AvdtpError::UnknownSignal(other as u8)),
        };

        match result {
            Ok(mut accept_body) => {
                let mut out = AvdtpHeader::response(label, header.signal_identifier, true).encode().to_vec();
                out.append(&mut accept_body);
                Ok(out)
            }
            Err(err) => {
                let mut out = AvdtpHeader::response(label, header.signal_identifier, false).encode().to_vec();
                if let Some(&first_seid_byte) = body.first() {
                    out.push(first_seid_byte);
                }
                out.push(err.to_error_code());
                Ok(out)
            }
        }
    }

    fn respond_discover(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.local_endpoints.len() * 2);
        for endpoint in &self.local_endpoints {
            let media_type_bits = match endpoint.media_type {
                MediaType::Audio => 0,
                MediaType::Video => 1,
                MediaType::Multimedia => 2,
            };
            out.extend_from_slice(&encode_discover_entry(
                endpoint.seid,
                endpoint.in_use,
                media_type_bits,
                matches!(endpoint.role, TsepRole::Source),
            ));
        }
        out
    }

    fn respond_capabilities(&self, body: &[u8]) -> Result<Vec<u8>, AvdtpError> {
        let seid = body.first().ok_or(AvdtpError::MalformedPdu("missing SEID"))? >> 2;
        let endpoint = self
            .local_endpoints
            .iter()
            .find(|e| e.seid == seid)
            .ok_or(AvdtpError::UnknownSeid(seid))?;

        let mut out = Vec::new();
        out.push(SERVICE_CATEGORY_MEDIA_TRANSPORT);
        out.push(0);
        out.extend_from_slice(&encode_media_codec_capability(
            0,
            endpoint.codec_type.to_u8(),
            &endpoint.capabilities,
        ));
        Ok(out)
    }

    fn respond_set_configuration(
        &mut self,
        connection: ConnectionHandle,
        body: &[u8],
    ) -> Result<Vec<u8>, AvdtpError> {
        if body.len() < 2 {
            return Err(AvdtpError::MalformedPdu("SET_CONFIGURATION too short"));
        }
        let acp_seid = body[0] >> 2;
        let int_seid = body[1] >> 2;
        let capabilities = &body[2..];

        let session = self.sessions.get_mut(&connection).unwrap();
        let endpoint = session
            .local_endpoint_mut(acp_seid)
            .ok_or(AvdtpError::UnknownSeid(acp_seid))?;
        if endpoint.in_use {
            return Err(AvdtpError::PeerRejected(error_code::SEP_IN_USE));
        }

        let mut sbc_info: Option<[u8; 4]> = None;
        for cap in iter_service_capabilities(capabilities) {
            let (category, payload) = cap?;
            if category == SERVICE_CATEGORY_MEDIA_CODEC {
                let (_media_type, codec_type, info) = decode_media_codec_capability(payload)?;
                if codec_type == CodecType::Sbc.to_u8() && info.len() == 4 {
                    sbc_info = Some([info[0], info[1], info[2], info[3]]);
                }
            }
        }

        endpoint
            .transition("set_configuration", StreamState::Configured)
            .map_err(|_| AvdtpError::PeerRejected(error_code::BAD_STATE))?;
        endpoint.in_use = true;
        endpoint.raw_configuration = Some(capabilities.to_vec());

        session.active_local_seid = Some(acp_seid);
        session.active_remote_seid = Some(int_seid);
        session.negotiated_sbc = sbc_info.map(decode_sbc_config);

        Ok(Vec::new())
    }

    fn respond_open(&mut self, connection: ConnectionHandle, body: &[u8]) -> Result<Vec<u8>, AvdtpError> {
        let seid = body.first().ok_or(AvdtpError::MalformedPdu("missing SEID"))? >> 2;
        let session = self.sessions.get_mut(&connection).unwrap();
        let endpoint = session.local_endpoint_mut(seid).ok_or(AvdtpError::UnknownSeid(seid))?;
        endpoint
            .transition("open", StreamState::Open)
            .map_err(|_| AvdtpError::PeerRejected(error_code::BAD_STATE))?;
        Ok(Vec::new())
    }

    fn respond_start(&mut self, connection: ConnectionHandle, body: &[u8]) -> Result<Vec<u8>, AvdtpError> {
        let seid = body.first().ok_or(AvdtpError::MalformedPdu("missing SEID"))? >> 2;
        let session = self.sessions.get_mut(&connection).unwrap();
        let endpoint = session.local_endpoint_mut(seid).ok_or(AvdtpError::UnknownSeid(seid))?;
        endpoint
            .transition("start", StreamState::Streaming)
            .map_err(|_| AvdtpError::PeerRejected(error_code::BAD_STATE))?;
        Ok(Vec::new())
    }

    fn respond_suspend(&mut self, connection: ConnectionHandle, body: &[u8]) -> Result<Vec<u8>, AvdtpError> {
        let seid = body.first().ok_or(AvdtpError::MalformedPdu("missing SEID"))? >> 2;
        let session = self.sessions.get_mut(&connection).unwrap();
        let endpoint = session.local_endpoint_mut(seid).ok_or(AvdtpError::UnknownSeid(seid))?;
        endpoint
            .transition("suspend", StreamState::Open)
            .map_err(|_| AvdtpError::PeerRejected(error_code::BAD_STATE))?;
        Ok(Vec::new())
    }

    fn respond_close(&mut self, connection: ConnectionHandle, body: &[u8]) -> Result<Vec<u8>, AvdtpError> {
        let seid = body.first().ok_or(AvdtpError::MalformedPdu("missing SEID"))? >> 2;
        let session = self.sessions.get_mut(&connection).unwrap();
        let endpoint = session.local_endpoint_mut(seid).ok_or(AvdtpError::UnknownSeid(seid))?;
        endpoint
            .transition("close", StreamState::Closing)
            .map_err(|_| AvdtpError::PeerRejected(error_code::BAD_STATE))?;
        endpoint.state = StreamState::Idle;
        endpoint.in_use = false;
        endpoint.raw_configuration = None;
        Ok(Vec::new())
    }

    fn respond_abort(&mut self, connection: ConnectionHandle, body: &[u8]) -> Result<Vec<u8>, AvdtpError> {
        let seid = body.first().ok_or(AvdtpError::MalformedPdu("missing SEID"))? >> 2;
        let session = self.sessions.get_mut(&connection).unwrap();
        if let Some(endpoint) = session.local_endpoint_mut(seid) {
            endpoint.state = StreamState::Idle;
            endpoint.in_use = false;
            endpoint.raw_configuration = None;
        }
        Ok(Vec::new())
    }

    /// Encodes one frame's worth of PCM with the session's negotiated
    /// SBC configuration and wraps it as an RTP media packet ready to
    /// send on the media channel.
    pub fn encode_media_frame(
        &mut self,
        connection: ConnectionHandle,
        encoder: &mut SbcEncoder,
        pcm: &[i16],
    ) -> Result<Vec<u8>, AvdtpError> {
        let session = self
            .sessions
            .get_mut(&connection)
            .ok_or(AvdtpError::UnknownSeid(0))?;
        if session.active_state() != StreamState::Streaming {
            return Err(AvdtpError::InvalidState {
                operation: "encode_media_frame",
                state: session.active_state(),
            });
        }

        let frame = encoder
            .encode_frame(pcm)
            .map_err(|_| AvdtpError::MalformedPdu("PCM input too short for one SBC frame"))?;
        let samples_per_frame = encoder.samples_per_frame() as u32;
        let (sequence_number, timestamp) = session.next_rtp_counters(samples_per_frame);

        let rtp = RtpHeader {
            marker: false,
            payload_type: self.config.rtp_payload_type,
            sequence_number,
            timestamp,
            ssrc: connection as u32,
        };
        Ok(pack_media_payload(&rtp, std::slice::from_ref(&frame)))
    }
}

fn sbc_capability_info(config: &SbcConfig) -> [u8; 4] {
    let freq_bit = match config.sampling_frequency {
        crate::sbc::SamplingFrequency::Freq16000 => SbcCapabilities::SAMPLING_FREQ_16000,
        crate::sbc::SamplingFrequency::Freq32000 => SbcCapabilities::SAMPLING_FREQ_32000,
        crate::sbc::SamplingFrequency::Freq44100 => SbcCapabilities::SAMPLING_FREQ_44100,
        crate::sbc::SamplingFrequency::Freq48000 => SbcCapabilities::SAMPLING_FREQ_48000,
    };
    let mode_bit = match config.channel_mode {
        crate::sbc::ChannelMode::Mono => SbcCapabilities::CHANNEL_MODE_MONO,
        crate::sbc::ChannelMode::DualChannel => SbcCapabilities::CHANNEL_MODE_DUAL,
        crate::sbc::ChannelMode::Stereo => SbcCapabilities::CHANNEL_MODE_STEREO,
        crate::sbc::ChannelMode::JointStereo => SbcCapabilities::CHANNEL_MODE_JOINT_STEREO,
    };
    let block_bit = match config.block_count {
        crate::sbc::BlockCount::Blocks4 => SbcCapabilities::BLOCKS_4,
        crate::sbc::BlockCount::Blocks8 => SbcCapabilities::BLOCKS_8,
        crate::sbc::BlockCount::Blocks12 => SbcCapabilities::BLOCKS_12,
        crate::sbc::BlockCount::Blocks16 => SbcCapabilities::BLOCKS_16,
    };
    let subbands_bit = match config.subbands {
        crate::sbc::SubBands::Sub4 => SbcCapabilities::SUBBANDS_4,
        crate::sbc::SubBands::Sub8 => SbcCapabilities::SUBBANDS_8,
    };
    let alloc_bit = match config.allocation_method {
        crate::sbc::AllocationMethod::Snr => SbcCapabilities::ALLOCATION_SNR,
        crate::sbc::AllocationMethod::Loudness => SbcCapabilities::ALLOCATION_LOUDNESS,
    };

    [
        (freq_bit << 4) | mode_bit,
        (block_bit << 4) | (subbands_bit << 2) | alloc_bit,
        config.bitpool,
        config.bitpool,
    ]
}

fn decode_sbc_config(info: [u8; 4]) -> SbcConfig {
    use crate::sbc::{AllocationMethod, BlockCount, ChannelMode, SamplingFrequency, SubBands};

    let sampling_frequency = match info[0] >> 4 {
        b if b & SbcCapabilities::SAMPLING_FREQ_16000 != 0 => SamplingFrequency::Freq16000,
        b if b & SbcCapabilities::SAMPLING_FREQ_32000 != 0 => SamplingFrequency::Freq32000,
        b if b & SbcCapabilities::SAMPLING_FREQ_48000 != 0 => SamplingFrequency::Freq48000,
        _ => SamplingFrequency::Freq44100,
    };
    let channel_mode = match info[0] & 0x0F {
        b if b & SbcCapabilities::CHANNEL_MODE_MONO != 0 => ChannelMode::Mono,
        b if b & SbcCapabilities::CHANNEL_MODE_DUAL != 0 => ChannelMode::DualChannel,
        b if b & SbcCapabilities::CHANNEL_MODE_STEREO != 0 => ChannelMode::Stereo,
        _ => ChannelMode::JointStereo,
    };
    let block_count = match info[1] >> 4 {
        b if b & SbcCapabilities::BLOCKS_4 != 0 => BlockCount::Blocks4,
        b if b & SbcCapabilities::BLOCKS_8 != 0 => BlockCount::Blocks8,
        b if b & SbcCapabilities::BLOCKS_12 != 0 => BlockCount::Blocks12,
        _ => BlockCount::Blocks16,
    };
    let subbands = if (info[1] >> 2) & SbcCapabilities::SUBBANDS_4 != 0 {
        SubBands::Sub4
    } else {
        SubBands::Sub8
    };
    let allocation_method = if info[1] & SbcCapabilities::ALLOCATION_SNR != 0 {
        AllocationMethod::Snr
    } else {
        AllocationMethod::Loudness
    };

    SbcConfig {
        sampling_frequency,
        channel_mode,
        block_count,
        subbands,
        allocation_method,
        bitpool: info[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avdtp::types::MediaType;

    fn source_endpoint(seid: Seid) -> StreamEndpoint {
        StreamEndpoint::new(
            seid,
            MediaType::Audio,
            TsepRole::Source,
            CodecType::Sbc,
            sbc_capability_info(&SbcConfig::default()).to_vec(),
        )
    }

    #[test]
    fn discover_lists_registered_endpoints() {
        let mut engine = AvdtpEngine::new(AvdtpEngineConfig::default(), vec![source_endpoint(1)]);
        let command = AvdtpHeader::command(0, SignalIdentifier::Discover).encode();
        let response = engine.handle_command(1, &command).unwrap();
        let (header, body) = AvdtpHeader::decode(&response).unwrap();
        assert_eq!(header.signal_identifier, SignalIdentifier::Discover);
        let (seid, in_use, _media_type, is_source) =
            decode_discover_entry(&body[0..2].try_into().unwrap());
        assert_eq!(seid, 1);
        assert!(!in_use);
        assert!(is_source);
    }

    #[test]
    fn set_configuration_walks_idle_to_configured() {
        let mut engine = AvdtpEngine::new(AvdtpEngineConfig::default(), vec![source_endpoint(1)]);
        // Looping a command this engine builds back into its own
        // handle_command(): the ACP seid (our local endpoint, 1) goes in
        // as `remote_seid` here since `build_set_configuration_command`
        // always addresses the ACP field from the sender's point of view.
        let command = engine.build_set_configuration_command(2, 1, &SbcConfig::default());
        let response = engine.handle_command(1, &command).unwrap();
        let (header, _) = AvdtpHeader::decode(&response).unwrap();
        assert_eq!(header.signal_identifier, SignalIdentifier::SetConfiguration);

        let session = engine.session(1).unwrap();
        let endpoint = session.local_endpoint(1).unwrap();
        assert_eq!(endpoint.state, StreamState::Configured);
        assert!(session.negotiated_sbc.is_some());
    }

    #[test]
    fn set_configuration_on_in_use_endpoint_is_rejected() {
        let mut engine = AvdtpEngine::new(AvdtpEngineConfig::default(), vec![source_endpoint(1)]);
        let command = engine.build_set_configuration_command(2, 1, &SbcConfig::default());
        let command2 = command.clone();
        engine.handle_command(1, &command).unwrap();

        let response = engine.handle_command(1, &command2).unwrap();
        let (header, body) = AvdtpHeader::decode(&response).unwrap();
        assert_eq!(header.message_type, super::super::types::MessageType::ResponseReject);
        assert_eq!(body[1], error_code::SEP_IN_USE);
    }

    #[test]
    fn full_lifecycle_configure_open_start_suspend_close() {
        let mut engine = AvdtpEngine::new(AvdtpEngineConfig::default(), vec![source_endpoint(1)]);

        let configure = engine.build_set_configuration_command(2, 1, &SbcConfig::default());
        engine.handle_command(1, &configure).unwrap();

        let open = engine.build_open_command(1);
        engine.handle_command(1, &open).unwrap();
        assert_eq!(engine.session(1).unwrap().local_endpoint(1).unwrap().state, StreamState::Open);

        let start = engine.build_start_command(1);
        engine.handle_command(1, &start).unwrap();
        assert_eq!(engine.session(1).unwrap().local_endpoint(1).unwrap().state, StreamState::Streaming);

        let suspend = engine.build_suspend_command(1);
        engine.handle_command(1, &suspend).unwrap();
        assert_eq!(engine.session(1).unwrap().local_endpoint(1).unwrap().state, StreamState::Open);

        let close = engine.build_close_command(1);
        engine.handle_command(1, &close).unwrap();
        assert_eq!(engine.session(1).unwrap().local_endpoint(1).unwrap().state, StreamState::Idle);
    }

    #[test]
    fn encode_media_frame_requires_streaming_state() {
        let mut engine = AvdtpEngine::new(AvdtpEngineConfig::default(), vec![source_endpoint(1)]);
        engine.open_session(1);
        let mut encoder = SbcEncoder::new(SbcConfig::default()).unwrap();
        let pcm = vec![0i16; encoder.samples_per_frame() * 2];
        let result = engine.encode_media_frame(1, &mut encoder, &pcm);
        assert!(result.is_err());
    }
}
