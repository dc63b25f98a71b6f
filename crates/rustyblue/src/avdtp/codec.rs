//! AVDTP signaling PDU encode/decode: a 2-byte header (transaction
//! label + packet type + message type, signal identifier) followed by
//! signal-specific parameters. Fragmentation/reassembly of signals
//! wider than the L2CAP MTU is out of scope; every PDU here is a single
//! packet.

use super::types::{AvdtpError, MessageType, Seid, SignalIdentifier};

/// A decoded AVDTP signaling header plus its raw parameter bytes. Signal
/// bodies are parsed by the caller, which knows which signal identifier
/// it's looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvdtpHeader {
    pub transaction_label: u8,
    pub message_type: MessageType,
    pub signal_identifier: SignalIdentifier,
}

impl AvdtpHeader {
    pub fn command(transaction_label: u8, signal_identifier: SignalIdentifier) -> Self {
        Self {
            transaction_label,
            message_type: MessageType::Command,
            signal_identifier,
        }
    }

    pub fn response(transaction_label: u8, signal_identifier: SignalIdentifier, accepted: bool) -> Self {
        Self {
            transaction_label,
            message_type: if accepted {
                MessageType::ResponseAccept
            } else {
                MessageType::ResponseReject
            },
            signal_identifier,
        }
    }

    pub fn encode(&self) -> [u8; 2] {
        let byte0 = (self.transaction_label << 4) | (0b00 << 2) | self.message_type.bits();
        let byte1 = self.signal_identifier as u8 & 0x3F;
        [byte0, byte1]
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), AvdtpError> {
        if bytes.len() < 2 {
            return Err(AvdtpError::MalformedPdu("header shorter than 2 bytes"));
        }
        let transaction_label = bytes[0] >> 4;
        let message_type = MessageType::from_bits(bytes[0]);
        let signal_identifier = SignalIdentifier::from_u8(bytes[1] & 0x3F)
            .ok_or(AvdtpError::UnknownSignal(bytes[1] & 0x3F))?;
        Ok((
            Self {
                transaction_label,
                message_type,
                signal_identifier,
            },
            &bytes[2..],
        ))
    }
}

/// `AVDTP_DISCOVER` response entry: one endpoint's SEID, in-use flag,
/// media type and role.
pub fn encode_discover_entry(seid: Seid, in_use: bool, media_type_bits: u8, role_is_source: bool) -> [u8; 2] {
    let byte0 = (seid << 2) | ((in_use as u8) << 1);
    let byte1 = (media_type_bits << 4) | ((!role_is_source as u8) << 3);
    [byte0, byte1]
}

pub fn decode_discover_entry(bytes: &[u8; 2]) -> (Seid, bool, u8, bool) {
    let seid = bytes[0] >> 2;
    let in_use = (bytes[0] >> 1) & 1 == 1;
    let media_type_bits = bytes[1] >> 4;
    let role_is_source = (bytes[1] >> 3) & 1 == 0;
    (seid, in_use, media_type_bits, role_is_source)
}

/// Service category identifiers used inside `SET_CONFIGURATION` /
/// `GET_CAPABILITIES` Service Capability elements (AVDTP §8.21).
pub const SERVICE_CATEGORY_MEDIA_TRANSPORT: u8 = 0x01;
pub const SERVICE_CATEGORY_MEDIA_CODEC: u8 = 0x07;

/// Media Codec Service Capability element: category, length, media
/// type/codec type header, then codec-specific-information-elements.
pub fn encode_media_codec_capability(media_type_bits: u8, codec_type: u8, codec_info: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + codec_info.len());
    out.push(SERVICE_CATEGORY_MEDIA_CODEC);
    out.push(2 + codec_info.len() as u8);
    out.push(media_type_bits << 4);
    out.push(codec_type);
    out.extend_from_slice(codec_info);
    out
}

pub fn decode_media_codec_capability(bytes: &[u8]) -> Result<(u8, u8, &[u8]), AvdtpError> {
    if bytes.len() < 2 {
        return Err(AvdtpError::MalformedPdu("media codec capability too short"));
    }
    let media_type_bits = bytes[0] >> 4;
    let codec_type = bytes[1];
    Ok((media_type_bits, codec_type, &bytes[2..]))
}

/// Walks a `SET_CONFIGURATION`/`GET_CAPABILITIES` Service Capabilities
/// byte stream, yielding `(category, payload)` pairs.
pub fn iter_service_capabilities(bytes: &[u8]) -> impl Iterator<Item = Result<(u8, &[u8]), AvdtpError>> {
    struct Iter<'a> {
        rest: &'a [u8],
    }
    impl<'a> Iterator for Iter<'a> {
        type Item = Result<(u8, &'a [u8]), AvdtpError>;
        fn next(&mut self) -> Option<Self::Item> {
            if self.rest.is_empty() {
                return None;
            }
            if self.rest.len() < 2 {
                self.rest = &[];
                return Some(Err(AvdtpError::MalformedPdu("truncated service capability")));
            }
            let category = self.rest[0];
            let length = self.rest[1] as usize;
            if self.rest.len() < 2 + length {
                self.rest = &[];
                return Some(Err(AvdtpError::MalformedPdu("service capability length overruns buffer")));
            }
            let payload = &self.rest[2..2 + length];
            self.rest = &self.rest[2 + length..];
            Some(Ok((category, payload)))
        }
    }
    Iter { rest: bytes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = AvdtpHeader::command(3, SignalIdentifier::SetConfiguration);
        let encoded = header.encode();
        let (decoded, rest) = AvdtpHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert!(rest.is_empty());
    }

    #[test]
    fn response_reject_sets_message_type() {
        let header = AvdtpHeader::response(1, SignalIdentifier::Open, false);
        assert_eq!(header.message_type, MessageType::ResponseReject);
    }

    #[test]
    fn discover_entry_round_trips() {
        let encoded = encode_discover_entry(5, true, 0, true);
        let (seid, in_use, media_type, is_source) = decode_discover_entry(&encoded);
        assert_eq!(seid, 5);
        assert!(in_use);
        assert_eq!(media_type, 0);
        assert!(is_source);
    }

    #[test]
    fn media_codec_capability_round_trips() {
        let codec_info = [0x3F, 0xFF, 2, 53];
        let encoded = encode_media_codec_capability(0, 0x00, &codec_info);
        let (media_type, codec_type, info) = decode_media_codec_capability(&encoded[2..]).unwrap();
        assert_eq!(media_type, 0);
        assert_eq!(codec_type, 0x00);
        assert_eq!(info, codec_info);
    }

    #[test]
    fn iterates_multiple_service_capabilities() {
        let media_transport = [SERVICE_CATEGORY_MEDIA_TRANSPORT, 0];
        let codec = encode_media_codec_capability(0, 0x00, &[0x3F, 0xFF, 2, 53]);
        let mut all = media_transport.to_vec();
        all.extend_from_slice(&codec);

        let parsed: Vec<_> = iter_service_capabilities(&all).collect::<Result<_, _>>().unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, SERVICE_CATEGORY_MEDIA_TRANSPORT);
        assert_eq!(parsed[1].0, SERVICE_CATEGORY_MEDIA_CODEC);
    }

    #[test]
    fn truncated_capability_stream_errors() {
        let bad = [SERVICE_CATEGORY_MEDIA_CODEC, 10, 0, 0];
        let result: Result<Vec<_>, _> = iter_service_capabilities(&bad).collect();
        assert!(result.is_err());
    }
}
