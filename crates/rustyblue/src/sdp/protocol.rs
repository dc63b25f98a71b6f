use crate::error::Error;
use crate::sdp::types::{error_code, DataElement, SdpPdu, Uuid};

pub struct SdpPacket {
    pub pdu_id: SdpPdu,
    pub transaction_id: u16,
    pub parameters_length: u16,
    pub parameters: Vec<u8>,
}

impl SdpPacket {
    pub fn new(pdu_id: SdpPdu, transaction_id: u16, parameters: Vec<u8>) -> Self {
        let parameters_length = parameters.len() as u16;
        Self {
            pdu_id,
            transaction_id,
            parameters_length,
            parameters,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(5 + self.parameters.len());
        buffer.push(self.pdu_id as u8);
        buffer.extend_from_slice(&self.transaction_id.to_be_bytes());
        buffer.extend_from_slice(&self.parameters_length.to_be_bytes());
        buffer.extend_from_slice(&self.parameters);
        buffer
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, Error> {
        if data.len() < 5 {
            return Err(Error::InvalidPacket("SDP packet too short".into()));
        }

        let pdu_id = match data[0] {
            0x01 => SdpPdu::ErrorResponse,
            0x02 => SdpPdu::ServiceSearchRequest,
            0x03 => SdpPdu::ServiceSearchResponse,
            0x04 => SdpPdu::ServiceAttributeRequest,
            0x05 => SdpPdu::ServiceAttributeResponse,
            0x06 => SdpPdu::ServiceSearchAttributeRequest,
            0x07 => SdpPdu::ServiceSearchAttributeResponse,
            _ => return Err(Error::InvalidPacket("Unknown SDP PDU ID".into())),
        };

        let transaction_id = u16::from_be_bytes([data[1], data[2]]);
        let parameters_length = u16::from_be_bytes([data[3], data[4]]);

        if data.len() < 5 + parameters_length as usize {
            return Err(Error::InvalidPacket("SDP packet too short for parameter length".into()));
        }

        let parameters = data[5..(5 + parameters_length as usize)].to_vec();

        Ok(Self {
            pdu_id,
            transaction_id,
            parameters_length,
            parameters,
        })
    }
}

/// Builds an `ErrorResponse` PDU (Core Spec Vol 3 Part B §4.4.1).
pub fn encode_error_response(transaction_id: u16, code: u16) -> Vec<u8> {
    let packet = SdpPacket::new(SdpPdu::ErrorResponse, transaction_id, code.to_be_bytes().to_vec());
    packet.serialize()
}

pub fn decode_error_response(response: &SdpPacket) -> Result<u16, Error> {
    if response.pdu_id != SdpPdu::ErrorResponse {
        return Err(Error::InvalidPacket("not an error response".into()));
    }
    if response.parameters.len() < 2 {
        return Err(Error::InvalidPacket("error response too short".into()));
    }
    Ok(u16::from_be_bytes([response.parameters[0], response.parameters[1]]))
}

pub fn encode_service_search_request(
    transaction_id: u16,
    uuids: &[Uuid],
    max_records: u16,
    continuation_state: &[u8],
) -> Vec<u8> {
    let mut parameters = Vec::new();
    encode_data_element(&DataElement::Sequence(uuids.iter().cloned().map(DataElement::Uuid).collect()), &mut parameters);
    parameters.extend_from_slice(&max_records.to_be_bytes());
    encode_continuation_state(continuation_state, &mut parameters);

    let packet = SdpPacket::new(SdpPdu::ServiceSearchRequest, transaction_id, parameters);
    packet.serialize()
}

pub fn encode_service_search_attribute_request(
    transaction_id: u16,
    uuids: &[Uuid],
    max_attribute_bytes: u16,
    attribute_ranges: &[(u16, u16)],
    continuation_state: &[u8],
) -> Vec<u8> {
    let mut parameters = Vec::new();
    encode_data_element(&DataElement::Sequence(uuids.iter().cloned().map(DataElement::Uuid).collect()), &mut parameters);
    parameters.extend_from_slice(&max_attribute_bytes.to_be_bytes());
    encode_data_element(&attribute_id_range_list(attribute_ranges), &mut parameters);
    encode_continuation_state(continuation_state, &mut parameters);

    let packet = SdpPacket::new(SdpPdu::ServiceSearchAttributeRequest, transaction_id, parameters);
    packet.serialize()
}

/// Encodes an attribute ID range list: a single ID becomes a 16-bit
/// unsigned element, a range becomes a 32-bit (start<<16|end) element.
fn attribute_id_range_list(ranges: &[(u16, u16)]) -> DataElement {
    DataElement::Sequence(
        ranges
            .iter()
            .map(|&(start, end)| {
                if start == end {
                    DataElement::Unsigned16(start)
                } else {
                    DataElement::Unsigned32(((start as u32) << 16) | end as u32)
                }
            })
            .collect(),
    )
}

fn encode_continuation_state(state: &[u8], buffer: &mut Vec<u8>) {
    buffer.push(state.len() as u8);
    buffer.extend_from_slice(state);
}

/// Reads a continuation state field `[len][bytes]`, returning the state
/// bytes and the offset just past it.
pub fn decode_continuation_state(data: &[u8], offset: usize) -> Result<(&[u8], usize), Error> {
    if offset >= data.len() {
        return Err(Error::InvalidPacket("missing continuation state length".into()));
    }
    let len = data[offset] as usize;
    let start = offset + 1;
    if data.len() < start + len {
        return Err(Error::InvalidPacket("continuation state truncated".into()));
    }
    Ok((&data[start..start + len], start + len))
}

fn encode_uuid(uuid: &Uuid, buffer: &mut Vec<u8>) {
    match uuid {
        Uuid::Uuid16(value) => {
            buffer.push(0x19); // Data element type 3, size index 1 (2 bytes)
            buffer.extend_from_slice(&value.to_be_bytes());
        }
        Uuid::Uuid32(value) => {
            buffer.push(0x1A); // size index 2 (4 bytes)
            buffer.extend_from_slice(&value.to_be_bytes());
        }
        Uuid::Uuid128(value) => {
            buffer.push(0x1C); // size index 4 (16 bytes)
            buffer.extend_from_slice(value);
        }
    }
}

/// Encodes a variable-length size field for type/size header byte
/// `base_type | size_index` where `size_index` selects an 8/16/32-bit
/// explicit length that follows the header byte.
fn push_header_with_length(element_type: u8, length: usize, buffer: &mut Vec<u8>) {
    if length <= 0xFF {
        buffer.push((element_type << 3) | 5);
        buffer.push(length as u8);
    } else if length <= 0xFFFF {
        buffer.push((element_type << 3) | 6);
        buffer.extend_from_slice(&(length as u16).to_be_bytes());
    } else {
        buffer.push((element_type << 3) | 7);
        buffer.extend_from_slice(&(length as u32).to_be_bytes());
    }
}

/// Encodes one data element (Core Spec Vol 3 Part B §3.2) onto `buffer`.
pub fn encode_data_element(element: &DataElement, buffer: &mut Vec<u8>) {
    match element {
        DataElement::Nil => buffer.push(0x00),
        DataElement::Unsigned8(v) => {
            buffer.push(0x08);
            buffer.push(*v);
        }
        DataElement::Unsigned16(v) => {
            buffer.push(0x09);
            buffer.extend_from_slice(&v.to_be_bytes());
        }
        DataElement::Unsigned32(v) => {
            buffer.push(0x0A);
            buffer.extend_from_slice(&v.to_be_bytes());
        }
        DataElement::Unsigned64(v) => {
            buffer.push(0x0B);
            buffer.extend_from_slice(&v.to_be_bytes());
        }
        DataElement::Signed8(v) => {
            buffer.push(0x10);
            buffer.push(*v as u8);
        }
        DataElement::Signed16(v) => {
            buffer.push(0x11);
            buffer.extend_from_slice(&v.to_be_bytes());
        }
        DataElement::Signed32(v) => {
            buffer.push(0x12);
            buffer.extend_from_slice(&v.to_be_bytes());
        }
        DataElement::Signed64(v) => {
            buffer.push(0x13);
            buffer.extend_from_slice(&v.to_be_bytes());
        }
        DataElement::Uuid(uuid) => encode_uuid(uuid, buffer),
        DataElement::TextString(s) => {
            push_header_with_length(4, s.len(), buffer);
            buffer.extend_from_slice(s.as_bytes());
        }
        DataElement::Boolean(v) => {
            buffer.push(0x28);
            buffer.push(*v as u8);
        }
        DataElement::Sequence(items) => {
            let mut body = Vec::new();
            for item in items {
                encode_data_element(item, &mut body);
            }
            push_header_with_length(6, body.len(), buffer);
            buffer.extend_from_slice(&body);
        }
        DataElement::Alternative(items) => {
            let mut body = Vec::new();
            for item in items {
                encode_data_element(item, &mut body);
            }
            push_header_with_length(7, body.len(), buffer);
            buffer.extend_from_slice(&body);
        }
        DataElement::Url(s) => {
            push_header_with_length(8, s.len(), buffer);
            buffer.extend_from_slice(s.as_bytes());
        }
    }
}

/// Reads the `[length]` bytes following a variable-length header's size
/// index, returning `(length, bytes_consumed)`.
fn read_variable_length(data: &[u8], offset: usize, size_index: u8) -> Result<(usize, usize), Error> {
    match size_index {
        5 => {
            let byte = *data.get(offset).ok_or(Error::InvalidPacket("truncated length byte".into()))?;
            Ok((byte as usize, 1))
        }
        6 => {
            if data.len() < offset + 2 {
                return Err(Error::InvalidPacket("truncated 16-bit length".into()));
            }
            Ok((u16::from_be_bytes([data[offset], data[offset + 1]]) as usize, 2))
        }
        7 => {
            if data.len() < offset + 4 {
                return Err(Error::InvalidPacket("truncated 32-bit length".into()));
            }
            Ok((
                u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]) as usize,
                4,
            ))
        }
        _ => Err(Error::InvalidPacket("invalid variable-length size index".into())),
    }
}

pub fn decode_data_element(data: &[u8], offset: &mut usize) -> Result<DataElement, Error> {
    if *offset >= data.len() {
        return Err(Error::InvalidPacket("Data element offset beyond data length".into()));
    }

    let header = data[*offset];
    *offset += 1;

    let element_type = (header >> 3) & 0x1F;
    let size_index = header & 0x07;

    macro_rules! fixed_bytes {
        ($n:expr) => {{
            if data.len() < *offset + $n {
                return Err(Error::InvalidPacket("data element truncated".into()));
            }
            let bytes = &data[*offset..*offset + $n];
            *offset += $n;
            bytes
        }};
    }

    match element_type {
        0 => Ok(DataElement::Nil),
        1 => match size_index {
            0 => Ok(DataElement::Unsigned8(fixed_bytes!(1)[0])),
            1 => Ok(DataElement::Unsigned16(u16::from_be_bytes(fixed_bytes!(2).try_into().unwrap()))),
            2 => Ok(DataElement::Unsigned32(u32::from_be_bytes(fixed_bytes!(4).try_into().unwrap()))),
            3 => Ok(DataElement::Unsigned64(u64::from_be_bytes(fixed_bytes!(8).try_into().unwrap()))),
            _ => Err(Error::InvalidPacket("invalid size index for unsigned integer".into())),
        },
        2 => match size_index {
            0 => Ok(DataElement::Signed8(fixed_bytes!(1)[0] as i8)),
            1 => Ok(DataElement::Signed16(i16::from_be_bytes(fixed_bytes!(2).try_into().unwrap()))),
            2 => Ok(DataElement::Signed32(i32::from_be_bytes(fixed_bytes!(4).try_into().unwrap()))),
            3 => Ok(DataElement::Signed64(i64::from_be_bytes(fixed_bytes!(8).try_into().unwrap()))),
            _ => Err(Error::InvalidPacket("invalid size index for signed integer".into())),
        },
        3 => match size_index {
            1 => Ok(DataElement::Uuid(Uuid::Uuid16(u16::from_be_bytes(fixed_bytes!(2).try_into().unwrap())))),
            2 => Ok(DataElement::Uuid(Uuid::Uuid32(u32::from_be_bytes(fixed_bytes!(4).try_into().unwrap())))),
            4 => {
                let bytes = fixed_bytes!(16);
                let mut array = [0u8; 16];
                array.copy_from_slice(bytes);
                Ok(DataElement::Uuid(Uuid::Uuid128(array)))
            }
            _ => Err(Error::InvalidPacket("invalid size index for UUID".into())),
        },
        4 => {
            let (length, consumed) = read_variable_length(data, *offset, size_index)?;
            *offset += consumed;
            let bytes = fixed_bytes!(length);
            Ok(DataElement::TextString(String::from_utf8_lossy(bytes).into_owned()))
        }
        5 => {
            let byte = fixed_bytes!(1)[0];
            Ok(DataElement::Boolean(byte != 0))
        }
        6 => {
            let (length, consumed) = read_variable_length(data, *offset, size_index)?;
            *offset += consumed;
            let end = *offset + length;
            if data.len() < end {
                return Err(Error::InvalidPacket("sequence element truncated".into()));
            }
            let mut items = Vec::new();
            while *offset < end {
                items.push(decode_data_element(data, offset)?);
            }
            Ok(DataElement::Sequence(items))
        }
        7 => {
            let (length, consumed) = read_variable_length(data, *offset, size_index)?;
            *offset += consumed;
            let end = *offset + length;
            if data.len() < end {
                return Err(Error::InvalidPacket("alternative element truncated".into()));
            }
            let mut items = Vec::new();
            while *offset < end {
                items.push(decode_data_element(data, offset)?);
            }
            Ok(DataElement::Alternative(items))
        }
        8 => {
            let (length, consumed) = read_variable_length(data, *offset, size_index)?;
            *offset += consumed;
            let bytes = fixed_bytes!(length);
            Ok(DataElement::Url(String::from_utf8_lossy(bytes).into_owned()))
        }
        _ => Err(Error::InvalidPacket("unknown data element type".into())),
    }
}

/// Decodes a `ServiceSearchAttributeResponse` payload (after the
/// `attribute_list_bytes` length and any continuation accumulation) into
/// a flat sequence of attribute-list `DataElement::Sequence`s, one per
/// matched record.
pub fn decode_attribute_lists(data: &[u8]) -> Result<Vec<DataElement>, Error> {
    let mut offset = 0;
    let mut lists = Vec::new();
    while offset < data.len() {
        lists.push(decode_data_element(data, &mut offset)?);
    }
    Ok(lists)
}

pub fn error_response_code_for(err: &Error) -> u16 {
    match err {
        Error::InvalidPacket(msg) if msg.contains("handle") => error_code::INVALID_SERVICE_RECORD_HANDLE,
        Error::InvalidPacket(_) => error_code::INVALID_REQUEST_SYNTAX,
        _ => error_code::INVALID_REQUEST_SYNTAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_round_trips() {
        let packet = SdpPacket::new(SdpPdu::ServiceSearchRequest, 42, vec![1, 2, 3]);
        let bytes = packet.serialize();
        let decoded = SdpPacket::deserialize(&bytes).unwrap();
        assert_eq!(decoded.transaction_id, 42);
        assert_eq!(decoded.parameters, vec![1, 2, 3]);
    }

    #[test]
    fn unsigned_integers_round_trip_every_width() {
        for element in [
            DataElement::Unsigned8(7),
            DataElement::Unsigned16(0x1234),
            DataElement::Unsigned32(0xDEAD_BEEF),
            DataElement::Unsigned64(0x0102_0304_0506_0708),
        ] {
            let mut buffer = Vec::new();
            encode_data_element(&element, &mut buffer);
            let mut offset = 0;
            assert_eq!(decode_data_element(&buffer, &mut offset).unwrap(), element);
            assert_eq!(offset, buffer.len());
        }
    }

    #[test]
    fn signed_integers_round_trip() {
        let element = DataElement::Signed32(-12345);
        let mut buffer = Vec::new();
        encode_data_element(&element, &mut buffer);
        let mut offset = 0;
        assert_eq!(decode_data_element(&buffer, &mut offset).unwrap(), element);
    }

    #[test]
    fn uuid_variants_round_trip() {
        for uuid in [
            Uuid::Uuid16(0x0100),
            Uuid::Uuid32(0x0000_1101),
            Uuid::Uuid128([0xAB; 16]),
        ] {
            let element = DataElement::Uuid(uuid.clone());
            let mut buffer = Vec::new();
            encode_data_element(&element, &mut buffer);
            let mut offset = 0;
            assert_eq!(decode_data_element(&buffer, &mut offset).unwrap(), element);
        }
    }

    #[test]
    fn text_string_and_url_round_trip() {
        let text = DataElement::TextString("Audio Source".into());
        let url = DataElement::Url("https://example.invalid/icon.png".into());
        for element in [text, url] {
            let mut buffer = Vec::new();
            encode_data_element(&element, &mut buffer);
            let mut offset = 0;
            assert_eq!(decode_data_element(&buffer, &mut offset).unwrap(), element);
        }
    }

    #[test]
    fn nested_sequence_round_trips() {
        let element = DataElement::Sequence(vec![
            DataElement::Uuid(Uuid::Uuid16(0x110A)),
            DataElement::Sequence(vec![DataElement::Unsigned16(1), DataElement::Boolean(true)]),
        ]);
        let mut buffer = Vec::new();
        encode_data_element(&element, &mut buffer);
        let mut offset = 0;
        assert_eq!(decode_data_element(&buffer, &mut offset).unwrap(), element);
    }

    #[test]
    fn large_sequence_uses_16_bit_length() {
        let items: Vec<DataElement> = (0..200).map(DataElement::Unsigned8).collect();
        let element = DataElement::Sequence(items);
        let mut buffer = Vec::new();
        encode_data_element(&element, &mut buffer);
        assert_eq!(buffer[0] & 0x07, 6); // 16-bit length form, 200 encoded bytes > 0xFF
        let mut offset = 0;
        assert_eq!(decode_data_element(&buffer, &mut offset).unwrap(), element);
    }

    #[test]
    fn continuation_state_round_trips() {
        let mut buffer = Vec::new();
        encode_continuation_state(&[0xAA, 0xBB], &mut buffer);
        let (state, next) = decode_continuation_state(&buffer, 0).unwrap();
        assert_eq!(state, &[0xAA, 0xBB]);
        assert_eq!(next, buffer.len());
    }

    #[test]
    fn empty_continuation_state_decodes_to_empty_slice() {
        let mut buffer = Vec::new();
        encode_continuation_state(&[], &mut buffer);
        let (state, _) = decode_continuation_state(&buffer, 0).unwrap();
        assert!(state.is_empty());
    }
}
