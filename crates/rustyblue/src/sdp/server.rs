use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::sdp::protocol::{decode_data_element, encode_data_element, encode_error_response, SdpPacket};
use crate::sdp::types::{error_code, AttributeId, DataElement, ServiceRecord, SdpPdu, Uuid, FIRST_SERVICE_HANDLE};

/// An SDP server: a handle-keyed service record database, protected for
/// concurrent access, plus PDU dispatch for the three SDP request types.
pub struct SdpServer {
    service_records: RwLock<HashMap<u32, ServiceRecord>>,
    next_handle: AtomicU32,
}

impl SdpServer {
    pub fn new() -> Self {
        Self {
            service_records: RwLock::new(HashMap::new()),
            next_handle: AtomicU32::new(FIRST_SERVICE_HANDLE),
        }
    }

    /// Assigns the next monotonic handle and stores `service` under it,
    /// stamping the `ServiceRecordHandle` (0x0000) attribute to match.
    pub fn register_service(&self, mut service: ServiceRecord) -> u32 {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        service.handle = handle;
        service
            .attributes
            .insert(AttributeId::ServiceRecordHandle as u16, DataElement::Unsigned32(handle));
        self.service_records.write().unwrap().insert(handle, service);
        handle
    }

    pub fn unregister_service(&self, handle: u32) -> bool {
        self.service_records.write().unwrap().remove(&handle).is_some()
    }

    /// Dispatches an inbound request PDU, always returning a well-formed
    /// response PDU — protocol errors become an `ErrorResponse`, never a
    /// Rust-level failure, since the wire protocol has no other way to
    /// carry a processing error back to the peer.
    pub fn handle_request(&self, request: &SdpPacket) -> SdpPacket {
        let result = match request.pdu_id {
            SdpPdu::ServiceSearchRequest => self.handle_service_search(request),
            SdpPdu::ServiceAttributeRequest => self.handle_service_attribute(request),
            SdpPdu::ServiceSearchAttributeRequest => self.handle_service_search_attribute(request),
            _ => Err(error_code::INVALID_REQUEST_SYNTAX),
        };

        match result {
            Ok(packet) => packet,
            Err(code) => {
                SdpPacket::deserialize(&encode_error_response(request.transaction_id, code)).unwrap()
            }
        }
    }

    fn handle_service_search(&self, request: &SdpPacket) -> Result<SdpPacket, u16> {
        let mut offset = 0;
        let pattern_element =
            decode_data_element(&request.parameters, &mut offset).map_err(|_| error_code::INVALID_REQUEST_SYNTAX)?;
        let pattern = sequence_of_uuids(&pattern_element).ok_or(error_code::INVALID_REQUEST_SYNTAX)?;

        if request.parameters.len() < offset + 2 {
            return Err(error_code::INVALID_PDU_SIZE);
        }
        let max_records = u16::from_be_bytes([request.parameters[offset], request.parameters[offset + 1]]);

        let handles = self.find_matching_services(&pattern);
        let handles: Vec<u32> = handles.into_iter().take(max_records as usize).collect();

        let mut parameters = Vec::new();
        parameters.extend_from_slice(&(handles.len() as u16).to_be_bytes());
        parameters.extend_from_slice(&(handles.len() as u16).to_be_bytes());
        for handle in &handles {
            parameters.extend_from_slice(&handle.to_be_bytes());
        }
        parameters.push(0); // no continuation: every match fits in one response

        Ok(SdpPacket::new(SdpPdu::ServiceSearchResponse, request.transaction_id, parameters))
    }

    fn handle_service_attribute(&self, request: &SdpPacket) -> Result<SdpPacket, u16> {
        if request.parameters.len() < 4 {
            return Err(error_code::INVALID_PDU_SIZE);
        }
        let handle = u32::from_be_bytes([
            request.parameters[0],
            request.parameters[1],
            request.parameters[2],
            request.parameters[3],
        ]);

        let records = self.service_records.read().unwrap();
        let record = records.get(&handle).ok_or(error_code::INVALID_SERVICE_RECORD_HANDLE)?;

        let mut offset = 6;
        let range_element =
            decode_data_element(&request.parameters, &mut offset).map_err(|_| error_code::INVALID_REQUEST_SYNTAX)?;
        let ranges = attribute_id_ranges(&range_element).ok_or(error_code::INVALID_REQUEST_SYNTAX)?;

        let attribute_list = attribute_list_for(record, &ranges);
        let mut body = Vec::new();
        encode_data_element(&attribute_list, &mut body);

        let mut parameters = Vec::new();
        parameters.extend_from_slice(&(body.len() as u16).to_be_bytes());
        parameters.extend_from_slice(&body);
        parameters.push(0);

        Ok(SdpPacket::new(SdpPdu::ServiceAttributeResponse, request.transaction_id, parameters))
    }

    fn handle_service_search_attribute(&self, request: &SdpPacket) -> Result<SdpPacket, u16> {
        let mut offset = 0;
        let pattern_element =
            decode_data_element(&request.parameters, &mut offset).map_err(|_| error_code::INVALID_REQUEST_SYNTAX)?;
        let pattern = sequence_of_uuids(&pattern_element).ok_or(error_code::INVALID_REQUEST_SYNTAX)?;

        if request.parameters.len() < offset + 2 {
            return Err(error_code::INVALID_PDU_SIZE);
        }
        offset += 2; // max attribute byte count: this server never fragments, so it's unused

        let range_element =
            decode_data_element(&request.parameters, &mut offset).map_err(|_| error_code::INVALID_REQUEST_SYNTAX)?;
        let ranges = attribute_id_ranges(&range_element).ok_or(error_code::INVALID_REQUEST_SYNTAX)?;

        let matching_handles = self.find_matching_services(&pattern);
        let records = self.service_records.read().unwrap();
        let lists: Vec<DataElement> = matching_handles
            .iter()
            .filter_map(|handle| records.get(handle))
            .map(|record| attribute_list_for(record, &ranges))
            .collect();

        let mut body = Vec::new();
        for list in &lists {
            encode_data_element(list, &mut body);
        }

        let mut parameters = Vec::new();
        parameters.extend_from_slice(&(body.len() as u16).to_be_bytes());
        parameters.extend_from_slice(&body);
        parameters.push(0); // this server always returns the full result in one response

        Ok(SdpPacket::new(SdpPdu::ServiceSearchAttributeResponse, request.transaction_id, parameters))
    }

    fn find_matching_services(&self, pattern: &[Uuid]) -> Vec<u32> {
        let records = self.service_records.read().unwrap();
        let mut handles: Vec<u32> = records
            .iter()
            .filter(|(_, record)| record.matches_pattern(pattern))
            .map(|(handle, _)| *handle)
            .collect();
        handles.sort_unstable();
        handles
    }
}

impl Default for SdpServer {
    fn default() -> Self {
        Self::new()
    }
}

fn sequence_of_uuids(element: &DataElement) -> Option<Vec<Uuid>> {
    match element {
        DataElement::Sequence(items) => items
            .iter()
            .map(|item| match item {
                DataElement::Uuid(uuid) => Some(uuid.clone()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn attribute_id_ranges(element: &DataElement) -> Option<Vec<(u16, u16)>> {
    let DataElement::Sequence(items) = element else { return None };
    items
        .iter()
        .map(|item| match item {
            DataElement::Unsigned16(id) => Some((*id, *id)),
            DataElement::Unsigned32(range) => Some(((*range >> 16) as u16, (*range & 0xFFFF) as u16)),
            _ => None,
        })
        .collect()
}

/// Builds the (attribute id, value) sequence a record's attributes
/// reduce to for the given id ranges, in ascending attribute id order.
fn attribute_list_for(record: &ServiceRecord, ranges: &[(u16, u16)]) -> DataElement {
    let mut ids: Vec<u16> = record
        .attributes
        .keys()
        .copied()
        .filter(|id| ranges.iter().any(|&(start, end)| *id >= start && *id <= end))
        .collect();
    ids.sort_unstable();

    let mut pairs = Vec::with_capacity(ids.len() * 2);
    for id in ids {
        pairs.push(DataElement::Unsigned16(id));
        pairs.push(record.attributes[&id].clone());
    }
    DataElement::Sequence(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::protocol::{
        decode_attribute_lists, decode_error_response, encode_service_search_attribute_request,
        encode_service_search_request,
    };

    fn sample_record() -> ServiceRecord {
        ServiceRecord::new(0).with_attribute(
            AttributeId::ServiceClassIdList as u16,
            DataElement::Sequence(vec![DataElement::Uuid(Uuid::Uuid16(0x110A))]),
        )
    }

    #[test]
    fn register_service_assigns_monotonic_handles_from_first_service_handle() {
        let server = SdpServer::new();
        let first = server.register_service(sample_record());
        let second = server.register_service(sample_record());
        assert_eq!(first, FIRST_SERVICE_HANDLE);
        assert_eq!(second, FIRST_SERVICE_HANDLE + 1);
    }

    #[test]
    fn service_search_finds_registered_record() {
        let server = SdpServer::new();
        server.register_service(sample_record());

        let request_bytes = encode_service_search_request(1, &[Uuid::Uuid16(0x110A)], 10, &[]);
        let request = SdpPacket::deserialize(&request_bytes).unwrap();
        let response = server.handle_request(&request);

        assert_eq!(response.pdu_id, SdpPdu::ServiceSearchResponse);
        let record_count = u16::from_be_bytes([response.parameters[2], response.parameters[3]]);
        assert_eq!(record_count, 1);
    }

    #[test]
    fn service_search_attribute_returns_requested_attributes() {
        let server = SdpServer::new();
        let handle = server.register_service(sample_record());

        let request_bytes = encode_service_search_attribute_request(
            2,
            &[Uuid::Uuid16(0x110A)],
            0xFFFF,
            &[(0x0000, 0xFFFF)],
            &[],
        );
        let request = SdpPacket::deserialize(&request_bytes).unwrap();
        let response = server.handle_request(&request);

        assert_eq!(response.pdu_id, SdpPdu::ServiceSearchAttributeResponse);
        let attribute_list_bytes = u16::from_be_bytes([response.parameters[0], response.parameters[1]]) as usize;
        let lists = decode_attribute_lists(&response.parameters[2..2 + attribute_list_bytes]).unwrap();
        assert_eq!(lists.len(), 1);
        let DataElement::Sequence(pairs) = &lists[0] else { panic!("expected sequence") };
        assert!(pairs.contains(&DataElement::Unsigned32(handle)));
    }

    #[test]
    fn unknown_pdu_type_yields_invalid_request_syntax_error() {
        let server = SdpServer::new();
        let request = SdpPacket::new(SdpPdu::ErrorResponse, 3, vec![]);
        let response = server.handle_request(&request);
        assert_eq!(response.pdu_id, SdpPdu::ErrorResponse);
        assert_eq!(decode_error_response(&response).unwrap(), error_code::INVALID_REQUEST_SYNTAX);
    }

    #[test]
    fn service_attribute_request_for_unknown_handle_yields_invalid_handle_error() {
        let server = SdpServer::new();
        let mut parameters = vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 0];
        let mut ranges = Vec::new();
        encode_data_element(
            &DataElement::Sequence(vec![DataElement::Unsigned32(0x0000_FFFF)]),
            &mut ranges,
        );
        parameters.extend_from_slice(&ranges);
        parameters.push(0);

        let request = SdpPacket::new(SdpPdu::ServiceAttributeRequest, 4, parameters);
        let response = server.handle_request(&request);
        assert_eq!(response.pdu_id, SdpPdu::ErrorResponse);
        assert_eq!(decode_error_response(&response).unwrap(), error_code::INVALID_SERVICE_RECORD_HANDLE);
    }

    #[test]
    fn unregister_service_removes_it_from_future_searches() {
        let server = SdpServer::new();
        let handle = server.register_service(sample_record());
        assert!(server.unregister_service(handle));

        let request_bytes = encode_service_search_request(5, &[Uuid::Uuid16(0x110A)], 10, &[]);
        let request = SdpPacket::deserialize(&request_bytes).unwrap();
        let response = server.handle_request(&request);
        let record_count = u16::from_be_bytes([response.parameters[2], response.parameters[3]]);
        assert_eq!(record_count, 0);
    }
}
