use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::sdp::protocol::{
    decode_attribute_lists, decode_continuation_state, decode_data_element, decode_error_response,
    encode_service_search_attribute_request, encode_service_search_request, SdpPacket,
};
use crate::sdp::types::{DataElement, ServiceRecord, SdpPdu, Uuid};

/// Default time a decoded attribute list stays cached under its
/// `(peer, search pattern)` key before a fresh query is required.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Abstracts the channel an `SdpClient` sends requests over and reads
/// responses from. Production code backs this with an L2CAP channel
/// connected to PSM 0x0001; tests back it with an in-memory fake.
pub trait SdpTransport {
    fn send(&mut self, peer: &str, bytes: &[u8]) -> Result<(), Error>;
    fn receive(&mut self, peer: &str) -> Result<Vec<u8>, Error>;
}

struct CacheEntry {
    records: Vec<ServiceRecord>,
    expires_at: Instant,
}

/// An SDP client: query dispatch with continuation-state accumulation,
/// a per-peer serialized query queue, and a bounded-TTL result cache.
pub struct SdpClient<T: SdpTransport> {
    transport: T,
    transaction_id: u16,
    cache: HashMap<(String, Vec<Uuid>), CacheEntry>,
    cache_ttl: Duration,
    pending_by_peer: HashMap<String, VecDeque<()>>,
}

impl<T: SdpTransport> SdpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            transaction_id: 0,
            cache: HashMap::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
            pending_by_peer: HashMap::new(),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn next_transaction_id(&mut self) -> u16 {
        let id = self.transaction_id;
        self.transaction_id = self.transaction_id.wrapping_add(1);
        id
    }

    /// Serializes queries to the same peer: enters the peer's queue,
    /// runs `body`, then leaves the queue so the next queued query goes.
    fn serialized<R>(&mut self, peer: &str, body: impl FnOnce(&mut Self) -> Result<R, Error>) -> Result<R, Error> {
        self.pending_by_peer.entry(peer.to_string()).or_default().push_back(());
        let result = body(self);
        if let Some(queue) = self.pending_by_peer.get_mut(peer) {
            queue.pop_front();
            if queue.is_empty() {
                self.pending_by_peer.remove(peer);
            }
        }
        result
    }

    /// `ServiceSearchAttribute` query (PDU 0x06): searches for records
    /// matching `pattern`, fetching every attribute in `attribute_ranges`,
    /// accumulating continuation chunks until the server sends a
    /// zero-length continuation state.
    pub fn search_and_get_attributes(
        &mut self,
        peer: &str,
        pattern: &[Uuid],
        attribute_ranges: &[(u16, u16)],
    ) -> Result<Vec<ServiceRecord>, Error> {
        let cache_key = (peer.to_string(), pattern.to_vec());
        if let Some(entry) = self.cache.get(&cache_key) {
            if entry.expires_at > Instant::now() {
                return Ok(entry.records.clone());
            }
        }

        let peer = peer.to_string();
        let records = self.serialized(&peer, |client| {
            client.run_search_and_get_attributes(&peer, pattern, attribute_ranges)
        })?;

        self.cache.insert(
            cache_key,
            CacheEntry {
                records: records.clone(),
                expires_at: Instant::now() + self.cache_ttl,
            },
        );
        Ok(records)
    }

    fn run_search_and_get_attributes(
        &mut self,
        peer: &str,
        pattern: &[Uuid],
        attribute_ranges: &[(u16, u16)],
    ) -> Result<Vec<ServiceRecord>, Error> {
        let mut accumulator = Vec::new();
        let mut continuation_state: Vec<u8> = Vec::new();

        loop {
            let transaction_id = self.next_transaction_id();
            let request = encode_service_search_attribute_request(
                transaction_id,
                pattern,
                0xFFFF,
                attribute_ranges,
                &continuation_state,
            );
            self.transport.send(peer, &request)?;
            let response_bytes = self.transport.receive(peer)?;
            let response = SdpPacket::deserialize(&response_bytes)?;

            if response.pdu_id == SdpPdu::ErrorResponse {
                let code = decode_error_response(&response)?;
                return Err(Error::ServiceDiscoveryFailed(format!("SDP server returned error 0x{code:04x}")));
            }
            if response.pdu_id != SdpPdu::ServiceSearchAttributeResponse {
                return Err(Error::InvalidPacket("unexpected SDP response PDU".into()));
            }
            if response.parameters.len() < 2 {
                return Err(Error::InvalidPacket("service search attribute response too short".into()));
            }

            let attribute_list_bytes = u16::from_be_bytes([response.parameters[0], response.parameters[1]]) as usize;
            let chunk_start = 2;
            let chunk_end = chunk_start + attribute_list_bytes;
            if response.parameters.len() < chunk_end {
                return Err(Error::InvalidPacket("attribute list chunk truncated".into()));
            }
            accumulator.extend_from_slice(&response.parameters[chunk_start..chunk_end]);

            let (state, _) = decode_continuation_state(&response.parameters, chunk_end)?;
            if state.is_empty() {
                break;
            }
            continuation_state = state.to_vec();
        }

        let lists = decode_attribute_lists(&accumulator)?;
        lists.into_iter().map(attribute_list_to_record).collect()
    }

    /// `ServiceSearch` query (PDU 0x02): returns matching service handles only.
    pub fn discover_services(&mut self, peer: &str, pattern: &[Uuid]) -> Result<Vec<u32>, Error> {
        let peer = peer.to_string();
        self.serialized(&peer, |client| {
            let transaction_id = client.next_transaction_id();
            let request = encode_service_search_request(transaction_id, pattern, 0xFFFF, &[]);
            client.transport.send(&peer, &request)?;
            let response_bytes = client.transport.receive(&peer)?;
            let response = SdpPacket::deserialize(&response_bytes)?;
            if response.pdu_id == SdpPdu::ErrorResponse {
                let code = decode_error_response(&response)?;
                return Err(Error::ServiceDiscoveryFailed(format!("SDP server returned error 0x{code:04x}")));
            }
            parse_service_search_response(&response)
        })
    }
}

fn attribute_list_to_record(list: DataElement) -> Result<ServiceRecord, Error> {
    let DataElement::Sequence(pairs) = list else {
        return Err(Error::InvalidPacket("attribute list is not a sequence".into()));
    };
    if pairs.len() % 2 != 0 {
        return Err(Error::InvalidPacket("attribute list has an odd number of elements".into()));
    }

    let mut attributes = HashMap::new();
    let mut handle = 0;
    for pair in pairs.chunks_exact(2) {
        let id = match &pair[0] {
            DataElement::Unsigned16(id) => *id,
            _ => return Err(Error::InvalidPacket("attribute id is not a 16-bit integer".into())),
        };
        if id == 0x0000 {
            if let DataElement::Unsigned32(h) = &pair[1] {
                handle = *h;
            }
        }
        attributes.insert(id, pair[1].clone());
    }

    Ok(ServiceRecord { handle, attributes })
}

fn parse_service_search_response(response: &SdpPacket) -> Result<Vec<u32>, Error> {
    if response.parameters.len() < 4 {
        return Err(Error::InvalidPacket("Service search response too short".into()));
    }

    let record_count = u16::from_be_bytes([response.parameters[2], response.parameters[3]]);
    let mut handles = Vec::with_capacity(record_count as usize);
    let mut offset = 4;

    for _ in 0..record_count {
        if offset + 4 > response.parameters.len() {
            return Err(Error::InvalidPacket("Service search response truncated".into()));
        }
        handles.push(u32::from_be_bytes([
            response.parameters[offset],
            response.parameters[offset + 1],
            response.parameters[offset + 2],
            response.parameters[offset + 3],
        ]));
        offset += 4;
    }

    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque as Queue;
    use std::rc::Rc;

    use crate::sdp::server::SdpServer;
    use crate::sdp::types::AttributeId;

    /// Drives requests straight into an in-process `SdpServer`, queuing
    /// the server's responses for `receive` to hand back.
    struct LoopbackTransport {
        server: Rc<RefCell<SdpServer>>,
        inbox: Queue<Vec<u8>>,
    }

    impl SdpTransport for LoopbackTransport {
        fn send(&mut self, _peer: &str, bytes: &[u8]) -> Result<(), Error> {
            let request = SdpPacket::deserialize(bytes)?;
            let response = self.server.borrow().handle_request(&request);
            self.inbox.push_back(response.serialize());
            Ok(())
        }

        fn receive(&mut self, _peer: &str) -> Result<Vec<u8>, Error> {
            self.inbox.pop_front().ok_or(Error::Timeout)
        }
    }

    fn sample_record() -> ServiceRecord {
        ServiceRecord::new(0x00010001)
            .with_attribute(
                AttributeId::ServiceClassIdList as u16,
                DataElement::Sequence(vec![DataElement::Uuid(Uuid::Uuid16(0x110A))]),
            )
            .with_attribute(
                AttributeId::DocumentationUrl as u16,
                DataElement::Url("https://example.invalid".into()),
            )
    }

    #[test]
    fn search_and_get_attributes_round_trips_through_loopback_server() {
        let server = SdpServer::new();
        server.register_service(sample_record());
        let server = Rc::new(RefCell::new(server));

        let transport = LoopbackTransport { server, inbox: Queue::new() };
        let mut client = SdpClient::new(transport);

        let records = client
            .search_and_get_attributes("peer-1", &[Uuid::Uuid16(0x110A)], &[(0x0000, 0xFFFF)])
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service_class_ids(), vec![Uuid::Uuid16(0x110A)]);
    }

    #[test]
    fn second_query_for_same_pattern_is_served_from_cache() {
        let server = SdpServer::new();
        let handle = server.register_service(sample_record());
        let server = Rc::new(RefCell::new(server));

        let transport = LoopbackTransport { server: server.clone(), inbox: Queue::new() };
        let mut client = SdpClient::new(transport);

        client.search_and_get_attributes("peer-1", &[Uuid::Uuid16(0x110A)], &[(0x0000, 0xFFFF)]).unwrap();
        server.borrow_mut().unregister_service(handle);

        // The record was removed server-side, but the cached result still
        // comes back because the TTL hasn't expired.
        let records = client
            .search_and_get_attributes("peer-1", &[Uuid::Uuid16(0x110A)], &[(0x0000, 0xFFFF)])
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn empty_pattern_matches_every_record() {
        let server = SdpServer::new();
        server.register_service(sample_record());
        let server = Rc::new(RefCell::new(server));

        let transport = LoopbackTransport { server, inbox: Queue::new() };
        let mut client = SdpClient::new(transport);

        let records = client.search_and_get_attributes("peer-1", &[], &[(0x0000, 0xFFFF)]).unwrap();
        assert_eq!(records.len(), 1);
    }
}
