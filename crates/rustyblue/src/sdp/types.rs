use std::collections::HashMap;

/// SDP protocol UUIDs this stack recognizes when decoding a
/// `ProtocolDescriptorList` attribute into convenience fields.
pub mod protocol_uuid {
    pub const SDP: u16 = 0x0001;
    pub const RFCOMM: u16 = 0x0003;
    pub const OBEX: u16 = 0x0008;
    pub const L2CAP: u16 = 0x0100;
    pub const AVDTP: u16 = 0x0019;
}

/// SDP error codes (Core Spec Vol 3 Part B §4.4.1), returned in an
/// `ErrorResponse` PDU.
pub mod error_code {
    pub const INVALID_SDP_VERSION: u16 = 0x0001;
    pub const INVALID_SERVICE_RECORD_HANDLE: u16 = 0x0002;
    pub const INVALID_REQUEST_SYNTAX: u16 = 0x0003;
    pub const INVALID_PDU_SIZE: u16 = 0x0004;
    pub const INVALID_CONTINUATION_STATE: u16 = 0x0005;
    pub const INSUFFICIENT_RESOURCES: u16 = 0x0006;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub handle: u32,
    pub attributes: HashMap<u16, DataElement>,
}

impl ServiceRecord {
    pub fn new(handle: u32) -> Self {
        Self {
            handle,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, id: u16, value: DataElement) -> Self {
        self.attributes.insert(id, value);
        self
    }

    /// `ServiceClassIDList` (0x0001): the record's service class UUIDs.
    pub fn service_class_ids(&self) -> Vec<Uuid> {
        self.attributes
            .get(&(AttributeId::ServiceClassIdList as u16))
            .map(uuids_in)
            .unwrap_or_default()
    }

    /// `BrowseGroupList` (0x0005): the browse groups this record is filed under.
    pub fn browse_group_ids(&self) -> Vec<Uuid> {
        self.attributes
            .get(&(AttributeId::BrowseGroupList as u16))
            .map(uuids_in)
            .unwrap_or_default()
    }

    /// `BluetoothProfileDescriptorList` (0x0009): (profile UUID, version) pairs.
    pub fn profile_descriptors(&self) -> Vec<(Uuid, u16)> {
        let Some(DataElement::Sequence(profiles)) =
            self.attributes.get(&(AttributeId::BluetoothProfileDescriptorList as u16))
        else {
            return Vec::new();
        };
        profiles
            .iter()
            .filter_map(|profile| match profile {
                DataElement::Sequence(pair) if pair.len() == 2 => {
                    let uuid = match &pair[0] {
                        DataElement::Uuid(u) => u.clone(),
                        _ => return None,
                    };
                    let version = match &pair[1] {
                        DataElement::Unsigned16(v) => *v,
                        _ => return None,
                    };
                    Some((uuid, version))
                }
                _ => None,
            })
            .collect()
    }

    /// Every protocol UUID named anywhere in `ProtocolDescriptorList` (0x0004).
    pub fn protocol_uuids(&self) -> Vec<Uuid> {
        self.protocol_stacks()
            .into_iter()
            .flat_map(|stack| stack.into_iter().map(|(uuid, _)| uuid))
            .collect()
    }

    /// `ProtocolDescriptorList` decoded as a list of protocol stacks, each a
    /// list of (protocol UUID, parameter elements).
    fn protocol_stacks(&self) -> Vec<Vec<(Uuid, Vec<DataElement>)>> {
        let Some(list) = self.attributes.get(&(AttributeId::ProtocolDescriptorList as u16)) else {
            return Vec::new();
        };
        // A list with a single protocol stack is stored flat (a sequence of
        // protocol entries); multiple alternative stacks are stored as a
        // sequence of sequences. Normalize to the latter shape.
        let stacks: Vec<&DataElement> = match list {
            DataElement::Sequence(entries)
                if entries.iter().all(|e| matches!(e, DataElement::Sequence(_))) =>
            {
                entries.iter().collect()
            }
            DataElement::Sequence(_) => vec![list],
            _ => return Vec::new(),
        };

        stacks
            .into_iter()
            .map(|stack| match stack {
                DataElement::Sequence(entries) => entries
                    .iter()
                    .filter_map(|entry| match entry {
                        DataElement::Sequence(parts) if !parts.is_empty() => {
                            let uuid = match &parts[0] {
                                DataElement::Uuid(u) => u.clone(),
                                _ => return None,
                            };
                            Some((uuid, parts[1..].to_vec()))
                        }
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// RFCOMM server channel, if the protocol descriptor list names RFCOMM.
    pub fn rfcomm_channel(&self) -> Option<u8> {
        self.protocol_stacks().into_iter().flatten().find_map(|(uuid, params)| {
            if uuid == Uuid::Uuid16(protocol_uuid::RFCOMM) {
                match params.first() {
                    Some(DataElement::Unsigned8(channel)) => Some(*channel),
                    _ => None,
                }
            } else {
                None
            }
        })
    }

    /// L2CAP PSM, if the protocol descriptor list names L2CAP with a PSM parameter.
    pub fn l2cap_psm(&self) -> Option<u16> {
        self.protocol_stacks().into_iter().flatten().find_map(|(uuid, params)| {
            if uuid == Uuid::Uuid16(protocol_uuid::L2CAP) {
                match params.first() {
                    Some(DataElement::Unsigned16(psm)) => Some(*psm),
                    _ => None,
                }
            } else {
                None
            }
        })
    }

    /// GOEP (OBEX-over-L2CAP) PSM: the L2CAP PSM of any protocol stack that
    /// also names the OBEX protocol, used by GOEP v2 profiles that skip RFCOMM.
    pub fn goep_psm(&self) -> Option<u16> {
        self.protocol_stacks().into_iter().find_map(|stack| {
            let has_obex = stack.iter().any(|(uuid, _)| *uuid == Uuid::Uuid16(protocol_uuid::OBEX));
            if !has_obex {
                return None;
            }
            stack.iter().find_map(|(uuid, params)| {
                if *uuid == Uuid::Uuid16(protocol_uuid::L2CAP) {
                    match params.first() {
                        Some(DataElement::Unsigned16(psm)) => Some(*psm),
                        _ => None,
                    }
                } else {
                    None
                }
            })
        })
    }

    /// `true` if every UUID in `pattern` appears in this record's service
    /// class list, protocol list, or profile descriptor keys.
    pub fn matches_pattern(&self, pattern: &[Uuid]) -> bool {
        if pattern.is_empty() {
            return true;
        }
        let haystack: Vec<Uuid> = self
            .service_class_ids()
            .into_iter()
            .chain(self.protocol_uuids())
            .chain(self.profile_descriptors().into_iter().map(|(uuid, _)| uuid))
            .collect();
        pattern.iter().all(|needle| haystack.contains(needle))
    }
}

fn uuids_in(element: &DataElement) -> Vec<Uuid> {
    match element {
        DataElement::Sequence(items) => items
            .iter()
            .filter_map(|item| match item {
                DataElement::Uuid(u) => Some(u.clone()),
                _ => None,
            })
            .collect(),
        DataElement::Uuid(u) => vec![u.clone()],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uuid {
    Uuid16(u16),
    Uuid32(u32),
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Expands to the full 128-bit value under the Bluetooth base UUID.
    pub fn to_uuid128(&self) -> [u8; 16] {
        const BASE: [u8; 16] = [
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B,
            0x34, 0xFB,
        ];
        match self {
            Uuid::Uuid128(bytes) => *bytes,
            Uuid::Uuid32(value) => {
                let mut out = BASE;
                out[0..4].copy_from_slice(&value.to_be_bytes());
                out
            }
            Uuid::Uuid16(value) => {
                let mut out = BASE;
                out[2..4].copy_from_slice(&value.to_be_bytes());
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataElement {
    Nil,
    Unsigned8(u8),
    Unsigned16(u16),
    Unsigned32(u32),
    Unsigned64(u64),
    Signed8(i8),
    Signed16(i16),
    Signed32(i32),
    Signed64(i64),
    TextString(String),
    Boolean(bool),
    Uuid(Uuid),
    Sequence(Vec<DataElement>),
    Alternative(Vec<DataElement>),
    Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeId {
    ServiceRecordHandle = 0x0000,
    ServiceClassIdList = 0x0001,
    ServiceRecordState = 0x0002,
    ServiceId = 0x0003,
    ProtocolDescriptorList = 0x0004,
    BrowseGroupList = 0x0005,
    LanguageBaseAttributeIdList = 0x0006,
    ServiceInfoTimeToLive = 0x0007,
    ServiceAvailability = 0x0008,
    BluetoothProfileDescriptorList = 0x0009,
    DocumentationUrl = 0x000A,
    ClientExecutableUrl = 0x000B,
    IconUrl = 0x000C,
    AdditionalProtocolDescriptorLists = 0x000D,
}

pub const SDP_PSM: u16 = 0x0001;

/// Service record handle reserved for the SDP server's own `ServiceDiscoveryServer` record.
pub const SDP_SERVER_HANDLE: u32 = 0x00000000;

/// First handle value allocated to a newly registered service record.
pub const FIRST_SERVICE_HANDLE: u32 = 0x00010000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpPdu {
    ErrorResponse = 0x01,
    ServiceSearchRequest = 0x02,
    ServiceSearchResponse = 0x03,
    ServiceAttributeRequest = 0x04,
    ServiceAttributeResponse = 0x05,
    ServiceSearchAttributeRequest = 0x06,
    ServiceSearchAttributeResponse = 0x07,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol_list_rfcomm_over_l2cap(psm: u16, channel: u8) -> DataElement {
        DataElement::Sequence(vec![
            DataElement::Sequence(vec![
                DataElement::Uuid(Uuid::Uuid16(protocol_uuid::L2CAP)),
                DataElement::Unsigned16(psm),
            ]),
            DataElement::Sequence(vec![
                DataElement::Uuid(Uuid::Uuid16(protocol_uuid::RFCOMM)),
                DataElement::Unsigned8(channel),
            ]),
        ])
    }

    #[test]
    fn decodes_rfcomm_channel_and_l2cap_psm() {
        let record = ServiceRecord::new(FIRST_SERVICE_HANDLE).with_attribute(
            AttributeId::ProtocolDescriptorList as u16,
            protocol_list_rfcomm_over_l2cap(0x0003, 5),
        );
        assert_eq!(record.l2cap_psm(), Some(0x0003));
        assert_eq!(record.rfcomm_channel(), Some(5));
        assert_eq!(record.goep_psm(), None);
    }

    #[test]
    fn decodes_goep_psm_when_obex_present_without_rfcomm() {
        let protocol_list = DataElement::Sequence(vec![
            DataElement::Sequence(vec![
                DataElement::Uuid(Uuid::Uuid16(protocol_uuid::L2CAP)),
                DataElement::Unsigned16(0x1001),
            ]),
            DataElement::Sequence(vec![DataElement::Uuid(Uuid::Uuid16(protocol_uuid::OBEX))]),
        ]);
        let record = ServiceRecord::new(FIRST_SERVICE_HANDLE)
            .with_attribute(AttributeId::ProtocolDescriptorList as u16, protocol_list);
        assert_eq!(record.goep_psm(), Some(0x1001));
    }

    #[test]
    fn matches_pattern_requires_every_uuid_present() {
        let record = ServiceRecord::new(FIRST_SERVICE_HANDLE).with_attribute(
            AttributeId::ServiceClassIdList as u16,
            DataElement::Sequence(vec![DataElement::Uuid(Uuid::Uuid16(0x110A))]),
        );
        assert!(record.matches_pattern(&[Uuid::Uuid16(0x110A)]));
        assert!(!record.matches_pattern(&[Uuid::Uuid16(0x110A), Uuid::Uuid16(0x110B)]));
        assert!(record.matches_pattern(&[]));
    }
}
