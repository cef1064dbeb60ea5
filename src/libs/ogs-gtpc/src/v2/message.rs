//! GTPv2 Messages
//!
//! Message structures and encoding/decoding for GTPv2-C protocol.
//!
//! Each known message type has a body struct with one named slot per IE it
//! expects, keyed by (IE type, instance). Parsing buckets every IE into the
//! first matching empty slot; everything else (unknown types, unexpected
//! instances, repeats of a single-valued slot) lands in `additional_ies` in
//! arrival order. Marshaling writes the named slots in declaration order and
//! then the additional IEs.

use bytes::{Bytes, BytesMut};

use super::header::{Gtp2Header, Gtp2MessageType, GTPV2C_FIXED_PREFIX_LEN, GTP2_VERSION};
use super::ie::{GroupedIeTable, Gtp2Ie, Gtp2IeType};
use crate::error::{GtpError, GtpResult};

/// Named-field body of one message type
pub trait MessageBody: Sized + Into<Gtp2Body> {
    const MESSAGE_TYPE: Gtp2MessageType;

    /// Bucket IEs into the named slots
    fn from_ies(ies: Vec<Gtp2Ie>) -> Self;

    /// IEs in marshal order
    fn ies(&self) -> Vec<&Gtp2Ie>;

    fn from_body(body: &Gtp2Body) -> Option<&Self>;
}

/// Slot of a named field: a single IE or a repeated one
trait IeSlot {
    /// Take `ie` if the slot still has room, otherwise hand it back
    fn offer(&mut self, ie: Gtp2Ie) -> Option<Gtp2Ie>;
    fn collect<'a>(&'a self, out: &mut Vec<&'a Gtp2Ie>);
}

impl IeSlot for Option<Gtp2Ie> {
    fn offer(&mut self, ie: Gtp2Ie) -> Option<Gtp2Ie> {
        if self.is_some() {
            return Some(ie);
        }
        *self = Some(ie);
        None
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Gtp2Ie>) {
        if let Some(ie) = self {
            out.push(ie);
        }
    }
}

impl IeSlot for Vec<Gtp2Ie> {
    fn offer(&mut self, ie: Gtp2Ie) -> Option<Gtp2Ie> {
        self.push(ie);
        None
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Gtp2Ie>) {
        out.extend(self.iter());
    }
}

/// Mandatory IE of a parsed body
pub fn required(slot: &Option<Gtp2Ie>, ie_type: Gtp2IeType) -> GtpResult<&Gtp2Ie> {
    slot.as_ref().ok_or(GtpError::RequiredFieldMissing {
        ie_type: ie_type as u8,
    })
}

macro_rules! message_bodies {
    ($(
        $(#[$meta:meta])*
        $name:ident {
            $( $field:ident : $ty:ty = ($ie:ident, $inst:literal), )*
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Default)]
            pub struct $name {
                $( pub $field: $ty, )*
                pub additional_ies: Vec<Gtp2Ie>,
            }

            impl MessageBody for $name {
                const MESSAGE_TYPE: Gtp2MessageType = Gtp2MessageType::$name;

                #[allow(unused_mut)]
                fn from_ies(ies: Vec<Gtp2Ie>) -> Self {
                    let mut body = Self::default();
                    for ie in ies {
                        let mut ie = Some(ie);
                        $(
                            if let Some(candidate) = ie.take() {
                                ie = if candidate.is(Gtp2IeType::$ie, $inst) {
                                    body.$field.offer(candidate)
                                } else {
                                    Some(candidate)
                                };
                            }
                        )*
                        if let Some(rest) = ie {
                            body.additional_ies.push(rest);
                        }
                    }
                    body
                }

                fn ies(&self) -> Vec<&Gtp2Ie> {
                    let mut out = Vec::new();
                    $( self.$field.collect(&mut out); )*
                    out.extend(self.additional_ies.iter());
                    out
                }

                fn from_body(body: &Gtp2Body) -> Option<&Self> {
                    match body {
                        Gtp2Body::$name(b) => Some(b),
                        _ => None,
                    }
                }
            }

            impl From<$name> for Gtp2Body {
                fn from(body: $name) -> Self {
                    Gtp2Body::$name(body)
                }
            }
        )*

        /// Parsed message body
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Gtp2Body {
            $( $name($name), )*
            /// Any other message type; all IEs are kept as additional IEs
            Generic(GenericBody),
        }

        impl Gtp2Body {
            /// Bucket IEs into the body matching `message_type`
            pub fn from_ies(message_type: u8, ies: Vec<Gtp2Ie>) -> Self {
                match message_type {
                    $( t if t == Gtp2MessageType::$name as u8 => Gtp2Body::$name($name::from_ies(ies)), )*
                    _ => Gtp2Body::Generic(GenericBody {
                        message_type,
                        additional_ies: ies,
                    }),
                }
            }

            pub fn message_type(&self) -> u8 {
                match self {
                    $( Gtp2Body::$name(_) => Gtp2MessageType::$name as u8, )*
                    Gtp2Body::Generic(g) => g.message_type,
                }
            }

            /// IEs in marshal order
            pub fn ies(&self) -> Vec<&Gtp2Ie> {
                match self {
                    $( Gtp2Body::$name(b) => b.ies(), )*
                    Gtp2Body::Generic(g) => g.additional_ies.iter().collect(),
                }
            }

            pub fn additional_ies(&self) -> &[Gtp2Ie] {
                match self {
                    $( Gtp2Body::$name(b) => &b.additional_ies, )*
                    Gtp2Body::Generic(g) => &g.additional_ies,
                }
            }
        }
    };
}

/// Body of a message type without a named-field table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenericBody {
    pub message_type: u8,
    pub additional_ies: Vec<Gtp2Ie>,
}

message_bodies! {
    EchoRequest {
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        sending_node_features: Option<Gtp2Ie> = (NodeFeatures, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    EchoResponse {
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        sending_node_features: Option<Gtp2Ie> = (NodeFeatures, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    VersionNotSupportedIndication {}

    CreateSessionRequest {
        imsi: Option<Gtp2Ie> = (Imsi, 0),
        msisdn: Option<Gtp2Ie> = (Msisdn, 0),
        mei: Option<Gtp2Ie> = (Mei, 0),
        uli: Option<Gtp2Ie> = (Uli, 0),
        serving_network: Option<Gtp2Ie> = (ServingNetwork, 0),
        rat_type: Option<Gtp2Ie> = (RatType, 0),
        indication: Option<Gtp2Ie> = (Indication, 0),
        sender_fteid: Option<Gtp2Ie> = (FTeid, 0),
        pgw_s5s8_fteid: Option<Gtp2Ie> = (FTeid, 1),
        apn: Option<Gtp2Ie> = (Apn, 0),
        selection_mode: Option<Gtp2Ie> = (SelectionMode, 0),
        pdn_type: Option<Gtp2Ie> = (PdnType, 0),
        paa: Option<Gtp2Ie> = (Paa, 0),
        apn_restriction: Option<Gtp2Ie> = (ApnRestriction, 0),
        ambr: Option<Gtp2Ie> = (Ambr, 0),
        linked_ebi: Option<Gtp2Ie> = (Ebi, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        bearer_contexts_to_be_created: Vec<Gtp2Ie> = (BearerContext, 0),
        bearer_contexts_to_be_removed: Vec<Gtp2Ie> = (BearerContext, 1),
        trace_information: Option<Gtp2Ie> = (TraceInformation, 0),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        mme_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        ue_time_zone: Option<Gtp2Ie> = (UeTimeZone, 0),
        charging_characteristics: Option<Gtp2Ie> = (ChargingCharacteristics, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    CreateSessionResponse {
        cause: Option<Gtp2Ie> = (Cause, 0),
        change_reporting_action: Option<Gtp2Ie> = (ChangeReportingAction, 0),
        sender_fteid: Option<Gtp2Ie> = (FTeid, 0),
        pgw_s5s8_fteid: Option<Gtp2Ie> = (FTeid, 1),
        paa: Option<Gtp2Ie> = (Paa, 0),
        apn_restriction: Option<Gtp2Ie> = (ApnRestriction, 0),
        ambr: Option<Gtp2Ie> = (Ambr, 0),
        linked_ebi: Option<Gtp2Ie> = (Ebi, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        bearer_contexts_created: Vec<Gtp2Ie> = (BearerContext, 0),
        bearer_contexts_marked_for_removal: Vec<Gtp2Ie> = (BearerContext, 1),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        charging_gateway_fqdn: Option<Gtp2Ie> = (Fqdn, 0),
        charging_gateway_address: Option<Gtp2Ie> = (IpAddress, 0),
        pgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    ModifyBearerRequest {
        mei: Option<Gtp2Ie> = (Mei, 0),
        uli: Option<Gtp2Ie> = (Uli, 0),
        serving_network: Option<Gtp2Ie> = (ServingNetwork, 0),
        rat_type: Option<Gtp2Ie> = (RatType, 0),
        indication: Option<Gtp2Ie> = (Indication, 0),
        sender_fteid: Option<Gtp2Ie> = (FTeid, 0),
        ambr: Option<Gtp2Ie> = (Ambr, 0),
        delay_value: Option<Gtp2Ie> = (DelayValue, 0),
        bearer_contexts_to_be_modified: Vec<Gtp2Ie> = (BearerContext, 0),
        bearer_contexts_to_be_removed: Vec<Gtp2Ie> = (BearerContext, 1),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        ue_time_zone: Option<Gtp2Ie> = (UeTimeZone, 0),
        mme_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    ModifyBearerResponse {
        cause: Option<Gtp2Ie> = (Cause, 0),
        msisdn: Option<Gtp2Ie> = (Msisdn, 0),
        linked_ebi: Option<Gtp2Ie> = (Ebi, 0),
        apn_restriction: Option<Gtp2Ie> = (ApnRestriction, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        bearer_contexts_modified: Vec<Gtp2Ie> = (BearerContext, 0),
        bearer_contexts_marked_for_removal: Vec<Gtp2Ie> = (BearerContext, 1),
        change_reporting_action: Option<Gtp2Ie> = (ChangeReportingAction, 0),
        charging_gateway_fqdn: Option<Gtp2Ie> = (Fqdn, 0),
        charging_gateway_address: Option<Gtp2Ie> = (IpAddress, 0),
        pgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    DeleteSessionRequest {
        cause: Option<Gtp2Ie> = (Cause, 0),
        linked_ebi: Option<Gtp2Ie> = (Ebi, 0),
        uli: Option<Gtp2Ie> = (Uli, 0),
        indication: Option<Gtp2Ie> = (Indication, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        originating_node: Option<Gtp2Ie> = (NodeType, 0),
        sender_fteid: Option<Gtp2Ie> = (FTeid, 0),
        ue_time_zone: Option<Gtp2Ie> = (UeTimeZone, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    DeleteSessionResponse {
        cause: Option<Gtp2Ie> = (Cause, 0),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    CreateBearerRequest {
        pti: Option<Gtp2Ie> = (Pti, 0),
        linked_ebi: Option<Gtp2Ie> = (Ebi, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        bearer_contexts: Vec<Gtp2Ie> = (BearerContext, 0),
        pgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        change_reporting_action: Option<Gtp2Ie> = (ChangeReportingAction, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    CreateBearerResponse {
        cause: Option<Gtp2Ie> = (Cause, 0),
        bearer_contexts: Vec<Gtp2Ie> = (BearerContext, 0),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        mme_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        enb_fq_csid: Option<Gtp2Ie> = (FqCsid, 2),
        pco: Option<Gtp2Ie> = (Pco, 0),
        ue_time_zone: Option<Gtp2Ie> = (UeTimeZone, 0),
        uli: Option<Gtp2Ie> = (Uli, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    UpdateBearerRequest {
        bearer_contexts: Vec<Gtp2Ie> = (BearerContext, 0),
        pti: Option<Gtp2Ie> = (Pti, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        ambr: Option<Gtp2Ie> = (Ambr, 0),
        change_reporting_action: Option<Gtp2Ie> = (ChangeReportingAction, 0),
        indication: Option<Gtp2Ie> = (Indication, 0),
        pgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    UpdateBearerResponse {
        cause: Option<Gtp2Ie> = (Cause, 0),
        bearer_contexts: Vec<Gtp2Ie> = (BearerContext, 0),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        mme_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        indication: Option<Gtp2Ie> = (Indication, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        ue_time_zone: Option<Gtp2Ie> = (UeTimeZone, 0),
        uli: Option<Gtp2Ie> = (Uli, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    DeleteBearerRequest {
        linked_ebi: Option<Gtp2Ie> = (Ebi, 0),
        ebis: Vec<Gtp2Ie> = (Ebi, 1),
        bearer_contexts: Vec<Gtp2Ie> = (BearerContext, 0),
        pti: Option<Gtp2Ie> = (Pti, 0),
        pco: Option<Gtp2Ie> = (Pco, 0),
        pgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        cause: Option<Gtp2Ie> = (Cause, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    DeleteBearerResponse {
        cause: Option<Gtp2Ie> = (Cause, 0),
        linked_ebi: Option<Gtp2Ie> = (Ebi, 0),
        bearer_contexts: Vec<Gtp2Ie> = (BearerContext, 0),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        mme_fq_csid: Option<Gtp2Ie> = (FqCsid, 0),
        sgw_fq_csid: Option<Gtp2Ie> = (FqCsid, 1),
        pco: Option<Gtp2Ie> = (Pco, 0),
        ue_time_zone: Option<Gtp2Ie> = (UeTimeZone, 0),
        uli: Option<Gtp2Ie> = (Uli, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    ReleaseAccessBearersRequest {
        ebis_to_be_released: Vec<Gtp2Ie> = (Ebi, 0),
        originating_node: Option<Gtp2Ie> = (NodeType, 0),
        indication: Option<Gtp2Ie> = (Indication, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    ReleaseAccessBearersResponse {
        cause: Option<Gtp2Ie> = (Cause, 0),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        indication: Option<Gtp2Ie> = (Indication, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    DownlinkDataNotification {
        cause: Option<Gtp2Ie> = (Cause, 0),
        ebi: Option<Gtp2Ie> = (Ebi, 0),
        arp: Option<Gtp2Ie> = (Arp, 0),
        imsi: Option<Gtp2Ie> = (Imsi, 0),
        sender_fteid: Option<Gtp2Ie> = (FTeid, 0),
        indication: Option<Gtp2Ie> = (Indication, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }

    DownlinkDataNotificationAcknowledge {
        cause: Option<Gtp2Ie> = (Cause, 0),
        delay_value: Option<Gtp2Ie> = (DelayValue, 0),
        recovery: Option<Gtp2Ie> = (Recovery, 0),
        imsi: Option<Gtp2Ie> = (Imsi, 0),
        private_extension: Option<Gtp2Ie> = (PrivateExtension, 0),
    }
}

/// GTPv2-C Message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Message {
    /// Message header
    pub header: Gtp2Header,
    /// Named-field body
    pub body: Gtp2Body,
}

impl Gtp2Message {
    /// Build a message around a typed body. The TEID is only written for
    /// message types that carry one.
    pub fn new<B: MessageBody>(teid: u32, sequence_number: u32, body: B) -> Self {
        let header = if B::MESSAGE_TYPE.has_teid() {
            Gtp2Header::new(B::MESSAGE_TYPE as u8, teid, sequence_number)
        } else {
            Gtp2Header::new_no_teid(B::MESSAGE_TYPE as u8, sequence_number)
        };
        Self {
            header,
            body: body.into(),
        }
    }

    /// Build a message of any type from an IE list
    pub fn from_ies(message_type: u8, teid: u32, sequence_number: u32, ies: Vec<Gtp2Ie>) -> Self {
        let has_teid = Gtp2MessageType::try_from(message_type)
            .map(Gtp2MessageType::has_teid)
            .unwrap_or(true);
        let header = if has_teid {
            Gtp2Header::new(message_type, teid, sequence_number)
        } else {
            Gtp2Header::new_no_teid(message_type, sequence_number)
        };
        Self {
            header,
            body: Gtp2Body::from_ies(message_type, ies),
        }
    }

    /// Create an Echo Request message
    pub fn echo_request(sequence_number: u32, recovery: u8) -> Self {
        Self::new(
            0,
            sequence_number,
            EchoRequest {
                recovery: Some(Gtp2Ie::recovery(recovery)),
                ..Default::default()
            },
        )
    }

    /// Create an Echo Response message
    pub fn echo_response(sequence_number: u32, recovery: u8) -> Self {
        Self::new(
            0,
            sequence_number,
            EchoResponse {
                recovery: Some(Gtp2Ie::recovery(recovery)),
                ..Default::default()
            },
        )
    }

    pub fn version_not_supported(sequence_number: u32) -> Self {
        Self::new(0, sequence_number, VersionNotSupportedIndication::default())
    }

    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    pub fn sequence(&self) -> u32 {
        self.header.sequence_number
    }

    pub fn set_sequence(&mut self, sequence_number: u32) {
        self.header.sequence_number = sequence_number & crate::v2::types::MAX_U24;
    }

    /// Header TEID, 0 when the message carries none
    pub fn teid(&self) -> u32 {
        self.header.teid.unwrap_or(0)
    }

    /// Overwrite the TEID of a message that carries one
    pub fn set_teid(&mut self, teid: u32) {
        if self.header.teid.is_some() {
            self.header.teid = Some(teid);
        }
    }

    /// Whether a response is expected for this message
    pub fn is_request(&self) -> bool {
        Gtp2MessageType::try_from(self.header.message_type)
            .map(|t| t.response_type().is_some())
            .unwrap_or(false)
    }

    /// IEs in marshal order
    pub fn ies(&self) -> Vec<&Gtp2Ie> {
        self.body.ies()
    }

    /// First top-level IE with this type and instance, named or additional
    pub fn find(&self, ie_type: Gtp2IeType, instance: u8) -> Option<&Gtp2Ie> {
        self.ies().into_iter().find(|ie| ie.is(ie_type, instance))
    }

    /// Typed view of the body
    pub fn body_as<B: MessageBody>(&self) -> GtpResult<&B> {
        B::from_body(&self.body).ok_or(GtpError::UnexpectedMessage {
            expected: B::MESSAGE_TYPE as u8,
            actual: self.header.message_type,
        })
    }

    /// Value of the length field for the current header and IEs
    pub fn encoded_length(&self) -> usize {
        self.header.header_len() - GTPV2C_FIXED_PREFIX_LEN
            + self.ies().iter().map(|ie| ie.encoded_len()).sum::<usize>()
    }

    /// Encode message to bytes, computing the length field
    pub fn marshal(&self) -> GtpResult<Bytes> {
        let length = self.encoded_length();
        let length = u16::try_from(length).map_err(|_| {
            GtpError::EncodingError(format!(
                "Message type {} of {} bytes exceeds length field",
                self.header.message_type, length
            ))
        })?;

        let mut header = self.header.clone();
        header.length = length;

        let mut buf = BytesMut::with_capacity(GTPV2C_FIXED_PREFIX_LEN + length as usize);
        header.encode(&mut buf);
        for ie in self.ies() {
            ie.encode(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// Decode message from bytes
    pub fn parse(data: &[u8]) -> GtpResult<Self> {
        Self::parse_with(data, &GroupedIeTable::default())
    }

    /// Decode message using a custom grouped IE table.
    ///
    /// A message whose version is not 2 is returned with its header and an
    /// empty generic body so the receiver can still answer it.
    pub fn parse_with(data: &[u8], table: &GroupedIeTable) -> GtpResult<Self> {
        let mut cursor = data;
        let header = Gtp2Header::decode(&mut cursor)?;

        if header.version != GTP2_VERSION {
            return Ok(Self {
                body: Gtp2Body::Generic(GenericBody {
                    message_type: header.message_type,
                    additional_ies: Vec::new(),
                }),
                header,
            });
        }

        let total = GTPV2C_FIXED_PREFIX_LEN + header.length as usize;
        if total > data.len() {
            return Err(GtpError::BufferTooShort {
                needed: total,
                available: data.len(),
            });
        }
        if total < header.header_len() {
            return Err(GtpError::InvalidFormat(format!(
                "Length {} shorter than header",
                header.length
            )));
        }

        let ies = Gtp2Ie::decode_all_with(&data[header.header_len()..total], table)?;
        Ok(Self {
            body: Gtp2Body::from_ies(header.message_type, ies),
            header,
        })
    }
}
