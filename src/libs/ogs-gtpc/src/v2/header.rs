//! GTPv2-C message header (TS 29.274 clause 5.1) and message type codes

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{GtpError, GtpResult};
use crate::v2::types::MAX_U24;

/// Header octets when the TEID is present
pub const GTPV2C_HEADER_LEN: usize = 12;

pub const GTPV2C_HEADER_LEN_NO_TEID: usize = 8;

/// Flags, message type and length octets that the length field excludes
pub const GTPV2C_FIXED_PREFIX_LEN: usize = 4;

pub const GTP2_TEID_LEN: usize = 4;

/// The only version this engine speaks
pub const GTP2_VERSION: u8 = 2;

macro_rules! message_types {
    ($($name:ident = $value:literal,)*) => {
        /// Message type codes handled by this crate
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Gtp2MessageType {
            $($name = $value,)*
        }

        impl TryFrom<u8> for Gtp2MessageType {
            type Error = GtpError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    _ => Err(GtpError::InvalidMessageType(value)),
                }
            }
        }
    };
}

message_types! {
    EchoRequest = 1,
    EchoResponse = 2,
    VersionNotSupportedIndication = 3,
    CreateSessionRequest = 32,
    CreateSessionResponse = 33,
    ModifyBearerRequest = 34,
    ModifyBearerResponse = 35,
    DeleteSessionRequest = 36,
    DeleteSessionResponse = 37,
    ChangeNotificationRequest = 38,
    ChangeNotificationResponse = 39,
    ModifyBearerCommand = 64,
    ModifyBearerFailureIndication = 65,
    DeleteBearerCommand = 66,
    DeleteBearerFailureIndication = 67,
    BearerResourceCommand = 68,
    BearerResourceFailureIndication = 69,
    DownlinkDataNotificationFailureIndication = 70,
    StopPagingIndication = 73,
    CreateBearerRequest = 95,
    CreateBearerResponse = 96,
    UpdateBearerRequest = 97,
    UpdateBearerResponse = 98,
    DeleteBearerRequest = 99,
    DeleteBearerResponse = 100,
    DeletePdnConnectionSetRequest = 101,
    DeletePdnConnectionSetResponse = 102,
    SuspendNotification = 162,
    SuspendAcknowledge = 163,
    ResumeNotification = 164,
    ResumeAcknowledge = 165,
    ReleaseAccessBearersRequest = 170,
    ReleaseAccessBearersResponse = 171,
    DownlinkDataNotification = 176,
    DownlinkDataNotificationAcknowledge = 177,
    ModifyAccessBearersRequest = 211,
    ModifyAccessBearersResponse = 212,
}

impl Gtp2MessageType {
    /// Response type paired with a request type; `None` for everything that
    /// is not a request expecting a response.
    pub fn response_type(self) -> Option<Gtp2MessageType> {
        use Gtp2MessageType::*;
        match self {
            EchoRequest => Some(EchoResponse),
            CreateSessionRequest => Some(CreateSessionResponse),
            ModifyBearerRequest => Some(ModifyBearerResponse),
            DeleteSessionRequest => Some(DeleteSessionResponse),
            ChangeNotificationRequest => Some(ChangeNotificationResponse),
            CreateBearerRequest => Some(CreateBearerResponse),
            UpdateBearerRequest => Some(UpdateBearerResponse),
            DeleteBearerRequest => Some(DeleteBearerResponse),
            DeletePdnConnectionSetRequest => Some(DeletePdnConnectionSetResponse),
            SuspendNotification => Some(SuspendAcknowledge),
            ResumeNotification => Some(ResumeAcknowledge),
            ReleaseAccessBearersRequest => Some(ReleaseAccessBearersResponse),
            DownlinkDataNotification => Some(DownlinkDataNotificationAcknowledge),
            ModifyAccessBearersRequest => Some(ModifyAccessBearersResponse),
            _ => None,
        }
    }

    /// Whether messages of this type carry a TEID field in the header.
    pub fn has_teid(self) -> bool {
        !matches!(
            self,
            Gtp2MessageType::EchoRequest
                | Gtp2MessageType::EchoResponse
                | Gtp2MessageType::VersionNotSupportedIndication
        )
    }
}

const VERSION_SHIFT: u8 = 5;
const FLAG_PIGGYBACK: u8 = 0x10;
const FLAG_TEID: u8 = 0x08;

/// Fixed part of every GTPv2-C message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Header {
    /// 3-bit version, kept as received
    pub version: u8,
    pub piggybacked: bool,
    pub message_type: u8,
    /// Octets after the 4-octet prefix, TEID and sequence included
    pub length: u16,
    /// `Some` iff the T flag is set
    pub teid: Option<u32>,
    /// 24-bit sequence number
    pub sequence_number: u32,
}

impl Default for Gtp2Header {
    fn default() -> Self {
        Self {
            version: GTP2_VERSION,
            piggybacked: false,
            message_type: 0,
            length: 0,
            teid: Some(0),
            sequence_number: 0,
        }
    }
}

impl Gtp2Header {
    pub fn new(message_type: u8, teid: u32, sequence_number: u32) -> Self {
        Self {
            message_type,
            teid: Some(teid),
            sequence_number: sequence_number & MAX_U24,
            ..Default::default()
        }
    }

    /// Header for echo and version-not-supported messages, which carry no TEID
    pub fn new_no_teid(message_type: u8, sequence_number: u32) -> Self {
        Self {
            teid: None,
            ..Self::new(message_type, 0, sequence_number)
        }
    }

    pub fn teid_presence(&self) -> bool {
        self.teid.is_some()
    }

    pub fn flags(&self) -> u8 {
        let p = if self.piggybacked { FLAG_PIGGYBACK } else { 0 };
        let t = if self.teid_presence() { FLAG_TEID } else { 0 };
        ((self.version & 0x07) << VERSION_SHIFT) | p | t
    }

    pub fn header_len(&self) -> usize {
        match self.teid {
            Some(_) => GTPV2C_HEADER_LEN,
            None => GTPV2C_HEADER_LEN_NO_TEID,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.header_len());
        buf.put_u8(self.flags());
        buf.put_u8(self.message_type);
        buf.put_u16(self.length);
        if let Some(teid) = self.teid {
            buf.put_u32(teid);
        }
        buf.put_uint(u64::from(self.sequence_number & MAX_U24), 3);
        buf.put_u8(0);
    }

    /// Decode the header and advance `buf` past it.
    ///
    /// The version is reported as found; rejecting foreign versions is left
    /// to the endpoint so that it can answer with a Version Not Supported
    /// Indication.
    pub fn decode(buf: &mut &[u8]) -> GtpResult<Self> {
        need(buf, GTPV2C_FIXED_PREFIX_LEN)?;
        let flags = buf.get_u8();
        let message_type = buf.get_u8();
        let length = buf.get_u16();

        let has_teid = flags & FLAG_TEID != 0;
        need(buf, if has_teid { GTP2_TEID_LEN + 4 } else { 4 })?;
        let teid = has_teid.then(|| buf.get_u32());
        let sequence_number = buf.get_uint(3) as u32;
        buf.advance(1);

        Ok(Self {
            version: flags >> VERSION_SHIFT,
            piggybacked: flags & FLAG_PIGGYBACK != 0,
            message_type,
            length,
            teid,
            sequence_number,
        })
    }
}

fn need(buf: &[u8], needed: usize) -> GtpResult<()> {
    if buf.len() < needed {
        return Err(GtpError::BufferTooShort {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(header: &Gtp2Header) -> (BytesMut, Gtp2Header) {
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        let mut cursor = &buf[..];
        let decoded = Gtp2Header::decode(&mut cursor).unwrap();
        assert!(cursor.is_empty());
        (buf, decoded)
    }

    #[test]
    fn test_teid_header_layout() {
        let mut header = Gtp2Header::new(Gtp2MessageType::ModifyBearerRequest as u8, 0xCAFE0001, 0xABCDEF);
        header.length = 0x20;
        let (buf, decoded) = round_trip(&header);

        assert_eq!(
            &buf[..],
            &[0x48, 34, 0x00, 0x20, 0xCA, 0xFE, 0x00, 0x01, 0xAB, 0xCD, 0xEF, 0x00]
        );
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_no_teid_header_layout() {
        let header = Gtp2Header::new_no_teid(Gtp2MessageType::EchoResponse as u8, 0x000102);
        let (buf, decoded) = round_trip(&header);

        assert_eq!(&buf[..], &[0x40, 2, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00]);
        assert_eq!(decoded.header_len(), GTPV2C_HEADER_LEN_NO_TEID);
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_sequence_truncated_to_24_bits() {
        let header = Gtp2Header::new(Gtp2MessageType::DeleteSessionRequest as u8, 1, 0x0100_0005);
        assert_eq!(header.sequence_number, 5);
    }

    #[test]
    fn test_piggyback_flag() {
        let header = Gtp2Header {
            piggybacked: true,
            ..Gtp2Header::new(Gtp2MessageType::CreateBearerResponse as u8, 7, 9)
        };
        assert_eq!(header.flags(), 0x58);
        assert!(round_trip(&header).1.piggybacked);
    }

    #[test]
    fn test_header_keeps_foreign_version() {
        let raw = [0x28u8, 0x01, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 0x01, 0];
        let decoded = Gtp2Header::decode(&mut &raw[..]).unwrap();
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.sequence_number, 1);
    }

    #[test]
    fn test_header_too_short() {
        let raw = [0x48u8, 0x20, 0x00, 0x08, 0, 0];
        assert!(matches!(
            Gtp2Header::decode(&mut &raw[..]),
            Err(GtpError::BufferTooShort { needed: 8, available: 2 })
        ));
        assert!(matches!(
            Gtp2Header::decode(&mut &raw[..3]),
            Err(GtpError::BufferTooShort { needed: 4, available: 3 })
        ));
    }

    #[test]
    fn test_response_pairing() {
        assert_eq!(
            Gtp2MessageType::CreateSessionRequest.response_type(),
            Some(Gtp2MessageType::CreateSessionResponse)
        );
        assert_eq!(Gtp2MessageType::CreateSessionResponse.response_type(), None);
        assert!(!Gtp2MessageType::EchoRequest.has_teid());
        assert!(Gtp2MessageType::DeleteSessionRequest.has_teid());
        assert_eq!(Gtp2MessageType::try_from(176).unwrap(), Gtp2MessageType::DownlinkDataNotification);
        assert!(Gtp2MessageType::try_from(200).is_err());
    }
}
