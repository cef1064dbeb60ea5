//! GTPv2-C value types
//!
//! Protocol constants and value encodings shared by the IE codec
//! (3GPP TS 29.274, TS 24.008 digit and PLMN encodings).

use bytes::{BufMut, BytesMut};

use crate::error::{GtpError, GtpResult};

// ============================================================================
// Cause values
// ============================================================================

macro_rules! cause_values {
    ($($name:ident = $value:literal,)*) => {
        /// Cause values (TS 29.274 clause 8.4)
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum Gtp2Cause {
            $($name = $value,)*
        }

        impl TryFrom<u8> for Gtp2Cause {
            type Error = GtpError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    _ => Err(GtpError::InvalidFormat(format!("Unknown cause value: {value}"))),
                }
            }
        }
    };
}

cause_values! {
    LocalDetach = 2,
    CompleteDetach = 3,
    RatChangedFrom3gppToNon3gpp = 4,
    IsrDeactivation = 5,
    ErrorIndicationReceived = 6,
    ImsiDetachOnly = 7,
    ReactivationRequested = 8,
    PdnReconnectionToThisApnDisallowed = 9,
    AccessChangedFromNon3gppTo3gpp = 10,
    PdnConnectionInactivityTimerExpires = 11,
    PgwNotResponding = 12,
    NetworkFailure = 13,
    QosParameterMismatch = 14,
    RequestAccepted = 16,
    RequestAcceptedPartially = 17,
    NewPdnTypeDueToNetworkPreference = 18,
    NewPdnTypeDueToSingleAddressBearerOnly = 19,
    ContextNotFound = 64,
    InvalidMessageFormat = 65,
    VersionNotSupportedByNextPeer = 66,
    InvalidLength = 67,
    ServiceNotSupported = 68,
    MandatoryIeIncorrect = 69,
    MandatoryIeMissing = 70,
    SystemFailure = 72,
    NoResourcesAvailable = 73,
    SemanticErrorInTheTftOperation = 74,
    SyntacticErrorInTheTftOperation = 75,
    SemanticErrorsInPacketFilter = 76,
    SyntacticErrorsInPacketFilter = 77,
    MissingOrUnknownApn = 78,
    GreKeyNotFound = 80,
    RelocationFailure = 81,
    DeniedInRat = 82,
    PreferredPdnTypeNotSupported = 83,
    AllDynamicAddressesAreOccupied = 84,
    UeContextWithoutTftAlreadyActivated = 85,
    ProtocolTypeNotSupported = 86,
    UeNotResponding = 87,
    UeRefuses = 88,
    ServiceDenied = 89,
    UnableToPageUe = 90,
    NoMemoryAvailable = 91,
    UserAuthenticationFailed = 92,
    ApnAccessDeniedNoSubscription = 93,
    RequestRejectedReasonNotSpecified = 94,
    PTmsiSignatureMismatch = 95,
    ImsiImeiNotKnown = 96,
    SemanticErrorInTheTadOperation = 97,
    SyntacticErrorInTheTadOperation = 98,
    RemotePeerNotResponding = 100,
    CollisionWithNetworkInitiatedRequest = 101,
    UnableToPageUeDueToSuspension = 102,
    ConditionalIeMissing = 103,
    ApnRestrictionTypeIncompatible = 104,
    InvalidOverallLength = 105,
    DataForwardingNotSupported = 106,
    InvalidReplyFromRemotePeer = 107,
    FallbackToGtpv1 = 108,
    InvalidPeer = 109,
    TemporarilyRejectedDueToHandoverInProgress = 110,
    ModificationsNotLimitedToS1uBearers = 111,
    RequestRejectedForAPmipv6Reason = 112,
    ApnCongestion = 113,
    BearerHandlingNotSupported = 114,
    UeAlreadyReAttached = 115,
    MultiplePdnConnectionsForAGivenApnNotAllowed = 116,
    TargetAccessRestrictedForTheSubscriber = 117,
    MmeSgsnRefusesDueToVplmnPolicy = 119,
    GtpCEntityCongestion = 120,
    LateOverlappingRequest = 121,
    TimedOutRequest = 122,
    UeIsTemporarilyNotReachableDueToPowerSaving = 123,
    RelocationFailureDueToNasMessageRedirection = 124,
    UeNotAuthorisedByOcsOrExternalAaaServer = 125,
    MultipleAccessesToAPdnConnectionNotAllowed = 126,
    RequestRejectedDueToUeCapability = 127,
}

impl Gtp2Cause {
    /// Cause in the acceptance range 16..=63
    pub fn is_success(&self) -> bool {
        is_accepted(*self as u8)
    }
}

/// Acceptance range of raw cause values (16..=63 per TS 29.274 8.4).
pub fn is_accepted(cause: u8) -> bool {
    (16..64).contains(&cause)
}

// ============================================================================
// Enumerated single-octet values
// ============================================================================

/// RAT Type (clause 8.17)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2RatType {
    Utran = 1,
    Geran = 2,
    Wlan = 3,
    Gan = 4,
    HspaEvolution = 5,
    Eutran = 6,
    Virtual = 7,
    EutranNbIot = 8,
}

/// PDN Type values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2PdnType {
    Ipv4 = 1,
    Ipv6 = 2,
    Ipv4v6 = 3,
    NonIp = 4,
}

impl TryFrom<u8> for Gtp2PdnType {
    type Error = GtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ipv4),
            2 => Ok(Self::Ipv6),
            3 => Ok(Self::Ipv4v6),
            4 => Ok(Self::NonIp),
            _ => Err(GtpError::InvalidPdnType(value)),
        }
    }
}

/// APN Restriction (clause 8.57)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2ApnRestriction {
    NoRestriction = 0,
    Public1 = 1,
    Public2 = 2,
    Private1 = 3,
    Private2 = 4,
}

/// Selection Mode (clause 8.58)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2SelectionMode {
    MsOrNetworkProvidedApn = 0,
    MsProvidedApn = 1,
    NetworkProvidedApn = 2,
}

/// Node Type (clause 8.34)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2NodeType {
    Mme = 0,
    Sgsn = 1,
}

/// F-TEID interface type codes (clause 8.22)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2FTeidInterfaceType {
    S1uEnodebGtpU = 0,
    S1uSgwGtpU = 1,
    S12RncGtpU = 2,
    S12SgwGtpU = 3,
    S5S8SgwGtpU = 4,
    S5S8PgwGtpU = 5,
    S5S8SgwGtpC = 6,
    S5S8PgwGtpC = 7,
    S5S8SgwPmipv6 = 8,
    S5S8PgwPmipv6 = 9,
    S11MmeGtpC = 10,
    S11S4SgwGtpC = 11,
    S10MmeGtpC = 12,
    S3MmeGtpC = 13,
    S3SgsnGtpC = 14,
    S4SgsnGtpU = 15,
    S4SgwGtpU = 16,
    S4SgsnGtpC = 17,
    S16SgsnGtpC = 18,
    EnodebGtpUForDlDataForwarding = 19,
    EnodebGtpUForUlDataForwarding = 20,
    RncGtpUForDataForwarding = 21,
    SgsnGtpUForDataForwarding = 22,
    SgwGtpUForDlDataForwarding = 23,
    SmMbmsGwGtpC = 24,
    SnMbmsGwGtpC = 25,
    SmMmeGtpC = 26,
    SnSgsnGtpC = 27,
    SgwGtpUForUlDataForwarding = 28,
    SnSgsnGtpU = 29,
    S2bEpdgGtpC = 30,
    S2bUEpdgGtpU = 31,
    S2bPgwGtpC = 32,
    S2bUPgwGtpU = 33,
    S2aTwanGtpU = 34,
    S2aTwanGtpC = 35,
    S2aPgwGtpC = 36,
    S2aPgwGtpU = 37,
    S11MmeGtpU = 38,
    S11SgwGtpU = 39,
}

/// DST adjustment carried in UE Time Zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gtp2DaylightSavingTime {
    NoAdjustment = 0,
    OneHour = 1,
    TwoHours = 2,
}

// ============================================================================
// Bit-field octets
// ============================================================================

/// Allocation/Retention Priority (ARP) octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gtp2Arp {
    pub pre_emption_capability: bool,
    pub priority_level: u8,
    pub pre_emption_vulnerability: bool,
}

impl Gtp2Arp {
    /// spare(1) | PCI(1) | PL(4) | spare(1) | PVI(1)
    pub fn encode(&self) -> u8 {
        ((self.pre_emption_capability as u8) << 6)
            | ((self.priority_level & 0x0F) << 2)
            | (self.pre_emption_vulnerability as u8)
    }

    pub fn decode(byte: u8) -> Self {
        Self {
            pre_emption_capability: (byte >> 6) & 0x01 != 0,
            priority_level: (byte >> 2) & 0x0F,
            pre_emption_vulnerability: byte & 0x01 != 0,
        }
    }
}

/// ULI presence flags octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gtp2UliFlags {
    pub cgi: bool,
    pub sai: bool,
    pub rai: bool,
    pub tai: bool,
    pub ecgi: bool,
    pub lai: bool,
}

impl Gtp2UliFlags {
    pub fn encode(&self) -> u8 {
        ((self.lai as u8) << 5)
            | ((self.ecgi as u8) << 4)
            | ((self.tai as u8) << 3)
            | ((self.rai as u8) << 2)
            | ((self.sai as u8) << 1)
            | (self.cgi as u8)
    }

    pub fn decode(byte: u8) -> Self {
        Self {
            cgi: byte & 0x01 != 0,
            sai: (byte >> 1) & 0x01 != 0,
            rai: (byte >> 2) & 0x01 != 0,
            tai: (byte >> 3) & 0x01 != 0,
            ecgi: (byte >> 4) & 0x01 != 0,
            lai: (byte >> 5) & 0x01 != 0,
        }
    }
}

// ============================================================================
// PLMN
// ============================================================================

/// PLMN ID as decimal digit strings (MCC always 3 digits, MNC 2 or 3)
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Gtp2PlmnId {
    pub mcc: String,
    pub mnc: String,
}

impl Gtp2PlmnId {
    pub fn new(mcc: &str, mnc: &str) -> Self {
        Self {
            mcc: mcc.to_string(),
            mnc: mnc.to_string(),
        }
    }

    /// MCC2|MCC1, MNC3|MCC3, MNC2|MNC1 with MNC3 = 0xF for 2-digit MNCs
    pub fn encode(&self, buf: &mut BytesMut) -> GtpResult<()> {
        let mcc = digits(&self.mcc)?;
        let mnc = digits(&self.mnc)?;
        if mcc.len() != 3 || !(2..=3).contains(&mnc.len()) {
            return Err(GtpError::EncodingError(format!(
                "Invalid PLMN {}-{}",
                self.mcc, self.mnc
            )));
        }
        let mnc3 = mnc.get(2).copied().unwrap_or(0x0F);
        buf.put_u8((mcc[1] << 4) | mcc[0]);
        buf.put_u8((mnc3 << 4) | mcc[2]);
        buf.put_u8((mnc[1] << 4) | mnc[0]);
        Ok(())
    }

    pub fn decode(value: &[u8]) -> GtpResult<Self> {
        if value.len() < 3 {
            return Err(GtpError::BufferTooShort {
                needed: 3,
                available: value.len(),
            });
        }
        let digit = |n: u8| char::from(b'0' + (n & 0x0F));
        let mut mcc = String::with_capacity(3);
        mcc.push(digit(value[0]));
        mcc.push(digit(value[0] >> 4));
        mcc.push(digit(value[1]));

        let mut mnc = String::with_capacity(3);
        mnc.push(digit(value[2]));
        mnc.push(digit(value[2] >> 4));
        if value[1] >> 4 != 0x0F {
            mnc.push(digit(value[1] >> 4));
        }
        Ok(Self { mcc, mnc })
    }
}

fn digits(s: &str) -> GtpResult<Vec<u8>> {
    s.chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| GtpError::EncodingError(format!("Non-digit in {s:?}")))
        })
        .collect()
}

// ============================================================================
// BCD digit strings (IMSI, MSISDN, MEI)
// ============================================================================

/// Encode decimal digits two per octet, low nibble first; an odd count is
/// padded with a 0xF fill nibble.
pub fn encode_bcd(number: &str) -> GtpResult<Vec<u8>> {
    let d = digits(number)?;
    Ok(d.chunks(2)
        .map(|pair| {
            let high = pair.get(1).copied().unwrap_or(0x0F);
            (high << 4) | pair[0]
        })
        .collect())
}

/// Decode nibble-swapped digits, stopping at the first fill nibble.
pub fn decode_bcd(buf: &[u8]) -> String {
    let mut result = String::with_capacity(buf.len() * 2);
    for byte in buf {
        for nibble in [byte & 0x0F, byte >> 4] {
            if nibble > 9 {
                return result;
            }
            result.push(char::from(b'0' + nibble));
        }
    }
    result
}

// ============================================================================
// Dotted names (APN, FQDN)
// ============================================================================

/// Convert dot-separated name to length-prefixed labels
pub fn encode_labels(name: &str) -> GtpResult<Vec<u8>> {
    let mut encoded = Vec::with_capacity(name.len() + 1);
    if name.is_empty() {
        return Ok(encoded);
    }
    for part in name.split('.') {
        let len = u8::try_from(part.len()).map_err(|_| {
            GtpError::EncodingError(format!("label of {} octets in {name:?}", part.len()))
        })?;
        encoded.push(len);
        encoded.extend_from_slice(part.as_bytes());
    }
    Ok(encoded)
}

/// Convert length-prefixed labels back to a dotted name
pub fn decode_labels(buf: &[u8]) -> GtpResult<String> {
    let mut result = String::new();
    let mut i = 0;
    while i < buf.len() {
        let len = buf[i] as usize;
        if i + 1 + len > buf.len() {
            return Err(GtpError::BufferTooShort {
                needed: i + 1 + len,
                available: buf.len(),
            });
        }
        if !result.is_empty() {
            result.push('.');
        }
        result.push_str(&String::from_utf8_lossy(&buf[i + 1..i + 1 + len]));
        i += 1 + len;
    }
    Ok(result)
}

// ============================================================================
// Odd-width big-endian integers
// ============================================================================

/// Maximum value of a 3-octet field
pub const MAX_U24: u32 = 0x00FF_FFFF;

/// Maximum value of a 5-octet field
pub const MAX_U40: u64 = 0x00FF_FFFF_FFFF;

pub fn put_u24(buf: &mut BytesMut, value: u32) {
    buf.put_slice(&(value & MAX_U24).to_be_bytes()[1..]);
}

pub fn get_u24(b: &[u8]) -> u32 {
    u32::from_be_bytes([0, b[0], b[1], b[2]])
}

pub fn put_u40(buf: &mut BytesMut, value: u64) {
    buf.put_slice(&(value & MAX_U40).to_be_bytes()[3..]);
}

pub fn get_u40(b: &[u8]) -> u64 {
    u64::from_be_bytes([0, 0, 0, b[0], b[1], b[2], b[3], b[4]])
}
