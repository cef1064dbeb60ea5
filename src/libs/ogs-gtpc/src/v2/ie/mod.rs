//! GTPv2 Information Elements
//!
//! Generic TLIV codec for GTPv2-C IEs. Every IE is `type(1) | length(2) |
//! spare(4 bits) instance(4 bits) | value`. Types listed in the grouped table
//! carry further IEs as their value and are decoded recursively into
//! `children`; all other IEs keep their raw value, interpreted by the typed
//! accessors in [`access`].

pub mod access;
pub mod builder;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{GtpError, GtpResult};

pub use builder::{
    Gtp2Ambr, Gtp2BearerQos, Gtp2CauseIe, Gtp2Cgi, Gtp2Ecgi, Gtp2FTeid, Gtp2FlowQos, Gtp2Lai,
    Gtp2OffendingIe, Gtp2Paa, Gtp2Pco, Gtp2PcoContainer, Gtp2Rai, Gtp2Sai, Gtp2Tai, Gtp2Uli,
};

/// IE header length: type(1) + length(2) + instance(1)
pub const GTP2_IE_HEADER_LEN: usize = 4;

/// Nesting limit for grouped IEs
pub const GTP2_MAX_GROUP_DEPTH: usize = 8;

macro_rules! ie_types {
    ($($name:ident = $value:literal,)*) => {
        /// GTPv2 IE Types
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Gtp2IeType {
            $($name = $value,)*
        }

        impl TryFrom<u8> for Gtp2IeType {
            type Error = GtpError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    _ => Err(GtpError::InvalidFormat(format!("Unknown IE type: {value}"))),
                }
            }
        }
    };
}

ie_types! {
    Imsi = 1,
    Cause = 2,
    Recovery = 3,
    Apn = 71,
    Ambr = 72,
    Ebi = 73,
    IpAddress = 74,
    Mei = 75,
    Msisdn = 76,
    Indication = 77,
    Pco = 78,
    Paa = 79,
    BearerQos = 80,
    FlowQos = 81,
    RatType = 82,
    ServingNetwork = 83,
    BearerTft = 84,
    Tad = 85,
    Uli = 86,
    FTeid = 87,
    Tmsi = 88,
    DelayValue = 92,
    BearerContext = 93,
    ChargingId = 94,
    ChargingCharacteristics = 95,
    TraceInformation = 96,
    BearerFlags = 97,
    PdnType = 99,
    Pti = 100,
    PdnConnection = 109,
    UeTimeZone = 114,
    TraceReference = 115,
    PlmnId = 120,
    PortNumber = 126,
    ApnRestriction = 127,
    SelectionMode = 128,
    ChangeReportingAction = 131,
    FqCsid = 132,
    NodeType = 135,
    Fqdn = 136,
    Arp = 155,
    NodeFeatures = 152,
    OverloadControlInformation = 180,
    LoadControlInformation = 181,
    RemoteUeContext = 191,
    ScefPdnConnection = 195,
    PrivateExtension = 255,
}

// ============================================================================
// Grouped IE table
// ============================================================================

/// IE types decoded recursively
pub const DEFAULT_GROUPED_IE_TYPES: [Gtp2IeType; 6] = [
    Gtp2IeType::BearerContext,
    Gtp2IeType::PdnConnection,
    Gtp2IeType::OverloadControlInformation,
    Gtp2IeType::LoadControlInformation,
    Gtp2IeType::RemoteUeContext,
    Gtp2IeType::ScefPdnConnection,
];

/// Set of IE type codes whose value is a nested IE stream.
///
/// Starts from [`DEFAULT_GROUPED_IE_TYPES`]; applications add vendor
/// extensions with [`GroupedIeTable::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedIeTable {
    grouped: [bool; 256],
}

impl Default for GroupedIeTable {
    fn default() -> Self {
        let mut grouped = [false; 256];
        for t in DEFAULT_GROUPED_IE_TYPES {
            grouped[t as usize] = true;
        }
        Self { grouped }
    }
}

impl GroupedIeTable {
    /// Default table plus the given extra type codes
    pub fn with_extra(extra: &[u8]) -> Self {
        let mut table = Self::default();
        for &t in extra {
            table.insert(t);
        }
        table
    }

    pub fn insert(&mut self, ie_type: u8) {
        self.grouped[ie_type as usize] = true;
    }

    pub fn remove(&mut self, ie_type: u8) {
        self.grouped[ie_type as usize] = false;
    }

    pub fn contains(&self, ie_type: u8) -> bool {
        self.grouped[ie_type as usize]
    }
}

// ============================================================================
// Generic IE
// ============================================================================

/// Generic GTPv2 Information Element
///
/// A leaf holds its raw value. A grouped IE owns its children; its value is
/// always the concatenated encoding of those children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Ie {
    /// IE Type
    pub ie_type: u8,
    /// IE Instance (4 bits)
    pub instance: u8,
    value: Bytes,
    children: Vec<Gtp2Ie>,
    grouped: bool,
}

impl Gtp2Ie {
    /// Create a new leaf IE
    pub fn new(ie_type: u8, instance: u8, value: Bytes) -> Self {
        Self {
            ie_type,
            instance: instance & 0x0F,
            value,
            children: Vec::new(),
            grouped: false,
        }
    }

    /// Create a new leaf IE from slice
    pub fn from_slice(ie_type: u8, instance: u8, value: &[u8]) -> Self {
        Self::new(ie_type, instance, Bytes::copy_from_slice(value))
    }

    /// Create a grouped IE owning `children`
    pub fn grouped(ie_type: u8, instance: u8, children: Vec<Gtp2Ie>) -> Self {
        let mut ie = Self {
            ie_type,
            instance: instance & 0x0F,
            value: Bytes::new(),
            children,
            grouped: true,
        };
        ie.rebuild_value();
        ie
    }

    /// Same IE with another instance number
    pub fn with_instance(mut self, instance: u8) -> Self {
        self.instance = instance & 0x0F;
        self
    }

    /// Whether this IE is of the given type and instance
    pub fn is(&self, ie_type: Gtp2IeType, instance: u8) -> bool {
        self.ie_type == ie_type as u8 && self.instance == instance
    }

    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    /// Raw value (for grouped IEs, the encoded children)
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn children(&self) -> &[Gtp2Ie] {
        &self.children
    }

    /// Value length as carried in the length field
    pub fn length(&self) -> usize {
        self.value.len()
    }

    /// Get encoded length
    pub fn encoded_len(&self) -> usize {
        GTP2_IE_HEADER_LEN + self.value.len()
    }

    /// Encode IE to bytes
    pub fn encode(&self, buf: &mut BytesMut) -> GtpResult<()> {
        let length = u16::try_from(self.value.len()).map_err(|_| {
            GtpError::EncodingError(format!(
                "IE type {} value of {} bytes exceeds length field",
                self.ie_type,
                self.value.len()
            ))
        })?;
        buf.reserve(self.encoded_len());
        buf.put_u8(self.ie_type);
        buf.put_u16(length);
        buf.put_u8(self.instance & 0x0F);
        buf.put_slice(&self.value);
        Ok(())
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> GtpResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode one IE, advancing `buf` past it
    pub fn decode(buf: &mut &[u8]) -> GtpResult<Self> {
        Self::decode_with(buf, &GroupedIeTable::default())
    }

    /// Decode one IE using a custom grouped table
    pub fn decode_with(buf: &mut &[u8], table: &GroupedIeTable) -> GtpResult<Self> {
        Self::decode_at_depth(buf, table, 0)
    }

    /// Decode one IE from the start of `data`, returning it with the number
    /// of bytes it occupied
    pub fn parse(data: &[u8]) -> GtpResult<(Self, usize)> {
        let mut cursor = data;
        let ie = Self::decode(&mut cursor)?;
        Ok((ie, data.len() - cursor.len()))
    }

    /// Decode IEs until `data` is exhausted; the first error aborts
    pub fn decode_all(data: &[u8]) -> GtpResult<Vec<Self>> {
        Self::decode_all_with(data, &GroupedIeTable::default())
    }

    pub fn decode_all_with(data: &[u8], table: &GroupedIeTable) -> GtpResult<Vec<Self>> {
        decode_stream(data, table, 0)
    }

    fn decode_at_depth(buf: &mut &[u8], table: &GroupedIeTable, depth: usize) -> GtpResult<Self> {
        if buf.remaining() < GTP2_IE_HEADER_LEN {
            return Err(GtpError::BufferTooShort {
                needed: GTP2_IE_HEADER_LEN,
                available: buf.remaining(),
            });
        }

        let ie_type = buf.get_u8();
        let length = buf.get_u16() as usize;
        let instance = buf.get_u8() & 0x0F;

        if buf.remaining() < length {
            return Err(GtpError::BufferTooShort {
                needed: length,
                available: buf.remaining(),
            });
        }

        let value = Bytes::copy_from_slice(&buf[..length]);
        buf.advance(length);

        if !table.contains(ie_type) {
            return Ok(Self::new(ie_type, instance, value));
        }

        if depth >= GTP2_MAX_GROUP_DEPTH {
            return Err(GtpError::InvalidFormat(format!(
                "Grouped IE type {ie_type} nested deeper than {GTP2_MAX_GROUP_DEPTH}"
            )));
        }
        let children = decode_stream(&value, table, depth + 1)?;
        Ok(Self {
            ie_type,
            instance,
            value,
            children,
            grouped: true,
        })
    }

    // ------------------------------------------------------------------------
    // Grouped IE manipulation
    // ------------------------------------------------------------------------

    /// Append a child to a grouped IE
    pub fn add_child(&mut self, child: Gtp2Ie) -> GtpResult<()> {
        self.ensure_grouped()?;
        self.children.push(child);
        self.rebuild_value();
        Ok(())
    }

    /// Remove the first child matching type and instance. Returns the
    /// removed child; a miss leaves the IE untouched.
    pub fn remove_child(&mut self, ie_type: u8, instance: u8) -> GtpResult<Option<Gtp2Ie>> {
        self.ensure_grouped()?;
        let Some(pos) = self
            .children
            .iter()
            .position(|c| c.ie_type == ie_type && c.instance == instance)
        else {
            return Ok(None);
        };
        let removed = self.children.remove(pos);
        self.rebuild_value();
        Ok(Some(removed))
    }

    /// First child with the given type and instance
    pub fn find(&self, ie_type: Gtp2IeType, instance: u8) -> Option<&Gtp2Ie> {
        self.children.iter().find(|c| c.is(ie_type, instance))
    }

    /// All children of the given type, any instance
    pub fn find_all(&self, ie_type: Gtp2IeType) -> impl Iterator<Item = &Gtp2Ie> {
        self.children
            .iter()
            .filter(move |c| c.ie_type == ie_type as u8)
    }

    fn ensure_grouped(&self) -> GtpResult<()> {
        if self.grouped {
            Ok(())
        } else {
            Err(GtpError::InvalidFormat(format!(
                "IE type {} is not grouped",
                self.ie_type
            )))
        }
    }

    fn rebuild_value(&mut self) {
        let total: usize = self.children.iter().map(Gtp2Ie::encoded_len).sum();
        let mut buf = BytesMut::with_capacity(total);
        for child in &self.children {
            // Oversized children are still concatenated; encode() of this IE
            // reports the overflow.
            buf.put_u8(child.ie_type);
            buf.put_u16(child.value.len() as u16);
            buf.put_u8(child.instance & 0x0F);
            buf.put_slice(&child.value);
        }
        self.value = buf.freeze();
    }
}

fn decode_stream(data: &[u8], table: &GroupedIeTable, depth: usize) -> GtpResult<Vec<Gtp2Ie>> {
    let mut cursor = data;
    let mut ies = Vec::new();
    while cursor.has_remaining() {
        ies.push(Gtp2Ie::decode_at_depth(&mut cursor, table, depth)?);
    }
    Ok(ies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ebi(v: u8) -> Gtp2Ie {
        Gtp2Ie::from_slice(Gtp2IeType::Ebi as u8, 0, &[v])
    }

    #[test]
    fn test_generic_ie_encode_decode() {
        let ie = Gtp2Ie::from_slice(Gtp2IeType::Recovery as u8, 3, &[42]);
        let bytes = ie.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[3, 0, 1, 3, 42]);

        let (decoded, consumed) = Gtp2Ie::parse(&bytes).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(decoded, ie);
    }

    #[test]
    fn test_decode_ignores_spare_nibble() {
        let raw = [3u8, 0, 1, 0xA2, 7];
        let (ie, _) = Gtp2Ie::parse(&raw).unwrap();
        assert_eq!(ie.instance, 2);
    }

    #[test]
    fn test_decode_short_header() {
        assert_eq!(
            Gtp2Ie::parse(&[1, 0, 8]),
            Err(GtpError::BufferTooShort { needed: 4, available: 3 })
        );
    }

    #[test]
    fn test_decode_length_past_buffer() {
        assert_eq!(
            Gtp2Ie::parse(&[1, 0, 8, 0, 0x21, 0x43]),
            Err(GtpError::BufferTooShort { needed: 8, available: 2 })
        );
    }

    #[test]
    fn test_decode_all_propagates_first_error() {
        let mut raw = ebi(5).to_bytes().unwrap().to_vec();
        raw.extend_from_slice(&[3, 0, 4, 0, 1]);
        assert!(matches!(
            Gtp2Ie::decode_all(&raw),
            Err(GtpError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_grouped_decode_recurses() {
        let bc = Gtp2Ie::grouped(
            Gtp2IeType::BearerContext as u8,
            0,
            vec![ebi(5), Gtp2Ie::from_slice(Gtp2IeType::ChargingId as u8, 0, &[0, 0, 0, 9])],
        );
        assert_eq!(bc.length(), 5 + 8);

        let bytes = bc.to_bytes().unwrap();
        let (decoded, _) = Gtp2Ie::parse(&bytes).unwrap();
        assert!(decoded.is_grouped());
        assert_eq!(decoded.children().len(), 2);
        assert_eq!(decoded, bc);
    }

    #[test]
    fn test_vendor_grouped_type() {
        let inner = ebi(6).to_bytes().unwrap();
        let outer = Gtp2Ie::from_slice(250, 0, &inner).to_bytes().unwrap();

        let (plain, _) = Gtp2Ie::parse(&outer).unwrap();
        assert!(!plain.is_grouped());

        let table = GroupedIeTable::with_extra(&[250]);
        let decoded = Gtp2Ie::decode_with(&mut &outer[..], &table).unwrap();
        assert_eq!(decoded.children(), &[ebi(6)]);
    }

    #[test]
    fn test_grouped_child_error_propagates() {
        let raw = [93u8, 0, 3, 0, 73, 0, 1];
        assert!(matches!(
            Gtp2Ie::parse(&raw),
            Err(GtpError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let mut ie = ebi(1);
        for _ in 0..=GTP2_MAX_GROUP_DEPTH {
            ie = Gtp2Ie::grouped(Gtp2IeType::BearerContext as u8, 0, vec![ie]);
        }
        let bytes = ie.to_bytes().unwrap();
        assert!(matches!(Gtp2Ie::parse(&bytes), Err(GtpError::InvalidFormat(_))));
    }

    #[test]
    fn test_add_remove_child() {
        let mut bc = Gtp2Ie::grouped(Gtp2IeType::BearerContext as u8, 0, vec![ebi(5)]);
        let fteid = Gtp2Ie::from_slice(Gtp2IeType::FTeid as u8, 1, &[0x80 | 4, 0, 0, 0, 1, 10, 0, 0, 1]);

        bc.add_child(fteid.clone()).unwrap();
        assert_eq!(bc.length(), ebi(5).encoded_len() + fteid.encoded_len());

        // type matches but instance does not
        assert_eq!(bc.remove_child(Gtp2IeType::FTeid as u8, 0).unwrap(), None);
        assert_eq!(bc.children().len(), 2);

        assert_eq!(bc.remove_child(Gtp2IeType::FTeid as u8, 1).unwrap(), Some(fteid));
        assert_eq!(bc, Gtp2Ie::grouped(Gtp2IeType::BearerContext as u8, 0, vec![ebi(5)]));
    }

    #[test]
    fn test_add_child_to_leaf_fails() {
        let mut leaf = ebi(5);
        assert!(leaf.add_child(ebi(6)).is_err());
        assert_eq!(leaf, ebi(5));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let ie = Gtp2Ie::new(Gtp2IeType::PrivateExtension as u8, 0, Bytes::from(vec![0u8; 70_000]));
        assert!(matches!(ie.to_bytes(), Err(GtpError::EncodingError(_))));
    }
}
