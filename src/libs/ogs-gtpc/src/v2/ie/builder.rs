//! Typed IE constructors
//!
//! Value structs for the composite IEs and `Gtp2Ie` constructors for the
//! IE catalogue. Every constructor produces instance 0; use
//! [`Gtp2Ie::with_instance`] for other instances.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, Bytes, BytesMut};

use super::{Gtp2Ie, Gtp2IeType};
use crate::error::{GtpError, GtpResult};
use crate::v2::types::{encode_bcd, encode_labels, put_u24, put_u40, Gtp2Arp, Gtp2PlmnId, Gtp2UliFlags};

// ============================================================================
// Value structs
// ============================================================================

/// IE reported back as the reason for a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gtp2OffendingIe {
    pub ie_type: u8,
    pub length: u16,
    pub instance: u8,
}

/// Cause IE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gtp2CauseIe {
    pub cause: u8,
    pub pce: bool,
    pub bce: bool,
    pub cs: bool,
    pub offending_ie: Option<Gtp2OffendingIe>,
}

impl Gtp2CauseIe {
    pub fn new(cause: u8) -> Self {
        Self {
            cause,
            pce: false,
            bce: false,
            cs: false,
            offending_ie: None,
        }
    }
}

/// AMBR IE (Aggregate Maximum Bit Rate, kbps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gtp2Ambr {
    pub uplink: u32,
    pub downlink: u32,
}

/// F-TEID IE (Fully Qualified TEID)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gtp2FTeid {
    pub interface_type: u8,
    pub teid: u32,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// Bearer QoS IE; bit rates are 40-bit kbps values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gtp2BearerQos {
    pub arp: Gtp2Arp,
    pub qci: u8,
    pub mbr_ul: u64,
    pub mbr_dl: u64,
    pub gbr_ul: u64,
    pub gbr_dl: u64,
}

/// Flow QoS IE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gtp2FlowQos {
    pub qci: u8,
    pub mbr_ul: u64,
    pub mbr_dl: u64,
    pub gbr_ul: u64,
    pub gbr_dl: u64,
}

/// PAA (PDN Address Allocation) IE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gtp2Paa {
    pub pdn_type: u8,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6_prefix_len: Option<u8>,
    pub ipv6: Option<Ipv6Addr>,
}

/// One PCO container (protocol or container identifier + contents)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2PcoContainer {
    pub id: u16,
    pub contents: Bytes,
}

/// PCO (Protocol Configuration Options) IE
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Gtp2Pco {
    /// Configuration protocol (0 = PPP with IP PDP)
    pub config_protocol: u8,
    pub containers: Vec<Gtp2PcoContainer>,
}

/// Cell Global Identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Cgi {
    pub plmn: Gtp2PlmnId,
    pub lac: u16,
    pub ci: u16,
}

/// Service Area Identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Sai {
    pub plmn: Gtp2PlmnId,
    pub lac: u16,
    pub sac: u16,
}

/// Routing Area Identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Rai {
    pub plmn: Gtp2PlmnId,
    pub lac: u16,
    pub rac: u16,
}

/// Tracking Area Identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Tai {
    pub plmn: Gtp2PlmnId,
    pub tac: u16,
}

/// E-UTRAN Cell Global Identity (28-bit ECI)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Ecgi {
    pub plmn: Gtp2PlmnId,
    pub eci: u32,
}

/// Location Area Identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gtp2Lai {
    pub plmn: Gtp2PlmnId,
    pub lac: u16,
}

/// ULI (User Location Information) IE
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Gtp2Uli {
    pub cgi: Option<Gtp2Cgi>,
    pub sai: Option<Gtp2Sai>,
    pub rai: Option<Gtp2Rai>,
    pub tai: Option<Gtp2Tai>,
    pub ecgi: Option<Gtp2Ecgi>,
    pub lai: Option<Gtp2Lai>,
}

impl Gtp2Uli {
    pub fn flags(&self) -> Gtp2UliFlags {
        Gtp2UliFlags {
            cgi: self.cgi.is_some(),
            sai: self.sai.is_some(),
            rai: self.rai.is_some(),
            tai: self.tai.is_some(),
            ecgi: self.ecgi.is_some(),
            lai: self.lai.is_some(),
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

fn u8_ie(ie_type: Gtp2IeType, v: u8) -> Gtp2Ie {
    Gtp2Ie::from_slice(ie_type as u8, 0, &[v])
}

fn u16_ie(ie_type: Gtp2IeType, v: u16) -> Gtp2Ie {
    Gtp2Ie::from_slice(ie_type as u8, 0, &v.to_be_bytes())
}

fn u32_ie(ie_type: Gtp2IeType, v: u32) -> Gtp2Ie {
    Gtp2Ie::from_slice(ie_type as u8, 0, &v.to_be_bytes())
}

fn leaf(ie_type: Gtp2IeType, buf: BytesMut) -> Gtp2Ie {
    Gtp2Ie::new(ie_type as u8, 0, buf.freeze())
}

impl Gtp2Ie {
    // ------------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------------

    pub fn imsi(imsi: &str) -> GtpResult<Self> {
        Ok(Self::from_slice(Gtp2IeType::Imsi as u8, 0, &encode_bcd(imsi)?))
    }

    pub fn msisdn(msisdn: &str) -> GtpResult<Self> {
        Ok(Self::from_slice(Gtp2IeType::Msisdn as u8, 0, &encode_bcd(msisdn)?))
    }

    pub fn mei(mei: &str) -> GtpResult<Self> {
        Ok(Self::from_slice(Gtp2IeType::Mei as u8, 0, &encode_bcd(mei)?))
    }

    // ------------------------------------------------------------------------
    // Single-octet values
    // ------------------------------------------------------------------------

    pub fn recovery(restart_counter: u8) -> Self {
        u8_ie(Gtp2IeType::Recovery, restart_counter)
    }

    pub fn ebi(ebi: u8) -> Self {
        u8_ie(Gtp2IeType::Ebi, ebi & 0x0F)
    }

    pub fn rat_type(rat_type: u8) -> Self {
        u8_ie(Gtp2IeType::RatType, rat_type)
    }

    pub fn pdn_type(pdn_type: u8) -> Self {
        u8_ie(Gtp2IeType::PdnType, pdn_type & 0x07)
    }

    pub fn selection_mode(mode: u8) -> Self {
        u8_ie(Gtp2IeType::SelectionMode, mode & 0x03)
    }

    pub fn apn_restriction(restriction: u8) -> Self {
        u8_ie(Gtp2IeType::ApnRestriction, restriction)
    }

    pub fn node_type(node_type: u8) -> Self {
        u8_ie(Gtp2IeType::NodeType, node_type)
    }

    pub fn delay_value(delay: u8) -> Self {
        u8_ie(Gtp2IeType::DelayValue, delay)
    }

    pub fn pti(pti: u8) -> Self {
        u8_ie(Gtp2IeType::Pti, pti)
    }

    pub fn node_features(features: u8) -> Self {
        u8_ie(Gtp2IeType::NodeFeatures, features)
    }

    pub fn arp(arp: Gtp2Arp) -> Self {
        u8_ie(Gtp2IeType::Arp, arp.encode())
    }

    // ------------------------------------------------------------------------
    // Integers
    // ------------------------------------------------------------------------

    pub fn charging_characteristics(cc: u16) -> Self {
        u16_ie(Gtp2IeType::ChargingCharacteristics, cc)
    }

    pub fn port_number(port: u16) -> Self {
        u16_ie(Gtp2IeType::PortNumber, port)
    }

    pub fn charging_id(id: u32) -> Self {
        u32_ie(Gtp2IeType::ChargingId, id)
    }

    pub fn ambr(uplink: u32, downlink: u32) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32(uplink);
        buf.put_u32(downlink);
        leaf(Gtp2IeType::Ambr, buf)
    }

    pub fn ue_time_zone(time_zone: u8, daylight_saving_time: u8) -> Self {
        Self::from_slice(
            Gtp2IeType::UeTimeZone as u8,
            0,
            &[time_zone, daylight_saving_time & 0x03],
        )
    }

    // ------------------------------------------------------------------------
    // Names and raw octets
    // ------------------------------------------------------------------------

    /// Fails when a label does not fit its length octet
    pub fn apn(apn: &str) -> GtpResult<Self> {
        Ok(Self::from_slice(Gtp2IeType::Apn as u8, 0, &encode_labels(apn)?))
    }

    pub fn fqdn(fqdn: &str) -> GtpResult<Self> {
        Ok(Self::from_slice(Gtp2IeType::Fqdn as u8, 0, &encode_labels(fqdn)?))
    }

    /// Indication flags, one octet per flag group as received
    pub fn indication(flags: &[u8]) -> Self {
        Self::from_slice(Gtp2IeType::Indication as u8, 0, flags)
    }

    pub fn ip_address(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self::from_slice(Gtp2IeType::IpAddress as u8, 0, &v4.octets()),
            IpAddr::V6(v6) => Self::from_slice(Gtp2IeType::IpAddress as u8, 0, &v6.octets()),
        }
    }

    pub fn private_extension(enterprise_id: u16, value: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(2 + value.len());
        buf.put_u16(enterprise_id);
        buf.put_slice(value);
        leaf(Gtp2IeType::PrivateExtension, buf)
    }

    // ------------------------------------------------------------------------
    // Composite values
    // ------------------------------------------------------------------------

    pub fn cause(cause: u8) -> Self {
        Self::from_cause(&Gtp2CauseIe::new(cause))
    }

    /// Cause naming the IE that made the request unacceptable
    pub fn cause_with_offending(cause: u8, ie_type: u8, instance: u8) -> Self {
        Self::from_cause(&Gtp2CauseIe {
            offending_ie: Some(Gtp2OffendingIe {
                ie_type,
                length: 0,
                instance,
            }),
            ..Gtp2CauseIe::new(cause)
        })
    }

    pub fn from_cause(c: &Gtp2CauseIe) -> Self {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u8(c.cause);
        buf.put_u8(((c.pce as u8) << 2) | ((c.bce as u8) << 1) | (c.cs as u8));
        if let Some(off) = &c.offending_ie {
            buf.put_u8(off.ie_type);
            buf.put_u16(off.length);
            buf.put_u8(off.instance & 0x0F);
        }
        leaf(Gtp2IeType::Cause, buf)
    }

    pub fn fteid(interface_type: u8, teid: u32, ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> Self {
        Self::from_fteid(&Gtp2FTeid {
            interface_type,
            teid,
            ipv4,
            ipv6,
        })
    }

    pub fn from_fteid(f: &Gtp2FTeid) -> Self {
        let mut flags = f.interface_type & 0x3F;
        if f.ipv4.is_some() {
            flags |= 0x80;
        }
        if f.ipv6.is_some() {
            flags |= 0x40;
        }

        let mut buf = BytesMut::with_capacity(25);
        buf.put_u8(flags);
        buf.put_u32(f.teid);
        if let Some(v4) = f.ipv4 {
            buf.put_slice(&v4.octets());
        }
        if let Some(v6) = f.ipv6 {
            buf.put_slice(&v6.octets());
        }
        leaf(Gtp2IeType::FTeid, buf)
    }

    pub fn bearer_qos(qos: &Gtp2BearerQos) -> Self {
        let mut buf = BytesMut::with_capacity(22);
        buf.put_u8(qos.arp.encode());
        buf.put_u8(qos.qci);
        for rate in [qos.mbr_ul, qos.mbr_dl, qos.gbr_ul, qos.gbr_dl] {
            put_u40(&mut buf, rate);
        }
        leaf(Gtp2IeType::BearerQos, buf)
    }

    pub fn flow_qos(qos: &Gtp2FlowQos) -> Self {
        let mut buf = BytesMut::with_capacity(21);
        buf.put_u8(qos.qci);
        for rate in [qos.mbr_ul, qos.mbr_dl, qos.gbr_ul, qos.gbr_dl] {
            put_u40(&mut buf, rate);
        }
        leaf(Gtp2IeType::FlowQos, buf)
    }

    pub fn paa_ipv4(addr: Ipv4Addr) -> Self {
        Self::from_paa(&Gtp2Paa {
            pdn_type: 1,
            ipv4: Some(addr),
            ipv6_prefix_len: None,
            ipv6: None,
        })
    }

    pub fn paa_ipv6(prefix_len: u8, addr: Ipv6Addr) -> Self {
        Self::from_paa(&Gtp2Paa {
            pdn_type: 2,
            ipv4: None,
            ipv6_prefix_len: Some(prefix_len),
            ipv6: Some(addr),
        })
    }

    pub fn paa_ipv4v6(ipv4: Ipv4Addr, prefix_len: u8, ipv6: Ipv6Addr) -> Self {
        Self::from_paa(&Gtp2Paa {
            pdn_type: 3,
            ipv4: Some(ipv4),
            ipv6_prefix_len: Some(prefix_len),
            ipv6: Some(ipv6),
        })
    }

    /// PDN type, then IPv6 prefix length and address, then IPv4 address
    pub fn from_paa(p: &Gtp2Paa) -> Self {
        let mut buf = BytesMut::with_capacity(22);
        buf.put_u8(p.pdn_type & 0x07);
        if let Some(v6) = p.ipv6 {
            buf.put_u8(p.ipv6_prefix_len.unwrap_or(64));
            buf.put_slice(&v6.octets());
        }
        if let Some(v4) = p.ipv4 {
            buf.put_slice(&v4.octets());
        }
        leaf(Gtp2IeType::Paa, buf)
    }

    /// Fails when a container holds more than 255 octets
    pub fn pco(pco: &Gtp2Pco) -> GtpResult<Self> {
        let mut buf = BytesMut::new();
        buf.put_u8(0x80 | (pco.config_protocol & 0x07));
        for c in &pco.containers {
            let len = u8::try_from(c.contents.len()).map_err(|_| {
                GtpError::EncodingError(format!(
                    "PCO container {:#06x} of {} octets",
                    c.id,
                    c.contents.len()
                ))
            })?;
            buf.put_u16(c.id);
            buf.put_u8(len);
            buf.put_slice(&c.contents);
        }
        Ok(leaf(Gtp2IeType::Pco, buf))
    }

    pub fn serving_network(mcc: &str, mnc: &str) -> GtpResult<Self> {
        let mut buf = BytesMut::with_capacity(3);
        Gtp2PlmnId::new(mcc, mnc).encode(&mut buf)?;
        Ok(leaf(Gtp2IeType::ServingNetwork, buf))
    }

    pub fn plmn_id(mcc: &str, mnc: &str) -> GtpResult<Self> {
        let mut buf = BytesMut::with_capacity(3);
        Gtp2PlmnId::new(mcc, mnc).encode(&mut buf)?;
        Ok(leaf(Gtp2IeType::PlmnId, buf))
    }

    /// PLMN followed by a 3-octet trace ID
    pub fn trace_reference(mcc: &str, mnc: &str, trace_id: u32) -> GtpResult<Self> {
        let mut buf = BytesMut::with_capacity(6);
        Gtp2PlmnId::new(mcc, mnc).encode(&mut buf)?;
        put_u24(&mut buf, trace_id);
        Ok(leaf(Gtp2IeType::TraceReference, buf))
    }

    /// Location fields follow the flags octet in CGI, SAI, RAI, TAI, ECGI,
    /// LAI order
    pub fn uli(uli: &Gtp2Uli) -> GtpResult<Self> {
        let mut buf = BytesMut::new();
        buf.put_u8(uli.flags().encode());
        if let Some(cgi) = &uli.cgi {
            cgi.plmn.encode(&mut buf)?;
            buf.put_u16(cgi.lac);
            buf.put_u16(cgi.ci);
        }
        if let Some(sai) = &uli.sai {
            sai.plmn.encode(&mut buf)?;
            buf.put_u16(sai.lac);
            buf.put_u16(sai.sac);
        }
        if let Some(rai) = &uli.rai {
            rai.plmn.encode(&mut buf)?;
            buf.put_u16(rai.lac);
            buf.put_u16(rai.rac);
        }
        if let Some(tai) = &uli.tai {
            tai.plmn.encode(&mut buf)?;
            buf.put_u16(tai.tac);
        }
        if let Some(ecgi) = &uli.ecgi {
            ecgi.plmn.encode(&mut buf)?;
            buf.put_u32(ecgi.eci & 0x0FFF_FFFF);
        }
        if let Some(lai) = &uli.lai {
            lai.plmn.encode(&mut buf)?;
            buf.put_u16(lai.lac);
        }
        Ok(leaf(Gtp2IeType::Uli, buf))
    }

    // ------------------------------------------------------------------------
    // Grouped
    // ------------------------------------------------------------------------

    pub fn bearer_context(children: Vec<Gtp2Ie>) -> Self {
        Self::grouped(Gtp2IeType::BearerContext as u8, 0, children)
    }

    pub fn pdn_connection(children: Vec<Gtp2Ie>) -> Self {
        Self::grouped(Gtp2IeType::PdnConnection as u8, 0, children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imsi_layout() {
        let ie = Gtp2Ie::imsi("123451234567890").unwrap();
        assert_eq!(
            &ie.to_bytes().unwrap()[..],
            &[1, 0, 8, 0, 0x21, 0x43, 0x15, 0x32, 0x54, 0x76, 0x98, 0xF0]
        );
    }

    #[test]
    fn test_fteid_layout() {
        let ie = Gtp2Ie::fteid(10, 0x12345678, Some(Ipv4Addr::new(127, 0, 0, 1)), None)
            .with_instance(1);
        assert_eq!(
            &ie.to_bytes().unwrap()[..],
            &[87, 0, 9, 1, 0x8A, 0x12, 0x34, 0x56, 0x78, 127, 0, 0, 1]
        );
    }

    #[test]
    fn test_bearer_qos_layout() {
        let qos = Gtp2BearerQos {
            arp: Gtp2Arp {
                pre_emption_capability: true,
                priority_level: 2,
                pre_emption_vulnerability: true,
            },
            qci: 9,
            mbr_ul: 0x11_1111_1111,
            mbr_dl: 0x22_2222_2222,
            gbr_ul: 0x33_3333_3333,
            gbr_dl: 0x44_4444_4444,
        };
        let ie = Gtp2Ie::bearer_qos(&qos);
        let v = ie.value();
        assert_eq!(v.len(), 22);
        assert_eq!(v[0], 0x49);
        assert_eq!(v[1], 9);
        assert_eq!(&v[2..7], &[0x11; 5]);
        assert_eq!(&v[17..22], &[0x44; 5]);
    }

    #[test]
    fn test_cause_with_offending_layout() {
        let ie = Gtp2Ie::cause_with_offending(70, Gtp2IeType::Imsi as u8, 0);
        assert_eq!(ie.value().as_ref(), &[70, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_paa_ipv4v6_layout() {
        let ie = Gtp2Ie::paa_ipv4v6(Ipv4Addr::new(10, 0, 0, 1), 64, Ipv6Addr::LOCALHOST);
        let v = ie.value();
        assert_eq!(v.len(), 22);
        assert_eq!(v[0], 3);
        assert_eq!(v[1], 64);
        assert_eq!(&v[18..], &[10, 0, 0, 1]);
    }

    #[test]
    fn test_uli_tai_ecgi_layout() {
        let uli = Gtp2Uli {
            tai: Some(Gtp2Tai {
                plmn: Gtp2PlmnId::new("001", "01"),
                tac: 0x0001,
            }),
            ecgi: Some(Gtp2Ecgi {
                plmn: Gtp2PlmnId::new("001", "01"),
                eci: 0x0000_0101,
            }),
            ..Default::default()
        };
        let ie = Gtp2Ie::uli(&uli).unwrap();
        assert_eq!(
            ie.value().as_ref(),
            &[0x18, 0x00, 0xF1, 0x10, 0x00, 0x01, 0x00, 0xF1, 0x10, 0x00, 0x00, 0x01, 0x01]
        );
    }

    #[test]
    fn test_trace_reference_layout() {
        let ie = Gtp2Ie::trace_reference("123", "45", 0x0A0B0C).unwrap();
        assert_eq!(ie.value().as_ref(), &[0x21, 0xF3, 0x54, 0x0A, 0x0B, 0x0C]);
    }

    #[test]
    fn test_pco_layout() {
        let pco = Gtp2Pco {
            config_protocol: 0,
            containers: vec![Gtp2PcoContainer {
                id: 0x000D,
                contents: Bytes::new(),
            }],
        };
        assert_eq!(Gtp2Ie::pco(&pco).unwrap().value().as_ref(), &[0x80, 0x00, 0x0D, 0x00]);
    }

    #[test]
    fn test_pco_container_over_255_octets() {
        let mut pco = Gtp2Pco {
            config_protocol: 0,
            containers: vec![Gtp2PcoContainer {
                id: 0x0010,
                contents: Bytes::from(vec![0xAA; 260]),
            }],
        };
        assert!(matches!(Gtp2Ie::pco(&pco), Err(GtpError::EncodingError(_))));

        pco.containers[0].contents = Bytes::from(vec![0xAA; 255]);
        let ie = Gtp2Ie::pco(&pco).unwrap();
        assert_eq!(ie.value()[3], 255);
        assert_eq!(ie.as_pco().unwrap(), pco);
    }

    #[test]
    fn test_apn_label_over_255_octets() {
        assert!(matches!(
            Gtp2Ie::apn(&"a".repeat(300)),
            Err(GtpError::EncodingError(_))
        ));
        assert!(Gtp2Ie::fqdn(&format!("{}.epc", "b".repeat(256))).is_err());
        let apn = Gtp2Ie::apn(&"a".repeat(255)).unwrap();
        assert_eq!(apn.as_apn().unwrap().len(), 255);
    }
}
