//! Typed IE accessors
//!
//! Each accessor checks the IE type first (`WrongType`) and then the value
//! length (`BufferTooShort`). Accessors for values that normally live inside
//! a Bearer Context also accept the Bearer Context itself and read the first
//! matching child.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, Bytes};

use super::{
    Gtp2Ambr, Gtp2BearerQos, Gtp2CauseIe, Gtp2Cgi, Gtp2Ecgi, Gtp2FTeid, Gtp2FlowQos, Gtp2Ie,
    Gtp2IeType, Gtp2Lai, Gtp2OffendingIe, Gtp2Paa, Gtp2Pco, Gtp2PcoContainer, Gtp2Rai, Gtp2Sai,
    Gtp2Tai, Gtp2Uli,
};
use crate::error::{GtpError, GtpResult};
use crate::v2::types::{decode_bcd, decode_labels, get_u24, get_u40, Gtp2Arp, Gtp2PlmnId, Gtp2UliFlags};

fn need(value: &[u8], needed: usize) -> GtpResult<()> {
    if value.len() < needed {
        Err(GtpError::BufferTooShort {
            needed,
            available: value.len(),
        })
    } else {
        Ok(())
    }
}

fn ipv4_at(v: &[u8], at: usize) -> Ipv4Addr {
    Ipv4Addr::new(v[at], v[at + 1], v[at + 2], v[at + 3])
}

fn ipv6_at(v: &[u8], at: usize) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&v[at..at + 16]);
    Ipv6Addr::from(octets)
}

impl Gtp2Ie {
    fn checked_value(&self, ie_type: Gtp2IeType) -> GtpResult<&[u8]> {
        if self.ie_type != ie_type as u8 {
            return Err(GtpError::WrongType {
                expected: ie_type as u8,
                actual: self.ie_type,
            });
        }
        Ok(self.value())
    }

    /// The IE itself when it has the wanted type, otherwise the first child
    /// of that type when this is a Bearer Context
    fn direct_or_child(&self, ie_type: Gtp2IeType) -> GtpResult<&Gtp2Ie> {
        if self.ie_type == ie_type as u8 {
            return Ok(self);
        }
        if self.ie_type == Gtp2IeType::BearerContext as u8 {
            return self
                .find_all(ie_type)
                .next()
                .ok_or(GtpError::RequiredFieldMissing {
                    ie_type: ie_type as u8,
                });
        }
        Err(GtpError::WrongType {
            expected: ie_type as u8,
            actual: self.ie_type,
        })
    }

    fn single_octet(&self, ie_type: Gtp2IeType) -> GtpResult<u8> {
        let v = self.checked_value(ie_type)?;
        need(v, 1)?;
        Ok(v[0])
    }

    // ------------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------------

    pub fn as_imsi(&self) -> GtpResult<String> {
        let v = self.checked_value(Gtp2IeType::Imsi)?;
        need(v, 1)?;
        Ok(decode_bcd(v))
    }

    pub fn as_msisdn(&self) -> GtpResult<String> {
        let v = self.checked_value(Gtp2IeType::Msisdn)?;
        need(v, 1)?;
        Ok(decode_bcd(v))
    }

    pub fn as_mei(&self) -> GtpResult<String> {
        let v = self.checked_value(Gtp2IeType::Mei)?;
        need(v, 1)?;
        Ok(decode_bcd(v))
    }

    // ------------------------------------------------------------------------
    // Single-octet values
    // ------------------------------------------------------------------------

    pub fn as_recovery(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::Recovery)
    }

    /// EPS Bearer ID; a Bearer Context yields the EBI of its first EBI child
    pub fn as_ebi(&self) -> GtpResult<u8> {
        let ie = self.direct_or_child(Gtp2IeType::Ebi)?;
        Ok(ie.single_octet(Gtp2IeType::Ebi)? & 0x0F)
    }

    pub fn as_rat_type(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::RatType)
    }

    pub fn as_pdn_type(&self) -> GtpResult<u8> {
        Ok(self.single_octet(Gtp2IeType::PdnType)? & 0x07)
    }

    pub fn as_selection_mode(&self) -> GtpResult<u8> {
        Ok(self.single_octet(Gtp2IeType::SelectionMode)? & 0x03)
    }

    pub fn as_apn_restriction(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::ApnRestriction)
    }

    pub fn as_node_type(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::NodeType)
    }

    pub fn as_delay_value(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::DelayValue)
    }

    pub fn as_pti(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::Pti)
    }

    pub fn as_node_features(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::NodeFeatures)
    }

    pub fn as_arp(&self) -> GtpResult<Gtp2Arp> {
        Ok(Gtp2Arp::decode(self.single_octet(Gtp2IeType::Arp)?))
    }

    // ------------------------------------------------------------------------
    // Integers
    // ------------------------------------------------------------------------

    pub fn as_charging_characteristics(&self) -> GtpResult<u16> {
        let v = self.checked_value(Gtp2IeType::ChargingCharacteristics)?;
        need(v, 2)?;
        Ok(u16::from_be_bytes([v[0], v[1]]))
    }

    pub fn as_port_number(&self) -> GtpResult<u16> {
        let v = self.checked_value(Gtp2IeType::PortNumber)?;
        need(v, 2)?;
        Ok(u16::from_be_bytes([v[0], v[1]]))
    }

    /// Charging ID; a Bearer Context yields its Charging ID child
    pub fn as_charging_id(&self) -> GtpResult<u32> {
        let ie = self.direct_or_child(Gtp2IeType::ChargingId)?;
        let v = ie.value();
        need(v, 4)?;
        Ok(u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
    }

    pub fn as_ambr(&self) -> GtpResult<Gtp2Ambr> {
        let mut v = self.checked_value(Gtp2IeType::Ambr)?;
        need(v, 8)?;
        Ok(Gtp2Ambr {
            uplink: v.get_u32(),
            downlink: v.get_u32(),
        })
    }

    /// Time zone octet and daylight saving adjustment
    pub fn as_ue_time_zone(&self) -> GtpResult<(u8, u8)> {
        let v = self.checked_value(Gtp2IeType::UeTimeZone)?;
        need(v, 2)?;
        Ok((v[0], v[1] & 0x03))
    }

    // ------------------------------------------------------------------------
    // Names and raw octets
    // ------------------------------------------------------------------------

    pub fn as_apn(&self) -> GtpResult<String> {
        decode_labels(self.checked_value(Gtp2IeType::Apn)?)
    }

    pub fn as_fqdn(&self) -> GtpResult<String> {
        decode_labels(self.checked_value(Gtp2IeType::Fqdn)?)
    }

    pub fn as_indication(&self) -> GtpResult<&[u8]> {
        self.checked_value(Gtp2IeType::Indication)
    }

    pub fn as_ip_address(&self) -> GtpResult<IpAddr> {
        let v = self.checked_value(Gtp2IeType::IpAddress)?;
        match v.len() {
            4 => Ok(IpAddr::V4(ipv4_at(v, 0))),
            16 => Ok(IpAddr::V6(ipv6_at(v, 0))),
            n if n < 4 => Err(GtpError::BufferTooShort {
                needed: 4,
                available: n,
            }),
            n => Err(GtpError::InvalidFormat(format!(
                "IP Address IE of {n} bytes"
            ))),
        }
    }

    /// Enterprise ID and proprietary value
    pub fn as_private_extension(&self) -> GtpResult<(u16, Bytes)> {
        self.checked_value(Gtp2IeType::PrivateExtension)?;
        let v = self.value();
        need(v, 2)?;
        Ok((u16::from_be_bytes([v[0], v[1]]), v.slice(2..)))
    }

    // ------------------------------------------------------------------------
    // Composite values
    // ------------------------------------------------------------------------

    pub fn as_cause(&self) -> GtpResult<Gtp2CauseIe> {
        let v = self.checked_value(Gtp2IeType::Cause)?;
        need(v, 2)?;
        let offending_ie = if v.len() >= 6 {
            Some(Gtp2OffendingIe {
                ie_type: v[2],
                length: u16::from_be_bytes([v[3], v[4]]),
                instance: v[5] & 0x0F,
            })
        } else {
            None
        };
        Ok(Gtp2CauseIe {
            cause: v[0],
            pce: v[1] & 0x04 != 0,
            bce: v[1] & 0x02 != 0,
            cs: v[1] & 0x01 != 0,
            offending_ie,
        })
    }

    /// Raw cause value only
    pub fn as_cause_value(&self) -> GtpResult<u8> {
        self.single_octet(Gtp2IeType::Cause)
    }

    pub fn as_fteid(&self) -> GtpResult<Gtp2FTeid> {
        let v = self.checked_value(Gtp2IeType::FTeid)?;
        need(v, 5)?;
        let flags = v[0];
        let has_v4 = flags & 0x80 != 0;
        let has_v6 = flags & 0x40 != 0;
        need(v, 5 + if has_v4 { 4 } else { 0 } + if has_v6 { 16 } else { 0 })?;

        let mut at = 5;
        let ipv4 = has_v4.then(|| {
            let a = ipv4_at(v, at);
            at += 4;
            a
        });
        let ipv6 = has_v6.then(|| ipv6_at(v, at));

        Ok(Gtp2FTeid {
            interface_type: flags & 0x3F,
            teid: u32::from_be_bytes([v[1], v[2], v[3], v[4]]),
            ipv4,
            ipv6,
        })
    }

    /// TEID of an F-TEID IE
    pub fn as_teid(&self) -> GtpResult<u32> {
        Ok(self.as_fteid()?.teid)
    }

    /// Interface type of an F-TEID IE
    pub fn as_interface_type(&self) -> GtpResult<u8> {
        Ok(self.as_fteid()?.interface_type)
    }

    /// Bearer QoS; a Bearer Context yields its Bearer QoS child
    pub fn as_bearer_qos(&self) -> GtpResult<Gtp2BearerQos> {
        let ie = self.direct_or_child(Gtp2IeType::BearerQos)?;
        let v = ie.value();
        need(v, 22)?;
        Ok(Gtp2BearerQos {
            arp: Gtp2Arp::decode(v[0]),
            qci: v[1],
            mbr_ul: get_u40(&v[2..]),
            mbr_dl: get_u40(&v[7..]),
            gbr_ul: get_u40(&v[12..]),
            gbr_dl: get_u40(&v[17..]),
        })
    }

    pub fn as_flow_qos(&self) -> GtpResult<Gtp2FlowQos> {
        let v = self.checked_value(Gtp2IeType::FlowQos)?;
        need(v, 21)?;
        Ok(Gtp2FlowQos {
            qci: v[0],
            mbr_ul: get_u40(&v[1..]),
            mbr_dl: get_u40(&v[6..]),
            gbr_ul: get_u40(&v[11..]),
            gbr_dl: get_u40(&v[16..]),
        })
    }

    pub fn as_paa(&self) -> GtpResult<Gtp2Paa> {
        let v = self.checked_value(Gtp2IeType::Paa)?;
        need(v, 1)?;
        let pdn_type = v[0] & 0x07;
        match pdn_type {
            1 => {
                need(v, 5)?;
                Ok(Gtp2Paa {
                    pdn_type,
                    ipv4: Some(ipv4_at(v, 1)),
                    ipv6_prefix_len: None,
                    ipv6: None,
                })
            }
            2 => {
                need(v, 18)?;
                Ok(Gtp2Paa {
                    pdn_type,
                    ipv4: None,
                    ipv6_prefix_len: Some(v[1]),
                    ipv6: Some(ipv6_at(v, 2)),
                })
            }
            3 => {
                need(v, 22)?;
                Ok(Gtp2Paa {
                    pdn_type,
                    ipv4: Some(ipv4_at(v, 18)),
                    ipv6_prefix_len: Some(v[1]),
                    ipv6: Some(ipv6_at(v, 2)),
                })
            }
            _ => Ok(Gtp2Paa {
                pdn_type,
                ipv4: None,
                ipv6_prefix_len: None,
                ipv6: None,
            }),
        }
    }

    pub fn as_pco(&self) -> GtpResult<Gtp2Pco> {
        self.checked_value(Gtp2IeType::Pco)?;
        let v = self.value();
        need(v, 1)?;
        let mut pco = Gtp2Pco {
            config_protocol: v[0] & 0x07,
            containers: Vec::new(),
        };
        let mut at = 1;
        while at < v.len() {
            need(&v[at..], 3)?;
            let id = u16::from_be_bytes([v[at], v[at + 1]]);
            let len = v[at + 2] as usize;
            need(&v[at + 3..], len)?;
            pco.containers.push(Gtp2PcoContainer {
                id,
                contents: v.slice(at + 3..at + 3 + len),
            });
            at += 3 + len;
        }
        Ok(pco)
    }

    pub fn as_serving_network(&self) -> GtpResult<Gtp2PlmnId> {
        Gtp2PlmnId::decode(self.checked_value(Gtp2IeType::ServingNetwork)?)
    }

    pub fn as_plmn_id(&self) -> GtpResult<Gtp2PlmnId> {
        Gtp2PlmnId::decode(self.checked_value(Gtp2IeType::PlmnId)?)
    }

    /// PLMN and trace ID
    pub fn as_trace_reference(&self) -> GtpResult<(Gtp2PlmnId, u32)> {
        let v = self.checked_value(Gtp2IeType::TraceReference)?;
        need(v, 6)?;
        Ok((Gtp2PlmnId::decode(v)?, get_u24(&v[3..])))
    }

    pub fn as_uli(&self) -> GtpResult<Gtp2Uli> {
        let v = self.checked_value(Gtp2IeType::Uli)?;
        need(v, 1)?;
        let flags = Gtp2UliFlags::decode(v[0]);
        let mut rest = &v[1..];
        let mut uli = Gtp2Uli::default();

        fn take<'a>(rest: &mut &'a [u8], n: usize) -> GtpResult<&'a [u8]> {
            need(rest, n)?;
            let (head, tail) = rest.split_at(n);
            *rest = tail;
            Ok(head)
        }
        let u16_at = |b: &[u8], at: usize| u16::from_be_bytes([b[at], b[at + 1]]);

        if flags.cgi {
            let b = take(&mut rest, 7)?;
            uli.cgi = Some(Gtp2Cgi {
                plmn: Gtp2PlmnId::decode(b)?,
                lac: u16_at(b, 3),
                ci: u16_at(b, 5),
            });
        }
        if flags.sai {
            let b = take(&mut rest, 7)?;
            uli.sai = Some(Gtp2Sai {
                plmn: Gtp2PlmnId::decode(b)?,
                lac: u16_at(b, 3),
                sac: u16_at(b, 5),
            });
        }
        if flags.rai {
            let b = take(&mut rest, 7)?;
            uli.rai = Some(Gtp2Rai {
                plmn: Gtp2PlmnId::decode(b)?,
                lac: u16_at(b, 3),
                rac: u16_at(b, 5),
            });
        }
        if flags.tai {
            let b = take(&mut rest, 5)?;
            uli.tai = Some(Gtp2Tai {
                plmn: Gtp2PlmnId::decode(b)?,
                tac: u16_at(b, 3),
            });
        }
        if flags.ecgi {
            let b = take(&mut rest, 7)?;
            uli.ecgi = Some(Gtp2Ecgi {
                plmn: Gtp2PlmnId::decode(b)?,
                eci: u32::from_be_bytes([b[3], b[4], b[5], b[6]]) & 0x0FFF_FFFF,
            });
        }
        if flags.lai {
            let b = take(&mut rest, 5)?;
            uli.lai = Some(Gtp2Lai {
                plmn: Gtp2PlmnId::decode(b)?,
                lac: u16_at(b, 3),
            });
        }
        Ok(uli)
    }
}
