//! Endpoint configuration

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::{GtpError, GtpResult};
use crate::v2::ie::GroupedIeTable;
use crate::GTPV2_C_UDP_PORT;

/// Settings of one GTPv2-C endpoint (`Conn`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnConfig {
    /// Address the datagram socket binds to
    pub local_addr: SocketAddr,
    /// F-TEID interface type naming this node's TEID in a session
    pub local_if_type: u8,
    /// Value of the Recovery IE in echo responses
    pub restart_counter: u8,
    /// Version and TEID checks on inbound messages
    pub validation: bool,
    /// Random draws before `new_local_teid` gives up
    pub teid_alloc_attempts: u32,
    /// Bound of each session's reply inbox
    pub inbox_capacity: usize,
    pub recv_buffer_size: usize,
    /// Vendor IE types decoded as grouped on top of the standard set
    pub extra_grouped_ie_types: Vec<u8>,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::from(([0, 0, 0, 0], GTPV2_C_UDP_PORT)),
            local_if_type: 0,
            restart_counter: 0,
            validation: true,
            teid_alloc_attempts: 1000,
            inbox_capacity: 8,
            recv_buffer_size: 65535,
            extra_grouped_ie_types: Vec::new(),
        }
    }
}

impl ConnConfig {
    pub fn new(local_addr: SocketAddr, local_if_type: u8) -> Self {
        Self {
            local_addr,
            local_if_type,
            ..Default::default()
        }
    }

    /// Parse a YAML mapping; absent keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> GtpResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| GtpError::Config(e.to_string()))
    }

    pub fn grouped_ie_table(&self) -> GroupedIeTable {
        GroupedIeTable::with_extra(&self.extra_grouped_ie_types)
    }
}
