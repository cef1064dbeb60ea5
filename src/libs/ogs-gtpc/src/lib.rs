//! NextGCore GTPv2-C Signaling Library
//!
//! This crate provides the GTPv2-C control plane engine: the IE and message
//! codec, the session/bearer store and the `Conn` signaling endpoint, as
//! specified in 3GPP TS 29.274.

pub mod config;
pub mod error;
pub mod v2;

#[cfg(test)]
mod property_tests;

pub use config::ConnConfig;
pub use error::{GtpError, GtpResult};

/// GTPv2-C UDP port (2123)
pub const GTPV2_C_UDP_PORT: u16 = 2123;
