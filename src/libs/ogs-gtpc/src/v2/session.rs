//! GTPv2 Sessions and Bearers
//!
//! A `Session` is shared as `Arc<Session>` between the Conn indices and any
//! handler task working on it. Mutable state sits behind a per-session lock;
//! the reply inbox is a bounded channel used to hand a message from one
//! dispatch task to another task waiting in [`Session::await_reply`].

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use super::ie::{Gtp2Ambr, Gtp2BearerQos};
use super::message::Gtp2Message;
use crate::error::{GtpError, GtpResult};

/// Name of the bearer every session is created with
pub const DEFAULT_BEARER: &str = "default";

/// Inbox bound used by [`Session::new`]
pub const DEFAULT_INBOX_CAPACITY: usize = 8;

/// Subscriber location as last reported
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub mcc: String,
    pub mnc: String,
    pub rat_type: u8,
    pub lac: u16,
    pub ci: u16,
    pub sac: u16,
    pub rac: u16,
    pub tac: u16,
    pub eci: u32,
}

/// Subscriber identity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscriber {
    pub imsi: String,
    pub msisdn: String,
    pub imei: String,
    pub location: Location,
}

impl Subscriber {
    pub fn new(imsi: &str) -> Self {
        Self {
            imsi: imsi.to_string(),
            ..Default::default()
        }
    }
}

/// One EPS bearer of a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bearer {
    pub name: String,
    pub ebi: u8,
    pub qos: Gtp2BearerQos,
    pub ambr: Gtp2Ambr,
    pub apn: String,
    pub subscriber_ip: Option<IpAddr>,
    pub charging_id: u32,
    /// TEID this node receives user plane traffic on
    pub incoming_teid: u32,
    /// TEID of the peer's user plane endpoint
    pub outgoing_teid: u32,
    pub remote_address: Option<IpAddr>,
}

impl Bearer {
    pub fn new(ebi: u8, apn: &str) -> Self {
        Self {
            ebi,
            apn: apn.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct SessionState {
    subscriber: Subscriber,
    teids: HashMap<u8, u32>,
    bearers: HashMap<String, Bearer>,
    is_active: bool,
}

/// Per-subscriber signaling state
#[derive(Debug)]
pub struct Session {
    peer_addr: SocketAddr,
    state: Mutex<SessionState>,
    inbox_tx: mpsc::Sender<Gtp2Message>,
    inbox_rx: tokio::sync::Mutex<mpsc::Receiver<Gtp2Message>>,
    removed: AtomicBool,
}

impl Session {
    /// New inactive session owning a default bearer
    pub fn new(peer_addr: SocketAddr, subscriber: Subscriber) -> Arc<Self> {
        Self::with_inbox_capacity(peer_addr, subscriber, DEFAULT_INBOX_CAPACITY)
    }

    pub fn with_inbox_capacity(
        peer_addr: SocketAddr,
        subscriber: Subscriber,
        capacity: usize,
    ) -> Arc<Self> {
        let (inbox_tx, inbox_rx) = mpsc::channel(capacity.max(1));
        let mut bearers = HashMap::new();
        bearers.insert(
            DEFAULT_BEARER.to_string(),
            Bearer {
                name: DEFAULT_BEARER.to_string(),
                ..Default::default()
            },
        );
        Arc::new(Self {
            peer_addr,
            state: Mutex::new(SessionState {
                subscriber,
                teids: HashMap::new(),
                bearers,
                is_active: false,
            }),
            inbox_tx,
            inbox_rx: tokio::sync::Mutex::new(inbox_rx),
            removed: AtomicBool::new(false),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    // ------------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------------

    /// Mark the session active; requires an IMSI
    pub fn activate(&self) -> GtpResult<()> {
        let mut state = self.state();
        if state.subscriber.imsi.is_empty() {
            return Err(GtpError::MissingIdentity);
        }
        state.is_active = true;
        Ok(())
    }

    pub fn deactivate(&self) {
        self.state().is_active = false;
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active
    }

    // ------------------------------------------------------------------------
    // Subscriber
    // ------------------------------------------------------------------------

    pub fn imsi(&self) -> String {
        self.state().subscriber.imsi.clone()
    }

    pub fn subscriber(&self) -> Subscriber {
        self.state().subscriber.clone()
    }

    /// Mutate the subscriber under the session lock
    pub fn update_subscriber<R>(&self, f: impl FnOnce(&mut Subscriber) -> R) -> R {
        f(&mut self.state().subscriber)
    }

    // ------------------------------------------------------------------------
    // TEIDs
    // ------------------------------------------------------------------------

    /// Record the TEID used on one interface, replacing any previous value
    pub fn add_teid(&self, interface_type: u8, teid: u32) {
        self.state().teids.insert(interface_type, teid);
    }

    pub fn get_teid(&self, interface_type: u8) -> GtpResult<u32> {
        self.state()
            .teids
            .get(&interface_type)
            .copied()
            .ok_or_else(|| GtpError::NotFound(format!("TEID for interface type {interface_type}")))
    }

    pub(crate) fn remove_teid(&self, interface_type: u8) -> Option<u32> {
        self.state().teids.remove(&interface_type)
    }

    // ------------------------------------------------------------------------
    // Bearers
    // ------------------------------------------------------------------------

    /// Store `bearer` under `name`, replacing a bearer of the same name
    pub fn add_bearer(&self, name: &str, mut bearer: Bearer) {
        bearer.name = name.to_string();
        self.state().bearers.insert(name.to_string(), bearer);
    }

    pub fn remove_bearer(&self, name: &str) -> GtpResult<Bearer> {
        if name == DEFAULT_BEARER {
            return Err(GtpError::DefaultBearerRemoval);
        }
        self.state()
            .bearers
            .remove(name)
            .ok_or_else(|| GtpError::NotFound(format!("bearer {name}")))
    }

    pub fn remove_bearer_by_ebi(&self, ebi: u8) -> GtpResult<Bearer> {
        let name = self.bearer_name_by_ebi(ebi)?;
        self.remove_bearer(&name)
    }

    pub fn lookup_bearer(&self, name: &str) -> GtpResult<Bearer> {
        self.state()
            .bearers
            .get(name)
            .cloned()
            .ok_or_else(|| GtpError::NotFound(format!("bearer {name}")))
    }

    pub fn lookup_bearer_by_ebi(&self, ebi: u8) -> GtpResult<Bearer> {
        self.state()
            .bearers
            .values()
            .find(|b| b.ebi == ebi)
            .cloned()
            .ok_or_else(|| GtpError::NotFound(format!("bearer with EBI {ebi}")))
    }

    /// Name of the bearer carrying `ebi`. The default bearer wins when
    /// several bearers share an EBI.
    pub fn bearer_name_by_ebi(&self, ebi: u8) -> GtpResult<String> {
        let state = self.state();
        if state.bearers.get(DEFAULT_BEARER).is_some_and(|b| b.ebi == ebi) {
            return Ok(DEFAULT_BEARER.to_string());
        }
        state
            .bearers
            .values()
            .find(|b| b.ebi == ebi)
            .map(|b| b.name.clone())
            .ok_or_else(|| GtpError::NotFound(format!("bearer with EBI {ebi}")))
    }

    pub fn default_bearer(&self) -> Bearer {
        self.state()
            .bearers
            .get(DEFAULT_BEARER)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the default bearer
    pub fn set_default_bearer(&self, bearer: Bearer) {
        self.add_bearer(DEFAULT_BEARER, bearer);
    }

    /// Mutate a bearer in place under the session lock
    pub fn update_bearer<R>(&self, name: &str, f: impl FnOnce(&mut Bearer) -> R) -> GtpResult<R> {
        let mut state = self.state();
        let bearer = state
            .bearers
            .get_mut(name)
            .ok_or_else(|| GtpError::NotFound(format!("bearer {name}")))?;
        Ok(f(bearer))
    }

    pub fn bearer_count(&self) -> usize {
        self.state().bearers.len()
    }

    pub fn bearer_names(&self) -> Vec<String> {
        self.state().bearers.keys().cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Reply hand-off
    // ------------------------------------------------------------------------

    /// Wait for the next message handed to this session and check that it
    /// answers `expected_sequence`.
    ///
    /// Only one waiter per session is expected; concurrent waiters take
    /// messages in turn.
    pub async fn await_reply(
        &self,
        expected_sequence: u32,
        timeout: Duration,
    ) -> GtpResult<Gtp2Message> {
        let received = tokio::time::timeout(timeout, async {
            let mut inbox = self.inbox_rx.lock().await;
            inbox.recv().await
        })
        .await;

        let msg = match received {
            Ok(Some(msg)) => msg,
            Ok(None) | Err(_) => return Err(GtpError::Timeout),
        };

        if msg.sequence() != expected_sequence {
            log::warn!(
                "Session {}: reply sequence {:#08x} does not match {:#08x}",
                self.imsi(),
                msg.sequence(),
                expected_sequence
            );
            return Err(GtpError::SequenceMismatch {
                expected: expected_sequence,
                actual: msg.sequence(),
            });
        }
        Ok(msg)
    }

    pub(crate) async fn push_inbox(&self, msg: Gtp2Message, timeout: Duration) -> GtpResult<()> {
        match tokio::time::timeout(timeout, self.inbox_tx.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(GtpError::Timeout),
        }
    }

    // ------------------------------------------------------------------------
    // Conn bookkeeping
    // ------------------------------------------------------------------------

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Returns false when the session was already removed
    pub(crate) fn mark_removed(&self) -> bool {
        !self.removed.swap(true, Ordering::AcqRel)
    }
}

/// Hand `msg` to the task waiting on `session`, waiting up to `timeout` for
/// room in its inbox.
pub async fn deliver(session: &Session, msg: Gtp2Message, timeout: Duration) -> GtpResult<()> {
    log::debug!(
        "Delivering message type {} seq {:#08x} to session {}",
        msg.message_type(),
        msg.sequence(),
        session.imsi()
    );
    session.push_inbox(msg, timeout).await
}
