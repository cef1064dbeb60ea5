//! GTPv2-C signaling endpoint
//!
//! A `Conn` owns one UDP socket, the handler table, the outbound sequence
//! counter and the two session indices (by local TEID and by IMSI). Every
//! inbound datagram is parsed on the read loop and dispatched on its own
//! task.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use super::handler::{default_handlers, HandlerFn};
use super::header::{Gtp2Header, Gtp2MessageType, GTP2_VERSION};
use super::ie::{GroupedIeTable, Gtp2Ie, Gtp2IeType};
use super::message::{required, CreateSessionRequest, Gtp2Message};
use super::session::{Session, Subscriber};
use super::types::{Gtp2Cause, MAX_U24};
use crate::config::ConnConfig;
use crate::error::{GtpError, GtpResult};

/// Value of the local TEID index
#[derive(Debug, Clone)]
enum TeidEntry {
    /// Minted by `new_local_teid`, no session yet
    Reserved,
    Session(Arc<Session>),
}

impl TeidEntry {
    fn session(&self) -> Option<&Arc<Session>> {
        match self {
            TeidEntry::Reserved => None,
            TeidEntry::Session(s) => Some(s),
        }
    }

    fn holds(&self, sess: &Arc<Session>) -> bool {
        self.session().is_some_and(|s| Arc::ptr_eq(s, sess))
    }
}

/// GTPv2-C endpoint
pub struct Conn {
    config: ConnConfig,
    grouped: GroupedIeTable,
    socket: OnceCell<Arc<UdpSocket>>,
    /// Last allocated sequence number
    sequence: Mutex<u32>,
    validation: AtomicBool,
    handlers: RwLock<HashMap<u8, HandlerFn>>,
    sessions_by_teid: DashMap<u32, TeidEntry>,
    sessions_by_imsi: DashMap<String, Arc<Session>>,
    /// Held while both indices change together
    index_lock: Mutex<()>,
    /// Requests inside their handler, keyed by peer and sequence. The flag
    /// is set once the handler sent a response.
    in_flight: DashMap<(SocketAddr, u32), bool>,
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("local_addr", &self.config.local_addr)
            .field("local_if_type", &self.config.local_if_type)
            .field("sessions", &self.sessions_by_imsi.len())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Conn {
    pub fn new(config: ConnConfig) -> Arc<Self> {
        Arc::new(Self {
            validation: AtomicBool::new(config.validation),
            grouped: config.grouped_ie_table(),
            config,
            socket: OnceCell::new(),
            sequence: Mutex::new(0),
            handlers: RwLock::new(default_handlers()),
            sessions_by_teid: DashMap::new(),
            sessions_by_imsi: DashMap::new(),
            index_lock: Mutex::new(()),
            in_flight: DashMap::new(),
        })
    }

    pub fn config(&self) -> &ConnConfig {
        &self.config
    }

    pub fn restart_counter(&self) -> u8 {
        self.config.restart_counter
    }

    pub fn local_if_type(&self) -> u8 {
        self.config.local_if_type
    }

    // ========================================================================
    // Socket
    // ========================================================================

    /// Bind the socket if not bound yet and return the bound address
    pub async fn bind(&self) -> GtpResult<SocketAddr> {
        let socket = self
            .socket
            .get_or_try_init(|| async {
                let socket = UdpSocket::bind(self.config.local_addr).await?;
                log::info!("GTPv2-C socket bound to {}", socket.local_addr()?);
                Ok::<_, GtpError>(Arc::new(socket))
            })
            .await?;
        Ok(socket.local_addr()?)
    }

    pub fn local_addr(&self) -> GtpResult<SocketAddr> {
        Ok(self.socket()?.local_addr()?)
    }

    fn socket(&self) -> GtpResult<&Arc<UdpSocket>> {
        self.socket.get().ok_or(GtpError::NotBound)
    }

    /// Read datagrams until `cancel` fires. Each datagram is parsed here and
    /// handled on a new task; unparsable datagrams are dropped.
    pub async fn listen_and_serve(self: &Arc<Self>, cancel: CancellationToken) -> GtpResult<()> {
        self.bind().await?;
        let socket = Arc::clone(self.socket()?);
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        log::info!("GTPv2-C serving on {}", socket.local_addr()?);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("GTPv2-C endpoint {} stopped", socket.local_addr()?);
                    return Ok(());
                }
                received = socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(r) => r,
                        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                            log::warn!("GTPv2-C recv: {e}");
                            continue;
                        }
                        Err(e) => {
                            log::error!("GTPv2-C socket error: {e}");
                            return Err(e.into());
                        }
                    };
                    log::debug!("GTPv2-C received {len} bytes from {peer}");

                    let msg = match Gtp2Message::parse_with(&buf[..len], &self.grouped) {
                        Ok(msg) => msg,
                        Err(e) => {
                            log::warn!("Dropping malformed datagram from {peer}: {e}");
                            continue;
                        }
                    };

                    let conn = Arc::clone(self);
                    tokio::spawn(async move {
                        match conn.handle(peer, msg).await {
                            Ok(()) => {}
                            Err(e @ GtpError::Handler { .. }) => log::error!("{e}"),
                            Err(e) => log::warn!("Dropped message from {peer}: {e}"),
                        }
                    });
                }
            }
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Validate and dispatch one inbound message to its handler
    pub async fn handle(self: &Arc<Self>, peer: SocketAddr, msg: Gtp2Message) -> GtpResult<()> {
        let message_type = msg.message_type();

        if self.validation_enabled() {
            if msg.header.version != GTP2_VERSION {
                let reply = Gtp2Message::version_not_supported(msg.sequence());
                if let Err(e) = self.write_message(peer, &reply).await {
                    log::warn!("Version Not Supported Indication to {peer} failed: {e}");
                }
                return Err(GtpError::InvalidVersion(msg.header.version));
            }

            if let Some(teid) = msg.header.teid.filter(|t| *t != 0) {
                if let Err(e) = self.get_session_by_teid(teid, peer) {
                    if msg.is_request() {
                        self.auto_reject(peer, &msg.header, &e).await;
                    }
                    return Err(e);
                }
            }
        }

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message_type)
            .cloned()
            .ok_or(GtpError::HandlerNotFound(message_type))?;

        let is_request = msg.is_request();
        let request_header = msg.header.clone();
        let key = (peer, request_header.sequence_number);
        if is_request {
            self.in_flight.entry(key).or_insert(false);
        }
        let result = handler(Arc::clone(self), peer, msg).await;
        let answered = is_request && self.in_flight.remove(&key).is_some_and(|(_, done)| done);

        if let Err(e) = result {
            if is_request && !answered {
                self.auto_reject(peer, &request_header, &e).await;
            }
            return Err(e.in_handler(message_type, peer));
        }
        Ok(())
    }

    fn mark_answered(&self, peer: SocketAddr, sequence: u32) {
        if let Some(mut done) = self.in_flight.get_mut(&(peer, sequence)) {
            *done = true;
        }
    }

    /// Answer a failed request with a negative response where the failure
    /// maps to a cause. Skipped by `handle` when the handler already
    /// answered through `respond_to` or `reject`.
    async fn auto_reject(&self, peer: SocketAddr, request: &Gtp2Header, err: &GtpError) {
        let cause = match err.root() {
            GtpError::RequiredFieldMissing { ie_type } => {
                Gtp2Ie::cause_with_offending(Gtp2Cause::MandatoryIeMissing as u8, *ie_type, 0)
            }
            GtpError::InvalidTeid(_) | GtpError::UnknownImsi(_) => {
                Gtp2Ie::cause(Gtp2Cause::ContextNotFound as u8)
            }
            _ => return,
        };
        if let Err(e) = self.reply_with_cause(peer, request, cause).await {
            log::warn!("Negative response to {peer} failed: {e}");
        }
    }

    async fn reply_with_cause(&self, peer: SocketAddr, request: &Gtp2Header, cause: Gtp2Ie) -> GtpResult<()> {
        let response_type = Gtp2MessageType::try_from(request.message_type)?
            .response_type()
            .ok_or(GtpError::InvalidMessageType(request.message_type))?;
        let reply = Gtp2Message::from_ies(response_type as u8, 0, request.sequence_number, vec![cause]);
        log::debug!(
            "Rejecting message type {} seq {:#08x} from {peer}",
            request.message_type,
            request.sequence_number
        );
        self.write_message(peer, &reply).await
    }

    /// Send a negative response to `request` carrying `cause` and, when
    /// given, the offending IE type and instance
    pub async fn reject(
        &self,
        peer: SocketAddr,
        request: &Gtp2Message,
        cause: u8,
        offending: Option<(u8, u8)>,
    ) -> GtpResult<()> {
        let cause = match offending {
            Some((ie_type, instance)) => Gtp2Ie::cause_with_offending(cause, ie_type, instance),
            None => Gtp2Ie::cause(cause),
        };
        self.reply_with_cause(peer, &request.header, cause).await?;
        self.mark_answered(peer, request.sequence());
        Ok(())
    }

    /// Register or replace the handler for a message type
    pub fn add_handler(&self, message_type: u8, handler: HandlerFn) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(message_type, handler);
    }

    pub fn add_handlers(&self, handlers: HashMap<u8, HandlerFn>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handlers);
    }

    pub fn enable_validation(&self) {
        self.validation.store(true, Ordering::Release);
    }

    pub fn disable_validation(&self) {
        self.validation.store(false, Ordering::Release);
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation.load(Ordering::Acquire)
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Last allocated sequence number
    pub fn sequence(&self) -> u32 {
        *lock(&self.sequence)
    }

    fn next_sequence(&self) -> u32 {
        let mut seq = lock(&self.sequence);
        *seq = if *seq >= MAX_U24 { 0 } else { *seq + 1 };
        *seq
    }

    /// Give back `seq` after a failed send. A number already followed by
    /// another allocation stays burnt so no value is handed out twice.
    fn release_sequence(&self, seq: u32) {
        let mut current = lock(&self.sequence);
        if *current == seq {
            *current = if seq == 0 { MAX_U24 } else { seq - 1 };
        }
    }

    /// Stamp the next sequence number into `msg` and send it to `addr`
    pub async fn send(&self, addr: SocketAddr, mut msg: Gtp2Message) -> GtpResult<u32> {
        let seq = self.next_sequence();
        msg.set_sequence(seq);
        if let Err(e) = self.write_message(addr, &msg).await {
            self.release_sequence(seq);
            return Err(e);
        }
        Ok(seq)
    }

    /// Send `to_send` as the answer to `received`, reusing its sequence
    pub async fn respond_to(
        &self,
        addr: SocketAddr,
        received: &Gtp2Message,
        mut to_send: Gtp2Message,
    ) -> GtpResult<()> {
        to_send.set_sequence(received.sequence());
        self.write_message(addr, &to_send).await?;
        self.mark_answered(addr, received.sequence());
        Ok(())
    }

    async fn write_message(&self, addr: SocketAddr, msg: &Gtp2Message) -> GtpResult<()> {
        let bytes = msg.marshal()?;
        let socket = self.socket()?;
        socket.send_to(&bytes, addr).await?;
        log::debug!(
            "GTPv2-C sent type {} seq {:#08x} ({} bytes) to {addr}",
            msg.message_type(),
            msg.sequence(),
            bytes.len()
        );
        Ok(())
    }

    pub async fn echo(&self, addr: SocketAddr) -> GtpResult<u32> {
        self.send(addr, Gtp2Message::echo_request(0, self.restart_counter()))
            .await
    }

    // ========================================================================
    // Message builders
    // ========================================================================

    /// Send a Create Session Request built from `ies` and return the
    /// session it describes with the sequence used.
    ///
    /// When the sender F-TEID is a TEID reserved by [`Conn::new_local_teid`]
    /// the session is registered before the request leaves, and the TEID
    /// goes back to reserved if the send fails. A session already indexed
    /// for the same IMSI is only replaced once the request was sent.
    pub async fn create_session(
        &self,
        addr: SocketAddr,
        ies: Vec<Gtp2Ie>,
    ) -> GtpResult<(Arc<Session>, u32)> {
        let msg = Gtp2Message::from_ies(Gtp2MessageType::CreateSessionRequest as u8, 0, 0, ies);
        let sess = self.parse_create_session(addr, msg.body_as::<CreateSessionRequest>()?)?;

        let local_teid = sess
            .get_teid(self.config.local_if_type)
            .ok()
            .filter(|teid| self.is_reserved(*teid));
        let registered = match local_teid {
            Some(teid) => self.index_session(teid, &sess, false)?,
            None => false,
        };

        match self.send(addr, msg).await {
            Ok(seq) => {
                if let (Some(teid), false) = (local_teid, registered) {
                    self.register_session(teid, &sess)?;
                }
                Ok((sess, seq))
            }
            Err(e) => {
                if let (Some(teid), true) = (local_teid, registered) {
                    self.unregister(teid, &sess);
                }
                Err(e)
            }
        }
    }

    pub async fn modify_bearer(&self, addr: SocketAddr, teid: u32, ies: Vec<Gtp2Ie>) -> GtpResult<u32> {
        let msg = Gtp2Message::from_ies(Gtp2MessageType::ModifyBearerRequest as u8, teid, 0, ies);
        self.send(addr, msg).await
    }

    pub async fn delete_session(&self, addr: SocketAddr, teid: u32, ies: Vec<Gtp2Ie>) -> GtpResult<u32> {
        let msg = Gtp2Message::from_ies(Gtp2MessageType::DeleteSessionRequest as u8, teid, 0, ies);
        self.send(addr, msg).await
    }

    pub async fn delete_bearer(&self, addr: SocketAddr, teid: u32, ies: Vec<Gtp2Ie>) -> GtpResult<u32> {
        let msg = Gtp2Message::from_ies(Gtp2MessageType::DeleteBearerRequest as u8, teid, 0, ies);
        self.send(addr, msg).await
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Unregistered session bound to `peer`
    pub fn new_session(&self, peer: SocketAddr, subscriber: Subscriber) -> Arc<Session> {
        Session::with_inbox_capacity(peer, subscriber, self.config.inbox_capacity)
    }

    /// Build an unregistered session from a Create Session Request.
    ///
    /// The F-TEIDs are recorded under their own interface types and the
    /// first bearer context to be created fills the default bearer.
    pub fn parse_create_session(
        &self,
        peer: SocketAddr,
        req: &CreateSessionRequest,
    ) -> GtpResult<Arc<Session>> {
        let imsi = required(&req.imsi, Gtp2IeType::Imsi)?.as_imsi()?;
        let mut subscriber = Subscriber::new(&imsi);
        if let Some(ie) = &req.msisdn {
            subscriber.msisdn = ie.as_msisdn()?;
        }
        if let Some(ie) = &req.mei {
            subscriber.imei = ie.as_mei()?;
        }
        if let Some(ie) = &req.rat_type {
            subscriber.location.rat_type = ie.as_rat_type()?;
        }
        if let Some(ie) = &req.serving_network {
            let plmn = ie.as_serving_network()?;
            subscriber.location.mcc = plmn.mcc;
            subscriber.location.mnc = plmn.mnc;
        }
        if let Some(ie) = &req.uli {
            let uli = ie.as_uli()?;
            let loc = &mut subscriber.location;
            if let Some(cgi) = uli.cgi {
                loc.lac = cgi.lac;
                loc.ci = cgi.ci;
            }
            if let Some(sai) = uli.sai {
                loc.lac = sai.lac;
                loc.sac = sai.sac;
            }
            if let Some(rai) = uli.rai {
                loc.lac = rai.lac;
                loc.rac = rai.rac;
            }
            if let Some(tai) = uli.tai {
                loc.tac = tai.tac;
            }
            if let Some(ecgi) = uli.ecgi {
                loc.eci = ecgi.eci;
            }
            if let Some(lai) = uli.lai {
                loc.lac = lai.lac;
            }
        }

        let sess = self.new_session(peer, subscriber);

        for ie in [&req.sender_fteid, &req.pgw_s5s8_fteid].into_iter().flatten() {
            let fteid = ie.as_fteid()?;
            sess.add_teid(fteid.interface_type, fteid.teid);
        }

        let mut bearer = sess.default_bearer();
        if let Some(ie) = &req.apn {
            bearer.apn = ie.as_apn()?;
        }
        if let Some(ie) = &req.ambr {
            bearer.ambr = ie.as_ambr()?;
        }
        if let Some(ie) = &req.paa {
            let paa = ie.as_paa()?;
            bearer.subscriber_ip = paa.ipv4.map(Into::into).or(paa.ipv6.map(Into::into));
        }
        if let Some(bc) = req.bearer_contexts_to_be_created.first() {
            bearer.ebi = bc.as_ebi()?;
            if let Ok(qos) = bc.as_bearer_qos() {
                bearer.qos = qos;
            }
            if let Some(ie) = bc.find_all(Gtp2IeType::FTeid).next() {
                let fteid = ie.as_fteid()?;
                bearer.outgoing_teid = fteid.teid;
                bearer.remote_address = fteid.ipv4.map(Into::into).or(fteid.ipv6.map(Into::into));
            }
        }
        sess.set_default_bearer(bearer);

        Ok(sess)
    }

    /// Mint a random non-zero TEID, reserve it in the local TEID index and
    /// return it as an F-TEID of this Conn's interface type. `None` when
    /// every attempt hit a taken value.
    pub fn new_local_teid(&self, ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> Option<Gtp2Ie> {
        for _ in 0..self.config.teid_alloc_attempts {
            let teid: u32 = rand::random();
            if teid == 0 {
                continue;
            }
            if let Entry::Vacant(slot) = self.sessions_by_teid.entry(teid) {
                slot.insert(TeidEntry::Reserved);
                log::trace!("Reserved local TEID {teid:#010x}");
                return Some(Gtp2Ie::fteid(self.config.local_if_type, teid, ipv4, ipv6));
            }
        }
        log::warn!(
            "No free local TEID after {} attempts",
            self.config.teid_alloc_attempts
        );
        None
    }

    /// Drop a reservation that never got a session
    pub fn release_teid(&self, teid: u32) -> bool {
        self.sessions_by_teid
            .remove_if(&teid, |_, e| matches!(e, TeidEntry::Reserved))
            .is_some()
    }

    fn is_reserved(&self, teid: u32) -> bool {
        self.sessions_by_teid
            .get(&teid)
            .is_some_and(|e| matches!(e.value(), TeidEntry::Reserved))
    }

    /// Index `sess` under `local_teid` and its IMSI, and record the TEID in
    /// the session under this Conn's interface type. A session already
    /// indexed for the same IMSI is replaced and removed.
    ///
    /// `local_teid` must be reserved by [`Conn::new_local_teid`] or already
    /// held by `sess`. Any other TEID fails with `InvalidTeid`.
    pub fn register_session(&self, local_teid: u32, sess: &Arc<Session>) -> GtpResult<()> {
        self.index_session(local_teid, sess, true).map(|_| ())
    }

    /// Without `replace` nothing is indexed while another session holds the
    /// IMSI. Returns whether `sess` got indexed.
    fn index_session(&self, local_teid: u32, sess: &Arc<Session>, replace: bool) -> GtpResult<bool> {
        let _guard = lock(&self.index_lock);

        if sess.is_removed() {
            return Err(GtpError::SessionRemoved);
        }
        let imsi = sess.imsi();
        if imsi.is_empty() {
            return Err(GtpError::MissingIdentity);
        }
        let usable = self
            .sessions_by_teid
            .get(&local_teid)
            .is_some_and(|e| matches!(e.value(), TeidEntry::Reserved) || e.holds(sess));
        if !usable {
            return Err(GtpError::InvalidTeid(local_teid));
        }

        let previous = self
            .sessions_by_imsi
            .get(&imsi)
            .map(|e| Arc::clone(e.value()));
        if let Some(old) = previous.filter(|old| !Arc::ptr_eq(old, sess)) {
            if !replace {
                return Ok(false);
            }
            log::info!("Session for IMSI {imsi} replaced");
            old.mark_removed();
            self.unindex(&old);
        }

        // moving to a new TEID drops the old entry
        if let Ok(prev_teid) = sess.get_teid(self.config.local_if_type) {
            if prev_teid != local_teid {
                self.sessions_by_teid
                    .remove_if(&prev_teid, |_, e| e.holds(sess));
            }
        }

        self.sessions_by_teid
            .insert(local_teid, TeidEntry::Session(Arc::clone(sess)));
        self.sessions_by_imsi.insert(imsi.clone(), Arc::clone(sess));
        sess.add_teid(self.config.local_if_type, local_teid);
        log::debug!("Session {imsi} registered under TEID {local_teid:#010x}");
        Ok(true)
    }

    /// Drop `sess` from both indices for good. Returns false if it was
    /// already removed.
    pub fn remove_session(&self, sess: &Arc<Session>) -> bool {
        let _guard = lock(&self.index_lock);
        if !sess.mark_removed() {
            return false;
        }
        self.unindex(sess);
        log::debug!("Session {} removed", sess.imsi());
        true
    }

    /// Undo a registration without retiring the session and put `teid`
    /// back to reserved
    fn unregister(&self, teid: u32, sess: &Arc<Session>) {
        let _guard = lock(&self.index_lock);
        self.unindex(sess);
        sess.remove_teid(self.config.local_if_type);
        self.sessions_by_teid.entry(teid).or_insert(TeidEntry::Reserved);
    }

    fn unindex(&self, sess: &Arc<Session>) {
        let imsi = sess.imsi();
        self.sessions_by_imsi
            .remove_if(&imsi, |_, s| Arc::ptr_eq(s, sess));

        match sess.get_teid(self.config.local_if_type) {
            Ok(teid) => {
                self.sessions_by_teid.remove_if(&teid, |_, e| e.holds(sess));
            }
            Err(_) => {
                log::warn!("Session {imsi} has no local TEID, scanning the TEID index");
                self.sessions_by_teid.retain(|_, e| match e.session() {
                    Some(s) => s.imsi() != imsi,
                    None => true,
                });
            }
        }
    }

    /// Session indexed under `teid`, provided it belongs to `peer`
    pub fn get_session_by_teid(&self, teid: u32, peer: SocketAddr) -> GtpResult<Arc<Session>> {
        self.sessions_by_teid
            .get(&teid)
            .and_then(|e| e.session().cloned())
            .filter(|s| s.peer_addr() == peer)
            .ok_or(GtpError::InvalidTeid(teid))
    }

    pub fn get_session_by_imsi(&self, imsi: &str) -> GtpResult<Arc<Session>> {
        self.sessions_by_imsi
            .get(imsi)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| GtpError::UnknownImsi(imsi.to_string()))
    }

    pub fn get_imsi_by_teid(&self, teid: u32, peer: SocketAddr) -> GtpResult<String> {
        Ok(self.get_session_by_teid(teid, peer)?.imsi())
    }

    pub fn session_count(&self) -> usize {
        self.sessions_by_imsi.len()
    }

    /// Bearers across all registered sessions
    pub fn bearer_count(&self) -> usize {
        self.sessions().iter().map(|s| s.bearer_count()).sum()
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions_by_imsi
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    #[cfg(test)]
    fn force_sequence(&self, seq: u32) {
        *lock(&self.sequence) = seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v2::types::Gtp2FTeidInterfaceType;

    fn conn() -> Arc<Conn> {
        Conn::new(ConnConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            Gtp2FTeidInterfaceType::S11MmeGtpC as u8,
        ))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:2123".parse().unwrap()
    }

    fn reserve(c: &Conn) -> u32 {
        c.new_local_teid(None, None).unwrap().as_teid().unwrap()
    }

    #[test]
    fn test_sequence_wraps_to_zero() {
        let c = conn();
        c.force_sequence(MAX_U24 - 1);
        assert_eq!(c.next_sequence(), MAX_U24);
        assert_eq!(c.next_sequence(), 0);
        assert_eq!(c.next_sequence(), 1);
    }

    #[test]
    fn test_release_only_latest_sequence() {
        let c = conn();
        let a = c.next_sequence();
        let b = c.next_sequence();
        c.release_sequence(a);
        assert_eq!(c.sequence(), b);
        c.release_sequence(b);
        assert_eq!(c.sequence(), a);
    }

    #[tokio::test]
    async fn test_send_unbound_restores_sequence() {
        let c = conn();
        c.force_sequence(41);
        let err = c.send(peer(), Gtp2Message::echo_request(0, 0)).await.unwrap_err();
        assert_eq!(err, GtpError::NotBound);
        assert_eq!(c.sequence(), 41);
    }

    #[test]
    fn test_new_local_teid_reserves() {
        let c = conn();
        let ie = c.new_local_teid(Some(Ipv4Addr::LOCALHOST), None).unwrap();
        let fteid = ie.as_fteid().unwrap();
        assert_ne!(fteid.teid, 0);
        assert_eq!(fteid.interface_type, Gtp2FTeidInterfaceType::S11MmeGtpC as u8);
        assert!(c.is_reserved(fteid.teid));
        // a reservation is not a session
        assert_eq!(c.session_count(), 0);
        assert!(c.get_session_by_teid(fteid.teid, peer()).is_err());
        assert!(c.release_teid(fteid.teid));
        assert!(!c.is_reserved(fteid.teid));
    }

    #[test]
    fn test_new_local_teid_unique() {
        let c = conn();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            let teid = c.new_local_teid(None, None).unwrap().as_teid().unwrap();
            assert!(seen.insert(teid));
        }
    }

    #[test]
    fn test_new_local_teid_zero_attempts() {
        let mut config = ConnConfig::new("127.0.0.1:0".parse().unwrap(), 10);
        config.teid_alloc_attempts = 0;
        assert!(Conn::new(config).new_local_teid(None, None).is_none());
    }

    #[test]
    fn test_register_and_remove_keep_indices_coherent() {
        let c = conn();
        let teid = reserve(&c);
        let sess = c.new_session(peer(), Subscriber::new("001010000000001"));
        c.register_session(teid, &sess).unwrap();

        assert!(Arc::ptr_eq(&c.get_session_by_teid(teid, peer()).unwrap(), &sess));
        assert!(Arc::ptr_eq(&c.get_session_by_imsi("001010000000001").unwrap(), &sess));
        assert_eq!(sess.get_teid(c.local_if_type()).unwrap(), teid);
        assert_eq!(c.get_imsi_by_teid(teid, peer()).unwrap(), "001010000000001");
        // registering again under the same TEID is a no-op
        c.register_session(teid, &sess).unwrap();
        assert_eq!(c.session_count(), 1);

        // wrong peer
        let other: SocketAddr = "127.0.0.2:2123".parse().unwrap();
        assert_eq!(c.get_session_by_teid(teid, other).unwrap_err(), GtpError::InvalidTeid(teid));

        assert!(c.remove_session(&sess));
        assert!(!c.remove_session(&sess));
        assert!(c.get_session_by_teid(teid, peer()).is_err());
        assert!(matches!(
            c.get_session_by_imsi("001010000000001"),
            Err(GtpError::UnknownImsi(_))
        ));
        assert_eq!(c.register_session(reserve(&c), &sess), Err(GtpError::SessionRemoved));
    }

    #[test]
    fn test_remove_falls_back_to_scan() {
        let c = conn();
        let teid = reserve(&c);
        let sess = c.new_session(peer(), Subscriber::new("001010000000002"));
        c.register_session(teid, &sess).unwrap();
        sess.remove_teid(c.local_if_type());

        assert!(c.remove_session(&sess));
        assert!(c.get_session_by_teid(teid, peer()).is_err());
        assert!(c.sessions_by_teid.is_empty());
    }

    #[test]
    fn test_register_replaces_same_imsi() {
        let c = conn();
        let (old_teid, new_teid) = (reserve(&c), reserve(&c));
        let old = c.new_session(peer(), Subscriber::new("001010000000003"));
        let new = c.new_session(peer(), Subscriber::new("001010000000003"));
        c.register_session(old_teid, &old).unwrap();
        c.register_session(new_teid, &new).unwrap();

        assert_eq!(c.session_count(), 1);
        assert!(old.is_removed());
        assert!(c.get_session_by_teid(old_teid, peer()).is_err());
        assert!(Arc::ptr_eq(&c.get_session_by_teid(new_teid, peer()).unwrap(), &new));
    }

    #[test]
    fn test_register_moves_teid() {
        let c = conn();
        let (first, second) = (reserve(&c), reserve(&c));
        let sess = c.new_session(peer(), Subscriber::new("001010000000004"));
        c.register_session(first, &sess).unwrap();
        c.register_session(second, &sess).unwrap();
        assert!(c.get_session_by_teid(first, peer()).is_err());
        assert_eq!(c.sessions_by_teid.len(), 1);
    }

    #[test]
    fn test_register_rejects_taken_teid() {
        let c = conn();
        let teid = reserve(&c);
        let a = c.new_session(peer(), Subscriber::new("001010000000005"));
        let b = c.new_session(peer(), Subscriber::new("001010000000006"));
        c.register_session(teid, &a).unwrap();
        assert_eq!(c.register_session(teid, &b), Err(GtpError::InvalidTeid(teid)));
    }

    #[test]
    fn test_register_rejects_unreserved_teid() {
        let c = conn();
        let sess = c.new_session(peer(), Subscriber::new("001010000000007"));
        assert_eq!(c.register_session(0x700, &sess), Err(GtpError::InvalidTeid(0x700)));

        // a released reservation is no longer usable
        let teid = reserve(&c);
        assert!(c.release_teid(teid));
        assert_eq!(c.register_session(teid, &sess), Err(GtpError::InvalidTeid(teid)));
        assert_eq!(c.session_count(), 0);
        assert!(c.sessions_by_teid.is_empty());
    }

    #[test]
    fn test_register_requires_imsi() {
        let c = conn();
        let sess = c.new_session(peer(), Subscriber::default());
        assert_eq!(c.register_session(reserve(&c), &sess), Err(GtpError::MissingIdentity));
    }

    #[test]
    fn test_parse_create_session_requires_imsi() {
        let c = conn();
        let req = CreateSessionRequest::default();
        assert_eq!(
            c.parse_create_session(peer(), &req).unwrap_err(),
            GtpError::RequiredFieldMissing { ie_type: Gtp2IeType::Imsi as u8 }
        );
    }

    #[test]
    fn test_parse_create_session_fills_session() {
        use crate::v2::message::MessageBody;

        let c = conn();
        let req = CreateSessionRequest::from_ies(vec![
            Gtp2Ie::imsi("123451234567890").unwrap(),
            Gtp2Ie::msisdn("8130").unwrap(),
            Gtp2Ie::fteid(10, 0xAAAA, Some(Ipv4Addr::LOCALHOST), None),
            Gtp2Ie::apn("internet").unwrap(),
            Gtp2Ie::bearer_context(vec![
                Gtp2Ie::ebi(5),
                Gtp2Ie::fteid(0, 0xBBBB, Some(Ipv4Addr::new(10, 0, 0, 9)), None),
            ]),
        ]);
        let sess = c.parse_create_session(peer(), &req).unwrap();

        assert_eq!(sess.imsi(), "123451234567890");
        assert_eq!(sess.subscriber().msisdn, "8130");
        assert_eq!(sess.get_teid(10).unwrap(), 0xAAAA);
        let bearer = sess.default_bearer();
        assert_eq!(bearer.ebi, 5);
        assert_eq!(bearer.apn, "internet");
        assert_eq!(bearer.outgoing_teid, 0xBBBB);
        assert_eq!(bearer.remote_address, Some(Ipv4Addr::new(10, 0, 0, 9).into()));
        assert_eq!(c.session_count(), 0);
    }
}
