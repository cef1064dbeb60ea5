//! Message handlers
//!
//! Handlers are looked up by message type when a datagram arrives and run on
//! their own task. Errors they return are logged at the dispatch boundary,
//! and a failed request gets a negative response there unless the handler
//! already answered it with `Conn::respond_to` or `Conn::reject`.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use super::conn::Conn;
use super::header::Gtp2MessageType;
use super::message::Gtp2Message;
use crate::error::GtpResult;

/// Boxed future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = GtpResult<()>> + Send>>;

/// Handler for one inbound message type
pub type HandlerFn = Arc<dyn Fn(Arc<Conn>, SocketAddr, Gtp2Message) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`HandlerFn`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Arc<Conn>, SocketAddr, Gtp2Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = GtpResult<()>> + Send + 'static,
{
    Arc::new(move |conn, peer, msg| Box::pin(f(conn, peer, msg)))
}

/// Handlers installed on every new Conn
pub fn default_handlers() -> HashMap<u8, HandlerFn> {
    let mut handlers: HashMap<u8, HandlerFn> = HashMap::new();
    handlers.insert(
        Gtp2MessageType::EchoRequest as u8,
        handler_fn(handle_echo_request),
    );
    handlers.insert(
        Gtp2MessageType::EchoResponse as u8,
        handler_fn(handle_echo_response),
    );
    handlers.insert(
        Gtp2MessageType::VersionNotSupportedIndication as u8,
        handler_fn(handle_version_not_supported),
    );
    handlers
}

async fn handle_echo_request(conn: Arc<Conn>, peer: SocketAddr, msg: Gtp2Message) -> GtpResult<()> {
    log::debug!("Echo Request seq {:#08x} from {peer}", msg.sequence());
    let response = Gtp2Message::echo_response(0, conn.restart_counter());
    conn.respond_to(peer, &msg, response).await
}

async fn handle_echo_response(_conn: Arc<Conn>, peer: SocketAddr, msg: Gtp2Message) -> GtpResult<()> {
    log::debug!("Echo Response seq {:#08x} from {peer}", msg.sequence());
    Ok(())
}

async fn handle_version_not_supported(
    _conn: Arc<Conn>,
    peer: SocketAddr,
    msg: Gtp2Message,
) -> GtpResult<()> {
    log::warn!(
        "Version Not Supported Indication seq {:#08x} from {peer}",
        msg.sequence()
    );
    Ok(())
}
