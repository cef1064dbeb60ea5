//! Correlating a response on one leg with a request pending on another

mod common;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use ogs_gtpc::v2::ie::Gtp2IeType;
use ogs_gtpc::v2::{
    deliver, handler_fn, required, Conn, DeleteSessionResponse, Gtp2Cause,
    Gtp2FTeidInterfaceType, Gtp2Ie, Gtp2Message, Gtp2MessageType, Session, Subscriber,
};
use ogs_gtpc::{GtpError, GtpResult};

use common::{eventually, loopback, recv_within, Node};

const MME_IF: u8 = Gtp2FTeidInterfaceType::S11MmeGtpC as u8;
const SGW_S11_IF: u8 = Gtp2FTeidInterfaceType::S11S4SgwGtpC as u8;
const SGW_S5_IF: u8 = Gtp2FTeidInterfaceType::S5S8SgwGtpC as u8;
const PGW_IF: u8 = Gtp2FTeidInterfaceType::S5S8PgwGtpC as u8;
const IMSI: &str = "001010000000001";
const REPLY_WAIT: Duration = Duration::from_secs(2);

/// Register a session for [`IMSI`] on `conn` towards `peer` and return it
/// with its local TEID
fn seed_session(conn: &Conn, peer: SocketAddr) -> (Arc<Session>, u32) {
    let sess = conn.new_session(peer, Subscriber::new(IMSI));
    let teid = conn
        .new_local_teid(Some(Ipv4Addr::LOCALHOST), None)
        .unwrap()
        .as_teid()
        .unwrap();
    conn.register_session(teid, &sess).unwrap();
    sess.activate().unwrap();
    (sess, teid)
}

fn delete_session_response(teid: u32) -> Gtp2Message {
    Gtp2Message::from_ies(
        Gtp2MessageType::DeleteSessionResponse as u8,
        teid,
        0,
        vec![Gtp2Ie::cause(Gtp2Cause::RequestAccepted as u8)],
    )
}

/// S11 Delete Session Request: forward on S5, wait for the PGW's answer and
/// only then answer the MME
async fn relay_delete_session(
    s11: Arc<Conn>,
    s5: Arc<Conn>,
    peer: SocketAddr,
    msg: Gtp2Message,
) -> GtpResult<()> {
    let s11_sess = s11.get_session_by_teid(msg.teid(), peer)?;
    let s5_sess = s5.get_session_by_imsi(&s11_sess.imsi())?;

    let seq = s5
        .delete_session(
            s5_sess.peer_addr(),
            s5_sess.get_teid(PGW_IF)?,
            vec![Gtp2Ie::ebi(5)],
        )
        .await?;
    let reply = s11_sess.await_reply(seq, REPLY_WAIT).await?;
    let rsp = reply.body_as::<DeleteSessionResponse>()?;
    let cause = required(&rsp.cause, Gtp2IeType::Cause)?.as_cause_value()?;

    s5.remove_session(&s5_sess);
    s11.remove_session(&s11_sess);

    let answer = Gtp2Message::from_ies(
        Gtp2MessageType::DeleteSessionResponse as u8,
        s11_sess.get_teid(MME_IF)?,
        0,
        vec![Gtp2Ie::cause(cause)],
    );
    s11.respond_to(peer, &msg, answer).await
}

/// Test a delete session travels MME -> SGW -> PGW and back, with the SGW
/// holding the S11 request until the S5 response is handed over
#[tokio::test]
async fn test_delete_session_across_legs() {
    let _ = env_logger::try_init();

    let mme = Node::start(loopback(MME_IF)).await;
    let sgw_s11 = Node::start(loopback(SGW_S11_IF)).await;
    let sgw_s5 = Node::start(loopback(SGW_S5_IF)).await;
    let pgw = Node::start(loopback(PGW_IF)).await;

    let (mme_sess, mme_teid) = seed_session(&mme.conn, sgw_s11.addr);
    let (s11_sess, s11_teid) = seed_session(&sgw_s11.conn, mme.addr);
    let (s5_sess, s5_teid) = seed_session(&sgw_s5.conn, pgw.addr);
    let (pgw_sess, pgw_teid) = seed_session(&pgw.conn, sgw_s5.addr);
    mme_sess.add_teid(SGW_S11_IF, s11_teid);
    s11_sess.add_teid(MME_IF, mme_teid);
    s5_sess.add_teid(PGW_IF, pgw_teid);
    pgw_sess.add_teid(SGW_S5_IF, s5_teid);

    pgw.conn.add_handler(
        Gtp2MessageType::DeleteSessionRequest as u8,
        handler_fn(|conn, peer, msg| async move {
            let sess = conn.get_session_by_teid(msg.teid(), peer)?;
            conn.remove_session(&sess);
            let answer = delete_session_response(sess.get_teid(SGW_S5_IF)?);
            conn.respond_to(peer, &msg, answer).await
        }),
    );

    let s5 = Arc::clone(&sgw_s5.conn);
    sgw_s11.conn.add_handler(
        Gtp2MessageType::DeleteSessionRequest as u8,
        handler_fn(move |conn, peer, msg| relay_delete_session(conn, Arc::clone(&s5), peer, msg)),
    );

    let s11 = Arc::clone(&sgw_s11.conn);
    sgw_s5.conn.add_handler(
        Gtp2MessageType::DeleteSessionResponse as u8,
        handler_fn(move |conn, peer, msg| {
            let s11 = Arc::clone(&s11);
            async move {
                let s5_sess = conn.get_session_by_teid(msg.teid(), peer)?;
                let s11_sess = s11.get_session_by_imsi(&s5_sess.imsi())?;
                deliver(&s11_sess, msg, REPLY_WAIT).await
            }
        }),
    );

    let (done_tx, mut done_rx) = mpsc::channel::<u8>(1);
    mme.conn.add_handler(
        Gtp2MessageType::DeleteSessionResponse as u8,
        handler_fn(move |conn, peer, msg| {
            let done = done_tx.clone();
            async move {
                let sess = conn.get_session_by_teid(msg.teid(), peer)?;
                let rsp = msg.body_as::<DeleteSessionResponse>()?;
                let cause = required(&rsp.cause, Gtp2IeType::Cause)?.as_cause_value()?;
                conn.remove_session(&sess);
                let _ = done.send(cause).await;
                Ok::<_, GtpError>(())
            }
        }),
    );

    mme.conn
        .delete_session(sgw_s11.addr, s11_teid, vec![Gtp2Ie::ebi(5)])
        .await
        .unwrap();

    assert_eq!(recv_within(&mut done_rx).await, Gtp2Cause::RequestAccepted as u8);

    for node in [&mme, &sgw_s11, &sgw_s5, &pgw] {
        let conn = Arc::clone(&node.conn);
        assert!(eventually(move || conn.session_count() == 0).await);
    }
    for sess in [&mme_sess, &s11_sess, &s5_sess, &pgw_sess] {
        assert!(sess.is_removed());
    }

    // removal happened exactly once per leg
    assert!(!sgw_s11.conn.remove_session(&s11_sess));
    assert!(!sgw_s5.conn.remove_session(&s5_sess));
    assert!(sgw_s11.conn.get_session_by_teid(s11_teid, mme.addr).is_err());
    assert!(sgw_s5.conn.get_session_by_teid(s5_teid, pgw.addr).is_err());

    for node in [mme, sgw_s11, sgw_s5, pgw] {
        node.stop().await.unwrap();
    }
}

/// Test a pending request gives up when the other leg never answers
#[tokio::test]
async fn test_relay_times_out_without_answer() {
    let _ = env_logger::try_init();

    let sgw = Node::start(loopback(SGW_S11_IF)).await;
    let (sess, _) = seed_session(&sgw.conn, "127.0.0.1:9".parse().unwrap());

    let err = sess
        .await_reply(42, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err, GtpError::Timeout);
    assert_eq!(sgw.conn.session_count(), 1);

    sgw.stop().await.unwrap();
}
