//! Shared helpers for the loopback endpoint tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ogs_gtpc::v2::{Conn, Gtp2Message};
use ogs_gtpc::{ConnConfig, GtpResult};

pub const WAIT: Duration = Duration::from_secs(3);

/// Endpoint config on an ephemeral loopback port
pub fn loopback(local_if_type: u8) -> ConnConfig {
    ConnConfig::new("127.0.0.1:0".parse().unwrap(), local_if_type)
}

/// Running endpoint
pub struct Node {
    pub conn: Arc<Conn>,
    pub addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<GtpResult<()>>,
}

impl Node {
    pub async fn start(config: ConnConfig) -> Self {
        let conn = Conn::new(config);
        let addr = conn.bind().await.unwrap();
        let cancel = CancellationToken::new();
        let task = {
            let conn = conn.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { conn.listen_and_serve(cancel).await })
        };
        Self {
            conn,
            addr,
            cancel,
            task,
        }
    }

    pub async fn stop(self) -> GtpResult<()> {
        self.cancel.cancel();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("serve loop did not stop")
            .expect("serve task panicked")
    }
}

/// Next value from a test channel, failing the test after [`WAIT`]
pub async fn recv_within<T>(rx: &mut mpsc::Receiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for handler")
        .expect("handler channel closed")
}

/// Plain UDP peer used to inject raw datagrams
pub async fn raw_peer() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

pub async fn recv_message(socket: &UdpSocket) -> Gtp2Message {
    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(WAIT, socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    Gtp2Message::parse(&buf[..len]).unwrap()
}

/// Poll `cond` until it holds or [`WAIT`] elapses
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
