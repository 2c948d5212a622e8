use super::{read_frame, write_frame, Error, Frame, Reply, Result, Transport};
use crate::{Bundle, InstanceId, NodeId, Proposal};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

type Connection = Arc<Mutex<TcpStream>>;

/// Sends frames over TCP, keeping one connection per peer.
///
/// Connections are opened on first use and dropped after a failed or timed
/// out request, so the next request reconnects.
pub struct TcpTransport {
    peers: BTreeMap<NodeId, SocketAddr>,
    timeout: Duration,
    // never held across an await
    connections: parking_lot::Mutex<HashMap<NodeId, Connection>>,
}

impl TcpTransport {
    pub fn new(peers: BTreeMap<NodeId, SocketAddr>, timeout: Duration) -> Self {
        Self {
            peers,
            timeout,
            connections: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Sends `frame` to `to` and waits for the reply.
    pub async fn request(&self, to: NodeId, frame: &Frame) -> Result<Reply> {
        let conn = self.connection(to).await?;
        let result = {
            let mut stream = conn.lock().await;
            timeout(self.timeout, exchange(&mut stream, frame))
                .await
                .unwrap_or(Err(Error::Timeout(self.timeout)))
        };
        if result.is_err() {
            self.evict(to, &conn);
        }
        result
    }

    async fn connection(&self, to: NodeId) -> Result<Connection> {
        let cached = self.connections.lock().get(&to).cloned();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        let addr = self.peers.get(&to).ok_or(Error::UnknownPeer(to))?;
        let stream = connect(addr, self.timeout).await?;

        // another task may have connected in the meantime
        let mut connections = self.connections.lock();
        let conn = connections
            .entry(to)
            .or_insert_with(|| Arc::new(Mutex::new(stream)));
        Ok(conn.clone())
    }

    // Only drops `conn` itself. A concurrent request may already have
    // replaced it with a fresh connection.
    fn evict(&self, to: NodeId, conn: &Connection) {
        let mut connections = self.connections.lock();
        if connections
            .get(&to)
            .map_or(false, |cached| Arc::ptr_eq(cached, conn))
        {
            log::debug!("dropping connection to {}", to);
            connections.remove(&to);
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, to: NodeId, bundle: &Bundle) -> Result<()> {
        match self.request(to, &Frame::Bundle(bundle.clone())).await? {
            Reply::Ack => Ok(()),
            Reply::Rejected(reason) => Err(Error::Rejected(reason)),
        }
    }
}

/// Submits a client value to the node listening on `addr` over a fresh
/// connection.
pub async fn propose(
    addr: &SocketAddr,
    instance: InstanceId,
    value: Proposal,
    limit: Duration,
) -> Result<Reply> {
    let mut stream = connect(addr, limit).await?;
    let frame = Frame::Propose { instance, value };
    timeout(limit, exchange(&mut stream, &frame))
        .await
        .map_err(|_| Error::Timeout(limit))?
}

async fn exchange(stream: &mut TcpStream, frame: &Frame) -> Result<Reply> {
    write_frame(stream, frame).await?;
    read_frame(stream).await
}

async fn connect(addr: &SocketAddr, limit: Duration) -> Result<TcpStream> {
    let stream = timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout(limit))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}
