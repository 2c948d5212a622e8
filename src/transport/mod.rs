//! Moving bundles between nodes.
//!
//! Frames are bincode-encoded and prefixed with their length as a 4-byte
//! big-endian integer. Every frame is answered with a [`Reply`].

mod server;
mod tcp;

pub use self::server::serve;
pub use self::tcp::{propose, TcpTransport};

use crate::{Bundle, InstanceId, NodeId, Proposal};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected before reading their body.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown peer {0}")]
    UnknownPeer(NodeId),
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(u32),
    #[error("peer rejected the frame: {0}")]
    Rejected(String),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode with bincode")]
    Encoding(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Sends bundles to single peers. Implementations are shared between tasks.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, to: NodeId, bundle: &Bundle) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum Frame {
    /// A client submits its value for an instance.
    Propose {
        instance: InstanceId,
        value: Proposal,
    },
    /// A peer gossips a protocol message.
    Bundle(Bundle),
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum Reply {
    Ack,
    Rejected(String),
}

pub async fn write_frame<W, M>(writer: &mut W, msg: &M) -> Result<()>
where
    W: AsyncWrite + Unpin,
    M: Serialize,
{
    let data = bincode::serialize(msg)?;
    let len = u32::try_from(data.len()).map_err(|_| Error::FrameTooLarge(u32::MAX))?;
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, M>(reader: &mut R) -> Result<M>
where
    R: AsyncRead + Unpin,
    M: DeserializeOwned,
{
    let mut len = [0u8; 4];
    reader.read_exact(&mut len).await?;
    let len = u32::from_be_bytes(len);
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(len));
    }
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await?;
    Ok(bincode::deserialize(&data)?)
}
