use super::{read_frame, write_frame, Error, Frame, Reply, Transport};
use crate::node::Node;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// Accepts connections on `listener` and feeds their frames to `node`, one
/// task per connection.
///
/// Client proposals are validated before they are answered, so an invalid
/// value gets a [`Reply::Rejected`]. Peer bundles are acknowledged as soon as
/// they are decoded and handled by a separate task; at most `workers` of
/// those run at once. Accept errors are logged and retried, so this only
/// returns if the listener has no local address.
pub async fn serve<T: Transport>(
    listener: TcpListener,
    node: Arc<Node<T>>,
    workers: usize,
) -> crate::Result<()> {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    log::info!("[{}] listening on {}", node.id(), listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(err) = stream.set_nodelay(true) {
                    log::debug!("[{}] nodelay for {}: {}", node.id(), addr, err);
                }
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    node.clone(),
                    permits.clone(),
                ));
            }
            Err(err) => {
                log::warn!("[{}] failed to accept: {}", node.id(), err);
                sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn handle_connection<T: Transport>(
    mut stream: TcpStream,
    peer: SocketAddr,
    node: Arc<Node<T>>,
    permits: Arc<Semaphore>,
) {
    loop {
        let frame: Frame = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(Error::Io(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                log::trace!("connection from {} closed", peer);
                return;
            }
            Err(err) => {
                log::warn!("bad frame from {}: {}", peer, err);
                let _ = write_frame(&mut stream, &Reply::Rejected(err.to_string())).await;
                return;
            }
        };

        let reply = match frame {
            Frame::Propose { .. } => match node.process(frame) {
                Ok(outgoings) => {
                    let node = node.clone();
                    tokio::spawn(async move { node.dispatch(outgoings).await });
                    Reply::Ack
                }
                Err(err) => {
                    log::info!("[{}] rejected proposal from {}: {}", node.id(), peer, err);
                    Reply::Rejected(err.to_string())
                }
            },
            Frame::Bundle(_) => {
                let node = node.clone();
                let permits = permits.clone();
                tokio::spawn(async move {
                    let _permit = match permits.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    if let Err(err) = node.handle(frame).await {
                        log::warn!("[{}] {}", node.id(), err);
                    }
                });
                Reply::Ack
            }
        };

        if let Err(err) = write_frame(&mut stream, &reply).await {
            log::debug!("failed to answer {}: {}", peer, err);
            return;
        }
    }
}
