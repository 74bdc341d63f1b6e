use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::broadcast::error::RecvError;

use crate::bus::BusHandle;
use crate::config::TransportConfig;
use crate::protocol;

/// Bridge the in-process bus onto the network.
///
/// Inbound datagrams are decoded and delivered to the engine; everything the
/// engine publishes is framed and forwarded to the configured peer address,
/// which is typically a broadcast address.
pub async fn serve(config: TransportConfig, handle: BusHandle) -> io::Result<()> {
    let socket = bind(&config.bind)?;
    socket.set_broadcast(true)?;

    let peer: SocketAddr = config
        .peer
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    log::info!("Bus gateway on {}, forwarding to {}", config.bind, peer);

    let mut subscriber = handle.subscribe();
    let mut buffer = [0u8; protocol::MAX_FRAME_SIZE];

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buffer) => {
                let (size, addr) = received?;

                match protocol::decode(&buffer[..size]) {
                    Ok(envelope) => handle.dispatch(envelope),
                    Err(e) => log::warn!("Invalid frame from {}: {}", addr, e),
                }
            }
            published = subscriber.recv() => {
                match published {
                    Ok(envelope) => match protocol::encode(&envelope) {
                        Ok(frame) => {
                            socket.send_to(&frame, peer).await?;
                        }
                        Err(e) => log::warn!("Failed to frame {}: {}", envelope.body.name(), e),
                    },
                    Err(RecvError::Lagged(count)) => {
                        log::warn!("Bus gateway lagged, dropped {} messages", count)
                    }
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
        }
    }
}

fn bind(address: &str) -> io::Result<UdpSocket> {
    let address: SocketAddr = address
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&socket2::SockAddr::from(address))?;

    UdpSocket::from_std(socket.into())
}
