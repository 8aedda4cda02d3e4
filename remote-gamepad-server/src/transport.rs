use crate::error::ServerError;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tracing::debug;

/// A listening endpoint the server accepts handhelds from.
#[async_trait]
pub trait Listener: Send {
    type Stream: AsyncRead + Unpin + Send;

    /// Waits for the next connection. Returns the stream and a printable
    /// peer address.
    async fn accept(&mut self) -> io::Result<(Self::Stream, String)>;
}

#[async_trait]
impl Listener for TcpListener {
    type Stream = tokio::net::TcpStream;

    async fn accept(&mut self) -> io::Result<(Self::Stream, String)> {
        let (stream, peer_addr) = TcpListener::accept(self).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Couldn't disable Nagle for [{peer_addr}]: {e}");
        }
        Ok((stream, peer_addr.to_string()))
    }
}

/// Binds the TCP listening socket. Failure here is fatal for the server.
pub async fn bind_tcp(address: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })
}

#[cfg(target_os = "linux")]
pub use rfcomm::bind_rfcomm;

#[cfg(target_os = "linux")]
mod rfcomm {
    use super::Listener;
    use crate::error::ServerError;
    use async_trait::async_trait;
    use bluer::rfcomm::{Listener as RfcommListener, SocketAddr, Stream};
    use bluer::Address;
    use std::io;

    #[async_trait]
    impl Listener for RfcommListener {
        type Stream = Stream;

        async fn accept(&mut self) -> io::Result<(Stream, String)> {
            let (stream, peer) = RfcommListener::accept(self).await?;
            Ok((stream, format!("{} channel {}", peer.addr, peer.channel)))
        }
    }

    /// Listens on `channel` of every local Bluetooth adapter.
    pub async fn bind_rfcomm(channel: u8) -> Result<RfcommListener, ServerError> {
        RfcommListener::bind(SocketAddr::new(Address::any(), channel))
            .await
            .map_err(|source| ServerError::Bind {
                address: format!("rfcomm channel {channel}"),
                source,
            })
    }
}
