//! Datagram transports.
//!
//! A [`Transport`] moves whole datagrams. It splits into a [`LinkReader`]
//! owned by the router task and a [`LinkWriter`] shared by every sender,
//! so reads and writes never contend.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::SdkError;

/// Largest datagram we accept; comfortably above a MAVLink v2 frame.
const MAX_DATAGRAM: usize = 4096;

// ------------------------------------------------------------------
// UDP
// ------------------------------------------------------------------

/// A UDP socket plus the address replies go to.
#[derive(Debug, Clone)]
pub struct UdpLink {
    socket: Arc<UdpSocket>,
    peer: Arc<Mutex<Option<SocketAddr>>>,
    follow_sender: bool,
}

impl UdpLink {
    fn peer(&self) -> Option<SocketAddr> {
        *self.peer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_peer(&self, addr: SocketAddr) {
        let mut peer = self.peer.lock().unwrap_or_else(PoisonError::into_inner);
        if *peer != Some(addr) {
            debug!(peer = %addr, "udp peer changed");
            *peer = Some(addr);
        }
    }
}

// ------------------------------------------------------------------
// Loopback
// ------------------------------------------------------------------

/// The far end of an in-memory [`Transport`].
///
/// Whatever is sent on `to_ground` arrives at the transport's reader, and
/// everything the transport writes shows up on `from_ground`.
#[derive(Debug)]
pub struct LoopbackPeer {
    /// Datagrams towards the ground side.
    pub to_ground: mpsc::UnboundedSender<Vec<u8>>,
    /// Datagrams written by the ground side.
    pub from_ground: mpsc::UnboundedReceiver<Vec<u8>>,
}

// ------------------------------------------------------------------
// Transport
// ------------------------------------------------------------------

/// An open datagram link.
#[derive(Debug)]
pub struct Transport {
    reader: LinkReader,
    writer: LinkWriter,
    description: String,
}

impl Transport {
    /// Open the socket described by `endpoint`.
    pub async fn open(endpoint: &Endpoint) -> Result<Self, SdkError> {
        let link = match endpoint {
            Endpoint::UdpIn { .. } => UdpLink {
                socket: Arc::new(UdpSocket::bind(endpoint.address()).await?),
                peer: Arc::new(Mutex::new(None)),
                follow_sender: true,
            },
            Endpoint::UdpOut { .. } => {
                let target = tokio::net::lookup_host(endpoint.address())
                    .await?
                    .next()
                    .ok_or_else(|| SdkError::Endpoint {
                        value: endpoint.to_string(),
                        reason: "host did not resolve".into(),
                    })?;
                let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                UdpLink {
                    socket: Arc::new(UdpSocket::bind(local).await?),
                    peer: Arc::new(Mutex::new(Some(target))),
                    follow_sender: false,
                }
            }
        };
        debug!(endpoint = %endpoint, local = ?link.socket.local_addr().ok(), "udp socket open");
        Ok(Self {
            reader: LinkReader::Udp(link.clone()),
            writer: LinkWriter::Udp(link),
            description: endpoint.to_string(),
        })
    }

    /// An in-memory transport and the handle for whatever plays the vehicle.
    pub fn loopback() -> (Self, LoopbackPeer) {
        let (to_ground, ground_rx) = mpsc::unbounded_channel();
        let (ground_tx, from_ground) = mpsc::unbounded_channel();
        let transport = Self {
            reader: LinkReader::Loopback(ground_rx),
            writer: LinkWriter::Loopback(ground_tx),
            description: "loopback".to_string(),
        };
        (transport, LoopbackPeer { to_ground, from_ground })
    }

    /// Human-readable name of the link, used in logs and errors.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Split into the read half and the write half.
    pub fn into_split(self) -> (LinkReader, LinkWriter) {
        (self.reader, self.writer)
    }
}

/// Receiving half of a [`Transport`].
#[derive(Debug)]
pub enum LinkReader {
    /// UDP socket.
    Udp(UdpLink),
    /// In-memory channel.
    Loopback(mpsc::UnboundedReceiver<Vec<u8>>),
}

impl LinkReader {
    /// Wait for the next datagram.
    ///
    /// Returns [`SdkError::LinkClosed`] once the far end of a loopback link
    /// is gone; UDP links never close on their own.
    pub async fn recv(&mut self) -> Result<Vec<u8>, SdkError> {
        match self {
            Self::Udp(link) => {
                let mut buf = vec![0u8; MAX_DATAGRAM];
                let (len, from) = link.socket.recv_from(&mut buf).await?;
                if link.follow_sender {
                    link.set_peer(from);
                }
                buf.truncate(len);
                Ok(buf)
            }
            Self::Loopback(rx) => rx.recv().await.ok_or(SdkError::LinkClosed),
        }
    }
}

/// Sending half of a [`Transport`].
#[derive(Debug)]
pub enum LinkWriter {
    /// UDP socket.
    Udp(UdpLink),
    /// In-memory channel.
    Loopback(mpsc::UnboundedSender<Vec<u8>>),
}

impl LinkWriter {
    /// Write one datagram.
    ///
    /// A listening UDP link cannot send before the vehicle has spoken;
    /// that case is [`SdkError::NotConnected`].
    pub async fn send(&self, datagram: &[u8]) -> Result<(), SdkError> {
        match self {
            Self::Udp(link) => {
                let peer = link.peer().ok_or(SdkError::NotConnected)?;
                link.socket.send_to(datagram, peer).await?;
                Ok(())
            }
            Self::Loopback(tx) => tx.send(datagram.to_vec()).map_err(|_| SdkError::LinkClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_carries_datagrams_both_ways() {
        let (transport, mut peer) = Transport::loopback();
        assert_eq!(transport.description(), "loopback");
        let (mut reader, writer) = transport.into_split();

        writer.send(&[1, 2, 3]).await.unwrap();
        assert_eq!(peer.from_ground.recv().await, Some(vec![1, 2, 3]));

        peer.to_ground.send(vec![9]).unwrap();
        assert_eq!(reader.recv().await.unwrap(), vec![9]);

        drop(peer);
        assert!(matches!(reader.recv().await, Err(SdkError::LinkClosed)));
        assert!(matches!(writer.send(&[0]).await, Err(SdkError::LinkClosed)));
    }

    #[tokio::test]
    async fn udp_listener_replies_to_last_sender() {
        let endpoint: Endpoint = "udpin:127.0.0.1:0".parse().unwrap();
        let transport = Transport::open(&endpoint).await.unwrap();
        let (mut reader, writer) = transport.into_split();
        let LinkReader::Udp(link) = &reader else {
            panic!("expected udp link");
        };
        let local = link.socket.local_addr().unwrap();

        assert!(matches!(writer.send(&[0]).await, Err(SdkError::NotConnected)));

        let vehicle = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        vehicle.send_to(&[0xFD, 1], local).await.unwrap();
        assert_eq!(reader.recv().await.unwrap(), vec![0xFD, 1]);

        writer.send(&[7, 7]).await.unwrap();
        let mut buf = [0u8; 8];
        let (n, _) = vehicle.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[7, 7]);
    }
}
