//! TCP transport session
//!
//! Owns the socket and the framing boundary: sends complete ADUs and reads
//! complete ADUs back by honoring the MBAP Length field. Correlation and
//! deadlines live a layer up in the client engine; this layer only moves
//! frames.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN, MBAP_PREFIX_LEN};
use crate::error::{ClientError, Result};

/// One live Modbus TCP connection.
#[derive(Debug)]
pub struct TcpSession {
    stream: TcpStream,
    endpoint: String,
    next_transaction_id: u16,
}

impl TcpSession {
    /// Open a TCP connection to `endpoint` (host:port), bounded by
    /// `connect_timeout`.
    pub async fn connect(endpoint: &str, connect_timeout: Duration) -> Result<Self> {
        debug!("connecting to {} (timeout {:?})", endpoint, connect_timeout);

        let stream = match timeout(connect_timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("connect to {} failed: {}", endpoint, e);
                return Err(ClientError::connect(endpoint, e.to_string()));
            }
            Err(_) => {
                warn!("connect to {} timed out", endpoint);
                return Err(ClientError::connect(endpoint, "connect timed out"));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }
        debug!("connected to {}", endpoint);

        Ok(Self {
            stream,
            endpoint: endpoint.to_string(),
            next_transaction_id: 0,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Session-local transaction id, wrapping at u16::MAX.
    pub fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    /// Write one complete frame.
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        trace!("TCP TX: {}", hex::encode(frame));
        self.stream
            .write_all(frame)
            .await
            .map_err(|e| ClientError::connect(&self.endpoint, e.to_string()))?;
        debug!("TCP TX: {}B", frame.len());
        Ok(())
    }

    /// Read one complete frame: 7-byte MBAP prefix, then the remaining body
    /// announced by the Length field.
    pub async fn receive_frame(&mut self) -> Result<Vec<u8>> {
        let mut prefix = [0u8; MBAP_PREFIX_LEN];
        read_exact_or_closed(&mut self.stream, &mut prefix, &self.endpoint).await?;

        let length = u16::from_be_bytes([prefix[4], prefix[5]]) as usize;
        if length == 0 || length > MAX_MBAP_LENGTH {
            return Err(ClientError::malformed(format!("length field {length}")));
        }

        // Unit id (prefix[6]) is the first byte the Length field counts.
        let mut frame = vec![0u8; MBAP_HEADER_LEN + length];
        frame[..MBAP_PREFIX_LEN].copy_from_slice(&prefix);
        read_exact_or_closed(&mut self.stream, &mut frame[MBAP_PREFIX_LEN..], &self.endpoint)
            .await?;

        trace!("TCP RX: {}", hex::encode(&frame));
        debug!("TCP RX: {}B", frame.len());
        Ok(frame)
    }
}

async fn read_exact_or_closed(stream: &mut TcpStream, buf: &mut [u8], endpoint: &str) -> Result<()> {
    use std::io::ErrorKind;

    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
            ) =>
        {
            Err(ClientError::ConnectionClosed)
        }
        Err(e) => Err(ClientError::connect(endpoint, format!("read error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn refused_port_is_connect_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = TcpSession::connect(&addr.to_string(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_connect_error() {
        // Non-routable test-net address. Whether the OS fails fast or the
        // deadline expires first, the failure is a connect failure, not a
        // response timeout.
        let err = TcpSession::connect("10.255.255.1:502", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
    }

    #[tokio::test]
    async fn reset_mid_frame_is_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // Linger 0 turns the close into an RST instead of a FIN.
            socket.set_linger(Some(Duration::ZERO)).unwrap();
            drop(socket);
        });

        let mut session = TcpSession::connect(&addr.to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        let err = session.receive_frame().await.unwrap_err();
        assert_eq!(err, ClientError::ConnectionClosed);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn transaction_ids_increment_and_wrap() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _keepalive = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut session = TcpSession::connect(&addr.to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(session.next_transaction_id(), 0);
        assert_eq!(session.next_transaction_id(), 1);

        session.next_transaction_id = u16::MAX;
        assert_eq!(session.next_transaction_id(), u16::MAX);
        assert_eq!(session.next_transaction_id(), 0);

        server.abort();
    }

    #[tokio::test]
    async fn frame_roundtrip_over_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 12];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut session = TcpSession::connect(&addr.to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        let frame = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x01, 0xA4, 0x00, 0x02,
        ];
        session.send(&frame).await.unwrap();
        let echoed = session.receive_frame().await.unwrap();
        assert_eq!(echoed, frame);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn eof_mid_frame_is_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Header announces 6 more bytes but only the prefix arrives.
            socket
                .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01])
                .await
                .unwrap();
        });

        let mut session = TcpSession::connect(&addr.to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        let err = session.receive_frame().await.unwrap_err();
        assert_eq!(err, ClientError::ConnectionClosed);

        server.await.unwrap();
    }
}
