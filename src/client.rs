//! Request/response engine
//!
//! One exchange per call: encode, send, then await the correlated reply
//! within a single deadline. Frames whose transaction id or unit id do not
//! match the outstanding request are discarded without resetting the
//! deadline. There is no retry; a failed exchange surfaces its error.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::frame;
use crate::point::{Request, Response};
use crate::session::TcpSession;

/// Modbus TCP client bound to one server and one unit id.
#[derive(Debug)]
pub struct ModbusClient {
    session: TcpSession,
    unit_id: u8,
    timeout: Duration,
}

impl ModbusClient {
    /// Connect to `endpoint` (host:port). The same timeout bounds the
    /// connection attempt and each subsequent exchange.
    pub async fn connect(endpoint: &str, unit_id: u8, timeout: Duration) -> Result<Self> {
        let session = TcpSession::connect(endpoint, timeout).await?;
        info!("session open: {} unit {}", endpoint, unit_id);
        Ok(Self {
            session,
            unit_id,
            timeout,
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Run one request/response exchange.
    pub async fn execute(&mut self, request: &Request) -> Result<Response> {
        let transaction_id = self.session.next_transaction_id();
        let wire = frame::encode_request(transaction_id, self.unit_id, request)?;

        // The deadline covers the send too; a peer that stops draining its
        // receive window must not stall the call unbounded.
        let deadline = self.timeout;
        let exchange = async {
            self.session.send(&wire).await?;
            self.await_response(transaction_id, request).await
        };
        match tokio::time::timeout(deadline, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Timeout(deadline.as_millis() as u64)),
        }
    }

    async fn await_response(
        &mut self,
        transaction_id: u16,
        request: &Request,
    ) -> Result<Response> {
        loop {
            let bytes = self.session.receive_frame().await?;
            let received = frame::decode_frame(&bytes)?;

            if received.transaction_id != transaction_id || received.unit_id != self.unit_id {
                debug!(
                    "discarding uncorrelated frame: txn={:04X} unit={} (want txn={:04X} unit={})",
                    received.transaction_id, received.unit_id, transaction_id, self.unit_id
                );
                continue;
            }

            return frame::decode_response(request, &received.pdu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ExceptionCode;
    use crate::point::RegisterKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn client_against<F, Fut>(server: F) -> ModbusClient
    where
        F: FnOnce(tokio::net::TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            server(socket).await;
        });
        ModbusClient::connect(&addr.to_string(), 1, Duration::from_millis(500))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let mut client = client_against(|mut socket| async move {
            let mut buf = vec![0u8; 12];
            let _ = socket.read_exact(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;

        let request = Request::ReadRegisters {
            address: 0,
            count: 1,
            kind: RegisterKind::Holding,
        };
        let err = client.execute(&request).await.unwrap_err();
        assert_eq!(err, ClientError::Timeout(500));
    }

    #[tokio::test]
    async fn stale_frame_discarded_then_real_reply_accepted() {
        let mut client = client_against(|mut socket| async move {
            let mut buf = vec![0u8; 12];
            socket.read_exact(&mut buf).await.unwrap();
            // Reply under an unrelated transaction id first.
            socket
                .write_all(&[0xBE, 0xEF, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x63])
                .await
                .unwrap();
            // Then the real reply under the request's transaction id.
            let reply = [buf[0], buf[1], 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2A];
            socket.write_all(&reply).await.unwrap();
        })
        .await;

        let request = Request::ReadRegisters {
            address: 0,
            count: 1,
            kind: RegisterKind::Holding,
        };
        let response = client.execute(&request).await.unwrap();
        assert_eq!(
            response,
            Response::ReadResult(crate::point::Values::Words(vec![42]))
        );
    }

    #[tokio::test]
    async fn exception_reply_surfaces_server_rejected() {
        let mut client = client_against(|mut socket| async move {
            let mut buf = vec![0u8; 12];
            socket.read_exact(&mut buf).await.unwrap();
            socket
                .write_all(&[buf[0], buf[1], 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02])
                .await
                .unwrap();
        })
        .await;

        let request = Request::ReadRegisters {
            address: 0xFFFF,
            count: 1,
            kind: RegisterKind::Holding,
        };
        let err = client.execute(&request).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::ServerRejected {
                function: 0x03,
                exception: ExceptionCode::IllegalDataAddress,
            }
        );
    }

    #[tokio::test]
    async fn peer_disconnect_mid_exchange() {
        let mut client = client_against(|mut socket| async move {
            let mut buf = vec![0u8; 12];
            socket.read_exact(&mut buf).await.unwrap();
            // Drop without replying.
        })
        .await;

        let request = Request::ReadRegisters {
            address: 0,
            count: 1,
            kind: RegisterKind::Holding,
        };
        let err = client.execute(&request).await.unwrap_err();
        assert_eq!(err, ClientError::ConnectionClosed);
    }
}
