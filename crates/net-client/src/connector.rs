//! The dial abstraction.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};
use tracing::debug;

use crate::error::{Error, Result};

/// A connected byte stream. Object-safe so scripted test transports and real
/// sockets go through the same client code.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

/// A boxed connected stream as handed out by a [`Connector`].
pub type NetStream = Box<dyn Stream>;

/// Abstraction over establishing an outbound connection.
///
/// A failed connect is an [`Error`]; the client owning the attempt maps it
/// to the [`DisconnectReason`](crate::DisconnectReason) it surfaces to
/// subscribers via [`Error::reason`].
pub trait Connector: Send + Sync {
    /// Resolve `host` and connect to `port`.
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
    ) -> Pin<Box<dyn Future<Output = Result<NetStream>> + Send + 'a>>;
}

/// Real TCP dialing with system name resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioConnector;

impl Connector for TokioConnector {
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
    ) -> Pin<Box<dyn Future<Output = Result<NetStream>> + Send + 'a>> {
        Box::pin(async move {
            let addrs: Vec<_> = lookup_host((host, port))
                .await
                .map_err(|e| {
                    debug!(host, error = %e, "name resolution failed");
                    Error::Resolution(e.to_string())
                })?
                .collect();
            if addrs.is_empty() {
                return Err(Error::NoAddresses(host.to_string()));
            }

            let mut last = Error::NoAddresses(host.to_string());
            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(stream) => {
                        debug!(host, port, %addr, "connected");
                        return Ok(Box::new(stream) as NetStream);
                    }
                    Err(e) => {
                        debug!(host, port, %addr, error = %e, "connect failed");
                        last = Error::Connect(e);
                    }
                }
            }
            Err(last)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason::DisconnectReason;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            sock.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = TokioConnector
            .connect("127.0.0.1", port)
            .await
            .expect("connect should succeed");
        stream.write_all(b"ping").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn closed_port_is_refused() {
        // Bind and immediately drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TokioConnector
            .connect("127.0.0.1", port)
            .await
            .err()
            .expect("connect must fail");
        assert!(matches!(err, Error::Connect(_)));
        assert_eq!(err.reason(), DisconnectReason::Refused);
    }

    #[tokio::test]
    async fn unresolvable_host_is_host_not_found() {
        let err = TokioConnector
            .connect("does-not-exist.invalid.", 5220)
            .await
            .err()
            .expect("lookup must fail");
        assert_eq!(err.reason(), DisconnectReason::HostNotFound);
    }
}
