//! Byte transports: TCP, Unix domain socket, and TLS over TCP.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::ConnectionConfig;
use crate::error::{RedisError, Result};

/// Any bidirectional byte stream a connection can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

pub type BoxedTransport = Box<dyn Transport>;

/// Open the transport `config` describes, bounded by `connect_timeout`.
pub async fn open(config: &ConnectionConfig) -> Result<BoxedTransport> {
    let timeout = config.connect_timeout;
    match tokio::time::timeout(timeout, open_unbounded(config)).await {
        Ok(result) => result,
        Err(_) => Err(RedisError::Timeout(format!(
            "connection to {} timed out after {timeout:?}",
            config.addr()
        ))),
    }
}

async fn open_unbounded(config: &ConnectionConfig) -> Result<BoxedTransport> {
    if let Some(path) = &config.unix_path {
        return open_unix(path).await;
    }

    let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
    stream.set_nodelay(true)?;

    if config.tls {
        return tls::wrap(stream, &config.host).await;
    }
    Ok(Box::new(stream))
}

#[cfg(unix)]
async fn open_unix(path: &std::path::Path) -> Result<BoxedTransport> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn open_unix(path: &std::path::Path) -> Result<BoxedTransport> {
    Err(RedisError::Config(format!(
        "unix sockets are not supported on this platform: {}",
        path.display()
    )))
}

#[cfg(feature = "tls")]
mod tls {
    use std::sync::{Arc, OnceLock};

    use rustls::pki_types::ServerName;
    use rustls::{ClientConfig, RootCertStore};
    use tokio::net::TcpStream;
    use tokio_rustls::TlsConnector;

    use super::BoxedTransport;
    use crate::error::{RedisError, Result};

    fn client_config() -> Arc<ClientConfig> {
        static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
        CONFIG
            .get_or_init(|| {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                Arc::new(
                    ClientConfig::builder()
                        .with_root_certificates(roots)
                        .with_no_client_auth(),
                )
            })
            .clone()
    }

    pub(super) async fn wrap(stream: TcpStream, host: &str) -> Result<BoxedTransport> {
        let name = ServerName::try_from(host.to_string())
            .map_err(|e| RedisError::Config(format!("invalid TLS server name {host:?}: {e}")))?;
        let connector = TlsConnector::from(client_config());
        let tls = connector.connect(name, stream).await?;
        Ok(Box::new(tls))
    }
}

#[cfg(not(feature = "tls"))]
mod tls {
    use tokio::net::TcpStream;

    use super::BoxedTransport;
    use crate::error::{RedisError, Result};

    pub(super) async fn wrap(_stream: TcpStream, _host: &str) -> Result<BoxedTransport> {
        Err(RedisError::Config(
            "TLS requested but redlink was built without the `tls` feature".into(),
        ))
    }
}

/// Map an elapsed read bound to the crate's timeout error.
pub(crate) fn read_timeout_error(addr: &str, timeout: Duration) -> RedisError {
    RedisError::Timeout(format!("no reply from {addr} within {timeout:?}"))
}

/// The error for a peer that closed the stream.
pub(crate) fn closed_by_server() -> RedisError {
    RedisError::Connection(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed by server",
    ))
}

// ── Tests ──────────────────────────────────────────────────────────
