//! WebSocket module-state feed.
//!
//! The server streams JSON-Patch batches over `/module_state`; the client
//! sends its subscriptions back using the same envelope:
//!
//! ```json
//! [{"op": "add", "path": "/07", "value": true}]
//! [{"op": "remove", "path": "/07"}]
//! ```
//!
//! This module only owns framing. Reconnection, backoff and patch
//! application live in `floorsync-core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use floorsync_api::feed::{self, PatchOp};
//! use floorsync_api::TransportConfig;
//! use url::Url;
//!
//! let url = Url::parse("ws://192.168.1.20:8080/module_state")?;
//! let (mut sink, mut source) = feed::connect(&url, &TransportConfig::default()).await?;
//! sink.send_batch(&[PatchOp::add("/07", true.into())]).await?;
//!
//! while let Some(frame) = source.next_text().await {
//!     let batch = feed::parse_batch(&frame?)?;
//!     println!("{} operations", batch.len());
//! }
//! ```

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rustls::DigitallySignedStruct;
use rustls::SignatureScheme;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::transport::{TlsMode, TransportConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── PatchOp ──────────────────────────────────────────────────────────

/// One JSON-Patch operation as it travels over the feed.
///
/// Only the three operations the server emits are modelled; anything else
/// fails to deserialize and the whole frame is treated as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOp {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    /// JSON pointer this operation targets.
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Replace { path, .. } | Self::Remove { path } => path,
        }
    }

    /// Operation name as written on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Replace { .. } => "replace",
            Self::Remove { .. } => "remove",
        }
    }
}

/// Decode one feed frame into an ordered patch batch.
pub fn parse_batch(text: &str) -> Result<Vec<PatchOp>, Error> {
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

// ── Connection ───────────────────────────────────────────────────────

/// Open the feed and split it into its outbound and inbound halves.
///
/// `wss://` URLs honour `transport.tls`; plain `ws://` ignores it.
pub async fn connect(
    url: &Url,
    transport: &TransportConfig,
) -> Result<(FeedSink, FeedSource), Error> {
    tracing::info!(url = %url, tls = ?transport.tls, "connecting to module feed");

    let connector = connector(transport.tls)?;
    let (ws_stream, _response) =
        tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("module feed connected");

    let (write, read) = ws_stream.split();
    Ok((FeedSink { inner: write }, FeedSource { inner: read }))
}

/// TLS connector for `mode`; `None` leaves the webpki-roots default.
pub fn connector(mode: TlsMode) -> Result<Option<Connector>, Error> {
    match mode {
        TlsMode::System => Ok(None),
        TlsMode::DangerAcceptInvalid => {
            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let config = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
                .with_safe_default_protocol_versions()
                .map_err(|e| Error::Tls(e.to_string()))?
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
                .with_no_client_auth();
            Ok(Some(Connector::Rustls(Arc::new(config))))
        }
    }
}

/// Skips chain and hostname checks but still verifies handshake
/// signatures, mirroring `danger_accept_invalid_certs` on the HTTP side.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Failure on an already open connection.
fn session_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            Error::WebSocketClosed {
                code: CloseCode::Abnormal.into(),
                reason: "connection already closed".into(),
            }
        }
        tungstenite::Error::Protocol(e) => Error::WebSocketClosed {
            code: CloseCode::Protocol.into(),
            reason: e.to_string(),
        },
        other => Error::WebSocketClosed {
            code: CloseCode::Abnormal.into(),
            reason: other.to_string(),
        },
    }
}

/// Outbound half of the feed.
pub struct FeedSink {
    inner: SplitSink<WsStream, Message>,
}

impl FeedSink {
    /// Send `ops` as a single JSON array frame.
    pub async fn send_batch(&mut self, ops: &[PatchOp]) -> Result<(), Error> {
        let text = serde_json::to_string(ops).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        tracing::trace!(frame = %text, "feed send");
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(session_error)
    }

    /// Send a close frame and flush.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.inner.close().await.map_err(session_error)
    }
}

/// Inbound half of the feed.
pub struct FeedSource {
    inner: SplitStream<WsStream>,
}

impl FeedSource {
    /// Wait for the next text frame.
    ///
    /// Returns `None` once the connection is over (normal close or end of
    /// stream) and `Some(Err(_))` on a network error or a close frame with
    /// any code other than 1000. Ping, pong and binary frames are skipped.
    pub async fn next_text(&mut self) -> Option<Result<String, Error>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Ping(_)) => {
                    // tungstenite queues the pong itself
                    tracing::trace!("feed ping");
                }
                Ok(Message::Close(Some(frame))) if frame.code != CloseCode::Normal => {
                    return Some(Err(Error::WebSocketClosed {
                        code: frame.code.into(),
                        reason: frame.reason.as_str().to_owned(),
                    }));
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("feed closed normally");
                    return None;
                }
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed) => return None,
                Err(e) => return Some(Err(session_error(e))),
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
