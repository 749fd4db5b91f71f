//! # Transport Link
//!
//! Owns the WebSocket to the Cortex service: opening it (with the TLS trust
//! override for a locally running service), serialising outbound writes,
//! and running the reader task that hands every inbound JSON message to a
//! single [`InboundHandler`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Transport                   │
//! │                                              │
//! │  writer: Mutex<Option<SplitSink>> ◄── send() │
//! │                                              │
//! │  reader task (per connection generation):    │
//! │    SplitStream ──► handler.on_message(json)  │
//! │    close/error ──► handler.on_close(reason)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every successful `open()` starts a new *generation*. A reader task only
//! reports a close for its own generation, so a late-finishing reader from
//! an older socket can never tear down a newer one, and `close()` followed
//! by the reader noticing the socket end notifies the handler exactly once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
};

use crate::config::CortexConfig;
use crate::error::{CortexError, CortexResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Lifecycle of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Receives everything the reader task sees.
///
/// Both callbacks run on the reader task and must not block.
pub trait InboundHandler: Send + Sync + 'static {
    /// A text frame that parsed as JSON.
    fn on_message(&self, message: serde_json::Value);

    /// The link left the `Open` state, for whatever reason.
    fn on_close(&self, reason: &str);
}

/// What the transport needs from [`CortexConfig`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub url: String,
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
}

impl TransportSettings {
    #[must_use]
    pub fn from_config(config: &CortexConfig) -> Self {
        Self {
            url: config.cortex_url.clone(),
            accept_invalid_certs: config.should_accept_invalid_certs(),
            connect_timeout: Duration::from_secs(config.timeouts.connect_timeout_secs),
        }
    }
}

#[derive(Debug)]
struct LinkState {
    state: ConnectionState,
    generation: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The single WebSocket link of a client instance.
pub struct Transport {
    settings: TransportSettings,
    handler: Arc<dyn InboundHandler>,
    link: Arc<Mutex<LinkState>>,
    writer: Arc<tokio::sync::Mutex<Option<WsWriter>>>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    /// Serialises `open()`/`close()` so a second opener waits and then sees `Open`.
    lifecycle: tokio::sync::Mutex<()>,
}

impl Transport {
    pub fn new(settings: TransportSettings, handler: Arc<dyn InboundHandler>) -> Self {
        Self {
            settings,
            handler,
            link: Arc::new(Mutex::new(LinkState {
                state: ConnectionState::Disconnected,
                generation: 0,
            })),
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            reader_handle: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        lock(&self.link).state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.settings.url
    }

    /// Open the link. A no-op when it is already open.
    ///
    /// # Errors
    /// [`CortexError::Timeout`] when the handshake exceeds the connect
    /// timeout, [`CortexError::ConnectionFailed`] for any other failure.
    pub async fn open(&self) -> CortexResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_open() {
            return Ok(());
        }

        lock(&self.link).state = ConnectionState::Connecting;

        let ws = match self.connect().await {
            Ok(ws) => ws,
            Err(e) => {
                lock(&self.link).state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let (writer, reader) = ws.split();
        *self.writer.lock().await = Some(writer);

        let generation = {
            let mut link = lock(&self.link);
            link.generation += 1;
            link.state = ConnectionState::Open;
            link.generation
        };

        let handle = Self::spawn_reader_loop(
            reader,
            generation,
            Arc::clone(&self.link),
            Arc::clone(&self.writer),
            Arc::clone(&self.handler),
        );
        if let Some(stale) = lock(&self.reader_handle).replace(handle) {
            stale.abort();
        }

        Ok(())
    }

    async fn connect(&self) -> CortexResult<WsStream> {
        let url = &self.settings.url;
        let connector = tls_connector(self.settings.accept_invalid_certs).map_err(|e| {
            CortexError::ConnectionFailed {
                url: url.clone(),
                reason: format!("TLS configuration failed: {e}"),
            }
        })?;

        let connect_fut = connect_async_tls_with_config(url.as_str(), None, true, connector);
        let timeout = self.settings.connect_timeout;

        let (ws, response) = tokio::time::timeout(timeout, connect_fut)
            .await
            .map_err(|_| CortexError::Timeout {
                seconds: timeout.as_secs(),
            })?
            .map_err(|e| CortexError::ConnectionFailed {
                url: url.clone(),
                reason: format!("WebSocket connection failed: {e}"),
            })?;

        tracing::info!(url = %url, status = %response.status(), "Connected to Cortex API");
        Ok(ws)
    }

    fn spawn_reader_loop(
        mut reader: WsReader,
        generation: u64,
        link: Arc<Mutex<LinkState>>,
        writer: Arc<tokio::sync::Mutex<Option<WsWriter>>>,
        handler: Arc<dyn InboundHandler>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let reason = loop {
                match reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(raw = %text, "Reader loop received message");
                        match serde_json::from_str::<serde_json::Value>(&text) {
                            Ok(value) => handler.on_message(value),
                            Err(e) => {
                                tracing::warn!("Failed to parse WebSocket message as JSON: {e}");
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(
                            || "Cortex WebSocket closed".to_string(),
                            |f| format!("Cortex WebSocket closed: {} {}", f.code, f.reason),
                        );
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {e}");
                        break format!("WebSocket error: {e}");
                    }
                    None => break "Cortex WebSocket stream ended".to_string(),
                    // Binary frames, pings, pongs
                    Some(Ok(_)) => {}
                }
            };

            // Same lock order as close(): writer, then link.
            let mut writer = writer.lock().await;
            let current = {
                let mut link = lock(&link);
                if link.generation == generation && link.state == ConnectionState::Open {
                    link.state = ConnectionState::Disconnected;
                    true
                } else {
                    false
                }
            };
            if current {
                writer.take();
                drop(writer);
                tracing::info!(%reason, "Cortex link closed");
                handler.on_close(&reason);
            }
            tracing::debug!(generation, "Reader loop exiting");
        })
    }

    /// Write one text frame.
    ///
    /// # Errors
    /// [`CortexError::NotConnected`] unless the link is open;
    /// [`CortexError::WebSocket`] if the write itself fails.
    pub async fn send(&self, text: String) -> CortexResult<()> {
        if !self.is_open() {
            return Err(CortexError::NotConnected);
        }
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(CortexError::NotConnected);
        };
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| CortexError::WebSocket(format!("Send error: {e}")))
    }

    /// Close the link. Idempotent; always ends in `Disconnected`.
    ///
    /// The handler's `on_close` runs if the link was open.
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let mut writer = self.writer.lock().await;
        let was_open = {
            let mut link = lock(&self.link);
            let was_open = link.state == ConnectionState::Open;
            if was_open {
                link.state = ConnectionState::Closing;
            }
            // Retire the current reader generation.
            link.generation += 1;
            was_open
        };

        if let Some(mut sink) = writer.take() {
            let _ = sink.close().await;
        }
        drop(writer);

        if let Some(handle) = lock(&self.reader_handle).take() {
            handle.abort();
        }

        lock(&self.link).state = ConnectionState::Disconnected;

        if was_open {
            tracing::info!(url = %self.settings.url, "Disconnected from Cortex API");
            self.handler.on_close("closed by client");
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.reader_handle).take() {
            handle.abort();
        }
    }
}

// ─── TLS ────────────────────────────────────────────────────────────────

#[cfg(feature = "rustls-tls")]
fn tls_connector(accept_invalid_certs: bool) -> CortexResult<Option<Connector>> {
    if !accept_invalid_certs {
        return Ok(None);
    }
    let config = insecure::client_config()?;
    Ok(Some(Connector::Rustls(Arc::new(config))))
}

#[cfg(all(feature = "native-tls", not(feature = "rustls-tls")))]
fn tls_connector(accept_invalid_certs: bool) -> CortexResult<Option<Connector>> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?;
    Ok(Some(Connector::NativeTls(connector)))
}

#[cfg(not(any(feature = "rustls-tls", feature = "native-tls")))]
fn tls_connector(_accept_invalid_certs: bool) -> CortexResult<Option<Connector>> {
    Ok(None)
}

/// Certificate verifier for the Cortex service's self-signed localhost
/// certificate. Only installed when invalid certificates are accepted.
#[cfg(feature = "rustls-tls")]
mod insecure {
    use std::sync::Arc;

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::CryptoProvider;
    use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
    use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

    use crate::error::CortexResult;

    #[derive(Debug)]
    struct AcceptAnyServerCert {
        provider: Arc<CryptoProvider>,
    }

    impl ServerCertVerifier for AcceptAnyServerCert {
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
                &self.provider.signature_verification_algorithms,
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
                &self.provider.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.provider
                .signature_verification_algorithms
                .supported_schemes()
        }
    }

    pub(super) fn client_config() -> CortexResult<ClientConfig> {
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

        let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth();
        Ok(config)
    }
}
