//! WebSocket signaling transport
//!
//! A persistent duplex connection to the signaling server. Outgoing frames go
//! through an unbounded channel to a writer task; a reader task forwards
//! incoming text frames, the close, or a read error into the session's event
//! channel.
//!
//! The transport has no opinion on envelope contents: frames travel as raw
//! text and are parsed by the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::SessionError;
use crate::event::{EventSender, TransportEvent};
use crate::signaling::SignalingEnvelope;

/// Opens signaling links
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Open a link to `url`. Resolving `Ok` is the transport's "opened" event;
    /// afterwards every frame, the close and any error arrive on `events`.
    async fn open(&self, url: &Url, events: EventSender) -> Result<Arc<dyn SignalingLink>, SessionError>;
}

/// An open signaling link
pub trait SignalingLink: Send + Sync {
    fn is_open(&self) -> bool;

    /// Queue a raw text frame
    fn send_text(&self, text: String) -> Result<(), SessionError>;

    /// Close the link. Safe to call more than once.
    fn close(&self);

    /// Serialize and queue an envelope. Callers check [`is_open`](Self::is_open) first.
    fn send(&self, envelope: &SignalingEnvelope) -> Result<(), SessionError> {
        let text = envelope.to_json()?;
        self.send_text(text)
    }
}

/// tokio-tungstenite based connector
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn open(&self, url: &Url, events: EventSender) -> Result<Arc<dyn SignalingLink>, SessionError> {
        if url.scheme() == "wss" {
            install_crypto_provider();
        }

        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::TransportOpen(e.to_string()))?;

        log::info!("[Signaling] Connected to signaling server: {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let open = Arc::new(AtomicBool::new(true));

        // Writer task: drains queued frames, stops after sending a close
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if ws_sender.send(msg).await.is_err() || closing {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let open_for_reader = open.clone();
        let reader = tokio::spawn(async move {
            loop {
                let event = match ws_receiver.next().await {
                    Some(Ok(Message::Text(text))) => TransportEvent::Message(text),
                    Some(Ok(Message::Close(frame))) => {
                        log::info!("[Signaling] Signaling connection closed: {:?}", frame);
                        TransportEvent::Closed
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        log::error!("[Signaling] WebSocket error: {}", e);
                        TransportEvent::Error(e.to_string())
                    }
                    None => {
                        log::info!("[Signaling] WebSocket stream ended");
                        TransportEvent::Closed
                    }
                };

                let terminal = !matches!(event, TransportEvent::Message(_));
                if terminal {
                    open_for_reader.store(false, Ordering::SeqCst);
                }
                if events.send(event.into()).is_err() || terminal {
                    break;
                }
            }
        });

        Ok(Arc::new(WsLink {
            tx,
            open,
            reader: Mutex::new(Some(reader)),
        }))
    }
}

/// rustls needs a process-wide provider before the first TLS handshake.
/// Another one may already be installed by the embedding application.
fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        log::debug!("[Signaling] Using the already installed TLS crypto provider");
    }
}

/// Link half of a tokio-tungstenite connection
pub struct WsLink {
    tx: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SignalingLink for WsLink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: String) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::TransportRuntime("signaling transport is not open".into()));
        }
        self.tx
            .send(Message::Text(text))
            .map_err(|_| SessionError::TransportRuntime("signaling writer has stopped".into()))
    }

    fn close(&self) {
        // Stop reporting first so a locally requested close emits no events
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.tx.send(Message::Close(None));
        }
    }
}

impl Drop for WsLink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SessionEvent;
    use tokio::net::TcpListener;

    async fn echo_server() -> (Url, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut received = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) if text == "bye" => {
                        let _ = ws.close(None).await;
                        break;
                    }
                    Message::Text(text) => {
                        received.push(text.clone());
                        ws.send(Message::Text(text)).await.unwrap();
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            received
        });

        (Url::parse(&format!("ws://{}", addr)).unwrap(), server)
    }

    #[tokio::test]
    async fn test_frames_round_trip_and_close_is_reported() {
        let (url, server) = echo_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();

        let link = WsConnector.open(&url, tx).await.unwrap();
        assert!(link.is_open());

        link.send(&SignalingEnvelope::RequestStream).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Transport(TransportEvent::Message(
                r#"{"type":"request-stream"}"#.to_string()
            )))
        );

        link.send_text("bye".into()).unwrap();
        assert_eq!(rx.recv().await, Some(SessionEvent::Transport(TransportEvent::Closed)));
        assert!(!link.is_open());
        assert!(link.send(&SignalingEnvelope::RequestStream).is_err());

        assert_eq!(server.await.unwrap(), vec![r#"{"type":"request-stream"}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_local_close_is_idempotent() {
        let (url, server) = echo_server().await;
        let (tx, _rx) = mpsc::unbounded_channel::<SessionEvent>();

        let link = WsConnector.open(&url, tx).await.unwrap();
        link.close();
        link.close();
        assert!(!link.is_open());

        assert!(server.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wss_starts_tls_handshake() {
        use tokio::io::AsyncReadExt;

        // Plain TCP peer: sees the ClientHello, then hangs up
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            let n = stream.read(&mut buf).await.unwrap();
            buf[..n].to_vec()
        });

        let (tx, _rx) = mpsc::unbounded_channel::<SessionEvent>();
        let url = Url::parse(&format!("wss://{}/viewer", addr)).unwrap();
        let err = WsConnector.open(&url, tx).await.err().unwrap();

        // 0x16: TLS handshake record
        assert_eq!(server.await.unwrap().first(), Some(&0x16));
        match err {
            SessionError::TransportOpen(message) => assert!(!message.contains("not compiled"), "{}", message),
            other => panic!("Expected TransportOpen, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_failure_is_transport_open_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, _rx) = mpsc::unbounded_channel::<SessionEvent>();
        let url = Url::parse(&format!("ws://{}", addr)).unwrap();
        let err = WsConnector.open(&url, tx).await.err().unwrap();
        assert!(matches!(err, SessionError::TransportOpen(_)));
    }
}
