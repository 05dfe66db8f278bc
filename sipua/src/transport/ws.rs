//! WebSocket client transport.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{Error, Result};
use crate::message::TransportKind;
use crate::transport::{Socket, SocketEvent, SocketTx};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// A SIP WebSocket client socket (RFC 7118).
///
/// Frames are sent as text messages on the `sip` subprotocol. The UA
/// drives reconnection; one `WsSocket` can be connected many times over
/// its life.
pub struct WsSocket {
    url: String,
    kind: TransportKind,
    writer: Mutex<Option<WsWriter>>,
}

impl WsSocket {
    /// Creates a socket for the given `ws://` or `wss://` url.
    pub fn new(url: &str) -> Result<Arc<Self>> {
        let kind = if url.starts_with("wss://") {
            TransportKind::Wss
        } else if url.starts_with("ws://") {
            TransportKind::Ws
        } else {
            return Err(Error::Configuration(format!("Invalid WebSocket url '{url}'")));
        };

        Ok(Arc::new(WsSocket {
            url: url.to_string(),
            kind,
            writer: Mutex::new(None),
        }))
    }

    async fn reader_task(mut reader: futures_util::stream::SplitStream<WsStream>, events: SocketTx) {
        let error = loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    if events.send(SocketEvent::Data(text.into())).is_err() {
                        break None;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if events.send(SocketEvent::Data(data)).is_err() {
                        break None;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break None,
                Some(Ok(_)) => continue,
                Some(Err(err)) => break Some(err.to_string()),
            }
        };

        let _ = events.send(SocketEvent::Disconnected { error });
    }
}

#[async_trait::async_trait]
impl Socket for WsSocket {
    async fn connect(&self, events: SocketTx) -> Result<()> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| Error::Transport(err.to_string()))?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("sip"));

        let (stream, _) = connect_async(request)
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;

        let (writer, reader) = stream.split();
        *self.writer.lock().await = Some(writer);

        tokio::spawn(Self::reader_task(reader, events.clone()));

        events.send(SocketEvent::Connected)?;

        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.send(Message::Close(None)).await;
            let _ = writer.close().await;
        }
    }

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(Error::Transport("Socket is not connected".into()));
        };

        let text = std::str::from_utf8(buf).map_err(|err| Error::Transport(err.to_string()))?;
        writer
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;

        Ok(buf.len())
    }

    fn tp_kind(&self) -> TransportKind {
        self.kind
    }

    fn peer_name(&self) -> &str {
        &self.url
    }
}
