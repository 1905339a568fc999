// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote sink abstraction.
//!
//! The sync loop only needs one thing from the backend: take a batch and
//! say how far it got. The trait keeps the loop independent of the wire:
//! - [`WebSocketSink`] talks the JSON protocol of `rq_core::protocol`
//! - tests plug in an in-memory sink

use std::future::Future;
use std::pin::Pin;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use rq_core::protocol::{ClientMessage, ServerMessage};
use rq_core::{Batch, Rejection, Seq};

/// How far the server processed a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Every operation up to and including this sequence was processed.
    pub highest_accepted: Seq,
    /// Operations within the accepted range that were refused for good.
    pub rejections: Vec<Rejection>,
}

impl Acknowledgement {
    /// Acknowledges everything up to `seq` with no rejections.
    pub fn upto(seq: Seq) -> Self {
        Acknowledgement {
            highest_accepted: seq,
            rejections: Vec::new(),
        }
    }
}

/// Error type for sink operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Worth retrying later (network down, server busy, timeout).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying the same batch can never succeed.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination of queued operations.
pub trait RemoteSink: Send {
    /// Sends a batch and waits for the server's answer.
    fn send<'a>(
        &'a mut self,
        batch: &'a Batch,
    ) -> Pin<Box<dyn Future<Output = SinkResult<Acknowledgement>> + Send + 'a>>;

    /// Releases any connection held by the sink.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

/// Sink sending batches over a WebSocket using tokio-tungstenite.
///
/// Connects lazily on the first send and again after any socket failure.
pub struct WebSocketSink {
    url: String,
    run_id: String,
    ws: Option<WebSocketConnection>,
}

impl WebSocketSink {
    pub fn new(url: impl Into<String>, run_id: impl Into<String>) -> Self {
        WebSocketSink {
            url: url.into(),
            run_id: run_id.into(),
            ws: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }

    async fn connect(url: &str) -> SinkResult<WebSocketConnection> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SinkError::Transient(format!("connection failed: {e}")))?;
        tracing::debug!(%url, "connected to server");
        let (sink, stream) = ws_stream.split();
        Ok(WebSocketConnection { sink, stream })
    }

    /// Sends one batch and returns the server's verdict.
    ///
    /// The connection is taken out of `self.ws` for the request and put
    /// back only once a reply was read, so an exchange dropped half way
    /// closes the socket along with any late reply.
    async fn exchange(&mut self, batch: &Batch) -> SinkResult<Acknowledgement> {
        let json = ClientMessage::batch(self.run_id.clone(), batch.ops().to_vec())
            .to_json()
            .map_err(|e| SinkError::Permanent(format!("cannot encode batch: {e}")))?;

        let mut ws = match self.ws.take() {
            Some(ws) => ws,
            None => Self::connect(&self.url).await?,
        };
        let reply = request(&mut ws, json).await?;
        match reply {
            ServerMessage::Ack {
                highest_accepted,
                rejections,
            } => {
                self.ws = Some(ws);
                Ok(Acknowledgement {
                    highest_accepted,
                    rejections,
                })
            }
            ServerMessage::Error {
                permanent: true,
                message,
            } => {
                self.ws = Some(ws);
                Err(SinkError::Permanent(message))
            }
            // The server state is unknown after a transient error; start fresh.
            ServerMessage::Error { message, .. } => Err(SinkError::Transient(message)),
        }
    }
}

/// Writes `json` and reads the next server message.
async fn request(ws: &mut WebSocketConnection, json: String) -> SinkResult<ServerMessage> {
    ws.sink
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| SinkError::Transient(format!("send failed: {e}")))?;
    ws.sink
        .flush()
        .await
        .map_err(|e| SinkError::Transient(format!("send failed: {e}")))?;

    loop {
        match ws.stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return ServerMessage::from_json(&text)
                    .map_err(|e| SinkError::Transient(format!("unreadable response: {e}")));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(SinkError::Transient("connection closed".into()));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(SinkError::Transient(format!("receive failed: {e}")));
            }
        }
    }
}

impl RemoteSink for WebSocketSink {
    fn send<'a>(
        &'a mut self,
        batch: &'a Batch,
    ) -> Pin<Box<dyn Future<Output = SinkResult<Acknowledgement>> + Send + 'a>> {
        Box::pin(self.exchange(batch))
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                let _ = ws.sink.close().await;
            }
        })
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
