//! WebSocket transport tasks.
//!
//! Each connection attempt gets its own epoch. The reader task reports
//! everything it sees to the connection driver tagged with that epoch, so
//! events from a torn-down socket can be recognised and ignored.

use std::time::Duration;

use claw_proto::LinkCloseCode;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tracing::{debug, trace};

/// How long to keep reading after the gateway's close frame so the reply
/// can be flushed.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Something that happened on a transport.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// The socket is open and writable.
    Opened { epoch: u64 },
    /// A text frame arrived.
    Text { epoch: u64, text: String },
    /// The socket closed or errored after opening.
    Closed {
        epoch: u64,
        code: Option<u16>,
        reason: String,
    },
    /// The socket never opened.
    Failed { epoch: u64, error: String },
}

impl TransportEvent {
    pub(crate) const fn epoch(&self) -> u64 {
        match self {
            Self::Opened { epoch }
            | Self::Text { epoch, .. }
            | Self::Closed { epoch, .. }
            | Self::Failed { epoch, .. } => *epoch,
        }
    }
}

/// Handle to one transport attempt.
#[derive(Debug)]
pub(crate) struct Link {
    epoch: u64,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
}

impl Link {
    /// Open a transport in the background.
    pub(crate) fn spawn(
        url: String,
        connect_timeout: Duration,
        epoch: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(run(url, connect_timeout, epoch, events, outbound_rx));
        Self {
            epoch,
            outbound,
            reader,
        }
    }

    pub(crate) const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Queue a text frame.
    ///
    /// Returns `false` if the writer has already gone away.
    pub(crate) fn send_text(&self, text: String) -> bool {
        self.outbound.send(Message::Text(text.into())).is_ok()
    }

    /// Send a close frame and stop reading.
    ///
    /// The writer flushes the close frame before releasing the socket.
    pub(crate) fn close(self, code: LinkCloseCode) {
        let frame = CloseFrame {
            code: CloseCode::from(code.code()),
            reason: Utf8Bytes::from_static(code.reason()),
        };
        let _ = self.outbound.send(Message::Close(Some(frame)));
        self.reader.abort();
    }
}

async fn run(
    url: String,
    connect_timeout: Duration,
    epoch: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    debug!(url = %url, epoch, "opening gateway transport");
    let connect = tokio_tungstenite::connect_async(url.as_str());
    let ws = match tokio::time::timeout(connect_timeout, connect).await {
        Ok(Ok((ws, _))) => ws,
        Ok(Err(e)) => {
            let _ = events.send(TransportEvent::Failed {
                epoch,
                error: e.to_string(),
            });
            return;
        }
        Err(_) => {
            let _ = events.send(TransportEvent::Failed {
                epoch,
                error: format!("connect timed out after {connect_timeout:?}"),
            });
            return;
        }
    };

    let (mut write, mut read) = ws.split();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if write.send(msg).await.is_err() || closing {
                break;
            }
        }
        let _ = write.close().await;
    });

    if events.send(TransportEvent::Opened { epoch }).is_err() {
        writer.abort();
        return;
    }

    let mut peer_closed = false;
    let (code, reason) = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                trace!(epoch, len = text.len(), "frame received");
                if events
                    .send(TransportEvent::Text {
                        epoch,
                        text: text.as_str().to_owned(),
                    })
                    .is_err()
                {
                    break (None, "connection dropped".to_string());
                }
            }
            Some(Ok(Message::Close(frame))) => {
                peer_closed = true;
                break frame.map_or((None, String::new()), |f| {
                    (Some(u16::from(f.code)), f.reason.as_str().to_owned())
                });
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break (None, e.to_string()),
            None => break (None, String::new()),
        }
    };

    debug!(epoch, ?code, reason = %reason, "gateway transport closed");
    let _ = events.send(TransportEvent::Closed {
        epoch,
        code,
        reason,
    });

    // The close reply is queued inside the stream and goes out on the next
    // read; keep reading until the gateway drops the socket.
    if peer_closed {
        let drained = tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, async {
            while let Some(Ok(_)) = read.next().await {}
        })
        .await;
        if drained.is_err() {
            debug!(epoch, "gateway did not finish the close handshake");
        }
    }
    writer.abort();
}
