use futures_util::future::{self, BoxFuture};
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Sink, SinkExt, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ConnectionError;

pub const NORMAL_CLOSURE: u16 = 1000;
pub const NO_STATUS: u16 = 1005;
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Frames the channel state machine cares about. Ping/pong stay inside the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Close(Option<u16>),
}

impl Frame {
    fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text),
            Self::Binary(bytes) => Message::Binary(bytes),
            Self::Close(code) => Message::Close(code.map(|code| CloseFrame {
                code: CloseCode::from(code),
                reason: "".into(),
            })),
        }
    }

    fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(Self::Text(text)),
            Message::Binary(bytes) => Some(Self::Binary(bytes)),
            Message::Close(frame) => Some(Self::Close(frame.map(|f| u16::from(f.code)))),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        }
    }
}

/// An open socket split into its read and write halves.
pub struct Socket {
    pub incoming: BoxStream<'static, Result<Frame, ConnectionError>>,
    pub outgoing: Pin<Box<dyn Sink<Frame, Error = ConnectionError> + Send>>,
}

/// Opens sockets. One call to `open` is one underlying connection attempt.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<Socket, ConnectionError>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<Socket, ConnectionError>> {
        let url = url.to_string();
        async move {
            let (ws, _resp) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| ConnectionError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
            let (sink, stream) = ws.split();

            let incoming = stream
                .filter_map(|item| {
                    future::ready(match item {
                        Ok(msg) => Frame::from_message(msg).map(Ok),
                        Err(e) => Some(Err(ConnectionError::Transport(e.to_string()))),
                    })
                })
                .boxed();
            let outgoing = sink
                .sink_map_err(|e| ConnectionError::Transport(e.to_string()))
                .with(|frame: Frame| future::ready(Ok::<_, ConnectionError>(frame.into_message())));

            Ok(Socket {
                incoming,
                outgoing: Box::pin(outgoing),
            })
        }
        .boxed()
    }
}
