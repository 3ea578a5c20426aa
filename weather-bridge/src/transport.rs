//! Delivery of outbound messages to the host device.

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, mpsc},
};

use crate::{error::TransportError, model::OutboundMessage};

#[async_trait]
pub trait HostTransport: Send + Sync + Debug {
    async fn send_app_message(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

/// Writes each message as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesTransport<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> HostTransport for JsonLinesTransport<W>
where
    W: AsyncWrite + Unpin + Send + Debug,
{
    async fn send_app_message(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Hands messages to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl HostTransport for ChannelTransport {
    async fn send_app_message(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.tx
            .send(message.clone())
            .map_err(|_| TransportError::Closed)
    }
}
