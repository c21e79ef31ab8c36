//! Channel manager: owns every active channel and merges their streams.

use std::collections::HashMap;

use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse, StatusUpdate};
use crate::error::ChannelError;

/// Routes responses back to the channel each message arrived on.
#[derive(Default)]
pub struct ChannelManager {
    channels: HashMap<String, Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. A channel with the same name is replaced.
    pub fn add(&mut self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            tracing::warn!(channel = %name, "Replacing already registered channel");
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Health-check and start every channel, then merge their message
    /// streams into one.
    ///
    /// Fails if any channel is unhealthy or fails to start.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            if let Err(e) = channel.health_check().await {
                tracing::error!(channel = %name, error = %e, "Channel health check failed");
                return Err(e);
            }
            let stream = channel.start().await?;
            tracing::info!(channel = %name, "Channel started");
            streams.push(stream);
        }
        Ok(Box::pin(stream::select_all(streams)))
    }

    fn get(&self, name: &str) -> Result<&dyn Channel, ChannelError> {
        self.channels
            .get(name)
            .map(|c| c.as_ref())
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    /// Send a response through the channel `msg` arrived on.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.respond(msg, response).await
    }

    pub async fn send_status(
        &self,
        channel: &str,
        status: StatusUpdate,
        metadata: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        self.get(channel)?.send_status(status, metadata).await
    }

    /// Shut down every channel, logging (not propagating) individual failures.
    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = %name, error = %e, "Channel shutdown failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::Mutex;

    use super::*;

    struct FixedChannel {
        name: &'static str,
        inbound: Vec<&'static str>,
        sent: Arc<Mutex<Vec<String>>>,
        healthy: bool,
    }

    #[async_trait]
    impl Channel for FixedChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let name = self.name;
            let messages: Vec<IncomingMessage> = self
                .inbound
                .iter()
                .map(|text| IncomingMessage::new(name, "u", *text))
                .collect();
            Ok(Box::pin(stream::iter(messages)))
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().await.push(response.content);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            if self.healthy {
                Ok(())
            } else {
                Err(ChannelError::StartupFailed {
                    name: self.name.to_string(),
                    reason: "unreachable".into(),
                })
            }
        }
    }

    fn fixed(name: &'static str, inbound: Vec<&'static str>) -> (FixedChannel, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let channel = FixedChannel {
            name,
            inbound,
            sent: Arc::clone(&sent),
            healthy: true,
        };
        (channel, sent)
    }

    #[tokio::test]
    async fn merges_streams_from_all_channels() {
        let (a, _) = fixed("a", vec!["a1", "a2"]);
        let (b, _) = fixed("b", vec!["b1"]);
        let mut manager = ChannelManager::new();
        manager.add(Box::new(a));
        manager.add(Box::new(b));
        assert_eq!(manager.names(), vec!["a", "b"]);

        let mut contents: Vec<String> = manager
            .start_all()
            .await
            .unwrap()
            .map(|m| m.content)
            .collect()
            .await;
        contents.sort();
        assert_eq!(contents, vec!["a1", "a2", "b1"]);
    }

    #[tokio::test]
    async fn unhealthy_channel_fails_startup() {
        let (a, _) = fixed("a", vec!["a1"]);
        let (mut b, _) = fixed("b", vec!["b1"]);
        b.healthy = false;
        let mut manager = ChannelManager::new();
        manager.add(Box::new(a));
        manager.add(Box::new(b));

        let err = manager.start_all().await.err().expect("startup should fail");
        assert!(matches!(err, ChannelError::StartupFailed { name, .. } if name == "b"));
    }

    #[tokio::test]
    async fn responds_through_origin_channel() {
        let (a, sent_a) = fixed("a", vec![]);
        let (b, sent_b) = fixed("b", vec![]);
        let mut manager = ChannelManager::new();
        manager.add(Box::new(a));
        manager.add(Box::new(b));

        let msg = IncomingMessage::new("b", "u", "hi");
        manager
            .respond(&msg, OutgoingResponse::text("reply"))
            .await
            .unwrap();

        assert!(sent_a.lock().await.is_empty());
        assert_eq!(*sent_b.lock().await, vec!["reply"]);
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let manager = ChannelManager::new();
        let msg = IncomingMessage::new("nowhere", "u", "hi");
        let err = manager
            .respond(&msg, OutgoingResponse::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownChannel(name) if name == "nowhere"));
    }
}
