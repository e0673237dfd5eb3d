//! MQTT feed connector built on rumqttc

use std::collections::VecDeque;

use contracts::{FeedConfig, InboundMessage, QoS};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet,
    SubscribeReasonCode,
};
use tracing::{debug, instrument, trace};

use crate::connector::{FeedConnector, FeedSession};
use crate::error::FeedError;

/// Request channel capacity between client handle and event loop
const CLIENT_CAPACITY: usize = 64;

fn map_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Connects to the configured broker and subscribes to the topic filter
#[derive(Debug, Clone)]
pub struct MqttConnector {
    config: FeedConfig,
}

impl MqttConnector {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(true);

        if let Some(username) = &self.config.username {
            let password = self
                .config
                .password
                .as_ref()
                .map(|p| p.expose().to_string())
                .unwrap_or_default();
            options.set_credentials(username.clone(), password);
        }

        options
    }

    /// Drive the event loop until CONNACK and SUBACK arrive
    ///
    /// Publishes that race ahead of SUBACK are kept for the session.
    async fn handshake(
        &self,
        client: &AsyncClient,
        event_loop: &mut EventLoop,
        early: &mut VecDeque<InboundMessage>,
    ) -> Result<(), FeedError> {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(FeedError::Rejected {
                            code: format!("{:?}", ack.code),
                        });
                    }
                    debug!(session_present = ack.session_present, "CONNACK received");
                    client
                        .subscribe(self.config.topic.clone(), map_qos(self.config.qos))
                        .await
                        .map_err(|e| FeedError::Subscribe {
                            topic: self.config.topic.clone(),
                            message: e.to_string(),
                        })?;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(FeedError::Subscribe {
                            topic: self.config.topic.clone(),
                            message: "broker refused subscription".into(),
                        });
                    }
                    return Ok(());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    early.push_back(InboundMessage::new(publish.topic, publish.payload));
                }
                Ok(event) => trace!(?event, "Handshake event"),
                Err(ConnectionError::ConnectionRefused(code)) => {
                    return Err(FeedError::Rejected {
                        code: format!("{code:?}"),
                    });
                }
                Err(e) => return Err(FeedError::connect_failed(e.to_string())),
            }
        }
    }
}

impl FeedConnector for MqttConnector {
    type Session = MqttSession;

    #[instrument(
        name = "mqtt_connect",
        skip(self),
        fields(host = %self.config.host, port = self.config.port, topic = %self.config.topic)
    )]
    async fn connect(&mut self) -> Result<MqttSession, FeedError> {
        let (client, mut event_loop) = AsyncClient::new(self.options(), CLIENT_CAPACITY);
        let mut early = VecDeque::new();

        let timeout = self.config.connect_timeout();
        match tokio::time::timeout(timeout, self.handshake(&client, &mut event_loop, &mut early))
            .await
        {
            Ok(Ok(())) => Ok(MqttSession {
                client,
                event_loop,
                pending: early,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(FeedError::Timeout { after: timeout }),
        }
    }
}

/// Live MQTT subscription
pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    pending: VecDeque<InboundMessage>,
}

impl FeedSession for MqttSession {
    async fn next_message(&mut self) -> Result<InboundMessage, FeedError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(InboundMessage::new(publish.topic, publish.payload));
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return Err(FeedError::connection_lost("broker sent DISCONNECT"));
                }
                Ok(event) => trace!(?event, "Feed event"),
                Err(e) => return Err(FeedError::connection_lost(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            trace!(error = %e, "Disconnect request not queued");
        }
    }
}
