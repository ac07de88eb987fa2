//! MQTT publisher: owns the broker session for one run.
//!
//! Lifecycle is `Disconnected -> Connected -> Disconnected`. The rumqttc
//! event loop runs on a background task and forwards transport events back
//! over a channel, so `publish` can block until the broker confirms each
//! message: the outgoing write for QoS 0, PUBACK for QoS 1, PUBCOMP for
//! QoS 2.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Outgoing, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use skycast_common::config::{MqttConfig, Qos};

/// Bus handshake failure. Fatal to the run, never retried.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid broker address: {0}")]
    InvalidBroker(String),
    #[error("broker handshake failed: {0}")]
    Handshake(String),
    #[error("broker handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// One failed publish. Recovered by the caller; never retried here.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("failed to publish to channel '{channel}': {reason}")]
pub struct PublishError {
    pub channel: String,
    pub reason: String,
}

impl PublishError {
    fn new(channel: &str, reason: impl Into<String>) -> Self {
        Self {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }
}

/// Capability the pipeline publishes through.
#[allow(async_fn_in_trait)]
pub trait MessagePublisher {
    /// Publish one UTF-8 payload and wait for the transport to confirm it.
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), PublishError>;

    /// Flush in-flight traffic for at most `drain`, then tear down
    /// unconditionally.
    async fn disconnect(self, drain: Duration);
}

/// Transport events the session task forwards to the publisher.
#[derive(Debug)]
enum SessionEvent {
    Connected,
    Rejected(String),
    Written(u16),
    Acked(u16),
    Completed(u16),
    Closed(String),
}

/// MQTT-backed [`MessagePublisher`].
#[derive(Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
    events: mpsc::Receiver<SessionEvent>,
    session: JoinHandle<()>,
    qos: QoS,
    retain: bool,
    ack_timeout: Duration,
}

impl MqttPublisher {
    /// Connect to the broker and wait for a successful CONNACK.
    pub async fn connect(config: &MqttConfig) -> Result<Self, ConnectionError> {
        let addr = config
            .broker_addr()
            .map_err(|e| ConnectionError::InvalidBroker(e.to_string()))?;

        let mut options = MqttOptions::new(config.client_id.clone(), addr.host, addr.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, 16);
        let (tx, mut events) = mpsc::channel(16);

        let session = tokio::spawn(async move {
            loop {
                let event = match event_loop.poll().await {
                    Ok(event) => event,
                    Err(e) => {
                        let _ = tx.send(SessionEvent::Closed(e.to_string())).await;
                        break;
                    }
                };

                let forwarded = match event {
                    Event::Incoming(Packet::ConnAck(ack)) => {
                        if ack.code == ConnectReturnCode::Success {
                            Some(SessionEvent::Connected)
                        } else {
                            Some(SessionEvent::Rejected(format!("{:?}", ack.code)))
                        }
                    }
                    Event::Outgoing(Outgoing::Publish(pkid)) => Some(SessionEvent::Written(pkid)),
                    Event::Incoming(Packet::PubAck(ack)) => Some(SessionEvent::Acked(ack.pkid)),
                    Event::Incoming(Packet::PubComp(comp)) => {
                        Some(SessionEvent::Completed(comp.pkid))
                    }
                    _ => None,
                };

                if let Some(forwarded) = forwarded
                    && tx.send(forwarded).await.is_err()
                {
                    break;
                }
            }
        });

        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        match tokio::time::timeout(connect_timeout, events.recv()).await {
            Ok(Some(SessionEvent::Connected)) => {
                debug!(broker = %config.broker, "Connected to broker");
                Ok(Self {
                    client,
                    events,
                    session,
                    qos: transport_qos(config.qos),
                    retain: config.retain,
                    ack_timeout: Duration::from_millis(config.ack_timeout_ms),
                })
            }
            Ok(Some(SessionEvent::Rejected(reason))) => {
                session.abort();
                Err(ConnectionError::Handshake(format!(
                    "broker rejected the connection: {}",
                    reason
                )))
            }
            Ok(Some(SessionEvent::Closed(reason))) => {
                session.abort();
                Err(ConnectionError::Handshake(reason))
            }
            Ok(Some(event)) => {
                session.abort();
                Err(ConnectionError::Handshake(format!(
                    "unexpected event before CONNACK: {:?}",
                    event
                )))
            }
            Ok(None) => {
                session.abort();
                Err(ConnectionError::Handshake(
                    "event loop terminated during handshake".to_string(),
                ))
            }
            Err(_) => {
                session.abort();
                Err(ConnectionError::Timeout(connect_timeout))
            }
        }
    }

    /// Wait for the confirmation the configured QoS level requires.
    async fn wait_for_confirmation(&mut self, channel: &str) -> Result<(), PublishError> {
        let deadline = tokio::time::Instant::now() + self.ack_timeout;

        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .map_err(|_| {
                    PublishError::new(
                        channel,
                        format!("no acknowledgment within {:?}", self.ack_timeout),
                    )
                })?;

            match event {
                Some(SessionEvent::Written(_)) if self.qos == QoS::AtMostOnce => return Ok(()),
                Some(SessionEvent::Acked(_)) if self.qos == QoS::AtLeastOnce => return Ok(()),
                Some(SessionEvent::Completed(_)) if self.qos == QoS::ExactlyOnce => return Ok(()),
                Some(SessionEvent::Closed(reason)) => {
                    return Err(PublishError::new(channel, reason));
                }
                // The write preceding a PUBACK/PUBCOMP, keep-alive traffic.
                Some(_) => continue,
                None => {
                    return Err(PublishError::new(channel, "event loop terminated"));
                }
            }
        }
    }
}

impl MessagePublisher for MqttPublisher {
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), PublishError> {
        self.client
            .publish(channel, self.qos, self.retain, payload.as_bytes())
            .await
            .map_err(|e| PublishError::new(channel, e.to_string()))?;

        self.wait_for_confirmation(channel).await
    }

    async fn disconnect(mut self, drain: Duration) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "DISCONNECT not sent, session already gone");
        }

        // Best-effort drain: the session task ends once the broker closes
        // the connection in response to DISCONNECT.
        let drained = tokio::time::timeout(drain, async {
            while let Some(event) = self.events.recv().await {
                if matches!(event, SessionEvent::Closed(_)) {
                    break;
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(window = ?drain, "Drain window elapsed before the session closed");
        }

        self.session.abort();
    }
}

fn transport_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}
