//! Queue consumer - the agent's long-running loop.
//!
//! One session at a time: connect, start the heartbeat, handle deliveries
//! strictly one after another, and on a recoverable failure wait out the
//! reconnect delay before connecting again.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{Broker, BrokerSession, Disposition, Heartbeat, MessageHandler, QueueError};

/// Where the consumer is in its connect/consume cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Consuming,
}

enum SessionEnd {
    Shutdown,
    Failed(QueueError),
}

pub struct QueueConsumer {
    broker: Arc<dyn Broker>,
    handler: Arc<dyn MessageHandler>,
    heartbeat_interval: Duration,
    reconnect_delay: Duration,
    state: watch::Sender<ConnectionState>,
}

impl QueueConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        handler: Arc<dyn MessageHandler>,
        heartbeat_interval: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            broker,
            handler,
            heartbeat_interval,
            reconnect_delay,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Consume until `shutdown` is cancelled or a non-recoverable error occurs.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), QueueError> {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let end = match self.broker.connect().await {
                Ok(session) => self.consume(session, &shutdown).await,
                Err(e) => SessionEnd::Failed(e),
            };
            self.set_state(ConnectionState::Disconnected);

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Failed(e) if e.is_recoverable() => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.reconnect_delay.as_secs(),
                        "Broker connection lost, reconnecting"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
                SessionEnd::Failed(e) => {
                    error!(error = %e, "Unrecoverable broker error");
                    return Err(e);
                }
            }
        }

        info!("Consumer stopped");
        Ok(())
    }

    async fn consume(
        &self,
        mut session: Box<dyn BrokerSession>,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let connection_lost = CancellationToken::new();
        let heartbeat = Heartbeat::spawn(
            session.probe(),
            self.heartbeat_interval,
            connection_lost.clone(),
        );
        self.set_state(ConnectionState::Consuming);

        let end = self
            .consume_loop(session.as_mut(), shutdown, &connection_lost)
            .await;

        heartbeat.stop().await;
        session.close().await;
        end
    }

    async fn consume_loop(
        &self,
        session: &mut dyn BrokerSession,
        shutdown: &CancellationToken,
        connection_lost: &CancellationToken,
    ) -> SessionEnd {
        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                _ = connection_lost.cancelled() => {
                    return SessionEnd::Failed(QueueError::ConnectionClosed(
                        "heartbeat reported the connection dead".to_string(),
                    ));
                }
                delivery = session.next_delivery() => delivery,
            };

            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => return SessionEnd::Failed(e),
            };

            // A job in progress runs to completion even during shutdown.
            debug!(delivery_tag = delivery.tag, bytes = delivery.body.len(), "Message received");
            let disposition = self.handler.handle(&delivery.body).await;
            info!(delivery_tag = delivery.tag, disposition = ?disposition, "Message settled");
            let settled = match disposition {
                Disposition::Ack => session.ack(delivery.tag).await,
                Disposition::Reject => session.reject(delivery.tag).await,
            };
            if let Err(e) = settled {
                return SessionEnd::Failed(e);
            }
        }
    }
}
