//! Job scheduling for the OpenChecker scan agent.
//!
//! Consumes scan jobs from an AMQP queue one at a time, runs each job's
//! checkers against a fresh workspace, and delivers the aggregated result to
//! the job's callback URL.

pub mod consumer;
pub mod delivery;
pub mod dispatcher;
pub mod heartbeat;
pub mod queue;

pub use consumer::{ConnectionState, QueueConsumer};
pub use delivery::{CallbackClient, DeliveryError, retry_config};
pub use dispatcher::{Disposition, JobDispatcher, JobEvent, MessageHandler};
pub use heartbeat::Heartbeat;
pub use queue::{AmqpBroker, Broker, BrokerSession, ConnectionProbe, Delivery, QueueError, QueueStatus};

pub use openchecker_core::RetryConfig;
