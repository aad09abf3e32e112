// Kafka integration for the relay.
//
// One producer and one consumer per process, created at startup and shared
// for the process lifetime. Producing blocks until broker acknowledgment;
// consuming blocks up to a bounded timeout and reports "nothing available"
// as a non-error.

pub mod config;
pub mod consumer;
pub mod producer;
pub mod types;

pub use consumer::RelayConsumer;
pub use producer::RelayProducer;
pub use types::{BrokerMessage, DeliveryReceipt, RelayEnvelope};
