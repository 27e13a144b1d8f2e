//! Broker transport: traits, an envelope-aware producer, and an in-memory
//! implementation.

pub mod in_memory;
pub mod producer;
pub mod transport;

pub use in_memory::InMemoryBroker;
pub use producer::{event_headers, EventProducer};
pub use transport::{
    BrokerMessage, Delivered, Delivery, Headers, PartitionClaim, Producer, Subscriber,
};
