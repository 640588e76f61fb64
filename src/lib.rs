//! `carrot-pool` bounds and reuses the network resources needed to talk to RabbitMq,
//! built on top of [`lapin`].
//!
//! Connections are expensive (a TCP socket, often a TLS handshake, an AMQP negotiation),
//! channels are cheaper but still require a round-trip to the broker. `carrot-pool` keeps
//! both in pools of bounded size, and can pin a dedicated channel to a queue when ordering
//! or prefetch semantics require it.
//!
//! [`ConnectionManager`] is the best starting point to learn more about what `carrot-pool`
//! provides. The [`pool`] module exposes the underlying pools, the [`transport`] module the
//! traits that let you plug a different broker client in.

pub mod affinity;
pub mod amqp;
mod error;
mod manager;
pub mod pool;
pub mod transport;

pub use error::Error;
pub use manager::{AcquiredChannel, ConnectionManager, ConnectionManagerBuilder};
