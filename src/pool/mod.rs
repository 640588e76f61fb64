//! Capacity-bounded pooling for broker connections and channels.
//!
//! [`Pool`] is generic over a [`Manager`], which knows how to create and close resources.
//! It is instantiated twice:
//! - [`ConnectionPool`], whose resources are connections opened by a
//!   [`Connector`](crate::transport::Connector);
//! - [`ChannelPool`], whose resources are channels opened on connections borrowed from a
//!   [`ConnectionPool`].
//!
//! ```rust
//! use carrot_pool::amqp::configuration::RabbitMqSettings;
//! use carrot_pool::amqp::ConnectionFactory;
//! use carrot_pool::pool::{ChannelPool, ChannelProvider, ConnectionPool, ConnectionProvider};
//!
//! // Function for asyncness.
//! async fn example() -> anyhow::Result<()> {
//!     // initialize rabbitmq connection details and config.
//!     let settings = RabbitMqSettings::default();
//!     let factory = ConnectionFactory::new_from_config(&settings)?;
//!
//!     let connection_pool = ConnectionPool::builder(ConnectionProvider::new(factory))
//!         .max_size(2)
//!         .build()?;
//!     let channel_pool = ChannelPool::builder(ChannelProvider::new(connection_pool))
//!         .max_size(16)
//!         .build()?;
//!
//!     // Borrow a channel: it goes back to the pool when dropped.
//!     let channel = channel_pool.get().await?;
//!     Ok(())
//! }
//! ```

mod channel;
mod connection;
mod error;
mod managed;

pub use channel::{ChannelPool, ChannelProvider, PooledChannel};
pub use connection::{ConnectionPool, ConnectionProvider, PooledConnection};
pub use error::{BuildError, PoolError};
pub use managed::{Manager, Object, Pool, PoolBuilder, Status};
