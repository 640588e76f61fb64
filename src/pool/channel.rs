//! Implements [`Manager`] for broker channels.
use tracing::debug;

use super::connection::ConnectionPool;
use super::Manager;
use crate::amqp::ConnectionFactory;
use crate::transport::{BrokerChannel, BrokerConnection, ChannelOf, ChannelOptions, Connector};
use crate::Error;

/// `ChannelPool` pools channels.
///
/// It relies on a [`ConnectionPool`] to reuse connections across channels.
pub type ChannelPool<C = ConnectionFactory> = super::Pool<ChannelProvider<C>>;

/// A channel borrowed from a [`ChannelPool`].
pub type PooledChannel<C = ConnectionFactory> = super::Object<ChannelProvider<C>>;

/// `ChannelProvider` implements [`Manager`] to fill a [`ChannelPool`].
///
/// Every new channel is opened on a connection borrowed from the inner [`ConnectionPool`].
/// The connection goes back to its pool as soon as the channel is open: a single connection
/// slot can therefore mint any number of channels over time.
pub struct ChannelProvider<C: Connector> {
    connection_pool: ConnectionPool<C>,
    options: ChannelOptions,
}

impl<C: Connector> ChannelProvider<C> {
    /// Construct a `ChannelProvider` opening channels with the default [`ChannelOptions`],
    /// i.e. with publisher confirmations enabled.
    pub fn new(connection_pool: ConnectionPool<C>) -> Self {
        Self {
            connection_pool,
            options: ChannelOptions::default(),
        }
    }

    /// Change the options used to open new channels.
    #[must_use]
    pub fn with_options(self, options: ChannelOptions) -> Self {
        Self { options, ..self }
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    pub fn connection_pool(&self) -> &ConnectionPool<C> {
        &self.connection_pool
    }
}

#[async_trait::async_trait]
impl<C: Connector> Manager for ChannelProvider<C> {
    type Type = ChannelOf<C>;
    type Error = Error;

    async fn create(&self) -> Result<ChannelOf<C>, Error> {
        let connection = self.connection_pool.get().await?;
        connection
            .open_channel(&self.options)
            .await
            .map_err(Error::ChannelCreation)
    }

    fn is_healthy(&self, obj: &ChannelOf<C>) -> bool {
        !obj.is_closed()
    }

    async fn close(&self, obj: &ChannelOf<C>) -> Result<(), anyhow::Error> {
        if obj.is_closed() {
            return Ok(());
        }
        debug!("Closing pooled channel");
        obj.close().await
    }
}
