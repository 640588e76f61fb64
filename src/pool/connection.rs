//! Implements [`Manager`] for broker connections.
use tracing::debug;

use super::Manager;
use crate::amqp::ConnectionFactory;
use crate::transport::{BrokerConnection, Connector};
use crate::Error;

/// `ConnectionPool` pools connections to the RabbitMq broker.
pub type ConnectionPool<C = ConnectionFactory> = super::Pool<ConnectionProvider<C>>;

/// A connection borrowed from a [`ConnectionPool`].
pub type PooledConnection<C = ConnectionFactory> = super::Object<ConnectionProvider<C>>;

/// `ConnectionProvider` implements [`Manager`] to fill a [`ConnectionPool`]
/// using a [`Connector`].
pub struct ConnectionProvider<C> {
    connector: C,
}

impl<C: Connector> ConnectionProvider<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[async_trait::async_trait]
impl<C: Connector> Manager for ConnectionProvider<C> {
    type Type = C::Connection;
    type Error = Error;

    async fn create(&self) -> Result<C::Connection, Error> {
        self.connector.connect().await.map_err(Error::Connect)
    }

    fn is_healthy(&self, obj: &C::Connection) -> bool {
        !obj.is_closed()
    }

    async fn close(&self, obj: &C::Connection) -> Result<(), anyhow::Error> {
        if obj.is_closed() {
            return Ok(());
        }
        debug!("Closing pooled connection");
        obj.close().await
    }
}
