//! The broker primitives pooled by this crate.
//!
//! [`ConnectionManager`](crate::ConnectionManager) only relies on these traits: they are
//! implemented for [`lapin`] in the [`amqp`](crate::amqp) module, but any client exposing
//! connections and channels can be plugged in.

/// Settings used to open every channel handed out by a
/// [`ChannelPool`](crate::pool::ChannelPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Ask for a specific channel id. The broker client picks one if `None`.
    pub channel_number: Option<u16>,
    /// Put the channel in confirm mode.
    pub publisher_confirms: bool,
    /// Treat messages returned by the broker as publishing failures.
    pub on_return_raises: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            channel_number: None,
            publisher_confirms: true,
            on_return_raises: false,
        }
    }
}

/// Something that can establish connections to a broker.
///
/// Implementers carry everything required to connect - address, credentials, timeout, TLS.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: BrokerConnection;

    /// Establish a new connection.
    async fn connect(&self) -> Result<Self::Connection, anyhow::Error>;
}

/// A live connection to a broker.
#[async_trait::async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    type Channel: BrokerChannel;

    /// Open a new channel multiplexed over this connection.
    ///
    /// The channel stays usable after the connection has been given back to its pool.
    async fn open_channel(&self, options: &ChannelOptions) -> Result<Self::Channel, anyhow::Error>;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), anyhow::Error>;
}

/// A channel, i.e. a logical session multiplexed over a [`BrokerConnection`].
#[async_trait::async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), anyhow::Error>;
}

/// The channel type produced by the connections of a [`Connector`].
pub type ChannelOf<C> = <<C as Connector>::Connection as BrokerConnection>::Channel;
