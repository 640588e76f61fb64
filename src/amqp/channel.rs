//! Implements the [`transport`](crate::transport) traits for [`lapin`].
use lapin::options::ConfirmSelectOptions;
use lapin::{ChannelState, ConnectionState};
use tracing::warn;

use crate::transport::{BrokerChannel, BrokerConnection, ChannelOptions};

/// AMQP reply code for a normal shutdown.
const REPLY_SUCCESS: u16 = 200;

/// A RabbitMq channel, together with the options it was opened with.
#[derive(Clone, Debug)]
pub struct Channel {
    inner: lapin::Channel,
    publisher_confirms: bool,
    on_return_raises: bool,
}

impl Channel {
    /// Get access to the underlying raw channel.
    pub fn raw(&self) -> &lapin::Channel {
        &self.inner
    }

    /// `true` if the channel was put in confirm mode when opened.
    pub fn publisher_confirms(&self) -> bool {
        self.publisher_confirms
    }

    /// `true` if messages returned by the broker should be treated as publishing failures.
    ///
    /// Publishers built on top of this channel are expected to honour it, e.g. by setting
    /// the `mandatory` flag and failing on `Confirmation::Ack(Some(_))`.
    pub fn on_return_raises(&self) -> bool {
        self.on_return_raises
    }
}

impl AsRef<lapin::Channel> for Channel {
    fn as_ref(&self) -> &lapin::Channel {
        &self.inner
    }
}

#[async_trait::async_trait]
impl BrokerConnection for lapin::Connection {
    type Channel = Channel;

    #[tracing::instrument(name = "rabbitmq_create_channel", skip(self))]
    async fn open_channel(&self, options: &ChannelOptions) -> Result<Channel, anyhow::Error> {
        if let Some(channel_number) = options.channel_number {
            // lapin allocates channel ids on its own.
            warn!(
                channel_number,
                "Ignoring the requested channel number, lapin assigns channel ids itself"
            );
        }
        let inner = self.create_channel().await?;
        if options.publisher_confirms {
            // See https://www.rabbitmq.com/amqp-0-9-1-reference.html#confirm.select.nowait
            inner
                .confirm_select(ConfirmSelectOptions { nowait: false })
                .await?;
        }
        Ok(Channel {
            inner,
            publisher_confirms: options.publisher_confirms,
            on_return_raises: options.on_return_raises,
        })
    }

    fn is_closed(&self) -> bool {
        matches!(
            self.status().state(),
            ConnectionState::Closing | ConnectionState::Closed | ConnectionState::Error
        )
    }

    async fn close(&self) -> Result<(), anyhow::Error> {
        lapin::Connection::close(self, REPLY_SUCCESS, "Connection pool closed").await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrokerChannel for Channel {
    fn is_closed(&self) -> bool {
        matches!(
            self.inner.status().state(),
            ChannelState::Closing | ChannelState::Closed | ChannelState::Error
        )
    }

    async fn close(&self) -> Result<(), anyhow::Error> {
        self.inner.close(REPLY_SUCCESS, "Channel closed").await?;
        Ok(())
    }
}
