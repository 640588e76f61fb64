use carrot_pool::amqp::configuration::RabbitMqSettings;
use carrot_pool::ConnectionManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The out-of-the-box parameters for the default RabbitMq Docker image.
    let mut settings = RabbitMqSettings::default();

    // A connection maps to an open TCP socket, a channel is a "logical" connection sharing
    // that socket. Channels are cheaper, so we can afford many more of them.
    // The maximum number of channels is, de facto, an upper limit on the number of
    // operations that can hit the broker concurrently.
    settings.pool.connection_pool_size = Some(2);
    settings.pool.channel_pool_size = Some(20);

    // Nothing is opened yet: connections and channels are created on first use.
    let manager = ConnectionManager::from_settings(&settings)?;

    // A channel borrowed from the shared pool. It goes back to the pool when dropped.
    {
        let channel = manager.acquire_channel(None).await?;
        println!("Borrowed channel {}", channel.raw().id());
    }

    // Consumers usually want the same channel every time they touch a given queue.
    let orders = manager.acquire_channel(Some("orders")).await?;
    let orders_again = manager.acquire_channel(Some("orders")).await?;
    assert_eq!(orders.raw().id(), orders_again.raw().id());

    // Queue channels first, then pooled channels, then connections.
    manager.close().await;
    Ok(())
}
