use crate::pool::{BuildError, PoolError};

/// Error returned when acquiring connections and channels.
///
/// Failures coming from the broker are propagated as they are: this crate never retries
/// nor swallows them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to connect to the RabbitMq broker")]
    Connect(#[source] anyhow::Error),
    #[error("Failed to open a channel on a RabbitMq connection")]
    ChannelCreation(#[source] anyhow::Error),
    #[error("The connection manager has been closed")]
    PoolClosed,
    #[error("Invalid pool configuration")]
    Build(#[from] BuildError),
    #[error("Invalid RabbitMq configuration")]
    Configuration(#[source] anyhow::Error),
}

impl From<PoolError<Error>> for Error {
    fn from(err: PoolError<Error>) -> Self {
        match err {
            PoolError::Backend(e) => e,
            PoolError::Closed => Self::PoolClosed,
        }
    }
}
