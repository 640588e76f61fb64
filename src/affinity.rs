//! Sticky queue-to-channel assignment.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::transport::BrokerChannel;
use crate::Error;

/// `AffinityMap` pins one channel to each queue name.
///
/// Channels stored here live outside of the shared [`ChannelPool`](crate::pool::ChannelPool)
/// rotation: they are never given back to the pool and are only closed by
/// [`AffinityMap::close`].
pub struct AffinityMap<T> {
    state: Mutex<State<T>>,
}

struct State<T> {
    /// Each queue gets its own cell, so that channel creation for one queue does not hold up
    /// lookups for the others.
    channels: HashMap<String, Arc<OnceCell<Arc<T>>>>,
    closed: bool,
}

impl<T> Default for AffinityMap<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                channels: HashMap::new(),
                closed: false,
            }),
        }
    }
}

impl<T: BrokerChannel> AffinityMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the channel pinned to `queue_name`, creating it with `create` on first use.
    ///
    /// Concurrent first uses of the same queue name share a single `create` call.
    /// If `create` fails, nothing is stored and the next call tries again.
    pub async fn get_or_try_insert_with<F, Fut>(
        &self,
        queue_name: &str,
        create: F,
    ) -> Result<Arc<T>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, Error>>,
    {
        let cell = {
            let mut state = self.state();
            if state.closed {
                return Err(Error::PoolClosed);
            }
            Arc::clone(state.channels.entry(queue_name.to_owned()).or_default())
        };
        let channel = match cell
            .get_or_try_init(|| async {
                debug!(queue_name, "Pinning a new channel to queue");
                create().await
            })
            .await
        {
            Ok(channel) => Arc::clone(channel),
            Err(e) => {
                self.forget_empty_cell(queue_name, &cell);
                return Err(e);
            }
        };

        if self.is_closed() {
            // The map was closed while the channel was being created.
            close_channel(channel.as_ref()).await;
            return Err(Error::PoolClosed);
        }
        Ok(channel)
    }

    /// The channel pinned to `queue_name`, if any.
    pub fn get(&self, queue_name: &str) -> Option<Arc<T>> {
        self.state()
            .channels
            .get(queue_name)
            .and_then(|cell| cell.get().cloned())
    }

    /// The number of queues with a pinned channel.
    pub fn len(&self) -> usize {
        self.state()
            .channels
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Close every pinned channel and forget about them.
    ///
    /// Channels that are already closed are skipped. Calling `close` again is a no-op.
    pub async fn close(&self) {
        let channels: Vec<Arc<T>> = {
            let mut state = self.state();
            state.closed = true;
            state
                .channels
                .drain()
                .filter_map(|(_, cell)| cell.get().cloned())
                .collect()
        };
        debug!(n_channels = channels.len(), "Closing queue channels");
        futures_util::future::join_all(
            channels
                .iter()
                .map(|channel| close_channel(channel.as_ref())),
        )
        .await;
    }

    /// Drop the entry for `queue_name` if it is still `cell` and nobody managed to fill it.
    fn forget_empty_cell(&self, queue_name: &str, cell: &Arc<OnceCell<Arc<T>>>) {
        let mut state = self.state();
        let is_empty_cell = state
            .channels
            .get(queue_name)
            .map_or(false, |current| {
                Arc::ptr_eq(current, cell) && !current.initialized()
            });
        if is_empty_cell {
            state.channels.remove(queue_name);
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn close_channel<T: BrokerChannel>(channel: &T) {
    if channel.is_closed() {
        return;
    }
    if let Err(e) = channel.close().await {
        warn!(error = ?e, "Failed to close queue channel");
    }
}
