//! A capacity-bounded pool of resources created on demand by a [`Manager`].
use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use super::{BuildError, PoolError};

/// `Manager` tells a [`Pool`] how to create and how to dispose of its resources.
///
/// `create` is invoked lazily, only when a caller asks for a resource and no idle one is
/// available, and always while the caller holds one of the pool's capacity slots.
#[async_trait::async_trait]
pub trait Manager: Send + Sync + 'static {
    type Type: Send + Sync + 'static;
    type Error: Send;

    /// Create a new resource.
    async fn create(&self) -> Result<Self::Type, Self::Error>;

    /// Check an idle resource before handing it out again.
    ///
    /// Unhealthy resources are closed and discarded, a fresh one is created in their place.
    fn is_healthy(&self, _obj: &Self::Type) -> bool {
        true
    }

    /// Dispose of a resource that is leaving the pool for good.
    async fn close(&self, obj: &Self::Type) -> Result<(), anyhow::Error>;
}

/// A snapshot of the state of a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// The maximum number of live resources. `None` if the pool is unbounded.
    pub max_size: Option<usize>,
    /// Live resources tracked by the pool: idle, borrowed and detached.
    pub size: usize,
    /// Idle resources, ready to be handed out without creating a new one.
    pub available: usize,
    /// Resources handed over with [`Object::take`] that still hold a capacity slot.
    pub detached: usize,
}

/// A pool of resources of type `M::Type`.
///
/// Cloning a `Pool` is cheap: all clones share the same resources.
pub struct Pool<M: Manager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Manager> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct PoolInner<M: Manager> {
    manager: M,
    slots: Mutex<Slots<M::Type>>,
    /// One permit per capacity slot. `None` for unbounded pools.
    semaphore: Option<Arc<Semaphore>>,
    max_size: Option<usize>,
    /// Only ever flipped while holding the `slots` lock.
    closed: AtomicBool,
}

struct Slots<T> {
    idle: VecDeque<T>,
    detached: Vec<Detached<T>>,
    size: usize,
}

/// A resource that left the rotation but is still accounted for by the pool.
struct Detached<T> {
    obj: Arc<T>,
    _permit: Option<OwnedSemaphorePermit>,
}

/// Builder for [`Pool`].
pub struct PoolBuilder<M: Manager> {
    manager: M,
    max_size: Option<usize>,
}

impl<M: Manager> PoolBuilder<M> {
    /// Set the maximum number of live resources.
    pub fn max_size(self, max_size: usize) -> Self {
        self.capacity(Some(max_size))
    }

    /// Set the maximum number of live resources, `None` removing the limit altogether.
    ///
    /// Pools are unbounded by default.
    pub fn capacity(self, capacity: Option<usize>) -> Self {
        Self {
            max_size: capacity,
            ..self
        }
    }

    /// Finalize the builder.
    pub fn build(self) -> Result<Pool<M>, BuildError> {
        let semaphore = match self.max_size {
            Some(0) => return Err(BuildError::ZeroCapacity),
            Some(requested) if requested > Semaphore::MAX_PERMITS => {
                return Err(BuildError::CapacityTooLarge {
                    requested,
                    max: Semaphore::MAX_PERMITS,
                })
            }
            Some(max_size) => Some(Arc::new(Semaphore::new(max_size))),
            None => None,
        };
        Ok(Pool {
            inner: Arc::new(PoolInner {
                manager: self.manager,
                slots: Mutex::new(Slots {
                    idle: VecDeque::new(),
                    detached: Vec::new(),
                    size: 0,
                }),
                semaphore,
                max_size: self.max_size,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl<M: Manager> Pool<M> {
    /// Start building a [`Pool`] around `manager`.
    pub fn builder(manager: M) -> PoolBuilder<M> {
        PoolBuilder {
            manager,
            max_size: None,
        }
    }

    /// The [`Manager`] used by this pool.
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Borrow a resource from the pool.
    ///
    /// The resource goes back to the pool when the returned [`Object`] is dropped.
    /// If the pool is at capacity, this waits until another caller gives a resource back.
    pub async fn get(&self) -> Result<Object<M>, PoolError<M::Error>> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        self.inner.reclaim_detached();
        let permit = match &self.inner.semaphore {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| PoolError::Closed)?,
            ),
            None => None,
        };

        loop {
            let idle = {
                let mut slots = self.inner.slots();
                if self.is_closed() {
                    return Err(PoolError::Closed);
                }
                slots.idle.pop_front()
            };
            let Some(obj) = idle else { break };
            if self.inner.manager.is_healthy(&obj) {
                return Ok(Object::new(obj, permit, Arc::clone(&self.inner)));
            }
            debug!("Discarding an unhealthy pooled resource");
            self.inner.slots().size -= 1;
            self.inner.close_object(&obj).await;
        }

        let obj = self
            .inner
            .manager
            .create()
            .await
            .map_err(PoolError::Backend)?;
        {
            let mut slots = self.inner.slots();
            if !self.is_closed() {
                slots.size += 1;
                debug!(size = slots.size, "Created a new pooled resource");
                return Ok(Object::new(obj, permit, Arc::clone(&self.inner)));
            }
        }
        // The pool was closed while we were busy creating.
        self.inner.close_object(&obj).await;
        Err(PoolError::Closed)
    }

    /// Get a resource that will never be given back to the pool's rotation.
    ///
    /// The resource keeps its capacity slot until it is closed, and [`Pool::close`] still
    /// closes it. See [`Object::take`].
    pub async fn get_unscoped(&self) -> Result<Arc<M::Type>, PoolError<M::Error>> {
        self.get().await.map(Object::take)
    }

    /// Close the pool.
    ///
    /// Parked callers are woken up with [`PoolError::Closed`], idle and detached resources
    /// are closed. Resources that are currently borrowed are closed as soon as they are given
    /// back. Closing an already closed pool is a no-op.
    pub async fn close(&self) {
        let (idle, detached) = {
            let mut slots = self.inner.slots();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            let idle: Vec<M::Type> = slots.idle.drain(..).collect();
            let detached: Vec<Detached<M::Type>> = slots.detached.drain(..).collect();
            slots.size -= idle.len() + detached.len();
            (idle, detached)
        };
        if let Some(semaphore) = &self.inner.semaphore {
            semaphore.close();
        }
        debug!(
            n_idle = idle.len(),
            n_detached = detached.len(),
            "Closing pool"
        );
        let resources = idle
            .iter()
            .chain(detached.iter().map(|detached| detached.obj.as_ref()));
        futures_util::future::join_all(resources.map(|obj| self.inner.close_object(obj))).await;
    }

    /// `true` once [`Pool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Retrieve the current [`Status`] of the pool.
    pub fn status(&self) -> Status {
        let slots = self.inner.slots();
        Status {
            max_size: self.inner.max_size,
            size: slots.size,
            available: slots.idle.len(),
            detached: slots.detached.len(),
        }
    }
}

impl<M: Manager> PoolInner<M> {
    fn slots(&self) -> MutexGuard<'_, Slots<M::Type>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn return_object(self: &Arc<Self>, obj: M::Type) {
        {
            let mut slots = self.slots();
            if !self.closed.load(Ordering::Acquire) {
                slots.idle.push_back(obj);
                return;
            }
            slots.size -= 1;
        }
        self.close_later(obj);
    }

    fn detach(self: &Arc<Self>, obj: Arc<M::Type>, permit: Option<OwnedSemaphorePermit>) {
        {
            let mut slots = self.slots();
            if !self.closed.load(Ordering::Acquire) {
                slots.detached.push(Detached {
                    obj,
                    _permit: permit,
                });
                return;
            }
            slots.size -= 1;
        }
        self.close_later(obj);
    }

    /// Free the capacity slots of detached resources that have been closed since.
    fn reclaim_detached(&self) {
        let reclaimed: Vec<Detached<M::Type>> = {
            let mut slots = self.slots();
            let (reclaimed, detached): (Vec<_>, Vec<_>) = std::mem::take(&mut slots.detached)
                .into_iter()
                .partition(|detached| !self.manager.is_healthy(&detached.obj));
            slots.detached = detached;
            slots.size -= reclaimed.len();
            reclaimed
        };
        if !reclaimed.is_empty() {
            debug!(
                n_resources = reclaimed.len(),
                "Reclaimed the slots of closed detached resources"
            );
        }
    }

    /// Close `obj` on a background task, the caller being unable to wait for it.
    fn close_later<O>(self: &Arc<Self>, obj: O)
    where
        O: Borrow<M::Type> + Send + Sync + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(self);
                handle.spawn(async move {
                    let obj: &M::Type = obj.borrow();
                    inner.close_object(obj).await
                });
            }
            Err(_) => warn!(
                "A resource left a closed pool outside of a tokio runtime. \
                It will be dropped without being closed."
            ),
        }
    }

    async fn close_object(&self, obj: &M::Type) {
        if let Err(e) = self.manager.close(obj).await {
            warn!(error = ?e, "Failed to close a pooled resource");
        }
    }
}

/// A resource borrowed from a [`Pool`].
///
/// It is given back to the pool when dropped.
pub struct Object<M: Manager> {
    obj: Option<M::Type>,
    /// Released after `obj` has been given back, see `Drop`.
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner<M>>,
}

impl<M: Manager> Object<M> {
    fn new(obj: M::Type, permit: Option<OwnedSemaphorePermit>, pool: Arc<PoolInner<M>>) -> Self {
        Self {
            obj: Some(obj),
            permit,
            pool,
        }
    }

    /// Detach the resource from the pool's rotation.
    ///
    /// The pool will not hand it out again, but it keeps accounting for it: the resource
    /// holds on to its capacity slot until it is closed, either by its holders or by
    /// [`Pool::close`].
    pub fn take(mut this: Self) -> Arc<M::Type> {
        let obj = Arc::new(
            this.obj
                .take()
                .expect("A pooled object can only be detached once"),
        );
        let permit = this.permit.take();
        this.pool.detach(Arc::clone(&obj), permit);
        obj
    }
}

impl<M: Manager> Drop for Object<M> {
    fn drop(&mut self) {
        if let Some(obj) = self.obj.take() {
            self.pool.return_object(obj);
        }
    }
}

impl<M: Manager> Deref for Object<M> {
    type Target = M::Type;

    fn deref(&self) -> &M::Type {
        self.obj
            .as_ref()
            .expect("A pooled object cannot be used after being detached")
    }
}

impl<M: Manager> DerefMut for Object<M> {
    fn deref_mut(&mut self) -> &mut M::Type {
        self.obj
            .as_mut()
            .expect("A pooled object cannot be used after being detached")
    }
}

impl<M: Manager> AsRef<M::Type> for Object<M> {
    fn as_ref(&self) -> &M::Type {
        self
    }
}

impl<M: Manager> fmt::Debug for Object<M>
where
    M::Type: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.obj).finish()
    }
}
