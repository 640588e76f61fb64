/// Error returned by [`Pool::get`](super::Pool::get) and friends.
#[derive(thiserror::Error, Debug)]
pub enum PoolError<E> {
    /// The [`Manager`](super::Manager) failed to create a new resource.
    #[error(transparent)]
    Backend(E),
    /// The pool has been closed: no resource can be handed out or created anymore.
    #[error("The pool has been closed")]
    Closed,
}

/// Error returned when a [`Pool`](super::Pool) cannot be built.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("The maximum size of a pool must be greater than zero")]
    ZeroCapacity,
    #[error("The maximum size of a pool cannot exceed {max}, got {requested}")]
    CapacityTooLarge { requested: usize, max: usize },
}
