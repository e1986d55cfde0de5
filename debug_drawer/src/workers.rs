use std::cell::Cell;

/// Scoped producer threads, each handed a distinct worker index.
///
/// Worker indices run `0..num_workers` and are meant to be used directly as
/// [`DebugDrawer`](crate::DebugDrawer) thread indices, so size the drawer
/// with at least as many producers as the pool has workers.
///
/// # Example
///
/// ```
/// use redlilium_debug_drawer::WorkerPool;
///
/// let pool = WorkerPool::new(4);
///
/// let mut seen = vec![usize::MAX; 4];
/// pool.scope(|s| {
///     for slot in seen.iter_mut() {
///         s.spawn(move |index| *slot = index);
///     }
/// });
/// seen.sort();
/// assert_eq!(seen, vec![0, 1, 2, 3]);
/// ```
pub struct WorkerPool {
    num_workers: usize,
}

impl WorkerPool {
    /// Creates a pool with the given number of worker slots.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }

    /// Creates a pool sized to the number of available CPU cores.
    pub fn default_threads() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Runs `f` with a scope whose spawned workers may borrow locals.
    ///
    /// Every worker has finished when this returns.
    pub fn scope<'env, F, R>(&self, f: F) -> R
    where
        F: for<'scope> FnOnce(&WorkerScope<'scope, 'env>) -> R,
    {
        std::thread::scope(|s| {
            let scope = WorkerScope {
                inner: s,
                next_index: Cell::new(0),
                num_workers: self.num_workers,
            };
            f(&scope)
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::default_threads()
    }
}

/// Spawning handle passed to [`WorkerPool::scope`].
pub struct WorkerScope<'scope, 'env: 'scope> {
    inner: &'scope std::thread::Scope<'scope, 'env>,
    next_index: Cell<usize>,
    num_workers: usize,
}

impl<'scope> WorkerScope<'scope, '_> {
    /// Spawns a worker on its own thread and passes it the next free index.
    ///
    /// Panics if every index of the pool is already taken.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce(usize) + Send + 'scope,
    {
        let index = self.next_index.get();
        assert!(
            index < self.num_workers,
            "worker pool of {} exhausted",
            self.num_workers
        );
        self.next_index.set(index + 1);
        self.inner.spawn(move || f(index));
    }

    /// Workers spawned so far.
    pub fn spawned(&self) -> usize {
        self.next_index.get()
    }
}
