//! Pool of reusable request contexts.
//!
//! [`ContextPool::acquire`] hands out a [`PooledContext`] guard. Dropping the
//! guard resets the context and puts it back on the free list, so a context
//! is released exactly once however dispatch ends (normal return, early
//! return, or an unwinding panic).

use {
    crate::context::{Context, ContextSettings},
    parking_lot::Mutex,
    std::{
        fmt,
        ops::{Deref, DerefMut},
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    },
};

/// Free list of request contexts, safe to share between threads.
pub struct ContextPool {
    free: Mutex<Vec<Box<Context>>>,
    max_idle: usize,
    param_capacity: usize,
    settings: Arc<ContextSettings>,
    created: AtomicUsize,
}

impl ContextPool {
    pub(crate) fn new(
        settings: Arc<ContextSettings>,
        max_idle: usize,
        prewarm: usize,
        param_capacity: usize,
    ) -> Self {
        let pool = Self {
            free: Mutex::new(Vec::with_capacity(max_idle.min(prewarm.max(16)))),
            max_idle,
            param_capacity,
            settings,
            created: AtomicUsize::new(0),
        };
        {
            let mut free = pool.free.lock();
            for _ in 0..prewarm.min(max_idle) {
                free.push(pool.create());
            }
        }
        pool
    }

    fn create(&self) -> Box<Context> {
        self.created.fetch_add(1, Ordering::Relaxed);
        let mut ctx = Box::new(Context::new(self.settings.clone()));
        ctx.reserve_params(self.param_capacity);
        ctx
    }

    /// Takes a context off the free list, allocating one only when it is empty.
    pub(crate) fn acquire(&self) -> PooledContext<'_> {
        let recycled = self.free.lock().pop();
        let ctx = recycled.unwrap_or_else(|| self.create());
        PooledContext {
            pool: self,
            ctx: Some(ctx),
        }
    }

    fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(ctx);
        }
    }

    /// Contexts currently waiting on the free list.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Contexts allocated since the pool was created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Upper bound of the free list.
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("idle", &self.idle())
            .field("created", &self.created())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

/// A context on loan from the pool. Returned on drop.
pub(crate) struct PooledContext<'p> {
    pool: &'p ContextPool,
    ctx: Option<Box<Context>>,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx.as_deref().expect("context is present until the guard drops")
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
            .as_deref_mut()
            .expect("context is present until the guard drops")
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
