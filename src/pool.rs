use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A pool of reusable values, used to amortize the allocation of the VM's
/// thread lists across executions.
///
/// The engine runs single-threaded: `get` hands out a guard that returns
/// the value to the pool on drop, and nested matching engine invocations
/// (lookarounds, atomic regions) simply check out additional values.
pub struct Pool<T> {
    stack: RefCell<Vec<T>>,
    create: Box<dyn Fn() -> T>,
}

impl<T> Pool<T> {
    /// Create a new pool. `create` is invoked whenever the pool is empty.
    pub fn new(create: Box<dyn Fn() -> T>) -> Pool<T> {
        Pool { stack: RefCell::new(vec![]), create }
    }

    /// Check a value out of the pool, creating one if none are cached.
    pub fn get(&self) -> PoolGuard<'_, T> {
        let value = self.stack.borrow_mut().pop().unwrap_or_else(|| (self.create)());
        PoolGuard { pool: self, value: Some(value) }
    }

    fn put(&self, value: T) {
        self.stack.borrow_mut().push(value);
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pool(cached: {})", self.stack.borrow().len())
    }
}

/// A checked-out pool value. Dereferences to `T`; returns the value to the
/// pool when dropped.
pub struct PoolGuard<'p, T> {
    pool: &'p Pool<T>,
    value: Option<T>,
}

impl<'p, T> Deref for PoolGuard<'p, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().unwrap()
    }
}

impl<'p, T> DerefMut for PoolGuard<'p, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap()
    }
}

impl<'p, T> Drop for PoolGuard<'p, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.put(value);
        }
    }
}
