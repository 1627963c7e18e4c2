//! Thread-safe reuse of heap-allocated wrapper instances.
//!
//! Deserializing hot paths that repeatedly build [`GreedyVectorMut`]s (and
//! other owned wrappers) can hand instances back to an [`ObjectPool`] instead
//! of dropping them, trading allocation churn for a bounded free-list per
//! concrete type. The pool is an explicit object owned by the caller or
//! injected, never process-wide state, so independent deserializations never
//! share it by accident.
//!
//! A loan is represented by [`PoolHandle`]. Its atomic in-use flag is swapped
//! exactly once on the first successful return, which makes repeated returns
//! of the same loan no-ops rather than double-frees; a returned instance is
//! reset (backing references cleared, poolable children recursively returned)
//! before it rejoins the free-list.
//!
//! [`GreedyVectorMut`]: crate::vector::GreedyVectorMut

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// A type the pool can lend out and take back.
///
/// `reset` runs on return, before the instance rejoins the free-list: it must
/// clear backing references and hand any poolable children back to `pool`.
pub trait Poolable: Default + Send + 'static {
    /// Clear internal state before reuse.
    fn reset(&mut self, pool: &ObjectPool) {
        let _ = pool;
    }
}

/// An element type that knows how to hand itself back when its parent
/// container is returned to the pool.
///
/// The default implementation simply drops the value; [`PoolHandle`]
/// elements return their loan instead.
pub trait PoolElement: Send + 'static {
    /// Release this element as part of a recursive pool return.
    fn release(self, pool: &ObjectPool)
    where
        Self: Sized,
    {
        let _ = pool;
    }
}

macro_rules! impl_plain_pool_element {
    ($($ty:ty),+ $(,)?) => {
        $(impl PoolElement for $ty {})+
    };
}

impl_plain_pool_element!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64, String, Vec<u8>);

/// A shared free-list of reusable instances, keyed by concrete type.
///
/// Acquire and return are thread-safe; a pooled object may be returned by a
/// different thread than the one that acquired it.
///
/// # Examples
///
/// ```
/// use flatpeach::pool::ObjectPool;
/// use flatpeach::vector::GreedyVectorMut;
///
/// let pool = ObjectPool::new();
/// let mut loan = pool.acquire::<GreedyVectorMut<u32>>();
/// loan.get_mut().unwrap().push(7);
/// assert!(loan.return_to_pool(&pool));
/// // The same allocation comes back, reset.
/// let reused = pool.acquire::<GreedyVectorMut<u32>>();
/// assert!(reused.get().unwrap().is_empty());
/// ```
pub struct ObjectPool {
    shelves: Mutex<HashMap<TypeId, Vec<Box<dyn Any + Send>>>>,
    max_per_type: usize,
}

/// Default cap on retained instances per concrete type.
const DEFAULT_MAX_PER_TYPE: usize = 64;

impl ObjectPool {
    /// A pool retaining up to 64 instances per concrete type.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_PER_TYPE)
    }

    /// A pool retaining up to `max_per_type` instances per concrete type.
    /// Returns beyond the cap drop the instance instead.
    pub fn with_capacity(max_per_type: usize) -> Self {
        Self {
            shelves: Mutex::new(HashMap::new()),
            max_per_type,
        }
    }

    /// Take an instance of `T` off the free-list, or build a fresh default.
    /// The loan starts out in-use.
    pub fn acquire<T: Poolable>(&self) -> PoolHandle<T> {
        let recycled = self
            .shelves
            .lock()
            .get_mut(&TypeId::of::<T>())
            .and_then(Vec::pop);
        let item = match recycled {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(item) => item,
                // A shelf only ever holds its keyed type; a mismatch means
                // the entry is unusable, so fall back to a fresh instance.
                Err(_) => Box::new(T::default()),
            },
            None => Box::new(T::default()),
        };
        PoolHandle {
            item: Some(item),
            in_use: AtomicBool::new(true),
        }
    }

    /// Number of instances of `T` currently shelved.
    pub fn shelved<T: Poolable>(&self) -> usize {
        self.shelves
            .lock()
            .get(&TypeId::of::<T>())
            .map_or(0, Vec::len)
    }

    fn recycle<T: Poolable>(&self, item: Box<T>) {
        let mut shelves = self.shelves.lock();
        let shelf = shelves.entry(TypeId::of::<T>()).or_default();
        if shelf.len() < self.max_per_type {
            shelf.push(item);
        }
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("types", &self.shelves.lock().len())
            .field("max_per_type", &self.max_per_type)
            .finish()
    }
}

/// One loan from an [`ObjectPool`].
///
/// Access the borrowed instance through [`get`](Self::get) /
/// [`get_mut`](Self::get_mut); both answer `None` once the loan has been
/// returned. Dropping an unreturned handle simply drops the instance.
#[derive(Debug)]
pub struct PoolHandle<T: Poolable> {
    item: Option<Box<T>>,
    in_use: AtomicBool,
}

impl<T: Poolable> PoolHandle<T> {
    /// The loaned instance, unless already returned.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.item.as_deref()
    }

    /// Mutable access to the loaned instance, unless already returned.
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.item.as_deref_mut()
    }

    /// Whether the loan is still outstanding.
    #[inline]
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Reset the instance and shelve it back in `pool`.
    ///
    /// Returns `true` on the first successful return. Every later call on
    /// the same loan is a no-op returning `false`, guaranteed by an atomic
    /// exchange of the in-use flag.
    pub fn return_to_pool(&mut self, pool: &ObjectPool) -> bool {
        self.give_back(pool, false)
    }

    /// Like [`return_to_pool`](Self::return_to_pool), but skips the in-use
    /// guard. For recovery paths where the flag state is known stale; the
    /// instance itself is still handed back at most once.
    pub fn return_to_pool_force(&mut self, pool: &ObjectPool) -> bool {
        self.give_back(pool, true)
    }

    // Named apart from `PoolElement::release` so the trait method cannot
    // shadow it during method resolution.
    fn give_back(&mut self, pool: &ObjectPool, force: bool) -> bool {
        let was_in_use = self.in_use.swap(false, Ordering::AcqRel);
        if !was_in_use && !force {
            return false;
        }
        let Some(mut item) = self.item.take() else {
            return false;
        };
        item.reset(pool);
        pool.recycle(item);
        true
    }
}

impl<T: Poolable> PoolElement for PoolHandle<T> {
    fn release(mut self, pool: &ObjectPool) {
        self.give_back(pool, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::GreedyVectorMut;

    #[test]
    fn test_acquire_release_reuse() {
        let pool = ObjectPool::new();
        let mut loan = pool.acquire::<GreedyVectorMut<String>>();
        loan.get_mut().unwrap().push("hello".to_owned());
        assert!(loan.is_in_use());
        assert!(loan.return_to_pool(&pool));
        assert!(!loan.is_in_use());
        assert_eq!(pool.shelved::<GreedyVectorMut<String>>(), 1);

        let reused = pool.acquire::<GreedyVectorMut<String>>();
        assert_eq!(pool.shelved::<GreedyVectorMut<String>>(), 0);
        // Reset before reuse: the previous contents are gone.
        assert!(reused.get().unwrap().is_empty());
    }

    #[test]
    fn test_repeated_return_is_noop() {
        let pool = ObjectPool::new();
        let mut loan = pool.acquire::<GreedyVectorMut<u32>>();
        assert!(loan.return_to_pool(&pool));
        assert!(!loan.return_to_pool(&pool));
        assert!(!loan.return_to_pool(&pool));
        assert_eq!(pool.shelved::<GreedyVectorMut<u32>>(), 1);
        assert!(loan.get().is_none());
    }

    #[test]
    fn test_forced_return_cannot_double_shelve() {
        let pool = ObjectPool::new();
        let mut loan = pool.acquire::<GreedyVectorMut<u32>>();
        assert!(loan.return_to_pool(&pool));
        // Force bypasses the flag, but the instance is long gone.
        assert!(!loan.return_to_pool_force(&pool));
        assert_eq!(pool.shelved::<GreedyVectorMut<u32>>(), 1);
    }

    #[test]
    fn test_element_release_returns_loan() {
        let pool = ObjectPool::new();
        let loan = pool.acquire::<GreedyVectorMut<u32>>();
        // The by-value element path, as used when a parent container drains
        // its children back into the pool.
        PoolElement::release(loan, &pool);
        assert_eq!(pool.shelved::<GreedyVectorMut<u32>>(), 1);
    }

    #[test]
    fn test_recursive_child_return() {
        let pool = ObjectPool::new();
        let mut outer = pool.acquire::<GreedyVectorMut<PoolHandle<GreedyVectorMut<String>>>>();
        for _ in 0..2 {
            let mut child = pool.acquire::<GreedyVectorMut<String>>();
            child.get_mut().unwrap().push("x".to_owned());
            outer.get_mut().unwrap().push(child);
        }
        assert_eq!(pool.shelved::<GreedyVectorMut<String>>(), 0);

        assert!(outer.return_to_pool(&pool));
        // Children came back along with the parent.
        assert_eq!(pool.shelved::<GreedyVectorMut<String>>(), 2);
        assert_eq!(
            pool.shelved::<GreedyVectorMut<PoolHandle<GreedyVectorMut<String>>>>(),
            1
        );
    }

    #[test]
    fn test_capacity_cap_drops_excess() {
        let pool = ObjectPool::with_capacity(1);
        let mut a = pool.acquire::<GreedyVectorMut<u32>>();
        let mut b = pool.acquire::<GreedyVectorMut<u32>>();
        assert!(a.return_to_pool(&pool));
        assert!(b.return_to_pool(&pool)); // reset succeeds, shelving is skipped
        assert_eq!(pool.shelved::<GreedyVectorMut<u32>>(), 1);
    }

    #[test]
    fn test_cross_thread_return() {
        let pool = ObjectPool::new();
        let mut loan = pool.acquire::<GreedyVectorMut<u32>>();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(loan.return_to_pool(&pool));
            });
        });
        assert_eq!(pool.shelved::<GreedyVectorMut<u32>>(), 1);
    }

    #[test]
    fn test_dropping_unreturned_loan_is_fine() {
        let pool = ObjectPool::new();
        {
            let _loan = pool.acquire::<GreedyVectorMut<u32>>();
        }
        assert_eq!(pool.shelved::<GreedyVectorMut<u32>>(), 0);
    }
}
