use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

static SHARED_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_lock_poison_once(cell: &'static str, operation: &'static str) {
    if SHARED_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(cell, operation, "shared_lock_poisoned_recovered");
    }
}

/// Copyable value shared between the runtime and a host-side handle.
/// A poisoned lock is recovered instead of propagating the panic.
#[derive(Debug)]
pub(crate) struct SharedCell<T> {
    name: &'static str,
    value: Arc<RwLock<T>>,
}

impl<T> Clone for SharedCell<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Copy> SharedCell<T> {
    pub(crate) fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            value: Arc::new(RwLock::new(initial)),
        }
    }

    pub(crate) fn get(&self) -> T {
        match self.value.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_lock_poison_once(self.name, "read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn set(&self, value: T) {
        match self.value.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => {
                warn_lock_poison_once(self.name, "write");
                *poisoned.into_inner() = value;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn lock(&self) -> &RwLock<T> {
        self.value.as_ref()
    }
}

#[cfg(test)]
pub(crate) fn poison<T>(lock: &RwLock<T>)
where
    T: Send + Sync,
{
    std::thread::scope(|scope| {
        let _ = scope
            .spawn(|| {
                let _guard = lock.write().expect("write guard");
                panic!("poison shared lock");
            })
            .join();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_the_same_value() {
        let cell = SharedCell::new("test", 1u32);
        let other = cell.clone();
        other.set(7);
        assert_eq!(cell.get(), 7);
    }

    #[test]
    fn poisoned_cell_still_reads_and_writes() {
        let cell = SharedCell::new("test", 3u32);
        poison(cell.lock());
        assert_eq!(cell.get(), 3);
        cell.set(9);
        assert_eq!(cell.get(), 9);
    }
}
