//! Handle collections drained once at shutdown.
//!
//! Workers register handles as they are created; the shutdown path drains
//! the collection exactly once. After the drain the registry is sealed and
//! further registrations hand the handle back to the caller, which must
//! close it itself.

use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
struct Inner<H> {
    handles: Vec<Arc<H>>,
    sealed: bool,
}

/// A mutex-guarded set of worker handles.
#[derive(Debug)]
pub struct HandleRegistry<H> {
    inner: Mutex<Inner<H>>,
}

impl<H> Default for HandleRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> HandleRegistry<H> {
    /// Create an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                handles: Vec::new(),
                sealed: false,
            }),
        }
    }

    /// Register a handle.
    ///
    /// # Errors
    ///
    /// Returns the handle back if the registry has already been drained.
    pub fn register(&self, handle: Arc<H>) -> Result<(), Arc<H>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.sealed {
            return Err(handle);
        }
        inner.handles.push(handle);
        Ok(())
    }

    /// Take every registered handle and seal the registry.
    pub fn drain(&self) -> Vec<Arc<H>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.sealed = true;
        std::mem::take(&mut inner.handles)
    }

    /// Number of handles currently registered.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handles
            .len()
    }

    /// Whether no handles are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the registry has been drained.
    pub fn is_sealed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drain() {
        let registry = HandleRegistry::new();
        registry.register(Arc::new(1)).unwrap();
        registry.register(Arc::new(2)).unwrap();
        assert_eq!(registry.len(), 2);

        let drained: Vec<i32> = registry.drain().iter().map(|h| **h).collect();
        assert_eq!(drained, vec![1, 2]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_after_drain_returns_handle() {
        let registry = HandleRegistry::new();
        assert!(!registry.is_sealed());
        assert!(registry.drain().is_empty());
        assert!(registry.is_sealed());

        let rejected = registry.register(Arc::new("late")).unwrap_err();
        assert_eq!(*rejected, "late");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_second_drain_is_empty() {
        let registry = HandleRegistry::new();
        registry.register(Arc::new(1)).unwrap();
        assert_eq!(registry.drain().len(), 1);
        assert!(registry.drain().is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(HandleRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        registry.register(Arc::new(i * 100 + j)).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.drain().len(), 800);
    }
}
