//! Per-worker scratch buffers.

use parking_lot::Mutex;

/// Fixed pool of scratch values shared by the workers of one stage.
///
/// Sized to the worker count, so a free slot normally exists; a worker that
/// finds none spins until one is released. There is no queueing and no
/// fairness.
#[derive(Debug)]
pub struct ScratchPool<T> {
    /// Never empty.
    slots: Vec<Mutex<T>>,
}

/// A single default slot.
impl<T: Default> Default for ScratchPool<T> {
    fn default() -> Self {
        Self::new(1, T::default)
    }
}

impl<T> ScratchPool<T> {
    /// Build `size` slots (at least one) with `make`.
    pub fn new(size: usize, mut make: impl FnMut() -> T) -> Self {
        Self {
            slots: (0..size.max(1)).map(|_| Mutex::new(make())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run `f` with exclusive access to the first free slot.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        loop {
            for slot in &self.slots {
                if let Some(mut guard) = slot.try_lock() {
                    return f(&mut guard);
                }
            }
            std::hint::spin_loop();
        }
    }
}
