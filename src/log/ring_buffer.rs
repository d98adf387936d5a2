use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed-capacity circular buffer that overwrites its oldest item once full.
///
/// The buffer carries its own mutex, so it can be shared behind an `Arc` or
/// stored inside a read-locked map and still be pushed to. Every operation,
/// including [`reset`](Self::reset), runs under that single lock.
#[derive(Debug)]
pub struct RingBuffer<T> {
    inner: Mutex<Ring<T>>,
}

#[derive(Debug)]
struct Ring<T> {
    buf: Vec<T>,
    /// Slot the next push writes to.
    head: usize,
    /// Slot holding the oldest item.
    tail: usize,
    len: usize,
    capacity: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            head: 0,
            tail: 0,
            len: 0,
            capacity,
        }
    }

    fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.len < self.capacity {
            // Not full yet: slots are filled in order, head == buf.len().
            self.buf.push(item);
            self.len += 1;
            self.head = (self.head + 1) % self.capacity;
        } else {
            self.buf[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
            self.tail = self.head;
        }
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

impl<T: Clone> Ring<T> {
    fn last_n(&self, n: usize) -> Vec<T> {
        let n = n.min(self.len);
        if n == 0 {
            return Vec::new();
        }
        let start = (self.tail + (self.len - n)) % self.capacity;
        (0..n)
            .map(|i| self.buf[(start + i) % self.capacity].clone())
            .collect()
    }
}

impl<T> RingBuffer<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ring::with_capacity(capacity)),
        }
    }

    // Every critical section is a single container operation, so the ring
    // is consistent even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `item`, overwriting the oldest item when full. O(1).
    pub fn push(&self, item: T) {
        self.lock().push(item);
    }

    /// Empties the buffer; capacity is kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drops all contents and switches to `capacity`.
    pub fn reset(&self, capacity: usize) {
        *self.lock() = Ring::with_capacity(capacity);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }
}

impl<T: Clone> RingBuffer<T> {
    /// The `n` most recently pushed items, oldest first.
    ///
    /// `n` is clamped to the current length.
    #[must_use]
    pub fn last_n(&self, n: usize) -> Vec<T> {
        self.lock().last_n(n)
    }

    /// Everything currently held, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.last_n(usize::MAX)
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}
